//! Behavior components: `move`, `follow`, `offscreen`, `lifespan`, `timer`,
//! `health` and `state`.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{KaboomError, Result};
use crate::event::EventController;
use crate::geometry::Rect;
use crate::math::{Vec2, vec2_from_angle};
use crate::object::{Component, EventArg, ObjId};

use super::Opacity;

// ── move / follow ────────────────────────────────────────────────────────

/// Moves the object along a fixed direction every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub dir: Vec2,
    pub speed: f32,
}

impl Component for Move {
    fn id(&self) -> Option<&str> {
        Some("move")
    }

    fn require(&self) -> &[&'static str] {
        &["pos"]
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        ctx.move_at(obj, self.dir * self.speed);
        Ok(())
    }
}

/// Move along `dir` (normalized) at `speed` pixels per second.
pub fn move_toward(dir: Vec2, speed: f32) -> Move {
    Move { dir: dir.normalize_or_zero(), speed }
}

/// Move at `angle` degrees at `speed` pixels per second.
pub fn move_angle(angle: f32, speed: f32) -> Move {
    Move { dir: vec2_from_angle(angle), speed }
}

/// Keeps the object at a fixed offset from another object's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Follow {
    pub target: ObjId,
    pub offset: Vec2,
}

impl Follow {
    fn snap(&self, ctx: &mut Context, obj: ObjId) {
        if !ctx.exists(self.target) {
            return;
        }
        if let Some(p) = ctx.pos(self.target) {
            ctx.set_pos(obj, p + self.offset);
        }
    }
}

impl Component for Follow {
    fn id(&self) -> Option<&str> {
        Some("follow")
    }

    fn require(&self) -> &[&'static str] {
        &["pos"]
    }

    fn add(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        self.snap(ctx, obj);
        Ok(())
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        self.snap(ctx, obj);
        Ok(())
    }
}

pub fn follow(target: ObjId, offset: Vec2) -> Follow {
    Follow { target, offset }
}

// ── offscreen ────────────────────────────────────────────────────────────

/// Tracks whether the object is on screen. Fires `exit_view` and
/// `enter_view` on the edges and can hide or destroy the object while out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offscreen {
    pub hide: bool,
    pub destroy: bool,
    /// Margin beyond the screen edge before the object counts as out.
    pub distance: f32,
    is_out: bool,
}

impl Offscreen {
    pub fn hide(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn destroy(mut self) -> Self {
        self.destroy = true;
        self
    }

    pub fn distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    pub fn is_out(&self) -> bool {
        self.is_out
    }
}

impl Component for Offscreen {
    fn id(&self) -> Option<&str> {
        Some("offscreen")
    }

    fn require(&self) -> &[&'static str] {
        &["pos"]
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let Some(p) = ctx.screen_pos(obj) else {
            return Ok(());
        };
        let screen = Rect::new(Vec2::ZERO, ctx.gfx.width(), ctx.gfx.height());
        let out = !screen.contains(p) && dist_sq_outside(&screen, p) > self.distance * self.distance;
        if out != self.is_out {
            self.is_out = out;
            ctx.trigger(obj, if out { "exit_view" } else { "enter_view" }, EventArg::None)?;
        }
        if self.hide {
            if let Some(o) = ctx.obj_mut(obj) {
                o.hidden = out;
            }
        }
        if out && self.destroy {
            ctx.destroy(obj)?;
        }
        Ok(())
    }
}

/// Squared distance from `p` to the nearest point of `r`.
fn dist_sq_outside(r: &Rect, p: Vec2) -> f32 {
    let nearest = p.clamp(r.min(), r.max());
    (p - nearest).length_squared()
}

pub fn offscreen() -> Offscreen {
    Offscreen::default()
}

// ── lifespan ─────────────────────────────────────────────────────────────

/// Destroys the object after `time` seconds, first fading its opacity out
/// over `fade` seconds when it has one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifespan {
    pub time: f32,
    pub fade: f32,
    elapsed: f32,
}

impl Lifespan {
    pub fn fade(mut self, fade: f32) -> Self {
        self.fade = fade.max(0.0);
        self
    }
}

impl Component for Lifespan {
    fn id(&self) -> Option<&str> {
        Some("lifespan")
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        self.elapsed += ctx.time.dt();
        if self.elapsed < self.time {
            return Ok(());
        }
        let fading = self.fade > 0.0 && ctx.c::<Opacity>(obj).is_some();
        if fading {
            let t = ((self.elapsed - self.time) / self.fade).min(1.0);
            ctx.set_opacity(obj, 1.0 - t);
            if t < 1.0 {
                return Ok(());
            }
        }
        ctx.destroy(obj)
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{:.1}s", (self.time - self.elapsed).max(0.0)))
    }
}

pub fn lifespan(time: f32) -> Lifespan {
    Lifespan { time, fade: 0.0, elapsed: 0.0 }
}

// ── timer ────────────────────────────────────────────────────────────────

/// Scope for object-owned timers ([`Context::obj_wait`],
/// [`Context::obj_loop`]). Removing it cancels them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerComp;

impl Component for TimerComp {
    fn id(&self) -> Option<&str> {
        Some("timer")
    }

    fn destroy(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        ctx.timers.cancel_owned(obj);
        Ok(())
    }
}

pub fn timer() -> TimerComp {
    TimerComp
}

// ── health ───────────────────────────────────────────────────────────────

/// Hit points. `hurt` and `heal` fire after the new value is set; `death`
/// fires whenever hp is set to zero or below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub hp: f32,
}

impl Health {
    fn set_hp(&mut self, ctx: &mut Context, obj: ObjId, hp: f32) -> Result<()> {
        self.hp = hp;
        if self.hp <= 0.0 {
            ctx.trigger(obj, "death", EventArg::None)?;
        }
        Ok(())
    }
}

impl Component for Health {
    fn id(&self) -> Option<&str> {
        Some("health")
    }

    fn members(&self) -> &[&'static str] {
        &["hurt", "heal", "hp", "set_hp"]
    }

    fn call(&mut self, ctx: &mut Context, obj: ObjId, member: &str, arg: &EventArg) -> Result<EventArg> {
        let n = arg.as_number();
        match member {
            "hurt" => {
                self.set_hp(ctx, obj, self.hp - n.unwrap_or(1.0))?;
                ctx.trigger(obj, "hurt", EventArg::None)?;
            }
            "heal" => {
                self.set_hp(ctx, obj, self.hp + n.unwrap_or(1.0))?;
                ctx.trigger(obj, "heal", EventArg::None)?;
            }
            "set_hp" => {
                if let Some(n) = n {
                    self.set_hp(ctx, obj, n)?;
                }
            }
            _ => {}
        }
        Ok(EventArg::Number(self.hp))
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{}", self.hp))
    }
}

pub fn health(hp: f32) -> Health {
    Health { hp }
}

// ── state ────────────────────────────────────────────────────────────────

/// A finite state machine. Entering a state fires `state_enter` with the
/// new state's name and `state_transition` with `"from -> to"`; leaving
/// fires `state_end`. While in a state, `state_update` and `state_draw` fire
/// every frame with its name.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub state: String,
    states: Option<Vec<String>>,
    transitions: Option<HashMap<String, Vec<String>>>,
    entered: bool,
}

impl State {
    /// Restrict the machine to these states.
    pub fn states(mut self, states: &[&str]) -> Self {
        self.states = Some(states.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Allow `from -> to` for every `to` given. Once any transition is
    /// declared, undeclared ones are rejected.
    pub fn transition(mut self, from: &str, to: &[&str]) -> Self {
        self.transitions
            .get_or_insert_with(HashMap::new)
            .insert(from.to_string(), to.iter().map(|s| s.to_string()).collect());
        self
    }

    fn enter(&mut self, ctx: &mut Context, obj: ObjId, next: &str) -> Result<()> {
        self.entered = true;
        if let Some(states) = &self.states {
            if !states.iter().any(|s| s == next) {
                return Err(KaboomError::custom(format!("State not found: {next}")));
            }
        }
        if let Some(transitions) = &self.transitions {
            let Some(available) = transitions.get(&self.state) else {
                return Ok(());
            };
            if !available.iter().any(|s| s == next) {
                let list = available.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(", ");
                return Err(KaboomError::custom(format!(
                    "Cannot transition state from \"{}\" to \"{next}\". Available transitions: {list}",
                    self.state
                )));
            }
        }
        let old = std::mem::replace(&mut self.state, next.to_string());
        ctx.trigger(obj, "state_end", EventArg::Text(old.clone()))?;
        ctx.trigger(obj, "state_enter", EventArg::Text(next.to_string()))?;
        ctx.trigger(obj, "state_transition", EventArg::Text(format!("{old} -> {next}")))
    }
}

impl Component for State {
    fn id(&self) -> Option<&str> {
        Some("state")
    }

    fn members(&self) -> &[&'static str] {
        &["enter_state"]
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        if !self.entered {
            self.entered = true;
            ctx.trigger(obj, "state_enter", EventArg::Text(self.state.clone()))?;
        }
        ctx.trigger(obj, "state_update", EventArg::Text(self.state.clone()))
    }

    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        ctx.trigger(obj, "state_draw", EventArg::Text(self.state.clone()))
    }

    fn call(&mut self, ctx: &mut Context, obj: ObjId, member: &str, arg: &EventArg) -> Result<EventArg> {
        if member == "enter_state" {
            if let Some(next) = arg.as_text() {
                self.enter(ctx, obj, next)?;
            }
        }
        Ok(EventArg::Text(self.state.clone()))
    }

    fn inspect(&self) -> Option<String> {
        Some(self.state.clone())
    }
}

pub fn state(initial: &str) -> State {
    State { state: initial.to_string(), states: None, transitions: None, entered: false }
}

// ── Context helpers ──────────────────────────────────────────────────────

impl Context {
    pub fn hp(&self, obj: ObjId) -> Option<f32> {
        self.c::<Health>(obj).map(|h| h.hp)
    }

    pub fn hurt(&mut self, obj: ObjId, n: f32) -> Result<()> {
        self.call(obj, "hurt", n).map(|_| ())
    }

    pub fn heal(&mut self, obj: ObjId, n: f32) -> Result<()> {
        self.call(obj, "heal", n).map(|_| ())
    }

    pub fn set_hp(&mut self, obj: ObjId, hp: f32) -> Result<()> {
        self.call(obj, "set_hp", hp).map(|_| ())
    }

    pub fn on_death(&mut self, obj: ObjId, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_obj(obj, "death", move |ctx, obj, _| f(ctx, obj))
    }

    pub fn cur_state(&self, obj: ObjId) -> Option<&str> {
        self.c::<State>(obj).map(|s| s.state.as_str())
    }

    pub fn enter_state(&mut self, obj: ObjId, state: &str) -> Result<()> {
        self.with_comp::<State, _>(obj, |s, ctx| s.enter(ctx, obj, state)).map(|_| ())
    }

    pub fn on_state_enter(&mut self, obj: ObjId, state: &str, f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_state_event(obj, "state_enter", state, f)
    }

    pub fn on_state_update(&mut self, obj: ObjId, state: &str, f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_state_event(obj, "state_update", state, f)
    }

    pub fn on_state_draw(&mut self, obj: ObjId, state: &str, f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_state_event(obj, "state_draw", state, f)
    }

    pub fn on_state_end(&mut self, obj: ObjId, state: &str, f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_state_event(obj, "state_end", state, f)
    }

    pub fn on_state_transition(
        &mut self,
        obj: ObjId,
        from: &str,
        to: &str,
        f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static,
    ) -> EventController {
        self.on_state_event(obj, "state_transition", &format!("{from} -> {to}"), f)
    }

    fn on_state_event(
        &mut self,
        obj: ObjId,
        event: &str,
        state: &str,
        mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static,
    ) -> EventController {
        let state = state.to_string();
        self.on_obj(obj, event, move |ctx, obj, arg| if arg.as_text() == Some(state.as_str()) { f(ctx, obj) } else { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps;
    use crate::comps::{opacity, pos};
    use crate::config::KaboomConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ctx() -> Context {
        Context::headless(KaboomConfig::default().size(200.0, 100.0)).unwrap()
    }

    #[test]
    fn move_advances_by_speed_times_dt() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![pos(0.0, 0.0), move_toward(Vec2::new(3.0, 4.0), 10.0)]).unwrap();
        ctx.step(0.5).unwrap();
        let p = ctx.pos(obj).unwrap();
        assert!((p - Vec2::new(3.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn follow_tracks_target() {
        let mut ctx = ctx();
        let leader = ctx.add(comps![pos(10.0, 10.0)]).unwrap();
        let tail = ctx.add(comps![pos(0.0, 0.0), follow(leader, Vec2::new(-5.0, 0.0))]).unwrap();
        assert_eq!(ctx.pos(tail), Some(Vec2::new(5.0, 10.0)));
        ctx.set_pos(leader, Vec2::new(50.0, 20.0));
        ctx.step(0.1).unwrap();
        assert_eq!(ctx.pos(tail), Some(Vec2::new(45.0, 20.0)));
    }

    #[test]
    fn offscreen_fires_edges_and_destroys() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![pos(100.0, 50.0), offscreen().hide()]).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for ev in ["exit_view", "enter_view"] {
            let l = log.clone();
            ctx.on_obj(obj, ev, move |_, _, _| {
                l.borrow_mut().push(ev);
                Ok(())
            });
        }
        ctx.step(0.1).unwrap();
        ctx.set_pos(obj, Vec2::new(500.0, 50.0));
        ctx.step(0.1).unwrap();
        assert!(ctx.obj(obj).unwrap().hidden);
        ctx.set_pos(obj, Vec2::new(100.0, 50.0));
        ctx.step(0.1).unwrap();
        assert!(!ctx.obj(obj).unwrap().hidden);
        assert_eq!(*log.borrow(), vec!["exit_view", "enter_view"]);

        let doomed = ctx.add(comps![pos(-300.0, 0.0), offscreen().destroy().distance(10.0)]).unwrap();
        ctx.step(0.1).unwrap();
        assert!(!ctx.exists(doomed));
    }

    #[test]
    fn lifespan_fades_then_destroys() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![opacity(1.0), lifespan(0.5).fade(0.5)]).unwrap();
        for _ in 0..6 {
            ctx.step(0.1).unwrap();
        }
        let op = ctx.c::<Opacity>(obj).unwrap().opacity;
        assert!((op - 0.8).abs() < 1e-3);
        for _ in 0..5 {
            ctx.step(0.1).unwrap();
        }
        assert!(!ctx.exists(obj));
    }

    #[test]
    fn health_hurt_heal_death() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![health(3.0)]).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for ev in ["hurt", "heal", "death"] {
            let l = log.clone();
            ctx.on_obj(obj, ev, move |_, _, _| {
                l.borrow_mut().push(ev);
                Ok(())
            });
        }
        ctx.hurt(obj, 1.0).unwrap();
        ctx.heal(obj, 2.0).unwrap();
        ctx.hurt(obj, 4.0).unwrap();
        assert_eq!(ctx.hp(obj), Some(0.0));
        assert_eq!(*log.borrow(), vec!["hurt", "heal", "death", "hurt"]);
    }

    #[test]
    fn state_machine_events_and_transitions() {
        let mut ctx = ctx();
        let obj = ctx
            .add(comps![state("idle").states(&["idle", "attack", "move"]).transition("idle", &["attack"])])
            .unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        ctx.on_state_enter(obj, "idle", move |_, _| {
            l.borrow_mut().push("enter idle");
            Ok(())
        });
        let l = log.clone();
        ctx.on_state_update(obj, "attack", move |_, _| {
            l.borrow_mut().push("update attack");
            Ok(())
        });
        let l = log.clone();
        ctx.on_state_transition(obj, "idle", "attack", move |_, _| {
            l.borrow_mut().push("idle -> attack");
            Ok(())
        });
        ctx.step(0.1).unwrap();
        assert!(ctx.enter_state(obj, "move").is_err());
        assert!(ctx.enter_state(obj, "fly").is_err());
        ctx.enter_state(obj, "attack").unwrap();
        ctx.step(0.1).unwrap();
        assert_eq!(ctx.cur_state(obj), Some("attack"));
        assert_eq!(*log.borrow(), vec!["enter idle", "idle -> attack", "update attack"]);
        // no transitions declared out of "attack": ignored
        ctx.enter_state(obj, "idle").unwrap();
        assert_eq!(ctx.cur_state(obj), Some("attack"));
    }

    #[test]
    fn removing_timer_cancels_owned_timers() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![timer()]).unwrap();
        let fired = Rc::new(RefCell::new(false));
        let f = fired.clone();
        ctx.obj_wait(obj, 0.1, move |_, _| {
            *f.borrow_mut() = true;
            Ok(())
        });
        ctx.unuse(obj, "timer").unwrap();
        ctx.step(0.2).unwrap();
        assert!(!*fired.borrow());
    }
}
