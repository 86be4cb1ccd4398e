//! # Body — Gravity, Platforms and Jumping
//!
//! A `body` falls under the game's gravity until it lands on a `solid`.
//! While it stands on a platform it stops falling; walking off the edge (or
//! the platform being destroyed) starts the fall again.
//!
//! ```text
//!   airborne ── land on solid (moving down) ──► grounded   "ground"
//!       ▲   └── hit solid from below ──► vel.y = 0         "headbutt"
//!       └───── jump() / platform gone ───────────┘
//! ```

use crate::collision::Side;
use crate::context::Context;
use crate::error::Result;
use crate::object::{Component, EventArg, ObjId};

pub const DEFAULT_JUMP_FORCE: f32 = 640.0;
pub const DEFAULT_MAX_VEL: f32 = 65536.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub jump_force: f32,
    /// Terminal falling speed.
    pub max_vel: f32,
    /// Gravity multiplier.
    pub weight: f32,
    pub vel_y: f32,
    cur_platform: Option<ObjId>,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            jump_force: DEFAULT_JUMP_FORCE,
            max_vel: DEFAULT_MAX_VEL,
            weight: 1.0,
            vel_y: 0.0,
            cur_platform: None,
        }
    }
}

impl Body {
    pub fn jump_force(mut self, force: f32) -> Self {
        self.jump_force = force;
        self
    }

    pub fn max_vel(mut self, max: f32) -> Self {
        self.max_vel = max;
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn cur_platform(&self) -> Option<ObjId> {
        self.cur_platform
    }

    pub fn is_grounded(&self) -> bool {
        self.cur_platform.is_some()
    }

    pub fn is_falling(&self) -> bool {
        self.vel_y > 0.0
    }

    pub fn is_jumping(&self) -> bool {
        self.vel_y < 0.0
    }

    fn jump(&mut self, force: Option<f32>) {
        self.cur_platform = None;
        self.vel_y = -force.unwrap_or(self.jump_force);
    }
}

impl Component for Body {
    fn id(&self) -> Option<&str> {
        Some("body")
    }

    fn require(&self) -> &[&'static str] {
        &["pos", "area"]
    }

    fn members(&self) -> &[&'static str] {
        &["jump", "is_grounded", "is_falling"]
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        if let Some(p) = self.cur_platform {
            if !ctx.exists(p) || !ctx.is_colliding(obj, p) {
                self.cur_platform = None;
            }
        }
        let airborne = self.cur_platform.is_none();
        if airborne {
            let dt = ctx.time.dt();
            self.vel_y = (self.vel_y + ctx.gravity() * self.weight * dt).min(self.max_vel);
            ctx.move_by(obj, crate::math::Vec2::new(0.0, self.vel_y * dt));
        }
        let hits = ctx.resolve_solids(obj);
        if !airborne {
            return Ok(());
        }
        for (target, side) in hits {
            match side {
                Side::Bottom if self.vel_y > 0.0 => {
                    self.cur_platform = Some(target);
                    self.vel_y = 0.0;
                    ctx.trigger(obj, "ground", target)?;
                }
                Side::Top if self.vel_y < 0.0 => {
                    self.vel_y = 0.0;
                    ctx.trigger(obj, "headbutt", target)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn call(&mut self, _ctx: &mut Context, _obj: ObjId, member: &str, arg: &EventArg) -> Result<EventArg> {
        Ok(match member {
            "jump" => {
                self.jump(arg.as_number());
                EventArg::None
            }
            "is_grounded" => EventArg::Number(if self.is_grounded() { 1.0 } else { 0.0 }),
            "is_falling" => EventArg::Number(if self.is_falling() { 1.0 } else { 0.0 }),
            _ => EventArg::None,
        })
    }

    fn inspect(&self) -> Option<String> {
        Some(match self.cur_platform {
            Some(p) => format!("on {p}"),
            None => format!("vel {:.0}", self.vel_y),
        })
    }
}

/// Marks an object that bodies stand on and cannot pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Solid;

impl Component for Solid {
    fn id(&self) -> Option<&str> {
        Some("solid")
    }

    fn require(&self) -> &[&'static str] {
        &["area"]
    }
}

pub fn body() -> Body {
    Body::default()
}

pub fn solid() -> Solid {
    Solid
}

impl Context {
    /// Launch the object's body upward. `None` uses its own jump force.
    pub fn jump(&mut self, obj: ObjId, force: Option<f32>) {
        if let Some(b) = self.c_mut::<Body>(obj) {
            b.jump(force);
        }
    }

    pub fn is_grounded(&self, obj: ObjId) -> bool {
        self.c::<Body>(obj).is_some_and(Body::is_grounded)
    }

    pub fn is_falling(&self, obj: ObjId) -> bool {
        self.c::<Body>(obj).is_some_and(Body::is_falling)
    }

    /// Fires when the object lands on a platform.
    pub fn on_ground(&mut self, obj: ObjId, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> crate::event::EventController {
        self.on_obj(obj, "ground", move |ctx, _, arg| match arg.as_obj() {
            Some(platform) => f(ctx, platform),
            None => Ok(()),
        })
    }

    /// Fires when the object bumps a solid from below.
    pub fn on_headbutt(&mut self, obj: ObjId, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> crate::event::EventController {
        self.on_obj(obj, "headbutt", move |ctx, _, arg| match arg.as_obj() {
            Some(block) => f(ctx, block),
            None => Ok(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps;
    use crate::comps::{area, pos, rect};
    use crate::config::KaboomConfig;
    use crate::math::Vec2;
    use std::cell::Cell;
    use std::rc::Rc;

    fn ctx() -> Context {
        Context::headless(KaboomConfig::default().gravity(1000.0)).unwrap()
    }

    #[test]
    fn body_requires_pos_and_area() {
        let mut ctx = ctx();
        let err = ctx.add(comps![pos(0.0, 0.0), body()]).unwrap_err();
        assert_eq!(err.name(), "MissingRequire");
    }

    #[test]
    fn falls_lands_and_jumps() {
        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 100.0), rect(200.0, 20.0), area(), solid()]).unwrap();
        let bean = ctx.add(comps![pos(50.0, 0.0), rect(20.0, 20.0), area(), body()]).unwrap();
        let landed = Rc::new(Cell::new(0));
        let l = landed.clone();
        ctx.on_ground(bean, move |_, _| {
            l.set(l.get() + 1);
            Ok(())
        });

        for _ in 0..120 {
            ctx.step(1.0 / 60.0).unwrap();
        }
        assert!(ctx.is_grounded(bean));
        assert_eq!(landed.get(), 1);
        assert!((ctx.pos(bean).unwrap().y - 80.0).abs() < 1e-3);

        ctx.jump(bean, None);
        ctx.step(1.0 / 60.0).unwrap();
        assert!(!ctx.is_grounded(bean));
        assert!(ctx.pos(bean).unwrap().y < 80.0);
    }

    #[test]
    fn walking_off_the_edge_falls_again() {
        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 100.0), rect(100.0, 20.0), area(), solid()]).unwrap();
        let bean = ctx.add(comps![pos(10.0, 80.0), rect(20.0, 20.0), area(), body()]).unwrap();
        for _ in 0..5 {
            ctx.step(1.0 / 60.0).unwrap();
        }
        assert!(ctx.is_grounded(bean));
        ctx.set_pos(bean, Vec2::new(300.0, 80.0));
        ctx.step(1.0 / 60.0).unwrap();
        assert!(!ctx.is_grounded(bean));
        assert!(ctx.is_falling(bean));
    }

    #[test]
    fn headbutt_stops_upward_motion() {
        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 0.0), rect(100.0, 20.0), area(), solid()]).unwrap();
        let bean = ctx.add(comps![pos(10.0, 25.0), rect(20.0, 20.0), area(), body()]).unwrap();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        ctx.on_headbutt(bean, move |_, _| {
            h.set(true);
            Ok(())
        });
        ctx.jump(bean, Some(600.0));
        ctx.step(1.0 / 60.0).unwrap();
        assert!(hit.get());
        assert!((ctx.pos(bean).unwrap().y - 20.0).abs() < 1e-3);
    }
}
