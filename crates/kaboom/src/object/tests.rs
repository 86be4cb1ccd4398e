use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::assets::SpriteOpt;
use crate::comps::{self as c, Mask, move_toward, pos, rect, z};
use crate::config::KaboomConfig;
use crate::gfx::{NullBackend, Recorded};
use crate::{KaboomError, comps};

type Log = Rc<RefCell<Vec<String>>>;

fn ctx() -> Context {
    Context::headless(KaboomConfig::default().size(200.0, 200.0)).unwrap()
}

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Writes `update <name>`, `draw <name>` and custom events into a shared log.
struct Recorder {
    name: &'static str,
    log: Log,
}

fn recorder(name: &'static str, log: &Log) -> Recorder {
    Recorder { name, log: log.clone() }
}

impl Component for Recorder {
    fn update(&mut self, _ctx: &mut Context, _obj: ObjId) -> Result<()> {
        self.log.borrow_mut().push(format!("update {}", self.name));
        Ok(())
    }

    fn draw(&mut self, _ctx: &mut Context, _obj: ObjId) -> Result<()> {
        self.log.borrow_mut().push(format!("draw {}", self.name));
        Ok(())
    }

    fn destroy(&mut self, _ctx: &mut Context, _obj: ObjId) -> Result<()> {
        self.log.borrow_mut().push(format!("destroy {}", self.name));
        Ok(())
    }

    fn on_event(&mut self, _ctx: &mut Context, _obj: ObjId, event: &str, _arg: &EventArg) -> Result<()> {
        self.log.borrow_mut().push(format!("comp {event}"));
        Ok(())
    }
}

struct Voice {
    id: &'static str,
    says: &'static str,
}

impl Component for Voice {
    fn id(&self) -> Option<&str> {
        Some(self.id)
    }

    fn members(&self) -> &[&'static str] {
        &["speak"]
    }

    fn call(&mut self, _ctx: &mut Context, _obj: ObjId, _member: &str, _arg: &EventArg) -> Result<EventArg> {
        Ok(EventArg::from(self.says))
    }
}

struct NeedsPos;

impl Component for NeedsPos {
    fn id(&self) -> Option<&str> {
        Some("needs_pos")
    }

    fn require(&self) -> &[&'static str] {
        &["pos"]
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[test]
fn bean_walks_right() {
    let mut ctx = ctx();
    ctx.assets
        .add_sprite(&mut ctx.gfx, "bean", 8, 8, &[255; 8 * 8 * 4], SpriteOpt::default())
        .unwrap();
    let bean = ctx.add(comps![c::sprite("bean"), pos(80.0, 40.0), c::area()]).unwrap();
    ctx.on_obj(bean, "update", |ctx, obj, _| {
        ctx.move_by(obj, Vec2::new(10.0, 0.0));
        Ok(())
    });
    for _ in 0..3 {
        ctx.step(1.0).unwrap();
    }
    let p = ctx.pos(bean).unwrap();
    assert!((p - Vec2::new(110.0, 40.0)).length() < 1e-3);

    let bbox = ctx.world_area(bean).unwrap().bbox();
    assert!((bbox.pos - Vec2::new(110.0, 40.0)).length() < 1e-3);
    assert_eq!((bbox.width, bbox.height), (8.0, 8.0));
    assert!(ctx.has_point(bean, Vec2::new(114.0, 44.0)));
    assert!(!ctx.has_point(bean, Vec2::new(84.0, 44.0)));
}

#[test]
fn move_toward_covers_speed_times_dt() {
    let mut ctx = ctx();
    let obj = ctx.add(comps![pos(80.0, 40.0), move_toward(Vec2::X, 10.0), "bean"]).unwrap();
    for _ in 0..3 {
        ctx.step(1.0).unwrap();
    }
    assert!((ctx.pos(obj).unwrap() - Vec2::new(110.0, 40.0)).length() < 1e-3);
    assert!(ctx.is(obj, "bean"));
    assert!(ctx.is(obj, "move"));
}

#[test]
fn unuse_brings_back_shadowed_member() {
    let mut ctx = ctx();
    let obj = ctx
        .add(comps![Voice { id: "dog", says: "woof" }, Voice { id: "cat", says: "meow" }, "friendly"])
        .unwrap();
    let said = ctx.call(obj, "speak", EventArg::None).unwrap();
    assert_eq!(said.as_ref().and_then(EventArg::as_text), Some("meow"));

    ctx.unuse(obj, "cat").unwrap();
    let said = ctx.call(obj, "speak", EventArg::None).unwrap();
    assert_eq!(said.as_ref().and_then(EventArg::as_text), Some("woof"));
    assert!(!ctx.is(obj, "cat"));

    ctx.unuse(obj, "friendly").unwrap();
    assert!(!ctx.is(obj, "friendly"));
    ctx.unuse(obj, "dog").unwrap();
    assert!(ctx.call(obj, "speak", EventArg::None).unwrap().is_none());
}

#[test]
fn same_id_replaces_component() {
    let mut ctx = ctx();
    let obj = ctx.add(comps![pos(1.0, 2.0)]).unwrap();
    ctx.use_comp(obj, pos(5.0, 6.0)).unwrap();
    assert_eq!(ctx.obj(obj).unwrap().tags(), vec!["pos"]);
    assert_eq!(ctx.pos(obj), Some(Vec2::new(5.0, 6.0)));
}

#[test]
fn cancelled_and_paused_handlers() {
    let mut ctx = ctx();
    let obj = ctx.add(comps![pos(0.0, 0.0)]).unwrap();
    let hits = Rc::new(Cell::new(0));

    let h = hits.clone();
    let cancelled = ctx.on_obj(obj, "ping", move |_, _, _| {
        h.set(h.get() + 1);
        Ok(())
    });
    let h = hits.clone();
    let paused = ctx.on_obj(obj, "ping", move |_, _, _| {
        h.set(h.get() + 10);
        Ok(())
    });

    cancelled.cancel();
    paused.set_paused(true);
    ctx.trigger(obj, "ping", EventArg::None).unwrap();
    assert_eq!(hits.get(), 0);

    paused.set_paused(false);
    ctx.trigger(obj, "ping", EventArg::None).unwrap();
    assert_eq!(hits.get(), 10);
}

#[test]
fn missing_require_is_reported() {
    let mut ctx = ctx();
    let err = ctx.add(comps![NeedsPos]).unwrap_err();
    assert_eq!(err.name(), "MissingRequire");
    assert!(matches!(err, KaboomError::MissingRequire { ref requires, .. } if requires == "pos"));

    let obj = ctx.add(comps![pos(0.0, 0.0)]).unwrap();
    ctx.use_comp(obj, NeedsPos).unwrap();
    assert!(ctx.is(obj, "needs_pos"));
}

#[test]
fn destroy_during_update_is_deferred() {
    let mut ctx = ctx();
    let log = log();
    // siblings update in insertion order, so the killer runs first
    let killer = ctx.add(comps![recorder("killer", &log)]).unwrap();
    let victim = ctx.add(comps![recorder("victim", &log)]).unwrap();
    ctx.on_obj(killer, "update", move |ctx, _, _| ctx.destroy(victim));

    ctx.step(0.1).unwrap();
    let entries = log.borrow().clone();
    assert!(entries.contains(&"destroy victim".to_string()));
    assert!(!entries.contains(&"update victim".to_string()));
    assert!(!entries.contains(&"draw victim".to_string()));
    assert!(!ctx.exists(victim));
    assert!(ctx.scene().get(victim).is_none());
}

#[test]
fn update_children_first_draw_parent_first() {
    let mut ctx = ctx();
    let log = log();
    let parent = ctx.add(comps![recorder("parent", &log)]).unwrap();
    ctx.add_child(parent, comps![recorder("child", &log)]).unwrap();
    ctx.step(0.1).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["update child", "update parent", "draw parent", "draw child"]
    );
}

#[test]
fn siblings_draw_by_z_stable() {
    let mut ctx = ctx();
    let log = log();
    ctx.add(comps![z(2.0), recorder("top", &log)]).unwrap();
    ctx.add(comps![z(1.0), recorder("first", &log)]).unwrap();
    ctx.add(comps![z(1.0), recorder("second", &log)]).unwrap();
    ctx.step(0.1).unwrap();
    let draws: Vec<String> = log.borrow().iter().filter(|e| e.starts_with("draw")).cloned().collect();
    assert_eq!(draws, vec!["draw first", "draw second", "draw top"]);
}

#[test]
fn event_order_comp_then_object_then_tag() {
    let mut ctx = ctx();
    let log = log();
    let obj = ctx.add(comps![recorder("a", &log), "enemy"]).unwrap();
    let l = log.clone();
    ctx.on("ping", "enemy", move |_, _, _| {
        l.borrow_mut().push("tag ping".into());
        Ok(())
    });
    let l = log.clone();
    ctx.on_obj(obj, "ping", move |_, _, _| {
        l.borrow_mut().push("obj ping".into());
        Ok(())
    });
    ctx.trigger(obj, "ping", EventArg::None).unwrap();
    assert_eq!(*log.borrow(), vec!["comp ping", "obj ping", "tag ping"]);
}

/// Triggers `ping` on its own host during update and counts what it hears.
#[derive(Default)]
struct SelfPinger {
    heard: Rc<Cell<u32>>,
}

impl Component for SelfPinger {
    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        ctx.trigger(obj, "ping", EventArg::None)
    }

    fn on_event(&mut self, _ctx: &mut Context, _obj: ObjId, event: &str, _arg: &EventArg) -> Result<()> {
        if event == "ping" {
            self.heard.set(self.heard.get() + 1);
        }
        Ok(())
    }
}

#[test]
fn events_raised_inside_a_hook_reach_the_component() {
    let mut ctx = ctx();
    let heard = Rc::new(Cell::new(0));
    ctx.add(comps![SelfPinger { heard: heard.clone() }]).unwrap();
    ctx.step(0.1).unwrap();
    assert_eq!(heard.get(), 1);
}

#[test]
fn detached_objects_wait_for_attach() {
    let mut ctx = ctx();
    let log = log();
    let added = Rc::new(Cell::new(false));
    let a = added.clone();
    ctx.on_add("late", move |_, _| {
        a.set(true);
        Ok(())
    });
    let obj = ctx.make(comps![recorder("late", &log), "late"]).unwrap();
    ctx.step(0.1).unwrap();
    assert!(log.borrow().is_empty());
    assert!(!added.get());

    let parent = ctx.add(comps![pos(0.0, 0.0)]).unwrap();
    ctx.attach(parent, obj).unwrap();
    assert!(added.get());
    assert!(ctx.get("late").is_empty());
    assert_eq!(ctx.get_all("late"), vec![obj]);
    assert_eq!(ctx.children(parent), vec![obj]);
}

#[test]
fn destroy_all_by_tag() {
    let mut ctx = ctx();
    for i in 0..3 {
        ctx.add(comps![pos(i as f32, 0.0), "coin"]).unwrap();
    }
    ctx.add(comps![pos(0.0, 0.0), "player"]).unwrap();
    ctx.destroy_all("coin").unwrap();
    ctx.step(0.1).unwrap();
    assert!(ctx.get("coin").is_empty());
    assert_eq!(ctx.get("player").len(), 1);
}

#[test]
fn world_transform_composes_parents() {
    let mut ctx = ctx();
    let parent = ctx.add(comps![pos(10.0, 0.0), c::scale(2.0, 2.0)]).unwrap();
    let child = ctx.add_child(parent, comps![pos(5.0, 5.0)]).unwrap();
    assert!((ctx.obj_to_world(child, Vec2::ZERO) - Vec2::new(20.0, 10.0)).length() < 1e-4);
    assert!((ctx.obj_from_world(child, Vec2::new(20.0, 10.0))).length() < 1e-4);
}

#[test]
fn mask_writes_stencil_then_tests_children() {
    let (backend, draws) = NullBackend::recording();
    let mut ctx = Context::new(
        KaboomConfig::default().size(100.0, 100.0).background(crate::math::Color::BLACK),
        Box::new(backend),
    )
    .unwrap();
    let window = ctx.add(comps![pos(10.0, 10.0), rect(20.0, 20.0), Mask::intersect()]).unwrap();
    ctx.add_child(window, comps![pos(0.0, 0.0), rect(50.0, 50.0)]).unwrap();
    ctx.step(0.1).unwrap();

    let records = draws.borrow();
    let clear = records.iter().position(|r| matches!(r, Recorded::ClearStencil)).unwrap();
    let modes: Vec<StencilMode> = records[clear..]
        .iter()
        .filter_map(|r| match r {
            Recorded::Draw { stencil, .. } => Some(*stencil),
            Recorded::ClearStencil => None,
        })
        .collect();
    assert_eq!(modes, vec![StencilMode::Write, StencilMode::Equal]);
    assert!(ctx.fatal_error().is_none());
}

/// Raises three events on its host from inside a member call.
struct Announcer;

impl Component for Announcer {
    fn id(&self) -> Option<&str> {
        Some("announcer")
    }

    fn members(&self) -> &[&'static str] {
        &["announce"]
    }

    fn call(&mut self, ctx: &mut Context, obj: ObjId, _member: &str, _arg: &EventArg) -> Result<EventArg> {
        for ev in ["first", "second", "third"] {
            ctx.trigger(obj, ev, EventArg::None)?;
        }
        Ok(EventArg::None)
    }
}

#[test]
fn queued_events_arrive_in_the_order_raised() {
    let mut ctx = ctx();
    let log = log();
    let obj = ctx.add(comps![recorder("r", &log), Announcer]).unwrap();
    for ev in ["first", "second", "third"] {
        let l = log.clone();
        ctx.on_obj(obj, ev, move |_, _, _| {
            l.borrow_mut().push(format!("obj {ev}"));
            Ok(())
        });
    }
    ctx.call(obj, "announce", EventArg::None).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["comp first", "obj first", "comp second", "obj second", "comp third", "obj third"]
    );
}
