//! # Area — Collision Shapes and Pointer Hit Testing
//!
//! An `area` gives an object a shape in its own space. Without an explicit
//! shape it borrows the first renderable's bounds (a `rect`, `sprite`, ...).
//! The collision check feeds `collide_update` into each area, which turns
//! the stream into edges:
//!
//! ```text
//!   collide_update(col) ── new target? ──► "collide"(col)
//!   update ── target gone or apart? ──► "collide_end"(target)
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::collision::{Collision, local_area, world_area_with};
use crate::context::Context;
use crate::draw::{DrawPolygonOpt, Outline};
use crate::error::Result;
use crate::event::EventController;
use crate::geometry::Shape;
use crate::math::{Color, Vec2};
use crate::object::{Component, EventArg, ObjId};

#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Explicit local shape. `None` falls back to the renderable's bounds.
    pub shape: Option<Shape>,
    pub offset: Vec2,
    pub scale: Vec2,
    /// Tags this object never collides with.
    pub collision_ignore: Vec<String>,
    colliding: Vec<(ObjId, Collision)>,
}

impl Default for Area {
    fn default() -> Self {
        Self {
            shape: None,
            offset: Vec2::ZERO,
            scale: Vec2::ONE,
            collision_ignore: Vec::new(),
            colliding: Vec::new(),
        }
    }
}

impl Area {
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn ignore(mut self, tag: impl Into<String>) -> Self {
        self.collision_ignore.push(tag.into());
        self
    }

    /// Objects currently overlapping this one, as last seen by the check.
    pub fn colliding(&self) -> impl Iterator<Item = ObjId> + '_ {
        self.colliding.iter().map(|(id, _)| *id)
    }

    pub fn collision_with(&self, other: ObjId) -> Option<&Collision> {
        self.colliding.iter().find(|(id, _)| *id == other).map(|(_, c)| c)
    }

    fn own_world_area(&self, ctx: &Context, obj: ObjId) -> Option<Shape> {
        world_area_with(ctx.scene(), obj, self, &ctx.world_transform(obj))
    }
}

impl Component for Area {
    fn id(&self) -> Option<&str> {
        Some("area")
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let own = self.own_world_area(ctx, obj);
        let mut ended = Vec::new();
        self.colliding.retain(|(target, _)| {
            let still = ctx.exists(*target)
                && match (&own, ctx.world_area(*target)) {
                    (Some(a), Some(b)) => a.collides(&b),
                    _ => false,
                };
            if !still {
                ended.push(*target);
            }
            still
        });
        for target in ended {
            ctx.trigger(obj, "collide_end", target)?;
        }
        Ok(())
    }

    fn on_event(&mut self, ctx: &mut Context, obj: ObjId, event: &str, arg: &EventArg) -> Result<()> {
        if event != "collide_update" {
            return Ok(());
        }
        let Some(col) = arg.as_collision() else {
            return Ok(());
        };
        match self.colliding.iter_mut().find(|(id, _)| *id == col.target) {
            Some(entry) => entry.1 = col.clone(),
            None => {
                self.colliding.push((col.target, col.clone()));
                ctx.trigger(obj, "collide", col.clone())?;
            }
        }
        Ok(())
    }

    fn draw_inspect(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let Some(shape) = local_area(ctx.scene(), obj, self) else {
            return Ok(());
        };
        let width = 2.0 / ctx.camera.scale.x.max(0.01);
        ctx.gfx.draw_polygon(
            &DrawPolygonOpt::new(shape.to_polygon().pts)
                .fill(false)
                .outline(Outline::new(width, Color::rgb(0.0, 0.5, 1.0)))
                .fixed(ctx.scene().is_fixed(obj)),
        )
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("colliding: {}", self.colliding.len()))
    }
}

pub fn area() -> Area {
    Area::default()
}

// ── Pointer and collision subscriptions ──────────────────────────────────

impl Context {
    /// `tag_a` objects starting to touch `tag_b` objects.
    pub fn on_collide(
        &mut self,
        tag_a: &str,
        tag_b: &str,
        f: impl FnMut(&mut Context, ObjId, &Collision) -> Result<()> + 'static,
    ) -> EventController {
        self.on_collision_event("collide", tag_a, tag_b, f)
    }

    /// Every frame while `tag_a` and `tag_b` objects overlap.
    pub fn on_collide_update(
        &mut self,
        tag_a: &str,
        tag_b: &str,
        f: impl FnMut(&mut Context, ObjId, &Collision) -> Result<()> + 'static,
    ) -> EventController {
        self.on_collision_event("collide_update", tag_a, tag_b, f)
    }

    /// `tag_a` objects separating from `tag_b` objects. The second handler
    /// argument is the object left behind.
    pub fn on_collide_end(
        &mut self,
        tag_a: &str,
        tag_b: &str,
        mut f: impl FnMut(&mut Context, ObjId, ObjId) -> Result<()> + 'static,
    ) -> EventController {
        let tag_b = tag_b.to_string();
        self.on("collide_end", tag_a, move |ctx: &mut Context, obj: ObjId, arg: &EventArg| match arg.as_obj() {
            Some(other) if ctx.is(other, &tag_b) => f(ctx, obj, other),
            _ => Ok(()),
        })
    }

    fn on_collision_event(
        &mut self,
        event: &str,
        tag_a: &str,
        tag_b: &str,
        mut f: impl FnMut(&mut Context, ObjId, &Collision) -> Result<()> + 'static,
    ) -> EventController {
        let tag_b = tag_b.to_string();
        self.on(event, tag_a, move |ctx: &mut Context, obj: ObjId, arg: &EventArg| match arg.as_collision() {
            Some(col) if ctx.is(col.target, &tag_b) => f(ctx, obj, col),
            _ => Ok(()),
        })
    }

    /// Objects tagged `tag` clicked this frame.
    pub fn on_click(&mut self, tag: &str, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_update(tag, move |ctx, obj| if ctx.is_clicked(obj) { f(ctx, obj) } else { Ok(()) })
    }

    /// The mouse entering an object tagged `tag`.
    pub fn on_hover(&mut self, tag: &str, f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.hover_edge(tag, true, f)
    }

    /// The mouse leaving an object tagged `tag`.
    pub fn on_hover_end(&mut self, tag: &str, f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.hover_edge(tag, false, f)
    }

    /// Every frame the mouse is over an object tagged `tag`.
    pub fn on_hover_update(&mut self, tag: &str, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on_update(tag, move |ctx, obj| if ctx.is_hovering(obj) { f(ctx, obj) } else { Ok(()) })
    }

    fn hover_edge(
        &mut self,
        tag: &str,
        entering: bool,
        mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static,
    ) -> EventController {
        let over: Rc<RefCell<HoverSet>> = Rc::default();
        self.on_update(tag, move |ctx, obj| {
            let now = ctx.is_hovering(obj);
            let changed = over.borrow_mut().set(obj, now, |id| ctx.exists(id));
            if changed && now == entering {
                f(ctx, obj)?;
            }
            Ok(())
        })
    }
}

/// Objects currently under the mouse for one hover subscription.
#[derive(Default)]
struct HoverSet {
    over: HashSet<ObjId>,
}

impl HoverSet {
    /// Record whether `obj` is hovered and report if that changed. Ids that
    /// no longer exist are dropped whenever a new one comes in.
    fn set(&mut self, obj: ObjId, now: bool, exists: impl Fn(ObjId) -> bool) -> bool {
        if !now {
            return self.over.remove(&obj);
        }
        if self.over.contains(&obj) {
            return false;
        }
        self.over.retain(|id| exists(*id));
        self.over.insert(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps;
    use crate::comps::{anchor, pos, rect};
    use crate::config::KaboomConfig;
    use crate::geometry::Rect;
    use crate::math::Anchor;

    fn ctx() -> Context {
        Context::headless(KaboomConfig::default()).unwrap()
    }

    #[test]
    fn area_borrows_rect_bounds() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(10.0, 20.0), rect(30.0, 40.0), area()]).unwrap();
        let bbox = ctx.world_area(a).unwrap().bbox();
        assert!((bbox.min() - Vec2::new(10.0, 20.0)).length() < 1e-4);
        assert!((bbox.max() - Vec2::new(40.0, 60.0)).length() < 1e-4);
    }

    #[test]
    fn centered_anchor_shifts_area() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(100.0, 100.0), rect(20.0, 20.0), anchor(Anchor::Center), area()]).unwrap();
        let bbox = ctx.world_area(a).unwrap().bbox();
        assert!((bbox.min() - Vec2::new(90.0, 90.0)).length() < 1e-4);
    }

    #[test]
    fn explicit_shape_with_offset_and_scale() {
        let mut ctx = ctx();
        let shape = Shape::Rect(Rect::new(Vec2::ZERO, 10.0, 10.0));
        let a = ctx
            .add(comps![pos(0.0, 0.0), area().shape(shape).offset(Vec2::new(5.0, 0.0)).scale(Vec2::splat(2.0))])
            .unwrap();
        let bbox = ctx.world_area(a).unwrap().bbox();
        assert!((bbox.min() - Vec2::new(10.0, 0.0)).length() < 1e-4);
        assert!((bbox.width - 20.0).abs() < 1e-4);
    }

    #[test]
    fn no_shape_no_area() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(0.0, 0.0), area()]).unwrap();
        assert!(ctx.world_area(a).is_none());
    }

    #[test]
    fn destroyed_target_ends_collision() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(0.0, 0.0), rect(10.0, 10.0), area()]).unwrap();
        let b = ctx.add(comps![pos(5.0, 5.0), rect(10.0, 10.0), area()]).unwrap();
        ctx.step(0.016).unwrap();
        assert_eq!(ctx.c::<Area>(a).unwrap().colliding().collect::<Vec<_>>(), vec![b]);
        let ended = Rc::new(RefCell::new(Vec::new()));
        let e = ended.clone();
        ctx.on_obj(a, "collide_end", move |_, _, arg| {
            e.borrow_mut().push(arg.as_obj());
            Ok(())
        });
        ctx.destroy(b).unwrap();
        ctx.step(0.016).unwrap();
        assert_eq!(*ended.borrow(), vec![Some(b)]);
        assert_eq!(ctx.c::<Area>(a).unwrap().colliding().count(), 0);
    }

    #[test]
    fn hover_fires_on_enter_and_leave() {
        use crate::input::InputEvent;

        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 0.0), rect(10.0, 10.0), area(), "button"]).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        ctx.on_hover("button", move |_, _| {
            l.borrow_mut().push("enter");
            Ok(())
        });
        let l = log.clone();
        ctx.on_hover_end("button", move |_, _| {
            l.borrow_mut().push("leave");
            Ok(())
        });

        ctx.input.push(InputEvent::MouseMove(Vec2::new(5.0, 5.0)));
        ctx.step(0.016).unwrap();
        ctx.step(0.016).unwrap();
        ctx.input.push(InputEvent::MouseMove(Vec2::new(50.0, 50.0)));
        ctx.step(0.016).unwrap();
        assert_eq!(*log.borrow(), vec!["enter", "leave"]);
    }

    #[test]
    fn hover_set_forgets_destroyed_objects() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(0.0, 0.0)]).unwrap();
        let b = ctx.add(comps![pos(0.0, 0.0)]).unwrap();
        let mut set = HoverSet::default();
        assert!(set.set(a, true, |id| ctx.exists(id)));
        assert!(!set.set(a, true, |id| ctx.exists(id)));

        ctx.destroy(a).unwrap();
        ctx.step(0.016).unwrap();
        assert!(set.set(b, true, |id| ctx.exists(id)));
        assert_eq!(set.over.len(), 1);
        assert!(set.set(b, false, |id| ctx.exists(id)));
        assert!(set.over.is_empty());
    }
}
