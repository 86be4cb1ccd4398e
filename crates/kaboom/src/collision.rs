//! # Collision — Area Queries, the Check Phase and Solid Resolution
//!
//! Once per frame, after update, every live unpaused object with an
//! [`Area`] is dropped into a spatial hash grid over its world-space
//! bounding box. Objects sharing a cell are tested pairwise:
//!
//! ```text
//!   cell size = hash_grid_size (64)
//!
//!   ┌────┬────┬────┐     a covers cells (0,0)..(1,1)
//!   │ a  │ a  │    │     b covers cells (1,1)..(2,2)
//!   ├────┼────┼────┤
//!   │ a  │ab  │ b  │ ──► a, b tested once (cell (1,1))
//!   ├────┼────┼────┤         displacement ≠ 0
//!   │    │ b  │ b  │           a: "collide_update"(col)
//!   └────┴────┴────┘           b: "collide_update"(col.reverse())
//! ```
//!
//! The two [`Collision`]s of a pair share their `resolved` flag, so one side
//! calling [`Collision::prevent_resolve`] is seen by the other.
//!
//! ## Solid resolution
//!
//! `body` objects are pushed out of `solid` ones one axis at a time, along
//! whichever of the four bounding box penetrations is smallest. This is not
//! a constraint solver; stacked or rotated shapes can jitter.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::comps::{AnchorComp, Area};
use crate::context::Context;
use crate::error::Result;
use crate::geometry::{RaycastHit, Shape, displacement};
use crate::math::{Mat4, Vec2, Vec3};
use crate::object::{ObjId, Scene};

/// One side of a pair of overlapping objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub source: ObjId,
    pub target: ObjId,
    /// Moves `source` out of `target`.
    pub displacement: Vec2,
    resolved: Rc<Cell<bool>>,
}

impl Collision {
    pub fn new(source: ObjId, target: ObjId, displacement: Vec2) -> Self {
        Self { source, target, displacement, resolved: Rc::default() }
    }

    /// The same collision seen from `target`. Shares the resolved flag.
    pub fn reverse(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            displacement: -self.displacement,
            resolved: self.resolved.clone(),
        }
    }

    /// `target` is to the left of `source`.
    pub fn is_left(&self) -> bool {
        self.displacement.x > 0.0
    }

    pub fn is_right(&self) -> bool {
        self.displacement.x < 0.0
    }

    /// `target` is above `source`.
    pub fn is_top(&self) -> bool {
        self.displacement.y > 0.0
    }

    pub fn is_bottom(&self) -> bool {
        self.displacement.y < 0.0
    }

    pub fn has_overlap(&self) -> bool {
        self.displacement != Vec2::ZERO
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get()
    }

    /// Keep `body` from pushing this pair apart.
    pub fn prevent_resolve(&self) {
        self.resolved.set(true);
    }
}

/// Which side of the moving object touched a solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

// ── World areas ──────────────────────────────────────────────────────────

/// Local area of `obj` given its `Area` component: the explicit shape or
/// the first renderable's shape, scaled, offset and anchored.
pub(crate) fn local_area(scene: &Scene, obj: ObjId, area: &Area) -> Option<Shape> {
    let o = scene.get(obj)?;
    let shape = match &area.shape {
        Some(s) => s.clone(),
        None => o
            .slots
            .iter()
            .filter_map(|s| s.comp.as_deref())
            .find_map(|c| c.render_area())?,
    };
    let bbox = shape.bbox();
    let anchor = match o.c::<AnchorComp>() {
        Some(a) => {
            let size = Vec2::new(bbox.width, bbox.height) * area.scale;
            -bbox.min() * area.scale + a.anchor.corner_offset(size.x, size.y)
        }
        None => Vec2::ZERO,
    };
    let m = Mat4::from_translation(Vec3::new(anchor.x, anchor.y, 0.0))
        * Mat4::from_scale(Vec3::new(area.scale.x, area.scale.y, 1.0))
        * Mat4::from_translation(Vec3::new(area.offset.x, area.offset.y, 0.0));
    Some(shape.transform(&m))
}

pub(crate) fn world_area_with(scene: &Scene, obj: ObjId, area: &Area, world: &Mat4) -> Option<Shape> {
    Some(local_area(scene, obj, area)?.transform(world))
}

impl Context {
    /// Area in world space, from the current positions of the object and
    /// its ancestors.
    pub fn world_area(&self, obj: ObjId) -> Option<Shape> {
        let area = self.c::<Area>(obj)?;
        world_area_with(&self.scene, obj, area, &self.scene.world_transform(obj))
    }

    /// Area in screen space.
    pub fn screen_area(&self, obj: ObjId) -> Option<Shape> {
        let world = self.world_area(obj)?;
        if self.scene.is_fixed(obj) {
            Some(world)
        } else {
            Some(world.transform(&self.camera.transform()))
        }
    }

    /// Closed test: touching edges count.
    pub fn is_colliding(&self, a: ObjId, b: ObjId) -> bool {
        match (self.world_area(a), self.world_area(b)) {
            (Some(x), Some(y)) => x.collides(&y),
            _ => false,
        }
    }

    /// Open test: touching edges do not count.
    pub fn is_overlapping(&self, a: ObjId, b: ObjId) -> bool {
        match (self.world_area(a), self.world_area(b)) {
            (Some(x), Some(y)) => x.overlaps(&y),
            _ => false,
        }
    }

    /// Point in the object's world area.
    pub fn has_point(&self, obj: ObjId, p: Vec2) -> bool {
        self.world_area(obj).is_some_and(|a| a.contains(p))
    }

    /// Mouse over the object. Fixed objects compare in screen space.
    pub fn is_hovering(&self, obj: ObjId) -> bool {
        let mouse = self.input.mouse_pos();
        let p = if self.scene.is_fixed(obj) { mouse } else { self.camera.to_world(mouse) };
        self.has_point(obj, p)
    }

    /// Left mouse button went down over the object this frame.
    pub fn is_clicked(&self, obj: ObjId) -> bool {
        self.input.is_mouse_pressed(crate::input::MouseButton::Left) && self.is_hovering(obj)
    }

    /// Nearest area hit by the segment `origin → origin + dir`, skipping
    /// objects tagged with any of `ignore`.
    pub fn raycast(&self, origin: Vec2, dir: Vec2, ignore: &[&str]) -> Option<(ObjId, RaycastHit)> {
        self.get_all("area")
            .into_iter()
            .filter(|id| !ignore.iter().any(|t| self.is(*id, t)))
            .filter_map(|id| Some((id, self.world_area(id)?.raycast(origin, dir)?)))
            .min_by(|a, b| a.1.fraction.total_cmp(&b.1.fraction))
    }
}

// ── Check phase ──────────────────────────────────────────────────────────

struct Entry {
    id: ObjId,
    shape: Shape,
    ignore: Vec<String>,
}

fn cell_range(min: f32, max: f32, cell: f32) -> std::ops::RangeInclusive<i32> {
    (min / cell).floor() as i32..=(max / cell).ceil() as i32
}

fn ignores(ctx: &Context, a: &Entry, b: &Entry) -> bool {
    a.ignore.iter().any(|t| ctx.is(b.id, t)) || b.ignore.iter().any(|t| ctx.is(a.id, t))
}

impl Context {
    /// Find every overlapping pair of areas and fire `collide_update` on both.
    pub(crate) fn check_frame(&mut self) -> Result<()> {
        self.scene.propagate_transforms();
        let cell = self.config.hash_grid_size.max(1.0);

        let mut entries = Vec::new();
        let mut stack = vec![self.scene.root()];
        while let Some(id) = stack.pop() {
            let Some(o) = self.scene.get(id) else { continue };
            if o.paused || o.dead {
                continue;
            }
            stack.extend(o.children().iter().rev().copied());
            if let Some(area) = o.c::<Area>() {
                if let Some(shape) = world_area_with(&self.scene, id, area, &o.transform()) {
                    entries.push(Entry { id, shape, ignore: area.collision_ignore.clone() });
                }
            }
        }

        let mut grid: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        let mut pairs = Vec::new();
        for (i, e) in entries.iter().enumerate() {
            let bbox = e.shape.bbox();
            let (min, max) = (bbox.min(), bbox.max());
            let mut checked = HashSet::new();
            for x in cell_range(min.x, max.x, cell) {
                for y in cell_range(min.y, max.y, cell) {
                    let bucket = grid.entry((x, y)).or_default();
                    for &j in bucket.iter() {
                        if !checked.insert(j) || ignores(self, e, &entries[j]) {
                            continue;
                        }
                        if let Some(d) = displacement(&e.shape, &entries[j].shape) {
                            if d != Vec2::ZERO {
                                pairs.push(Collision::new(e.id, entries[j].id, d));
                            }
                        }
                    }
                    bucket.push(i);
                }
            }
        }

        for col in pairs {
            if !self.exists(col.source) || !self.exists(col.target) {
                continue;
            }
            let rev = col.reverse();
            self.trigger(col.source, "collide_update", col)?;
            self.trigger(rev.source, "collide_update", rev)?;
        }
        Ok(())
    }
}

// ── Solid resolution ─────────────────────────────────────────────────────

impl Context {
    /// Push `obj` out of every `solid` area it overlaps or touches, one axis
    /// at a time. Returns each solid hit and the side of `obj` that hit it.
    pub fn resolve_solids(&mut self, obj: ObjId) -> Vec<(ObjId, Side)> {
        let mut targets = Vec::new();
        for other in self.get_all("solid") {
            if other == obj {
                continue;
            }
            let ignored = self
                .c::<Area>(obj)
                .is_some_and(|a| a.collision_ignore.iter().any(|t| self.is(other, t)));
            if ignored {
                continue;
            }
            let (Some(a1), Some(a2)) = (self.world_area(obj), self.world_area(other)) else {
                continue;
            };
            let (b1, b2) = (a1.bbox(), a2.bbox());
            let (min1, max1, min2, max2) = (b1.min(), b1.max(), b2.min(), b2.max());
            if max1.x < min2.x || max2.x < min1.x || max1.y < min2.y || max2.y < min1.y {
                continue;
            }
            let dis_left = max1.x - min2.x;
            let dis_right = max2.x - min1.x;
            let dis_top = max1.y - min2.y;
            let dis_bottom = max2.y - min1.y;
            let min = dis_left.min(dis_right).min(dis_top).min(dis_bottom);
            let (delta, side) = if min == dis_left {
                (Vec2::new(-dis_left, 0.0), Side::Right)
            } else if min == dis_right {
                (Vec2::new(dis_right, 0.0), Side::Left)
            } else if min == dis_top {
                (Vec2::new(0.0, -dis_top), Side::Bottom)
            } else {
                (Vec2::new(0.0, dis_bottom), Side::Top)
            };
            self.move_by(obj, self.to_local_delta(obj, delta));
            targets.push((other, side));
        }
        targets
    }

    /// A world-space offset expressed in the parent's space of `obj`.
    fn to_local_delta(&self, obj: ObjId, delta: Vec2) -> Vec2 {
        match self.obj(obj).and_then(|o| o.parent()) {
            Some(p) => {
                let inv = self.scene.world_transform(p).inverse();
                inv.transform_vector3(Vec3::new(delta.x, delta.y, 0.0)).truncate()
            }
            None => delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps::{area, pos, rect, solid};
    use crate::comps;
    use crate::config::KaboomConfig;

    fn ctx() -> Context {
        Context::headless(KaboomConfig::default()).unwrap()
    }

    #[test]
    fn reverse_flips_sides_and_shares_resolution() {
        let col = Collision::new(ObjId { index: 1, generation: 0 }, ObjId { index: 2, generation: 0 }, Vec2::new(3.0, -1.0));
        assert!(col.is_left() && col.is_bottom());
        let rev = col.reverse();
        assert!(rev.is_right() && rev.is_top());
        assert_eq!(rev.source, col.target);
        rev.prevent_resolve();
        assert!(col.is_resolved());
    }

    #[test]
    fn overlapping_rect_areas() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(0.0, 0.0), rect(10.0, 10.0), area()]).unwrap();
        let b = ctx.add(comps![pos(5.0, 5.0), rect(10.0, 10.0), area()]).unwrap();
        assert!(ctx.is_colliding(a, b));
        assert!(ctx.is_overlapping(a, b));
        ctx.set_pos(b, Vec2::new(10.0, 10.0));
        assert!(ctx.is_colliding(a, b));
        assert!(!ctx.is_overlapping(a, b));
    }

    #[test]
    fn check_frame_fires_collide_then_end() {
        let mut ctx = ctx();
        let a = ctx.add(comps![pos(0.0, 0.0), rect(10.0, 10.0), area(), "a"]).unwrap();
        let b = ctx.add(comps![pos(5.0, 0.0), rect(10.0, 10.0), area(), "b"]).unwrap();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let l = log.clone();
        ctx.on_collide("a", "b", move |_, _, col| {
            l.borrow_mut().push(format!("collide {}", col.is_right()));
            Ok(())
        });
        let l = log.clone();
        ctx.on_collide_end("a", "b", move |_, _, _| {
            l.borrow_mut().push("end".to_string());
            Ok(())
        });
        ctx.step(0.016).unwrap();
        ctx.step(0.016).unwrap();
        assert_eq!(*log.borrow(), vec!["collide true"]);
        ctx.set_pos(b, Vec2::new(100.0, 0.0));
        ctx.step(0.016).unwrap();
        assert_eq!(*log.borrow(), vec!["collide true", "end"]);
        assert!(ctx.exists(a));
    }

    #[test]
    fn ignored_tags_never_collide() {
        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 0.0), rect(10.0, 10.0), area().ignore("ghost"), "a"]).unwrap();
        ctx.add(comps![pos(5.0, 0.0), rect(10.0, 10.0), area(), "ghost"]).unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        ctx.on("collide", "a", move |_, _, _| {
            h.set(h.get() + 1);
            Ok(())
        });
        ctx.step(0.016).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn solid_pushes_along_smallest_axis() {
        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 100.0), rect(200.0, 20.0), area(), solid()]).unwrap();
        let box_ = ctx.add(comps![pos(50.0, 85.0), rect(10.0, 20.0), area()]).unwrap();
        let hits = ctx.resolve_solids(box_);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, Side::Bottom);
        let p = ctx.pos(box_).unwrap();
        assert!((p - Vec2::new(50.0, 80.0)).length() < 1e-3);
    }

    #[test]
    fn raycast_finds_nearest() {
        let mut ctx = ctx();
        let near = ctx.add(comps![pos(20.0, -5.0), rect(10.0, 10.0), area()]).unwrap();
        ctx.add(comps![pos(60.0, -5.0), rect(10.0, 10.0), area()]).unwrap();
        let (hit, info) = ctx.raycast(Vec2::ZERO, Vec2::new(100.0, 0.0), &[]).unwrap();
        assert_eq!(hit, near);
        assert!((info.point.x - 20.0).abs() < 1e-3);
    }
}
