//! Transform components: where an object sits, how big it is, which way it
//! faces, its draw order and whether the camera moves it.

use crate::context::Context;
use crate::draw::DrawCircleOpt;
use crate::error::Result;
use crate::math::{Color, Vec2};
use crate::object::{Component, EventArg, ObjId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pos {
    pub pos: Vec2,
}

impl Pos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { pos: Vec2::new(x, y) }
    }
}

impl Component for Pos {
    fn id(&self) -> Option<&str> {
        Some("pos")
    }

    fn members(&self) -> &[&'static str] {
        &["move_by", "move_to"]
    }

    fn call(&mut self, _ctx: &mut Context, _obj: ObjId, member: &str, arg: &EventArg) -> Result<EventArg> {
        let Some(p) = arg.as_point() else {
            return Ok(EventArg::Point(self.pos));
        };
        match member {
            "move_by" => self.pos += p,
            "move_to" => self.pos = p,
            _ => {}
        }
        Ok(EventArg::Point(self.pos))
    }

    fn draw_inspect(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let fixed = ctx.scene().is_fixed(obj);
        ctx.gfx.draw_circle(
            &DrawCircleOpt::new(4.0 / ctx.camera.scale.x.max(0.01))
                .color(Color::RED)
                .outline(crate::draw::Outline::new(1.0, Color::WHITE))
                .fixed(fixed),
        )
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("({:.0}, {:.0})", self.pos.x, self.pos.y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub scale: Vec2,
}

impl Scale {
    pub fn new(x: f32, y: f32) -> Self {
        Self { scale: Vec2::new(x, y) }
    }

    pub fn uniform(s: f32) -> Self {
        Self { scale: Vec2::splat(s) }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl Component for Scale {
    fn id(&self) -> Option<&str> {
        Some("scale")
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("({:.2}, {:.2})", self.scale.x, self.scale.y))
    }
}

/// Rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotate {
    pub angle: f32,
}

impl Rotate {
    pub fn new(angle: f32) -> Self {
        Self { angle }
    }
}

impl Component for Rotate {
    fn id(&self) -> Option<&str> {
        Some("rotate")
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{:.0}", self.angle))
    }
}

/// Draw order among siblings; higher draws later.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Z {
    pub z: f32,
}

impl Component for Z {
    fn id(&self) -> Option<&str> {
        Some("z")
    }

    fn inspect(&self) -> Option<String> {
        Some(self.z.to_string())
    }
}

/// Draw this object (and its children) in screen space, ignoring the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fixed {
    pub fixed: bool,
}

impl Default for Fixed {
    fn default() -> Self {
        Self { fixed: true }
    }
}

impl Component for Fixed {
    fn id(&self) -> Option<&str> {
        Some("fixed")
    }
}

pub fn pos(x: f32, y: f32) -> Pos {
    Pos::new(x, y)
}

pub fn scale(x: f32, y: f32) -> Scale {
    Scale::new(x, y)
}

pub fn rotate(angle: f32) -> Rotate {
    Rotate::new(angle)
}

pub fn z(z: f32) -> Z {
    Z { z }
}

pub fn fixed() -> Fixed {
    Fixed::default()
}

// ── Movement helpers ─────────────────────────────────────────────────────

impl Context {
    pub fn pos(&self, obj: ObjId) -> Option<Vec2> {
        self.c::<Pos>(obj).map(|p| p.pos)
    }

    pub fn set_pos(&mut self, obj: ObjId, p: Vec2) {
        if let Some(pos) = self.c_mut::<Pos>(obj) {
            pos.pos = p;
        }
    }

    /// Shift by a fixed offset.
    pub fn move_by(&mut self, obj: ObjId, delta: Vec2) {
        if let Some(pos) = self.c_mut::<Pos>(obj) {
            pos.pos += delta;
        }
    }

    /// Move at `vel` pixels per second for this frame.
    pub fn move_at(&mut self, obj: ObjId, vel: Vec2) {
        let dt = self.time.dt();
        self.move_by(obj, vel * dt);
    }

    /// Step toward `dest` at `speed` pixels per second, stopping on it.
    pub fn move_to(&mut self, obj: ObjId, dest: Vec2, speed: f32) {
        let dt = self.time.dt();
        if let Some(pos) = self.c_mut::<Pos>(obj) {
            let diff = dest - pos.pos;
            let step = speed * dt;
            if diff.length() <= step {
                pos.pos = dest;
            } else {
                pos.pos += diff.normalize() * step;
            }
        }
    }

    /// Position in world space, through every ancestor's transform.
    pub fn world_pos(&self, obj: ObjId) -> Option<Vec2> {
        let parent = self.obj(obj)?.parent()?;
        Some(self.obj_to_world(parent, self.pos(obj)?))
    }

    /// Position on screen, after the camera unless the object is fixed.
    pub fn screen_pos(&self, obj: ObjId) -> Option<Vec2> {
        let parent = self.obj(obj)?.parent()?;
        Some(self.obj_to_screen(parent, self.pos(obj)?))
    }

    pub fn angle(&self, obj: ObjId) -> f32 {
        self.c::<Rotate>(obj).map_or(0.0, |r| r.angle)
    }

    pub fn set_angle(&mut self, obj: ObjId, angle: f32) {
        if let Some(r) = self.c_mut::<Rotate>(obj) {
            r.angle = angle;
        }
    }

    pub fn scale_of(&self, obj: ObjId) -> Vec2 {
        self.c::<Scale>(obj).map_or(Vec2::ONE, |s| s.scale)
    }

    pub fn set_scale(&mut self, obj: ObjId, s: Vec2) {
        if let Some(sc) = self.c_mut::<Scale>(obj) {
            sc.scale = s;
        }
    }
}
