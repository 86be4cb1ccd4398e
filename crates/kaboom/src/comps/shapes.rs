//! Shape renderables: `rect`, `circle` and `uvquad`.

use crate::context::Context;
use crate::draw::{DrawCircleOpt, DrawRectOpt, DrawUvQuadOpt};
use crate::error::Result;
use crate::geometry::{self, Shape};
use crate::math::{Anchor, Vec2};
use crate::object::{Component, ObjId};

use super::AnchorComp;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub fill: bool,
}

impl Rect {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height, radius: 0.0, fill: true }
    }

    pub fn radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }
}

impl Component for Rect {
    fn id(&self) -> Option<&str> {
        Some("rect")
    }

    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let props = ctx.render_props(obj);
        ctx.gfx.draw_rect(
            &DrawRectOpt::new(self.width, self.height)
                .radius(self.radius)
                .fill(self.fill)
                .props(props),
        )
    }

    fn render_area(&self) -> Option<Shape> {
        Some(Shape::Rect(geometry::Rect::new(Vec2::ZERO, self.width, self.height)))
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{}x{}", self.width, self.height))
    }
}

/// Drawn centered on the object unless an anchor says otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub radius: f32,
    pub fill: bool,
}

impl Circle {
    pub fn new(radius: f32) -> Self {
        Self { radius, fill: true }
    }
}

impl Component for Circle {
    fn id(&self) -> Option<&str> {
        Some("circle")
    }

    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let mut props = ctx.render_props(obj);
        if ctx.c::<AnchorComp>(obj).is_none() {
            props.anchor = Anchor::Center;
        }
        ctx.gfx.draw_circle(&DrawCircleOpt::new(self.radius).fill(self.fill).props(props))
    }

    fn render_area(&self) -> Option<Shape> {
        Some(Shape::Circle(geometry::Circle::new(Vec2::ZERO, self.radius)))
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{}", self.radius))
    }
}

/// A plain quad with UVs spanning `0..1`, meant for custom shaders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvQuad {
    pub width: f32,
    pub height: f32,
}

impl Component for UvQuad {
    fn id(&self) -> Option<&str> {
        Some("uvquad")
    }

    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let props = ctx.render_props(obj);
        ctx.gfx.draw_uv_quad(&DrawUvQuadOpt::new(self.width, self.height).props(props))
    }

    fn render_area(&self) -> Option<Shape> {
        Some(Shape::Rect(geometry::Rect::new(Vec2::ZERO, self.width, self.height)))
    }
}

pub fn rect(width: f32, height: f32) -> Rect {
    Rect::new(width, height)
}

pub fn circle(radius: f32) -> Circle {
    Circle::new(radius)
}

pub fn uvquad(width: f32, height: f32) -> UvQuad {
    UvQuad { width, height }
}
