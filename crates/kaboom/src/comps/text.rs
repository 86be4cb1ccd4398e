//! The `text` component.

use crate::context::Context;
use crate::draw::{DrawTextOpt, TextAlign};
use crate::error::Result;
use crate::geometry::{self, Shape};
use crate::math::Vec2;
use crate::object::{Component, ObjId};

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    pub font: Option<String>,
    pub size: Option<f32>,
    /// Wrap width.
    pub width: Option<f32>,
    pub align: TextAlign,
    pub line_spacing: f32,
    pub letter_spacing: f32,
    measured: Vec2,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
            size: None,
            width: None,
            align: TextAlign::Left,
            line_spacing: 0.0,
            letter_spacing: 0.0,
            measured: Vec2::ZERO,
        }
    }

    pub fn font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    /// Laid-out size from the last update or draw.
    pub fn measured(&self) -> Vec2 {
        self.measured
    }

    fn opt(&self, ctx: &Context, obj: ObjId) -> DrawTextOpt {
        let mut opt = DrawTextOpt::new(self.text.clone())
            .align(self.align)
            .line_spacing(self.line_spacing)
            .letter_spacing(self.letter_spacing)
            .props(ctx.render_props(obj));
        opt.font = self.font.clone();
        opt.size = self.size;
        opt.width = self.width;
        opt
    }
}

impl Component for Text {
    fn id(&self) -> Option<&str> {
        Some("text")
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        if let Some(ft) = ctx.format_text(&self.opt(ctx, obj))? {
            self.measured = Vec2::new(ft.width, ft.height);
        }
        Ok(())
    }

    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let opt = self.opt(ctx, obj);
        if let Some(ft) = ctx.draw_text(&opt)? {
            self.measured = Vec2::new(ft.width, ft.height);
        }
        Ok(())
    }

    fn render_area(&self) -> Option<Shape> {
        Some(Shape::Rect(geometry::Rect::new(Vec2::ZERO, self.measured.x, self.measured.y)))
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("\"{}\"", self.text))
    }
}

pub fn text(text: impl Into<String>) -> Text {
    Text::new(text)
}

impl Context {
    pub fn set_text(&mut self, obj: ObjId, text: impl Into<String>) {
        if let Some(t) = self.c_mut::<Text>(obj) {
            t.text = text.into();
        }
    }
}
