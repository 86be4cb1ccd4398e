//! Render property components. They draw nothing themselves; renderables
//! ([`Rect`](super::Rect), [`Sprite`](super::Sprite), ...) read them through
//! [`Context::render_props`].

use crate::context::Context;
use crate::draw::{Outline, RenderProps};
use crate::gfx::{StencilMode, Uniform};
use crate::math::{Anchor, Color};
use crate::object::{Component, ObjId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorComp {
    pub color: Color,
}

impl Component for ColorComp {
    fn id(&self) -> Option<&str> {
        Some("color")
    }

    fn inspect(&self) -> Option<String> {
        let c = self.color;
        Some(format!("({:.0}, {:.0}, {:.0})", c.r * 255.0, c.g * 255.0, c.b * 255.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opacity {
    pub opacity: f32,
}

impl Default for Opacity {
    fn default() -> Self {
        Self { opacity: 1.0 }
    }
}

impl Component for Opacity {
    fn id(&self) -> Option<&str> {
        Some("opacity")
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{:.2}", self.opacity))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorComp {
    pub anchor: Anchor,
}

impl Component for AnchorComp {
    fn id(&self) -> Option<&str> {
        Some("anchor")
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{:?}", self.anchor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineComp {
    pub outline: Outline,
}

impl Component for OutlineComp {
    fn id(&self) -> Option<&str> {
        Some("outline")
    }

    fn inspect(&self) -> Option<String> {
        Some(format!("{}", self.outline.width))
    }
}

/// Draw with a named shader asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderComp {
    pub shader: String,
    pub uniform: Uniform,
}

impl Component for ShaderComp {
    fn id(&self) -> Option<&str> {
        Some("shader")
    }

    fn inspect(&self) -> Option<String> {
        Some(self.shader.clone())
    }
}

/// Children draw only inside (`intersect`) or outside (`subtract`) of what
/// this object draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mask {
    pub mode: StencilMode,
}

impl Mask {
    pub fn intersect() -> Self {
        Self { mode: StencilMode::Equal }
    }

    pub fn subtract() -> Self {
        Self { mode: StencilMode::NotEqual }
    }
}

impl Component for Mask {
    fn id(&self) -> Option<&str> {
        Some("mask")
    }
}

pub fn color(r: f32, g: f32, b: f32) -> ColorComp {
    ColorComp { color: Color::rgb(r, g, b) }
}

pub fn opacity(opacity: f32) -> Opacity {
    Opacity { opacity }
}

pub fn anchor(anchor: Anchor) -> AnchorComp {
    AnchorComp { anchor }
}

pub fn outline(width: f32, color: Color) -> OutlineComp {
    OutlineComp { outline: Outline::new(width, color) }
}

pub fn shader(name: impl Into<String>, uniform: Uniform) -> ShaderComp {
    ShaderComp { shader: name.into(), uniform }
}

impl Context {
    /// Render options gathered from an object's property components.
    /// Position, scale and angle stay at identity: the object's transform is
    /// already on the stack when its components draw.
    pub fn render_props(&self, obj: ObjId) -> RenderProps {
        let mut props = RenderProps::default();
        let Some(o) = self.obj(obj) else {
            return props;
        };
        if let Some(c) = o.c::<ColorComp>() {
            props.color = c.color;
        }
        if let Some(op) = o.c::<Opacity>() {
            props.opacity = op.opacity;
        }
        if let Some(a) = o.c::<AnchorComp>() {
            props.anchor = a.anchor;
        }
        if let Some(ol) = o.c::<OutlineComp>() {
            props.outline = Some(ol.outline);
        }
        if let Some(s) = o.c::<ShaderComp>() {
            props.shader = self.assets.shader(&s.shader);
            props.uniform = Some(s.uniform.clone());
        }
        props.fixed = self.scene().is_fixed(obj);
        props
    }

    pub fn set_color(&mut self, obj: ObjId, color: Color) {
        if let Some(c) = self.c_mut::<ColorComp>(obj) {
            c.color = color;
        }
    }

    pub fn set_opacity(&mut self, obj: ObjId, opacity: f32) {
        if let Some(o) = self.c_mut::<Opacity>(obj) {
            o.opacity = opacity;
        }
    }
}
