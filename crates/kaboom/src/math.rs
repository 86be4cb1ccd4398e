//! Math types: re-exports from glam plus the small value types the renderer
//! and the component model share (`Color`, `Quad`, `Anchor`).
//!
//! ## Coordinate System
//!
//! Screen space, origin at the top-left, +X right and +Y down. One unit is
//! one logical pixel. Angles are in **degrees** everywhere in the public API
//! and are converted to radians only when a matrix is built.
//!
//! ```text
//!   (0,0) ─────────────► +X
//!     │
//!     │      anchor (-1,-1) ┌──────┐ (1,-1)
//!     │                     │(0,0) │
//!     │      anchor (-1, 1) └──────┘ (1, 1)
//!     ▼
//!    +Y
//! ```

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "one")]
    pub a: f32,
}

fn one() -> f32 {
    1.0
}

impl Color {
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const RED: Self = Self::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Self = Self::rgb(0.0, 0.0, 1.0);
    pub const YELLOW: Self = Self::rgb(1.0, 1.0, 0.0);
    pub const MAGENTA: Self = Self::rgb(1.0, 0.0, 1.0);
    pub const CYAN: Self = Self::rgb(0.0, 1.0, 1.0);

    /// Create a color from RGB (alpha = 1).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from 0-255 channel values.
    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Create a color from a `0xRRGGBB` literal.
    pub fn hex(rgb: u32) -> Self {
        Self::rgb8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Component-wise multiply (tinting).
    pub fn mult(self, other: Color) -> Self {
        Self::rgba(self.r * other.r, self.g * other.g, self.b * other.b, self.a * other.a)
    }

    pub fn lerp(self, other: Color, t: f32) -> Self {
        Self::rgba(
            lerp(self.r, other.r, t),
            lerp(self.g, other.g, t),
            lerp(self.b, other.b, t),
            lerp(self.a, other.a, t),
        )
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A normalized sub-rectangle of a texture, `{x, y, w, h}` in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Quad {
    /// The whole texture.
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Build a quad from pixel coordinates inside a texture of the given size.
    pub fn from_pixels(x: f32, y: f32, w: f32, h: f32, tex_w: f32, tex_h: f32) -> Self {
        Self::new(x / tex_w, y / tex_h, w / tex_w, h / tex_h)
    }

    /// Map `other` (relative to this quad) into this quad's space.
    ///
    /// Used to combine an animation frame with the atlas region a sprite was
    /// loaded from: `atlas.scale(frame)`.
    pub fn scale(&self, other: &Quad) -> Quad {
        Quad::new(
            self.x + self.w * other.x,
            self.y + self.h * other.y,
            self.w * other.w,
            self.h * other.h,
        )
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::FULL
    }
}

/// Which point of a drawable sits at its position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BotLeft,
    Bot,
    BotRight,
    /// Arbitrary anchor in `-1.0..=1.0` on each axis.
    Custom(Vec2),
}

impl Anchor {
    /// Offset in `-1.0..=1.0` units, `(-1,-1)` being the top-left corner.
    pub fn to_vec2(self) -> Vec2 {
        match self {
            Anchor::TopLeft => Vec2::new(-1.0, -1.0),
            Anchor::Top => Vec2::new(0.0, -1.0),
            Anchor::TopRight => Vec2::new(1.0, -1.0),
            Anchor::Left => Vec2::new(-1.0, 0.0),
            Anchor::Center => Vec2::ZERO,
            Anchor::Right => Vec2::new(1.0, 0.0),
            Anchor::BotLeft => Vec2::new(-1.0, 1.0),
            Anchor::Bot => Vec2::new(0.0, 1.0),
            Anchor::BotRight => Vec2::new(1.0, 1.0),
            Anchor::Custom(v) => v,
        }
    }

    /// Translation that moves a `w`×`h` box centered on the origin so this
    /// anchor point lands on the origin.
    pub fn offset(self, w: f32, h: f32) -> Vec2 {
        let a = self.to_vec2();
        Vec2::new(-a.x * w * 0.5, -a.y * h * 0.5)
    }

    /// Same, for a box whose top-left corner sits on the origin.
    pub fn corner_offset(self, w: f32, h: f32) -> Vec2 {
        let a = self.to_vec2() + Vec2::ONE;
        Vec2::new(-a.x * w * 0.5, -a.y * h * 0.5)
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn deg2rad(deg: f32) -> f32 {
    deg.to_radians()
}

pub fn rad2deg(rad: f32) -> f32 {
    rad.to_degrees()
}

/// Unit vector pointing at `deg` degrees (0 = +X, 90 = +Y).
pub fn vec2_from_angle(deg: f32) -> Vec2 {
    let (s, c) = deg2rad(deg).sin_cos();
    Vec2::new(c, s)
}

/// Angle of a vector in degrees.
pub fn vec2_angle(v: Vec2) -> f32 {
    rad2deg(v.y.atan2(v.x))
}

/// Apply a 4x4 matrix to a 2D point (z = 0, w = 1).
pub fn mat4_mul_vec2(m: &Mat4, p: Vec2) -> Vec2 {
    let v = m.transform_point3(Vec3::new(p.x, p.y, 0.0));
    Vec2::new(v.x, v.y)
}

/// Model matrix for a 2D position / scale / rotation (degrees), applied in
/// translate, scale, rotate order.
pub fn model_matrix(pos: Vec2, scale: Vec2, angle: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(pos.x, pos.y, 0.0))
        * Mat4::from_scale(Vec3::new(scale.x, scale.y, 1.0))
        * Mat4::from_rotation_z(deg2rad(angle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_scale_composes_atlas_regions() {
        let atlas = Quad::new(0.5, 0.0, 0.5, 0.5);
        let frame = Quad::new(0.5, 0.5, 0.5, 0.5);
        let q = atlas.scale(&frame);
        assert!((q.x - 0.75).abs() < 1e-6);
        assert!((q.y - 0.25).abs() < 1e-6);
        assert!((q.w - 0.25).abs() < 1e-6);
        assert!((q.h - 0.25).abs() < 1e-6);
    }

    #[test]
    fn anchor_offsets() {
        assert_eq!(Anchor::TopLeft.offset(10.0, 20.0), Vec2::new(5.0, 10.0));
        assert_eq!(Anchor::Center.offset(10.0, 20.0), Vec2::ZERO);
        assert_eq!(Anchor::BotRight.offset(10.0, 20.0), Vec2::new(-5.0, -10.0));
        assert_eq!(Anchor::TopLeft.corner_offset(10.0, 20.0), Vec2::ZERO);
        assert_eq!(Anchor::Center.corner_offset(10.0, 20.0), Vec2::new(-5.0, -10.0));
    }

    #[test]
    fn model_matrix_moves_points() {
        let m = model_matrix(Vec2::new(10.0, 5.0), Vec2::splat(2.0), 90.0);
        let p = mat4_mul_vec2(&m, Vec2::new(1.0, 0.0));
        assert!((p.x - 10.0).abs() < 1e-4);
        assert!((p.y - 7.0).abs() < 1e-4);
    }

    #[test]
    fn hex_colors() {
        let c = Color::hex(0xff8000);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
    }
}
