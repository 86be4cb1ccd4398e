//! # Draw — Immediate-Mode Primitives
//!
//! Every primitive here lowers into [`Gfx::draw_raw`]: it builds a handful
//! of local-space [`Vertex`]es, wraps them in the transform its options
//! describe, and hands them to the batcher. Nothing is retained between
//! calls.
//!
//! ```text
//!   draw_sprite ──► draw_texture ──► draw_uv_quad ─┐
//!   draw_text ─────► draw_formatted_text ──────────┤
//!   draw_rect ─┐                                   │
//!   draw_triangle ─► draw_polygon ─────────────────┼──► Gfx::draw_raw
//!   draw_circle ──► draw_ellipse ─┘    │ outline   │
//!                                      ▼           │
//!                     draw_lines ──► draw_line ────┘
//! ```
//!
//! ## Options
//!
//! Each primitive takes an option struct holding its own geometry plus a
//! shared [`RenderProps`] block (position, scale, angle, anchor, color,
//! opacity, `fixed`, shader, uniform, outline). The common props get
//! builder methods on every option type:
//!
//! ```ignore
//! gfx.draw_rect(&DrawRectOpt::new(40.0, 20.0).pos(vec2(10.0, 10.0)).color(Color::RED))?;
//! ```
//!
//! ## Sizes
//!
//! A size that is NaN or infinite is a programming error and comes back as
//! [`KaboomError::InvalidDrawArgs`]. A size that is zero or negative draws
//! nothing. Polygons with fewer than three points draw nothing.
//!
//! ## Stencil Masking
//!
//! [`Gfx::draw_masked`] and [`Gfx::draw_subtracted`] run a mask closure with
//! stencil writes enabled, then a content closure tested against it:
//!
//! ```text
//!   flush ─► clear stencil ─► mode = Write ─► mask() ─► flush
//!         ─► mode = Equal / NotEqual ─► content() ─► flush ─► mode = None
//! ```

use crate::error::{KaboomError, Result};
use crate::gfx::{Gfx, Shader, StencilMode, Texture, Uniform, Vertex};
use crate::math::{Anchor, Color, Quad, Vec2, deg2rad};

/// Builder methods for the [`RenderProps`] every option struct carries.
macro_rules! render_props {
    ($($ty:ty),* $(,)?) => {$(
        impl $ty {
            pub fn pos(mut self, pos: Vec2) -> Self {
                self.props.pos = pos;
                self
            }

            pub fn scale(mut self, scale: Vec2) -> Self {
                self.props.scale = scale;
                self
            }

            pub fn angle(mut self, angle: f32) -> Self {
                self.props.angle = angle;
                self
            }

            pub fn anchor(mut self, anchor: Anchor) -> Self {
                self.props.anchor = anchor;
                self
            }

            pub fn color(mut self, color: Color) -> Self {
                self.props.color = color;
                self
            }

            pub fn opacity(mut self, opacity: f32) -> Self {
                self.props.opacity = opacity;
                self
            }

            pub fn fixed(mut self, fixed: bool) -> Self {
                self.props.fixed = fixed;
                self
            }

            pub fn shader(mut self, shader: Shader) -> Self {
                self.props.shader = Some(shader);
                self
            }

            pub fn uniform(mut self, uniform: Uniform) -> Self {
                self.props.uniform = Some(uniform);
                self
            }

            pub fn outline(mut self, outline: Outline) -> Self {
                self.props.outline = Some(outline);
                self
            }

            pub fn props(mut self, props: RenderProps) -> Self {
                self.props = props;
                self
            }
        }
    )*};
}

pub mod text;

pub use text::{CharTransform, DrawTextOpt, FontAtlas, FormattedChar, FormattedText, Glyph, TextAlign, format_text};

/// Texels trimmed from each edge of a texture region so neighbouring atlas
/// cells don't bleed in under filtering.
pub const UV_PAD: f32 = 0.1;

/// Size of one checkerboard cell behind a transparent background.
pub const BG_GRID_SIZE: f32 = 64.0;

// ── Shared options ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    /// A filled circle at every interior joint.
    #[default]
    Round,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub width: f32,
    pub color: Color,
    pub join: LineJoin,
}

impl Outline {
    pub fn new(width: f32, color: Color) -> Self {
        Self { width, color, join: LineJoin::Round }
    }
}

/// Properties shared by every primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProps {
    pub pos: Vec2,
    pub scale: Vec2,
    /// Degrees.
    pub angle: f32,
    pub anchor: Anchor,
    pub color: Color,
    pub opacity: f32,
    /// Ignore the camera.
    pub fixed: bool,
    pub shader: Option<Shader>,
    pub uniform: Option<Uniform>,
    pub outline: Option<Outline>,
}

impl Default for RenderProps {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            scale: Vec2::ONE,
            angle: 0.0,
            anchor: Anchor::TopLeft,
            color: Color::WHITE,
            opacity: 1.0,
            fixed: false,
            shader: None,
            uniform: None,
            outline: None,
        }
    }
}

impl RenderProps {
    /// Props for a child primitive: same color, opacity, camera mode, shader
    /// and uniform; untransformed.
    fn inherit(&self) -> Self {
        Self {
            color: self.color,
            opacity: self.opacity,
            fixed: self.fixed,
            shader: self.shader,
            uniform: self.uniform.clone(),
            ..Self::default()
        }
    }
}

// ── Option structs ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DrawUvQuadOpt {
    pub width: f32,
    pub height: f32,
    pub tex: Option<Texture>,
    pub quad: Quad,
    pub flip_x: bool,
    pub flip_y: bool,
    pub props: RenderProps,
}

impl DrawUvQuadOpt {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            tex: None,
            quad: Quad::FULL,
            flip_x: false,
            flip_y: false,
            props: RenderProps::default(),
        }
    }

    pub fn tex(mut self, tex: Texture) -> Self {
        self.tex = Some(tex);
        self
    }

    pub fn quad(mut self, quad: Quad) -> Self {
        self.quad = quad;
        self
    }

    pub fn flip_x(mut self, flip: bool) -> Self {
        self.flip_x = flip;
        self
    }

    pub fn flip_y(mut self, flip: bool) -> Self {
        self.flip_y = flip;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawTextureOpt {
    pub tex: Texture,
    /// Target size; with only one of the two set the aspect ratio is kept.
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Repeat the texture to fill `width`×`height` instead of stretching.
    pub tiled: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub quad: Quad,
    pub props: RenderProps,
}

impl DrawTextureOpt {
    pub fn new(tex: Texture) -> Self {
        Self {
            tex,
            width: None,
            height: None,
            tiled: false,
            flip_x: false,
            flip_y: false,
            quad: Quad::FULL,
            props: RenderProps::default(),
        }
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn tiled(mut self, tiled: bool) -> Self {
        self.tiled = tiled;
        self
    }

    pub fn quad(mut self, quad: Quad) -> Self {
        self.quad = quad;
        self
    }

    pub fn flip_x(mut self, flip: bool) -> Self {
        self.flip_x = flip;
        self
    }

    pub fn flip_y(mut self, flip: bool) -> Self {
        self.flip_y = flip;
        self
    }
}

/// Like [`DrawTextureOpt`], but the texture is looked up by sprite name.
/// Resolved by [`Context::draw_sprite`](crate::context::Context::draw_sprite).
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSpriteOpt {
    pub sprite: String,
    pub frame: usize,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub tiled: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub quad: Quad,
    pub props: RenderProps,
}

impl DrawSpriteOpt {
    pub fn new(sprite: impl Into<String>) -> Self {
        Self {
            sprite: sprite.into(),
            frame: 0,
            width: None,
            height: None,
            tiled: false,
            flip_x: false,
            flip_y: false,
            quad: Quad::FULL,
            props: RenderProps::default(),
        }
    }

    pub fn frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn tiled(mut self, tiled: bool) -> Self {
        self.tiled = tiled;
        self
    }

    pub fn flip_x(mut self, flip: bool) -> Self {
        self.flip_x = flip;
        self
    }

    pub fn flip_y(mut self, flip: bool) -> Self {
        self.flip_y = flip;
        self
    }

    /// Texture options for a resolved sprite frame.
    pub(crate) fn to_texture_opt(&self, tex: Texture, frame: Quad) -> DrawTextureOpt {
        DrawTextureOpt {
            tex,
            width: self.width,
            height: self.height,
            tiled: self.tiled,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
            quad: frame.scale(&self.quad),
            props: self.props.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRectOpt {
    pub width: f32,
    pub height: f32,
    /// Corner radius, clamped to half the shorter side.
    pub radius: f32,
    pub fill: bool,
    /// Two-stop gradient, top to bottom (left to right if `horizontal`).
    pub gradient: Option<[Color; 2]>,
    pub horizontal: bool,
    pub props: RenderProps,
}

impl DrawRectOpt {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            radius: 0.0,
            fill: true,
            gradient: None,
            horizontal: false,
            props: RenderProps::default(),
        }
    }

    pub fn radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    pub fn gradient(mut self, from: Color, to: Color) -> Self {
        self.gradient = Some([from, to]);
        self
    }

    pub fn horizontal(mut self, horizontal: bool) -> Self {
        self.horizontal = horizontal;
        self
    }
}

/// A single segment. Position, scale, angle and anchor are ignored; the
/// endpoints are already in the current transform's space.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawLineOpt {
    pub p1: Vec2,
    pub p2: Vec2,
    pub width: f32,
    pub props: RenderProps,
}

impl DrawLineOpt {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self { p1, p2, width: 1.0, props: RenderProps::default() }
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawLinesOpt {
    pub pts: Vec<Vec2>,
    pub width: f32,
    pub join: LineJoin,
    pub props: RenderProps,
}

impl DrawLinesOpt {
    pub fn new(pts: Vec<Vec2>) -> Self {
        Self { pts, width: 1.0, join: LineJoin::Round, props: RenderProps::default() }
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn join(mut self, join: LineJoin) -> Self {
        self.join = join;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawTriangleOpt {
    pub p1: Vec2,
    pub p2: Vec2,
    pub p3: Vec2,
    pub fill: bool,
    pub props: RenderProps,
}

impl DrawTriangleOpt {
    pub fn new(p1: Vec2, p2: Vec2, p3: Vec2) -> Self {
        Self { p1, p2, p3, fill: true, props: RenderProps::default() }
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCircleOpt {
    pub radius: f32,
    /// Arc start, degrees.
    pub start: f32,
    /// Arc end, degrees.
    pub end: f32,
    pub fill: bool,
    /// Center color, rim color.
    pub gradient: Option<[Color; 2]>,
    /// Multiplier on the number of rim segments.
    pub resolution: f32,
    pub props: RenderProps,
}

impl DrawCircleOpt {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            start: 0.0,
            end: 360.0,
            fill: true,
            gradient: None,
            resolution: 1.0,
            props: RenderProps { anchor: Anchor::Center, ..RenderProps::default() },
        }
    }

    pub fn arc(mut self, start: f32, end: f32) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    pub fn gradient(mut self, center: Color, rim: Color) -> Self {
        self.gradient = Some([center, rim]);
        self
    }

    pub fn resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawEllipseOpt {
    pub radius_x: f32,
    pub radius_y: f32,
    pub start: f32,
    pub end: f32,
    pub fill: bool,
    pub gradient: Option<[Color; 2]>,
    pub resolution: f32,
    pub props: RenderProps,
}

impl DrawEllipseOpt {
    pub fn new(radius_x: f32, radius_y: f32) -> Self {
        Self {
            radius_x,
            radius_y,
            start: 0.0,
            end: 360.0,
            fill: true,
            gradient: None,
            resolution: 1.0,
            props: RenderProps { anchor: Anchor::Center, ..RenderProps::default() },
        }
    }

    pub fn arc(mut self, start: f32, end: f32) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    pub fn gradient(mut self, center: Color, rim: Color) -> Self {
        self.gradient = Some([center, rim]);
        self
    }
}

impl From<DrawCircleOpt> for DrawEllipseOpt {
    fn from(c: DrawCircleOpt) -> Self {
        Self {
            radius_x: c.radius,
            radius_y: c.radius,
            start: c.start,
            end: c.end,
            fill: c.fill,
            gradient: c.gradient,
            resolution: c.resolution,
            props: c.props,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawPolygonOpt {
    pub pts: Vec<Vec2>,
    pub fill: bool,
    /// Translation applied after position, scale and rotation.
    pub offset: Vec2,
    /// Per-vertex tint, multiplied with the base color.
    pub colors: Option<Vec<Color>>,
    /// Per-vertex texture coordinates; `tex` is only used when these are set.
    pub uv: Option<Vec<Vec2>>,
    pub tex: Option<Texture>,
    /// Custom triangulation. Defaults to a fan around the first point.
    pub indices: Option<Vec<u16>>,
    pub props: RenderProps,
}

impl DrawPolygonOpt {
    pub fn new(pts: Vec<Vec2>) -> Self {
        Self {
            pts,
            fill: true,
            offset: Vec2::ZERO,
            colors: None,
            uv: None,
            tex: None,
            indices: None,
            props: RenderProps::default(),
        }
    }

    pub fn fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    pub fn colors(mut self, colors: Vec<Color>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn textured(mut self, tex: Texture, uv: Vec<Vec2>) -> Self {
        self.tex = Some(tex);
        self.uv = Some(uv);
        self
    }

    pub fn indices(mut self, indices: Vec<u16>) -> Self {
        self.indices = Some(indices);
        self
    }
}

render_props!(
    DrawUvQuadOpt,
    DrawTextureOpt,
    DrawSpriteOpt,
    DrawRectOpt,
    DrawLineOpt,
    DrawLinesOpt,
    DrawTriangleOpt,
    DrawCircleOpt,
    DrawEllipseOpt,
    DrawPolygonOpt,
);

// ── Helpers ──────────────────────────────────────────────────────────

fn finite(what: &str, v: f32) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(KaboomError::draw_args(format!("{what} must be a finite number, got {v}")))
    }
}

/// Points along an elliptical arc from `start` to `end` degrees, both ends
/// included.
pub fn arc_points(center: Vec2, radius_x: f32, radius_y: f32, start: f32, end: f32, resolution: f32) -> Vec<Vec2> {
    let segments = ((radius_x + radius_y).abs().sqrt() * 3.0 * resolution).max(16.0).ceil() as usize;
    let step = (end - start) / segments as f32;
    let at = |deg: f32| {
        let (s, c) = deg2rad(deg).sin_cos();
        center + Vec2::new(radius_x * c, radius_y * s)
    };
    let mut pts: Vec<Vec2> = (0..segments).map(|i| at(start + step * i as f32)).collect();
    pts.push(at(end));
    pts
}

fn fan_indices(n: usize) -> Vec<u16> {
    (0..n.saturating_sub(2))
        .flat_map(|i| [0, (i + 1) as u16, (i + 2) as u16])
        .collect()
}

// ── Primitives ───────────────────────────────────────────────────────

impl Gfx {
    /// Run `f` inside a push/pop pair, popping even when it fails.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.push_transform();
        let out = f(self);
        self.pop_transform();
        out
    }

    /// A textured quad: the building block of sprites, textures and text.
    pub fn draw_uv_quad(&mut self, opt: &DrawUvQuadOpt) -> Result<()> {
        let (w, h) = (opt.width, opt.height);
        finite("width", w)?;
        finite("height", h)?;
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }
        let p = &opt.props;
        let offset = p.anchor.offset(w, h);
        let (pad_x, pad_y) = opt
            .tex
            .map_or((0.0, 0.0), |t| (UV_PAD / t.width as f32, UV_PAD / t.height as f32));
        let q = opt.quad;
        let (qx, qy, qw, qh) = (q.x + pad_x, q.y + pad_y, q.w - pad_x * 2.0, q.h - pad_y * 2.0);
        let (u0, u1) = if opt.flip_x { (qx + qw, qx) } else { (qx, qx + qw) };
        let (v0, v1) = if opt.flip_y { (qy + qh, qy) } else { (qy, qy + qh) };
        let (hw, hh) = (w * 0.5, h * 0.5);
        let verts = [
            Vertex::new(Vec2::new(-hw, hh), Vec2::new(u0, v1), p.color, p.opacity),
            Vertex::new(Vec2::new(-hw, -hh), Vec2::new(u0, v0), p.color, p.opacity),
            Vertex::new(Vec2::new(hw, -hh), Vec2::new(u1, v0), p.color, p.opacity),
            Vertex::new(Vec2::new(hw, hh), Vec2::new(u1, v1), p.color, p.opacity),
        ];

        self.scoped(|gfx| {
            gfx.push_translate(p.pos);
            gfx.push_rotate(p.angle);
            gfx.push_scale(p.scale);
            gfx.push_translate(offset);
            gfx.draw_raw(&verts, &[0, 1, 3, 1, 2, 3], p.fixed, opt.tex.as_ref(), p.shader, p.uniform.as_ref())
        })
    }

    pub fn draw_texture(&mut self, opt: &DrawTextureOpt) -> Result<()> {
        let q = opt.quad;
        let w = opt.tex.width as f32 * q.w;
        let h = opt.tex.height as f32 * q.h;
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }
        let quad_opt = |props: RenderProps| DrawUvQuadOpt {
            width: w,
            height: h,
            tex: Some(opt.tex),
            quad: q,
            flip_x: opt.flip_x,
            flip_y: opt.flip_y,
            props,
        };

        if opt.tiled {
            let tw = opt.width.unwrap_or(w);
            let th = opt.height.unwrap_or(h);
            finite("width", tw)?;
            finite("height", th)?;
            let rep_x = (tw / w).ceil().max(0.0) as u32;
            let rep_y = (th / h).ceil().max(0.0) as u32;
            let full = Vec2::new(rep_x as f32 * w, rep_y as f32 * h);
            let offset = (opt.props.anchor.to_vec2() + Vec2::ONE) * 0.5 * full;
            for i in 0..rep_x {
                for j in 0..rep_y {
                    let props = RenderProps {
                        pos: opt.props.pos + Vec2::new(w * i as f32, h * j as f32) - offset,
                        anchor: Anchor::TopLeft,
                        ..opt.props.clone()
                    };
                    self.draw_uv_quad(&quad_opt(props))?;
                }
            }
            Ok(())
        } else {
            let scale = match (opt.width, opt.height) {
                (Some(tw), Some(th)) => Vec2::new(tw / w, th / h),
                (Some(tw), None) => Vec2::splat(tw / w),
                (None, Some(th)) => Vec2::splat(th / h),
                (None, None) => Vec2::ONE,
            };
            let props = RenderProps {
                scale: scale * opt.props.scale,
                ..opt.props.clone()
            };
            self.draw_uv_quad(&quad_opt(props))
        }
    }

    pub fn draw_rect(&mut self, opt: &DrawRectOpt) -> Result<()> {
        let (w, h) = (opt.width, opt.height);
        finite("width", w)?;
        finite("height", h)?;
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }

        let pts = if opt.radius > 0.0 {
            let r = opt.radius.min(w.min(h) * 0.5);
            let mut pts = vec![Vec2::new(r, 0.0), Vec2::new(w - r, 0.0)];
            pts.extend(arc_points(Vec2::new(w - r, r), r, r, 270.0, 360.0, 1.0));
            pts.extend([Vec2::new(w, r), Vec2::new(w, h - r)]);
            pts.extend(arc_points(Vec2::new(w - r, h - r), r, r, 0.0, 90.0, 1.0));
            pts.extend([Vec2::new(w - r, h), Vec2::new(r, h)]);
            pts.extend(arc_points(Vec2::new(r, h - r), r, r, 90.0, 180.0, 1.0));
            pts.extend([Vec2::new(0.0, h - r), Vec2::new(0.0, r)]);
            pts.extend(arc_points(Vec2::new(r, r), r, r, 180.0, 270.0, 1.0));
            pts
        } else {
            vec![Vec2::ZERO, Vec2::new(w, 0.0), Vec2::new(w, h), Vec2::new(0.0, h)]
        };

        // gradients only map cleanly onto the four plain corners
        let colors = match opt.gradient {
            Some([a, b]) if opt.radius <= 0.0 => Some(if opt.horizontal {
                vec![a, b, b, a]
            } else {
                vec![a, a, b, b]
            }),
            _ => None,
        };

        self.draw_polygon(&DrawPolygonOpt {
            pts,
            fill: opt.fill,
            offset: opt.props.anchor.corner_offset(w, h),
            colors,
            props: opt.props.clone(),
            ..DrawPolygonOpt::new(Vec::new())
        })
    }

    pub fn draw_line(&mut self, opt: &DrawLineOpt) -> Result<()> {
        finite("width", opt.width)?;
        let d = opt.p2 - opt.p1;
        if d == Vec2::ZERO || opt.width <= 0.0 {
            return Ok(());
        }
        let dir = d.normalize();
        let n = Vec2::new(dir.y, -dir.x) * opt.width * 0.5;
        let p = &opt.props;
        let verts = [opt.p1 - n, opt.p1 + n, opt.p2 + n, opt.p2 - n]
            .map(|pos| Vertex::new(pos, Vec2::ZERO, p.color, p.opacity));
        self.draw_raw(&verts, &[0, 1, 3, 1, 2, 3], p.fixed, None, p.shader, p.uniform.as_ref())
    }

    pub fn draw_lines(&mut self, opt: &DrawLinesOpt) -> Result<()> {
        let pts = &opt.pts;
        if pts.len() < 2 {
            return Ok(());
        }
        for seg in pts.windows(2) {
            self.draw_line(&DrawLineOpt {
                p1: seg[0],
                p2: seg[1],
                width: opt.width,
                props: opt.props.inherit(),
            })?;
        }

        if opt.join == LineJoin::Round && opt.width > 1.0 {
            let closed = pts.first() == pts.last();
            let joints = pts[1..pts.len() - 1].iter().chain(closed.then(|| &pts[0]));
            for &pt in joints {
                self.draw_circle(&DrawCircleOpt {
                    props: RenderProps { pos: pt, anchor: Anchor::Center, ..opt.props.inherit() },
                    ..DrawCircleOpt::new(opt.width * 0.5)
                })?;
            }
        }
        Ok(())
    }

    pub fn draw_triangle(&mut self, opt: &DrawTriangleOpt) -> Result<()> {
        self.draw_polygon(&DrawPolygonOpt {
            fill: opt.fill,
            props: opt.props.clone(),
            ..DrawPolygonOpt::new(vec![opt.p1, opt.p2, opt.p3])
        })
    }

    pub fn draw_circle(&mut self, opt: &DrawCircleOpt) -> Result<()> {
        finite("radius", opt.radius)?;
        self.draw_ellipse(&DrawEllipseOpt::from(opt.clone()))
    }

    pub fn draw_ellipse(&mut self, opt: &DrawEllipseOpt) -> Result<()> {
        let (rx, ry) = (opt.radius_x, opt.radius_y);
        finite("radius_x", rx)?;
        finite("radius_y", ry)?;
        if rx <= 0.0 || ry <= 0.0 {
            return Ok(());
        }

        let center = opt.props.anchor.to_vec2() * Vec2::new(-rx, -ry);
        let mut pts = vec![center];
        pts.extend(arc_points(center, rx, ry, opt.start, opt.end, opt.resolution));
        let colors = opt.gradient.map(|[inner, rim]| {
            let mut c = vec![inner];
            c.resize(pts.len(), rim);
            c
        });

        let full = opt.end - opt.start >= 360.0;
        if full && opt.props.outline.is_some() {
            // outline the rim only, not the spoke to the center
            if opt.fill {
                self.draw_polygon(&DrawPolygonOpt {
                    colors,
                    props: RenderProps { outline: None, ..opt.props.clone() },
                    ..DrawPolygonOpt::new(pts.clone())
                })?;
            }
            return self.draw_polygon(&DrawPolygonOpt {
                fill: false,
                props: opt.props.clone(),
                ..DrawPolygonOpt::new(pts[1..].to_vec())
            });
        }

        self.draw_polygon(&DrawPolygonOpt {
            fill: opt.fill,
            colors,
            props: opt.props.clone(),
            ..DrawPolygonOpt::new(pts)
        })
    }

    pub fn draw_polygon(&mut self, opt: &DrawPolygonOpt) -> Result<()> {
        let n = opt.pts.len();
        if n < 3 {
            return Ok(());
        }
        let p = &opt.props;

        self.scoped(|gfx| {
            gfx.push_translate(p.pos);
            gfx.push_scale(p.scale);
            gfx.push_rotate(p.angle);
            gfx.push_translate(opt.offset);

            if opt.fill {
                let verts: Vec<Vertex> = opt
                    .pts
                    .iter()
                    .enumerate()
                    .map(|(i, &pt)| {
                        let uv = opt.uv.as_ref().and_then(|uv| uv.get(i).copied()).unwrap_or(Vec2::ZERO);
                        let color = opt
                            .colors
                            .as_ref()
                            .and_then(|c| c.get(i))
                            .map_or(p.color, |c| c.mult(p.color));
                        Vertex::new(pt, uv, color, p.opacity)
                    })
                    .collect();
                let indices = match &opt.indices {
                    Some(custom) => custom.clone(),
                    None => fan_indices(n),
                };
                let tex = if opt.uv.is_some() { opt.tex.as_ref() } else { None };
                gfx.draw_raw(&verts, &indices, p.fixed, tex, p.shader, p.uniform.as_ref())?;
            }

            if let Some(outline) = p.outline {
                let mut pts = opt.pts.clone();
                pts.push(opt.pts[0]);
                gfx.draw_lines(&DrawLinesOpt {
                    pts,
                    width: outline.width,
                    join: outline.join,
                    props: RenderProps { color: outline.color, ..p.inherit() },
                })?;
            }
            Ok(())
        })
    }

    /// Checkerboard behind a missing or translucent background color.
    pub fn draw_background(&mut self) -> Result<()> {
        if self.background().is_some_and(|c| c.a >= 1.0) {
            return Ok(());
        }
        let (w, h) = (self.width(), self.height());
        let quad = Quad::new(0.0, 0.0, w / BG_GRID_SIZE, h / BG_GRID_SIZE);
        let bg = self.bg_tex;
        self.draw_uv_quad(&DrawUvQuadOpt::new(w, h).tex(bg).quad(quad).fixed(true))
    }

    // ── Stencil ──────────────────────────────────────────────────────

    /// Draw `content` only where `mask` drew.
    pub fn draw_masked(
        &mut self,
        content: impl FnOnce(&mut Self) -> Result<()>,
        mask: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.draw_stenciled(content, mask, StencilMode::Equal)
    }

    /// Draw `content` everywhere except where `mask` drew.
    pub fn draw_subtracted(
        &mut self,
        content: impl FnOnce(&mut Self) -> Result<()>,
        mask: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.draw_stenciled(content, mask, StencilMode::NotEqual)
    }

    pub fn draw_stenciled(
        &mut self,
        content: impl FnOnce(&mut Self) -> Result<()>,
        mask: impl FnOnce(&mut Self) -> Result<()>,
        test: StencilMode,
    ) -> Result<()> {
        self.clear_stencil();
        self.set_stencil(StencilMode::Write);
        let out = mask(self).and_then(|()| {
            self.set_stencil(test);
            content(self)
        });
        self.set_stencil(StencilMode::None);
        out
    }

    /// Draw in window pixels inside the viewport, ignoring the logical
    /// canvas scale.
    pub fn draw_unscaled(&mut self, content: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let (w, h) = (self.width(), self.height());
        let vp = self.viewport();
        self.set_logical_size(vp.width, vp.height);
        let out = content(self);
        self.set_logical_size(w, h);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{DrawLog, NullBackend, Recorded};

    fn gfx() -> (Gfx, DrawLog) {
        let (backend, log) = NullBackend::recording();
        let mut gfx = Gfx::new(Box::new(backend), 100.0, 100.0, Some(Color::BLACK)).unwrap();
        gfx.frame_start();
        (gfx, log)
    }

    #[test]
    fn rect_without_a_real_size_is_an_error() {
        let (mut gfx, _) = gfx();
        let err = gfx.draw_rect(&DrawRectOpt::new(f32::NAN, 10.0)).unwrap_err();
        assert!(matches!(err, KaboomError::InvalidDrawArgs(_)));
        assert!(gfx.draw_rect(&DrawRectOpt::new(-5.0, 10.0)).is_ok());
        assert_eq!(gfx.queued_vertices(), 0);
    }

    #[test]
    fn degenerate_polygon_draws_nothing() {
        let (mut gfx, _) = gfx();
        gfx.draw_polygon(&DrawPolygonOpt::new(vec![Vec2::ZERO, Vec2::X])).unwrap();
        assert_eq!(gfx.queued_vertices(), 0);
        gfx.draw_polygon(&DrawPolygonOpt::new(vec![Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE])).unwrap();
        assert_eq!(gfx.queued_vertices(), 4);
    }

    #[test]
    fn rect_is_four_vertices_at_its_corners() {
        let (mut gfx, _) = gfx();
        gfx.draw_rect(&DrawRectOpt::new(50.0, 50.0).pos(Vec2::new(50.0, 0.0))).unwrap();
        let q = gfx.queued_for_tests();
        assert_eq!(q.len(), 4);
        // (50,0) is the top middle of a 100x100 canvas
        assert_eq!(q[0].position, [0.0, 1.0, 0.0]);
        assert_eq!(q[2].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn centered_rect_straddles_its_position() {
        let (mut gfx, _) = gfx();
        gfx.draw_rect(&DrawRectOpt::new(20.0, 20.0).pos(Vec2::new(50.0, 50.0)).anchor(Anchor::Center))
            .unwrap();
        let q = gfx.queued_for_tests();
        assert!((q[0].position[0] + 0.2).abs() < 1e-5);
        assert!((q[0].position[1] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn uv_quad_flip_swaps_texture_coordinates() {
        let (mut gfx, _) = gfx();
        gfx.draw_uv_quad(&DrawUvQuadOpt::new(10.0, 10.0)).unwrap();
        gfx.draw_uv_quad(&DrawUvQuadOpt::new(10.0, 10.0).flip_x(true)).unwrap();
        let q = gfx.queued_for_tests();
        assert_eq!(q[0].uv, [0.0, 1.0]);
        assert_eq!(q[1].uv, [0.0, 0.0]);
        assert_eq!(q[4].uv, [1.0, 1.0]);
        assert_eq!(q[6].uv, [0.0, 0.0]);
    }

    #[test]
    fn uv_pad_shrinks_texture_region() {
        let (mut gfx, _) = gfx();
        let tex = gfx.make_texture(10, 10, &[255; 400]).unwrap();
        gfx.draw_uv_quad(&DrawUvQuadOpt::new(10.0, 10.0).tex(tex)).unwrap();
        let q = gfx.queued_for_tests();
        assert!((q[1].uv[0] - 0.01).abs() < 1e-6);
        assert!((q[3].uv[0] - 0.99).abs() < 1e-6);
    }

    #[test]
    fn texture_keeps_aspect_with_one_dimension() {
        let (mut gfx, _) = gfx();
        let tex = gfx.make_texture(4, 2, &[255; 32]).unwrap();
        gfx.draw_texture(&DrawTextureOpt::new(tex).width(50.0)).unwrap();
        let q = gfx.queued_for_tests();
        // 4x2 scaled by 12.5 → 50x25, top-left at the origin
        assert!((q[3].position[0] - 0.0).abs() < 1e-5);
        assert!((q[3].position[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn tiled_texture_repeats() {
        let (mut gfx, _) = gfx();
        let tex = gfx.make_texture(10, 10, &[255; 400]).unwrap();
        gfx.draw_texture(&DrawTextureOpt::new(tex).width(25.0).height(10.0).tiled(true)).unwrap();
        assert_eq!(gfx.queued_vertices(), 12);
    }

    #[test]
    fn circle_outline_skips_the_center_spoke() {
        let (mut gfx, _) = gfx();
        gfx.draw_circle(&DrawCircleOpt::new(10.0).outline(Outline { join: LineJoin::None, ..Outline::new(1.0, Color::RED) }))
            .unwrap();
        let rim = arc_points(Vec2::ZERO, 10.0, 10.0, 0.0, 360.0, 1.0).len();
        // fill is center + rim; the outline adds whole quads and no circles
        let outline = gfx.queued_vertices() - (rim + 1);
        assert!(outline >= (rim - 1) * 4);
        assert_eq!(outline % 4, 0);
    }

    #[test]
    fn line_is_a_quad_around_the_segment() {
        let (mut gfx, _) = gfx();
        gfx.draw_line(&DrawLineOpt::new(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0)).width(20.0)).unwrap();
        let q = gfx.queued_for_tests();
        let ys: Vec<f32> = q.iter().map(|v| v.position[1]).collect();
        assert!(ys.iter().any(|y| (y - 0.2).abs() < 1e-5));
        assert!(ys.iter().any(|y| (y + 0.2).abs() < 1e-5));
    }

    #[test]
    fn masked_draw_stencil_sequence() {
        let (mut gfx, log) = gfx();
        gfx.draw_masked(
            |g| g.draw_rect(&DrawRectOpt::new(100.0, 100.0)),
            |g| g.draw_circle(&DrawCircleOpt::new(30.0).pos(Vec2::splat(50.0))),
        )
        .unwrap();
        gfx.draw_rect(&DrawRectOpt::new(10.0, 10.0)).unwrap();
        gfx.frame_end().unwrap();

        let stencils: Vec<_> = log
            .borrow()
            .iter()
            .map(|r| match r {
                Recorded::Draw { stencil, .. } => Some(*stencil),
                Recorded::ClearStencil => None,
            })
            .collect();
        assert_eq!(
            stencils,
            vec![None, Some(StencilMode::Write), Some(StencilMode::Equal), Some(StencilMode::None)]
        );
    }

    #[test]
    fn subtracted_uses_not_equal() {
        let (mut gfx, log) = gfx();
        gfx.draw_subtracted(
            |g| g.draw_rect(&DrawRectOpt::new(100.0, 100.0)),
            |g| g.draw_rect(&DrawRectOpt::new(10.0, 10.0)),
        )
        .unwrap();
        let log = log.borrow();
        assert!(matches!(log.last(), Some(Recorded::Draw { stencil: StencilMode::NotEqual, .. })));
    }

    #[test]
    fn checkerboard_only_without_opaque_background() {
        let (mut gfx, _) = gfx();
        gfx.draw_background().unwrap();
        assert_eq!(gfx.queued_vertices(), 0);
        gfx.set_background(None);
        gfx.draw_background().unwrap();
        assert_eq!(gfx.queued_vertices(), 4);
    }

    #[test]
    fn transform_stack_is_balanced_after_draws() {
        let (mut gfx, _) = gfx();
        gfx.draw_rect(&DrawRectOpt::new(f32::INFINITY, 1.0)).ok();
        gfx.draw_ellipse(&DrawEllipseOpt::new(5.0, 3.0).angle(30.0)).unwrap();
        assert_eq!(gfx.transform_depth(), 0);
    }
}
