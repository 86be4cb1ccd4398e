//! # Text — Font Atlases, Layout and Drawing
//!
//! Text goes through two steps so a caller can measure before drawing:
//!
//! ```text
//!   DrawTextOpt ──format_text──► FormattedText ──draw_formatted_text──► uv quads
//!                 (wrap, align,   (one FormattedChar per glyph,
//!                  per-char fx)    positioned in text-local space)
//! ```
//!
//! ## Fonts
//!
//! A [`FontAtlas`] is one texture plus a glyph table. Three sources:
//!
//! - [`FontAtlas::builtin`]: a 3×5 pixel font baked into the crate, always
//!   available (the debug overlay and the error screen use it).
//! - [`FontAtlas::from_grid`]: a bitmap font laid out as equal cells in a
//!   texture, in the order of a character string.
//! - [`FontAtlas::from_ttf`] (feature `text`): ASCII 32–126 rasterized with
//!   fontdue at a fixed pixel size and packed row by row into a 512×512
//!   atlas with 1px padding. Glyphs are white with coverage in alpha so the
//!   tint color comes through unchanged.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::{DrawUvQuadOpt, Outline, RenderProps, finite};
use crate::error::Result;
#[cfg(feature = "text")]
use crate::error::KaboomError;
use crate::gfx::{Gfx, Shader, Texture, Uniform};
use crate::math::{Anchor, Color, Quad, Vec2};

/// Where a glyph lives in its atlas and how it sits on a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub quad: Quad,
    /// Size in atlas pixels.
    pub width: f32,
    pub height: f32,
    /// Cursor advance in atlas pixels.
    pub advance: f32,
    /// Top-left of the glyph relative to the pen position at the top of the
    /// line.
    pub offset: Vec2,
}

#[derive(Debug, Clone)]
pub struct FontAtlas {
    pub tex: Texture,
    glyphs: HashMap<char, Glyph>,
    /// Pixel size the atlas was built for.
    pub size: f32,
    pub line_height: f32,
}

impl FontAtlas {
    /// Look up a glyph. Fonts without lowercase letters fall back to the
    /// uppercase glyph.
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs
            .get(&ch)
            .or_else(|| self.glyphs.get(&ch.to_ascii_uppercase()))
    }

    /// A bitmap font already uploaded as a texture: `chars` fill the cells
    /// left to right, top to bottom.
    pub fn from_grid(tex: Texture, cell_w: u32, cell_h: u32, chars: &str) -> Self {
        let cols = (tex.width / cell_w.max(1)).max(1);
        let (tw, th) = (tex.width as f32, tex.height as f32);
        let (cw, ch) = (cell_w as f32, cell_h as f32);
        let glyphs = chars
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let (col, row) = (i as u32 % cols, i as u32 / cols);
                let glyph = Glyph {
                    quad: Quad::from_pixels(col as f32 * cw, row as f32 * ch, cw, ch, tw, th),
                    width: cw,
                    height: ch,
                    advance: cw,
                    offset: Vec2::ZERO,
                };
                (c, glyph)
            })
            .collect();
        Self { tex, glyphs, size: ch, line_height: ch }
    }

    /// The built-in 3×5 pixel font, in 4×6 cells.
    pub fn builtin(gfx: &mut Gfx) -> Result<Self> {
        const CELL_W: usize = 4;
        const CELL_H: usize = 6;
        const COLS: usize = 16;
        let rows = BUILTIN_GLYPHS.len().div_ceil(COLS);
        let (w, h) = (COLS * CELL_W, rows * CELL_H);
        let mut rgba = vec![0u8; w * h * 4];

        for (i, (_, bits)) in BUILTIN_GLYPHS.iter().enumerate() {
            let (ox, oy) = ((i % COLS) * CELL_W, (i / COLS) * CELL_H);
            for (y, row) in bits.iter().enumerate() {
                for x in 0..3 {
                    if row & (0b100 >> x) != 0 {
                        let idx = ((oy + y) * w + ox + x) * 4;
                        rgba[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
                    }
                }
            }
        }

        let tex = gfx.make_texture(w as u32, h as u32, &rgba)?;
        let chars: String = BUILTIN_GLYPHS.iter().map(|(c, _)| *c).collect();
        Ok(Self::from_grid(tex, CELL_W as u32, CELL_H as u32, &chars))
    }

    /// Rasterize a TTF/OTF font at `size` pixels.
    #[cfg(feature = "text")]
    pub fn from_ttf(gfx: &mut Gfx, name: &str, bytes: &[u8], size: f32) -> Result<Self> {
        const ATLAS_SIZE: usize = 512;
        const PADDING: usize = 1;

        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings { scale: size, ..Default::default() })
            .map_err(|e| KaboomError::AssetLoad { name: name.to_string(), reason: e.to_string() })?;
        let (ascent, line_height) = font
            .horizontal_line_metrics(size)
            .map_or((size, size * 1.2), |m| (m.ascent, m.new_line_size));

        let mut rgba = vec![0u8; ATLAS_SIZE * ATLAS_SIZE * 4];
        let mut glyphs = HashMap::new();
        let (mut cx, mut cy, mut row_h) = (PADDING, PADDING, 0);

        for code in 32u8..=126 {
            let ch = code as char;
            let (m, bitmap) = font.rasterize(ch, size);
            let (gw, gh) = (m.width, m.height);
            let mut glyph = Glyph {
                quad: Quad::new(0.0, 0.0, 0.0, 0.0),
                width: gw as f32,
                height: gh as f32,
                advance: m.advance_width,
                offset: Vec2::new(m.xmin as f32, ascent - (m.ymin as f32 + gh as f32)),
            };
            if gw == 0 || gh == 0 {
                glyphs.insert(ch, glyph);
                continue;
            }

            if cx + gw + PADDING > ATLAS_SIZE {
                cx = PADDING;
                cy += row_h + PADDING;
                row_h = 0;
            }
            if cy + gh + PADDING > ATLAS_SIZE {
                log::warn!("font atlas for \"{name}\" full at '{ch}', glyph dropped");
                continue;
            }

            for gy in 0..gh {
                for gx in 0..gw {
                    let dst = ((cy + gy) * ATLAS_SIZE + cx + gx) * 4;
                    rgba[dst..dst + 4].copy_from_slice(&[255, 255, 255, bitmap[gy * gw + gx]]);
                }
            }
            let atlas = ATLAS_SIZE as f32;
            glyph.quad = Quad::from_pixels(cx as f32, cy as f32, gw as f32, gh as f32, atlas, atlas);
            glyphs.insert(ch, glyph);

            cx += gw + PADDING;
            row_h = row_h.max(gh);
        }

        let tex = gfx.make_texture(ATLAS_SIZE as u32, ATLAS_SIZE as u32, &rgba)?;
        log::debug!("rasterized font \"{name}\" at {size}px ({} glyphs)", glyphs.len());
        Ok(Self { tex, glyphs, size, line_height })
    }
}

// ── Options ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    fn factor(self) -> f32 {
        match self {
            TextAlign::Left => 0.0,
            TextAlign::Center => 0.5,
            TextAlign::Right => 1.0,
        }
    }
}

/// Per-character adjustment returned by a [`DrawTextOpt::transform`]
/// callback. Offsets add, factors multiply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharTransform {
    pub pos: Vec2,
    pub scale: Vec2,
    pub angle: f32,
    pub color: Color,
    pub opacity: f32,
}

impl Default for CharTransform {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            scale: Vec2::ONE,
            angle: 0.0,
            color: Color::WHITE,
            opacity: 1.0,
        }
    }
}

pub type CharTransformFn = Rc<dyn Fn(usize, char) -> CharTransform>;

#[derive(Clone)]
pub struct DrawTextOpt {
    pub text: String,
    /// Font asset name; `None` uses the built-in font.
    pub font: Option<String>,
    /// Line height in pixels; defaults to the font's own size.
    pub size: Option<f32>,
    /// Wrap width.
    pub width: Option<f32>,
    pub align: TextAlign,
    pub line_spacing: f32,
    pub letter_spacing: f32,
    pub transform: Option<CharTransformFn>,
    pub props: RenderProps,
}

impl fmt::Debug for DrawTextOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawTextOpt")
            .field("text", &self.text)
            .field("font", &self.font)
            .field("size", &self.size)
            .field("width", &self.width)
            .field("align", &self.align)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

impl DrawTextOpt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
            size: None,
            width: None,
            align: TextAlign::Left,
            line_spacing: 0.0,
            letter_spacing: 0.0,
            transform: None,
            props: RenderProps::default(),
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

    pub fn line_spacing(mut self, spacing: f32) -> Self {
        self.line_spacing = spacing;
        self
    }

    pub fn letter_spacing(mut self, spacing: f32) -> Self {
        self.letter_spacing = spacing;
        self
    }

    pub fn transform(mut self, f: impl Fn(usize, char) -> CharTransform + 'static) -> Self {
        self.transform = Some(Rc::new(f));
        self
    }
}

render_props!(DrawTextOpt);

// ── Layout ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedChar {
    pub ch: char,
    pub tex: Texture,
    pub quad: Quad,
    pub width: f32,
    pub height: f32,
    /// Glyph center in text-local space.
    pub pos: Vec2,
    pub scale: Vec2,
    pub angle: f32,
    pub color: Color,
    pub opacity: f32,
}

/// Laid-out text, ready to draw or measure.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedText {
    pub width: f32,
    pub height: f32,
    pub chars: Vec<FormattedChar>,
    pub pos: Vec2,
    pub angle: f32,
    pub anchor: Anchor,
    pub fixed: bool,
    pub shader: Option<Shader>,
    pub uniform: Option<Uniform>,
}

struct Line {
    width: f32,
    chars: Vec<(char, f32)>,
}

pub fn format_text(font: &FontAtlas, opt: &DrawTextOpt) -> Result<FormattedText> {
    let size = opt.size.unwrap_or(font.size);
    finite("size", size)?;
    let scale = opt.props.scale * (size / font.size);
    let line_h = font.line_height * (size / font.size) * opt.props.scale.y;
    let advance = |c: char| font.glyph(c).map_or(0.0, |g| g.advance * scale.x);
    let spacing = opt.letter_spacing;
    let width_of = |chars: &[(char, f32)]| chars.last().map_or(0.0, |&(c, x)| x + advance(c));

    let mut lines = Vec::new();
    let mut cur: Vec<(char, f32)> = Vec::new();
    let mut cur_x = 0.0;
    let mut last_space: Option<usize> = None;

    for ch in opt.text.chars() {
        if ch == '\n' {
            lines.push(Line { width: width_of(&cur), chars: std::mem::take(&mut cur) });
            cur_x = 0.0;
            last_space = None;
            continue;
        }
        if font.glyph(ch).is_none() {
            continue;
        }
        let gw = advance(ch);

        let overflow = opt.width.is_some_and(|max| cur_x + gw > max) && !cur.is_empty();
        if overflow {
            match last_space {
                // break at the last space and carry the partial word over
                Some(sp) => {
                    let rest: Vec<char> = cur.drain(sp + 1..).map(|(c, _)| c).collect();
                    cur.truncate(sp);
                    lines.push(Line { width: width_of(&cur), chars: std::mem::take(&mut cur) });
                    cur_x = 0.0;
                    for c in rest {
                        cur.push((c, cur_x));
                        cur_x += advance(c) + spacing;
                    }
                }
                None => {
                    lines.push(Line { width: width_of(&cur), chars: std::mem::take(&mut cur) });
                    cur_x = 0.0;
                }
            }
            last_space = None;
        }

        if ch == ' ' {
            last_space = Some(cur.len());
        }
        cur.push((ch, cur_x));
        cur_x += gw + spacing;
    }
    lines.push(Line { width: width_of(&cur), chars: cur });

    let tw = opt
        .width
        .unwrap_or_else(|| lines.iter().map(|l| l.width).fold(0.0, f32::max));
    let th = lines.len() as f32 * line_h + (lines.len() - 1) as f32 * opt.line_spacing;

    let mut chars = Vec::new();
    for (li, line) in lines.iter().enumerate() {
        let ox = (tw - line.width) * opt.align.factor();
        let oy = li as f32 * (line_h + opt.line_spacing);
        for &(ch, x) in &line.chars {
            let Some(g) = font.glyph(ch) else { continue };
            let mut fc = FormattedChar {
                ch,
                tex: font.tex,
                quad: g.quad,
                width: g.width,
                height: g.height,
                pos: Vec2::new(
                    ox + x + (g.offset.x + g.width * 0.5) * scale.x,
                    oy + (g.offset.y + g.height * 0.5) * scale.y,
                ),
                scale,
                angle: 0.0,
                color: opt.props.color,
                opacity: opt.props.opacity,
            };
            if let Some(f) = &opt.transform {
                let t = f(chars.len(), ch);
                fc.pos += t.pos;
                fc.scale *= t.scale;
                fc.angle += t.angle;
                fc.color = fc.color.mult(t.color);
                fc.opacity *= t.opacity;
            }
            chars.push(fc);
        }
    }

    Ok(FormattedText {
        width: tw,
        height: th,
        chars,
        pos: opt.props.pos,
        angle: opt.props.angle,
        anchor: opt.props.anchor,
        fixed: opt.props.fixed,
        shader: opt.props.shader,
        uniform: opt.props.uniform.clone(),
    })
}

impl Gfx {
    pub fn draw_formatted_text(&mut self, text: &FormattedText) -> Result<()> {
        let offset = text.anchor.corner_offset(text.width, text.height);
        self.scoped(|gfx| {
            gfx.push_translate(text.pos);
            gfx.push_rotate(text.angle);
            gfx.push_translate(offset);
            for c in &text.chars {
                gfx.draw_uv_quad(&DrawUvQuadOpt {
                    width: c.width,
                    height: c.height,
                    tex: Some(c.tex),
                    quad: c.quad,
                    flip_x: false,
                    flip_y: false,
                    props: RenderProps {
                        pos: c.pos,
                        scale: c.scale,
                        angle: c.angle,
                        anchor: Anchor::Center,
                        color: c.color,
                        opacity: c.opacity,
                        fixed: text.fixed,
                        shader: text.shader,
                        uniform: text.uniform.clone(),
                        outline: None,
                    },
                })?;
            }
            Ok(())
        })
    }

    /// Lay out and draw in one go, returning the layout for measuring.
    pub fn draw_text(&mut self, font: &FontAtlas, opt: &DrawTextOpt) -> Result<FormattedText> {
        let text = format_text(font, opt)?;
        self.draw_formatted_text(&text)?;
        Ok(text)
    }
}

/// 3×5 glyphs, one row per byte, most significant of the low three bits on
/// the left.
#[rustfmt::skip]
const BUILTIN_GLYPHS: &[(char, [u8; 5])] = &[
    (' ', [0b000, 0b000, 0b000, 0b000, 0b000]),
    ('!', [0b010, 0b010, 0b010, 0b000, 0b010]),
    ('"', [0b101, 0b101, 0b000, 0b000, 0b000]),
    ('#', [0b101, 0b111, 0b101, 0b111, 0b101]),
    ('%', [0b101, 0b001, 0b010, 0b100, 0b101]),
    ('\'', [0b010, 0b010, 0b000, 0b000, 0b000]),
    ('(', [0b001, 0b010, 0b010, 0b010, 0b001]),
    (')', [0b100, 0b010, 0b010, 0b010, 0b100]),
    ('*', [0b000, 0b101, 0b010, 0b101, 0b000]),
    ('+', [0b000, 0b010, 0b111, 0b010, 0b000]),
    (',', [0b000, 0b000, 0b000, 0b010, 0b100]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    ('/', [0b001, 0b001, 0b010, 0b100, 0b100]),
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b111, 0b001, 0b111, 0b100, 0b111]),
    ('3', [0b111, 0b001, 0b111, 0b001, 0b111]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b111, 0b001, 0b111]),
    ('6', [0b111, 0b100, 0b111, 0b101, 0b111]),
    ('7', [0b111, 0b001, 0b001, 0b001, 0b001]),
    ('8', [0b111, 0b101, 0b111, 0b101, 0b111]),
    ('9', [0b111, 0b101, 0b111, 0b001, 0b111]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
    (';', [0b000, 0b010, 0b000, 0b010, 0b100]),
    ('<', [0b001, 0b010, 0b100, 0b010, 0b001]),
    ('=', [0b000, 0b111, 0b000, 0b111, 0b000]),
    ('>', [0b100, 0b010, 0b001, 0b010, 0b100]),
    ('?', [0b111, 0b001, 0b011, 0b000, 0b010]),
    ('A', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('B', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('C', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('D', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('E', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('F', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('G', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('H', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('I', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('J', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('K', [0b101, 0b101, 0b110, 0b101, 0b101]),
    ('L', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('M', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('N', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('O', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('P', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('Q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('R', [0b110, 0b101, 0b110, 0b101, 0b101]),
    ('S', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('T', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('U', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('V', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('W', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('X', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('Y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('Z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('[', [0b110, 0b100, 0b100, 0b100, 0b110]),
    (']', [0b011, 0b001, 0b001, 0b001, 0b011]),
    ('_', [0b000, 0b000, 0b000, 0b000, 0b111]),
    ('|', [0b010, 0b010, 0b010, 0b010, 0b010]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::NullBackend;

    fn setup() -> (Gfx, FontAtlas) {
        let mut gfx = Gfx::new(Box::new(NullBackend::new()), 100.0, 100.0, None).unwrap();
        let font = FontAtlas::builtin(&mut gfx).unwrap();
        (gfx, font)
    }

    #[test]
    fn single_line_is_measured() {
        let (_, font) = setup();
        let t = format_text(&font, &DrawTextOpt::new("AB")).unwrap();
        assert_eq!(t.width, 8.0);
        assert_eq!(t.height, 6.0);
        assert_eq!(t.chars.len(), 2);
        assert_eq!(t.chars[0].pos, Vec2::new(2.0, 3.0));
        assert_eq!(t.chars[1].pos, Vec2::new(6.0, 3.0));
    }

    #[test]
    fn size_scales_layout() {
        let (_, font) = setup();
        let t = format_text(&font, &DrawTextOpt::new("AB").size(12.0)).unwrap();
        assert_eq!(t.width, 16.0);
        assert_eq!(t.height, 12.0);
        assert_eq!(t.chars[0].scale, Vec2::splat(2.0));
    }

    #[test]
    fn wraps_at_the_last_space() {
        let (_, font) = setup();
        let t = format_text(&font, &DrawTextOpt::new("AB CD").width(14.0)).unwrap();
        let text: String = t.chars.iter().map(|c| c.ch).collect();
        assert_eq!(text, "ABCD");
        assert_eq!(t.height, 12.0);
        // "C" starts the second line
        assert_eq!(t.chars[2].pos, Vec2::new(2.0, 9.0));
    }

    #[test]
    fn long_word_breaks_mid_word() {
        let (_, font) = setup();
        let t = format_text(&font, &DrawTextOpt::new("ABCDE").width(10.0)).unwrap();
        assert_eq!(t.height, 18.0);
        assert_eq!(t.chars[4].pos.y, 15.0);
    }

    #[test]
    fn newline_and_center_alignment() {
        let (_, font) = setup();
        let t = format_text(&font, &DrawTextOpt::new("A\nABC").align(TextAlign::Center)).unwrap();
        assert_eq!(t.width, 12.0);
        // the single "A" is centered over the 12px line below it
        assert_eq!(t.chars[0].pos.x, 6.0);
        assert_eq!(t.chars[1].pos.x, 2.0);
    }

    #[test]
    fn lowercase_uses_uppercase_glyphs() {
        let (_, font) = setup();
        assert_eq!(font.glyph('a'), font.glyph('A'));
        assert!(font.glyph('~').is_none());
    }

    #[test]
    fn per_char_transform_applies() {
        let (_, font) = setup();
        let opt = DrawTextOpt::new("AAA").transform(|i, _| CharTransform {
            pos: Vec2::new(0.0, i as f32),
            ..CharTransform::default()
        });
        let t = format_text(&font, &opt).unwrap();
        let ys: Vec<f32> = t.chars.iter().map(|c| c.pos.y).collect();
        assert_eq!(ys, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn draw_text_queues_one_quad_per_visible_glyph() {
        let (mut gfx, font) = setup();
        gfx.frame_start();
        gfx.draw_text(&font, &DrawTextOpt::new("HI THERE")).unwrap();
        // the space glyph is blank but still a quad
        assert_eq!(gfx.queued_vertices(), 8 * 4);
        assert_eq!(gfx.transform_depth(), 0);
    }
}
