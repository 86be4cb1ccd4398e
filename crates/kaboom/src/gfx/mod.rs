//! # Gfx — Transform Stack, Batcher and Backend Together
//!
//! [`Gfx`] is the low-level renderer every draw primitive lowers into. It
//! owns:
//!
//! - the [`TransformStack`] drawing code composes into,
//! - the camera view matrix for the current frame,
//! - the [`Batcher`](batch) and the [`RenderBackend`] it flushes to,
//! - the default 1×1 white texture and the default shader.
//!
//! ## `draw_raw`
//!
//! ```text
//! local vertex ──► M = fixed ? transform : view * transform
//!              ──► screen (x, y) ──► NDC (x/w*2-1, -y/h*2+1)
//!              ──► batch queue (flushed first if state changed)
//! ```
//!
//! `fixed` skips the camera, which is what UI, HUD and the debug overlay
//! use.

pub mod backend;
pub(crate) mod batch;
pub mod transform;
pub mod uniform;
pub mod vertex;
pub mod wgpu_backend;

mod gpu;

pub use backend::{DrawCall, DrawLog, NullBackend, Recorded, RenderBackend, ShaderId, StencilMode, TextureId};
pub use batch::{MAX_BATCHED_INDICES, MAX_BATCHED_QUAD, MAX_BATCHED_VERTS};
pub use gpu::GpuContext;
pub use transform::TransformStack;
pub use uniform::{Uniform, UniformValue};
pub use vertex::{GpuVertex, STRIDE, Vertex};
pub use wgpu_backend::WgpuBackend;

use batch::Batcher;

use crate::error::{KaboomError, Result};
use crate::math::{Color, Mat4, Vec2, Vec3};

/// A texture living on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub(crate) id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn id(&self) -> TextureId {
        self.id
    }
}

/// A compiled shader living on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shader(pub(crate) ShaderId);

/// Where the logical canvas lands inside the window, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Convert a window-pixel position into logical coordinates.
    pub fn to_logical(&self, p: Vec2, logical: Vec2) -> Vec2 {
        Vec2::new(
            (p.x - self.x) * logical.x / self.width.max(1.0),
            (p.y - self.y) * logical.y / self.height.max(1.0),
        )
    }
}

pub struct Gfx {
    backend: Box<dyn RenderBackend>,
    batch: Batcher,
    stack: TransformStack,
    view: Mat4,
    width: f32,
    height: f32,
    viewport: Viewport,
    stencil: StencilMode,
    background: Option<Color>,
    default_tex: Texture,
    default_shader: Shader,
    pub(crate) bg_tex: Texture,
    last_draw_calls: u32,
}

impl Gfx {
    pub fn new(mut backend: Box<dyn RenderBackend>, width: f32, height: f32, background: Option<Color>) -> Result<Self> {
        let white = backend.create_texture(1, 1, &[255, 255, 255, 255])?;
        #[rustfmt::skip]
        let checker = [
            128, 128, 128, 255,  190, 190, 190, 255,
            190, 190, 190, 255,  128, 128, 128, 255,
        ];
        let bg = backend.create_texture(2, 2, &checker)?;
        let shader = backend.create_shader(DEFAULT_FRAG)?;
        log::debug!("gfx ready on {} backend ({width}x{height})", backend.name());

        Ok(Self {
            backend,
            batch: Batcher::new(),
            stack: TransformStack::new(),
            view: Mat4::IDENTITY,
            width,
            height,
            viewport: Viewport { x: 0.0, y: 0.0, width, height },
            stencil: StencilMode::None,
            background,
            default_tex: Texture { id: white, width: 1, height: 1 },
            default_shader: Shader(shader),
            bg_tex: Texture { id: bg, width: 2, height: 2 },
            last_draw_calls: 0,
        })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width, self.height) * 0.5
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, color: Option<Color>) {
        self.background = color;
    }

    /// Draw calls issued during the last completed frame.
    pub fn draw_calls(&self) -> u32 {
        self.last_draw_calls
    }

    /// Draw calls issued so far in the current frame.
    pub fn frame_draw_calls(&self) -> u32 {
        self.batch.draw_calls()
    }

    /// Vertices currently waiting in the batch.
    pub fn queued_vertices(&self) -> usize {
        self.batch.vertex_count()
    }

    pub fn default_texture(&self) -> Texture {
        self.default_tex
    }

    pub fn default_shader(&self) -> Shader {
        self.default_shader
    }

    // ── Resources ────────────────────────────────────────────────────

    pub fn make_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<Texture> {
        if rgba.len() != (width * height * 4) as usize {
            return Err(KaboomError::Gpu(format!(
                "texture data is {} bytes, expected {}",
                rgba.len(),
                width * height * 4
            )));
        }
        let id = self.backend.create_texture(width, height, rgba)?;
        Ok(Texture { id, width, height })
    }

    /// Compile a fragment snippet (see [`RenderBackend::create_shader`]).
    pub fn make_shader(&mut self, frag_src: &str) -> Result<Shader> {
        Ok(Shader(self.backend.create_shader(frag_src)?))
    }

    // ── Transform stack ──────────────────────────────────────────────

    pub fn transform(&self) -> Mat4 {
        self.stack.current()
    }

    pub fn push_transform(&mut self) {
        self.stack.push();
    }

    pub fn pop_transform(&mut self) {
        self.stack.pop();
    }

    pub fn push_translate(&mut self, t: Vec2) {
        self.stack.translate(t);
    }

    pub fn push_scale(&mut self, s: Vec2) {
        self.stack.scale(s);
    }

    pub fn push_rotate(&mut self, deg: f32) {
        self.stack.rotate_z(deg);
    }

    pub fn push_rotate_x(&mut self, deg: f32) {
        self.stack.rotate_x(deg);
    }

    pub fn push_rotate_y(&mut self, deg: f32) {
        self.stack.rotate_y(deg);
    }

    pub fn push_matrix(&mut self, m: &Mat4) {
        self.stack.apply(m);
    }

    pub fn transform_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Camera matrix applied to every non-fixed draw.
    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    // ── Drawing ──────────────────────────────────────────────────────

    /// Queue geometry. `indices` refer to positions in `verts`.
    pub fn draw_raw(
        &mut self,
        verts: &[Vertex],
        indices: &[u16],
        fixed: bool,
        texture: Option<&Texture>,
        shader: Option<Shader>,
        uniform: Option<&Uniform>,
    ) -> Result<()> {
        if verts.len() * STRIDE > MAX_BATCHED_VERTS || indices.len() > MAX_BATCHED_INDICES {
            return Err(KaboomError::draw_args(format!(
                "{} vertices / {} indices exceed the batch capacity",
                verts.len(),
                indices.len()
            )));
        }

        let tex = texture.map_or(self.default_tex.id, |t| t.id);
        let shader = shader.unwrap_or(self.default_shader).0;
        let empty = Uniform::default();
        let uniform = uniform.unwrap_or(&empty);

        if self.batch.needs_flush(tex, shader, uniform, verts.len(), indices.len()) {
            self.flush();
        }

        let m = if fixed { self.stack.current() } else { self.view * self.stack.current() };
        let (w, h) = (self.width, self.height);
        let projected = verts.iter().map(|v| {
            let p = m.transform_point3(Vec3::new(v.pos.x, v.pos.y, 0.0));
            GpuVertex {
                position: [p.x / w * 2.0 - 1.0, -p.y / h * 2.0 + 1.0, 0.0],
                uv: [v.uv.x, v.uv.y],
                color: [v.color.r, v.color.g, v.color.b, v.color.a * v.opacity],
            }
        });
        self.batch.push(projected, indices, tex, shader, uniform);
        Ok(())
    }

    pub fn flush(&mut self) {
        self.batch.flush(self.backend.as_mut(), self.stencil);
    }

    /// Flush, then switch stencil mode for everything queued afterwards.
    pub(crate) fn set_stencil(&mut self, mode: StencilMode) {
        self.flush();
        self.stencil = mode;
    }

    pub(crate) fn clear_stencil(&mut self) {
        self.flush();
        self.backend.clear_stencil();
    }

    /// Swap the logical size used for NDC conversion. Flushes first.
    pub(crate) fn set_logical_size(&mut self, width: f32, height: f32) {
        self.flush();
        self.width = width;
        self.height = height;
    }

    #[cfg(test)]
    pub(crate) fn queued_for_tests(&self) -> &[GpuVertex] {
        self.batch.vqueue_for_tests()
    }

    // ── Frame ────────────────────────────────────────────────────────

    /// Reset per-frame state. The background is drawn by the caller.
    pub fn frame_start(&mut self) {
        self.batch.reset_draw_calls();
        self.stack.reset();
        self.stencil = StencilMode::None;
        let clear = self.background.unwrap_or(Color::BLACK);
        self.backend.begin_frame(clear);
    }

    /// Drop whatever stencil and transform state an aborted draw left
    /// behind, so the rest of the frame draws unclipped from identity.
    pub(crate) fn recover(&mut self) {
        self.set_stencil(StencilMode::None);
        self.stack.reset();
    }

    pub fn frame_end(&mut self) -> Result<()> {
        self.flush();
        self.last_draw_calls = self.batch.draw_calls();
        self.backend.end_frame()
    }

    /// Logical size and viewport from a new canvas size.
    pub fn resize(&mut self, canvas_w: u32, canvas_h: u32, logical: Option<(f32, f32)>, scale: f32, letterbox: bool) {
        let (cw, ch) = (canvas_w.max(1) as f32, canvas_h.max(1) as f32);
        match logical {
            Some((lw, lh)) if letterbox => {
                let fit = (cw / lw).min(ch / lh);
                let (vw, vh) = (lw * fit, lh * fit);
                self.viewport = Viewport { x: (cw - vw) * 0.5, y: (ch - vh) * 0.5, width: vw, height: vh };
                self.width = lw;
                self.height = lh;
            }
            Some((lw, lh)) => {
                self.viewport = Viewport { x: 0.0, y: 0.0, width: cw, height: ch };
                self.width = lw;
                self.height = lh;
            }
            None => {
                self.viewport = Viewport { x: 0.0, y: 0.0, width: cw, height: ch };
                self.width = cw / scale;
                self.height = ch / scale;
            }
        }
        self.backend.resize(canvas_w, canvas_h);
        self.backend.set_viewport(self.viewport);
    }
}

/// Fragment snippet of the built-in textured-quad shader.
pub const DEFAULT_FRAG: &str = "
fn frag(pos: vec3<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32> {
    return def_frag(uv, color);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    fn gfx() -> (Gfx, DrawLog) {
        let (backend, log) = NullBackend::recording();
        (Gfx::new(Box::new(backend), 100.0, 100.0, None).unwrap(), log)
    }

    fn quad(gfx: &mut Gfx, tex: Option<&Texture>, shader: Option<Shader>) {
        let v = Vertex::new(Vec2::ZERO, Vec2::ZERO, Color::WHITE, 1.0);
        gfx.draw_raw(&[v; 4], &[0, 1, 3, 1, 2, 3], false, tex, shader, None).unwrap();
    }

    fn draws(log: &DrawLog) -> usize {
        log.borrow().iter().filter(|r| matches!(r, Recorded::Draw { .. })).count()
    }

    #[test]
    fn shared_state_is_one_draw_call() {
        let (mut gfx, log) = gfx();
        gfx.frame_start();
        for _ in 0..100 {
            quad(&mut gfx, None, None);
        }
        assert_eq!(gfx.queued_vertices(), 400);
        gfx.frame_end().unwrap();
        assert_eq!(draws(&log), 1);
        assert_eq!(gfx.draw_calls(), 1);
    }

    #[test]
    fn shader_switch_splits_into_three_calls() {
        let (mut gfx, log) = gfx();
        let other = gfx.make_shader(DEFAULT_FRAG).unwrap();
        gfx.frame_start();
        for _ in 0..10 {
            quad(&mut gfx, None, None);
        }
        quad(&mut gfx, None, Some(other));
        // the switch flushed the first run; only the new quad is queued
        assert_eq!(gfx.queued_vertices(), 4);
        for _ in 0..10 {
            quad(&mut gfx, None, None);
        }
        gfx.frame_end().unwrap();
        assert_eq!(draws(&log), 3);
    }

    #[test]
    fn texture_and_uniform_changes_flush() {
        let (mut gfx, log) = gfx();
        let tex = gfx.make_texture(1, 1, &[0, 0, 0, 255]).unwrap();
        gfx.frame_start();
        quad(&mut gfx, None, None);
        quad(&mut gfx, Some(&tex), None);
        let v = Vertex::new(Vec2::ZERO, Vec2::ZERO, Color::WHITE, 1.0);
        let u = Uniform::new().with("u_time", 1.0);
        gfx.draw_raw(&[v; 3], &[0, 1, 2], false, Some(&tex), None, Some(&u)).unwrap();
        gfx.draw_raw(&[v; 3], &[0, 1, 2], false, Some(&tex), None, Some(&u.clone())).unwrap();
        gfx.frame_end().unwrap();
        assert_eq!(draws(&log), 3);
    }

    #[test]
    fn capacity_overflow_flushes() {
        let (mut gfx, log) = gfx();
        gfx.frame_start();
        for _ in 0..MAX_BATCHED_QUAD + 1 {
            quad(&mut gfx, None, None);
        }
        gfx.frame_end().unwrap();
        assert_eq!(draws(&log), 2);
    }

    #[test]
    fn vertices_are_projected_to_ndc() {
        let (mut gfx, _log) = gfx();
        gfx.frame_start();
        gfx.set_view(Mat4::from_translation(Vec3::new(50.0, 0.0, 0.0)));
        let v = Vertex::new(Vec2::new(0.0, 0.0), Vec2::ZERO, Color::WHITE, 0.5);
        gfx.draw_raw(&[v], &[0], true, None, None, None).unwrap();
        gfx.draw_raw(&[v], &[0], false, None, None, None).unwrap();
        let queued = &gfx.batch.vqueue_for_tests();
        assert_eq!(queued[0].position, [-1.0, 1.0, 0.0]);
        assert_eq!(queued[1].position, [0.0, 1.0, 0.0]);
        assert_eq!(queued[0].color[3], 0.5);
    }

    #[test]
    fn oversized_draw_is_rejected() {
        let (mut gfx, _log) = gfx();
        let v = Vertex::new(Vec2::ZERO, Vec2::ZERO, Color::WHITE, 1.0);
        let verts = vec![v; MAX_BATCHED_VERTS / STRIDE + 1];
        assert!(gfx.draw_raw(&verts, &[], false, None, None, None).is_err());
    }

    #[test]
    fn letterbox_viewport_maps_mouse() {
        let (mut gfx, _log) = gfx();
        gfx.resize(400, 200, Some((100.0, 100.0)), 1.0, true);
        let vp = gfx.viewport();
        assert_eq!(vp.x, 100.0);
        assert_eq!(vp.width, 200.0);
        let p = vp.to_logical(Vec2::new(200.0, 100.0), Vec2::new(100.0, 100.0));
        assert_eq!(p, Vec2::new(50.0, 50.0));
    }
}
