//! The seam between the batcher and a graphics API.
//!
//! The batcher produces finished [`DrawCall`]s: projected vertices, indices
//! local to that call, and the texture/shader/uniform/stencil state they
//! must be drawn with. A [`RenderBackend`] turns them into real GPU work.
//!
//! Two backends ship with the crate:
//!
//! - [`WgpuBackend`](super::wgpu_backend::WgpuBackend) for a window
//! - [`NullBackend`] for headless runs and tests. It records every call so
//!   draw-call counts and stencil sequences can be asserted.

use std::cell::RefCell;
use std::rc::Rc;

use super::Viewport;
use super::uniform::Uniform;
use super::vertex::GpuVertex;
use crate::error::Result;
use crate::math::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub(crate) u32);

/// How a draw call interacts with the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilMode {
    /// Stencil ignored.
    #[default]
    None,
    /// Write 1 where geometry lands; nothing reaches the color target.
    Write,
    /// Draw only where the stencil is 1.
    Equal,
    /// Draw only where the stencil is not 1.
    NotEqual,
}

/// One flushed batch.
#[derive(Debug)]
pub struct DrawCall<'a> {
    pub vertices: &'a [GpuVertex],
    pub indices: &'a [u16],
    pub texture: TextureId,
    pub shader: ShaderId,
    pub uniform: &'a Uniform,
    pub stencil: StencilMode,
}

pub trait RenderBackend {
    fn name(&self) -> &str;

    /// Upload RGBA8 pixels. Textures repeat when sampled outside `0..1`.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId>;

    /// Compile a fragment snippet defining
    /// `fn frag(pos: vec3<f32>, uv: vec2<f32>, color: vec4<f32>) -> vec4<f32>`.
    fn create_shader(&mut self, frag_src: &str) -> Result<ShaderId>;

    fn begin_frame(&mut self, clear: Color);

    fn draw(&mut self, call: DrawCall<'_>);

    /// Reset every stencil value to 0. Affects draws issued after this call.
    fn clear_stencil(&mut self);

    fn resize(&mut self, width: u32, height: u32);

    /// Region of the surface the logical canvas maps to.
    fn set_viewport(&mut self, _viewport: Viewport) {}

    fn end_frame(&mut self) -> Result<()>;
}

// ── Null backend ────────────────────────────────────────────────────────

/// What the null backend remembers about each call.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Draw {
        vertices: usize,
        indices: usize,
        texture: TextureId,
        shader: ShaderId,
        uniform: Uniform,
        stencil: StencilMode,
    },
    ClearStencil,
}

/// Shared handle to the calls a [`NullBackend`] has seen.
pub type DrawLog = Rc<RefCell<Vec<Recorded>>>;

/// A backend that draws nothing.
#[derive(Default)]
pub struct NullBackend {
    textures: u32,
    shaders: u32,
    frames: u64,
    log: Option<DrawLog>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A null backend plus a handle to everything it receives.
    pub fn recording() -> (Self, DrawLog) {
        let log: DrawLog = Rc::default();
        let backend = Self {
            log: Some(log.clone()),
            ..Self::default()
        };
        (backend, log)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn create_texture(&mut self, _width: u32, _height: u32, _rgba: &[u8]) -> Result<TextureId> {
        self.textures += 1;
        Ok(TextureId(self.textures - 1))
    }

    fn create_shader(&mut self, _frag_src: &str) -> Result<ShaderId> {
        self.shaders += 1;
        Ok(ShaderId(self.shaders - 1))
    }

    fn begin_frame(&mut self, _clear: Color) {}

    fn draw(&mut self, call: DrawCall<'_>) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(Recorded::Draw {
                vertices: call.vertices.len(),
                indices: call.indices.len(),
                texture: call.texture,
                shader: call.shader,
                uniform: call.uniform.clone(),
                stencil: call.stencil,
            });
        }
    }

    fn clear_stencil(&mut self) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(Recorded::ClearStencil);
        }
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn end_frame(&mut self) -> Result<()> {
        self.frames += 1;
        Ok(())
    }
}
