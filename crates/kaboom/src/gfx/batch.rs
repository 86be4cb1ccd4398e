//! # Batcher — One Draw Call per Run of Shared State
//!
//! The batcher owns the CPU-side queues and the state the queued geometry
//! was recorded under. Geometry is appended as long as the state matches;
//! the first mismatch flushes the queue as one draw call.
//!
//! ```text
//!  draw(tex A) draw(tex A) draw(tex B) draw(tex B) draw(tex A)  frame end
//!  └──────── queue ────────┘│└──────── queue ────────┘│└ queue ┘ │
//!                         flush #1                 flush #2    flush #3
//! ```
//!
//! A flush is also forced when the next draw would not fit in the fixed
//! capacity, which keeps every index within `u16` range and every upload
//! inside the preallocated GPU buffers.

use super::backend::{DrawCall, RenderBackend, ShaderId, StencilMode, TextureId};
use super::uniform::Uniform;
use super::vertex::{GpuVertex, STRIDE};

pub const MAX_BATCHED_QUAD: usize = 2048;
/// Capacity of the vertex queue, in floats.
pub const MAX_BATCHED_VERTS: usize = MAX_BATCHED_QUAD * 4 * STRIDE;
pub const MAX_BATCHED_INDICES: usize = MAX_BATCHED_QUAD * 6;

#[derive(Debug, Default)]
pub(crate) struct Batcher {
    vqueue: Vec<GpuVertex>,
    iqueue: Vec<u16>,
    cur_tex: Option<TextureId>,
    cur_shader: Option<ShaderId>,
    cur_uniform: Uniform,
    draw_calls: u32,
}

impl Batcher {
    pub fn new() -> Self {
        Self {
            vqueue: Vec::with_capacity(MAX_BATCHED_VERTS / STRIDE),
            iqueue: Vec::with_capacity(MAX_BATCHED_INDICES),
            ..Self::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vqueue.len()
    }

    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn reset_draw_calls(&mut self) {
        self.draw_calls = 0;
    }

    /// Whether queuing `verts`/`indices` under this state requires a flush
    /// first.
    pub fn needs_flush(
        &self,
        tex: TextureId,
        shader: ShaderId,
        uniform: &Uniform,
        verts: usize,
        indices: usize,
    ) -> bool {
        if self.vqueue.is_empty() {
            return false;
        }
        self.cur_tex != Some(tex)
            || self.cur_shader != Some(shader)
            || self.cur_uniform != *uniform
            || (self.vqueue.len() + verts) * STRIDE > MAX_BATCHED_VERTS
            || self.iqueue.len() + indices > MAX_BATCHED_INDICES
    }

    /// Append already-projected geometry. Indices are relative to `verts`.
    pub fn push(
        &mut self,
        verts: impl IntoIterator<Item = GpuVertex>,
        indices: &[u16],
        tex: TextureId,
        shader: ShaderId,
        uniform: &Uniform,
    ) {
        let base = self.vqueue.len() as u16;
        self.vqueue.extend(verts);
        self.iqueue.extend(indices.iter().map(|i| base + i));
        self.cur_tex = Some(tex);
        self.cur_shader = Some(shader);
        if self.cur_uniform != *uniform {
            self.cur_uniform = uniform.clone();
        }
    }

    /// Issue the queued geometry as one draw call. No-op when empty.
    pub fn flush(&mut self, backend: &mut dyn RenderBackend, stencil: StencilMode) {
        if self.vqueue.is_empty() {
            return;
        }
        let (Some(texture), Some(shader)) = (self.cur_tex, self.cur_shader) else {
            return;
        };
        backend.draw(DrawCall {
            vertices: &self.vqueue,
            indices: &self.iqueue,
            texture,
            shader,
            uniform: &self.cur_uniform,
            stencil,
        });
        self.vqueue.clear();
        self.iqueue.clear();
        self.draw_calls += 1;
    }

    #[cfg(test)]
    pub fn vqueue_for_tests(&self) -> &[GpuVertex] {
        &self.vqueue
    }
}
