//! # Vertex — What a Draw Call Hands to the Batch
//!
//! There are two vertex types:
//!
//! - [`Vertex`] is what drawing code builds: a *local* position (before any
//!   transform), a UV coordinate, a color and an opacity.
//! - [`GpuVertex`] is what sits in the batch queue and the GPU buffer: the
//!   same data after the current transform, the camera and the
//!   screen-to-NDC conversion have been applied.
//!
//! ## Memory Layout
//!
//! `#[repr(C)]` pins the field order so the bytes match what the vertex
//! fetcher expects, and `bytemuck` lets the whole queue be cast to `&[u8]`
//! without a copy.
//!
//! ```text
//! GpuVertex (36 bytes = 9 floats = STRIDE)
//! ┌────────────────┬──────────────┬────────────────────────┐
//! │ position       │ uv           │ color * opacity        │
//! │ [f32; 3]       │ [f32; 2]     │ [f32; 4]               │
//! │ offset 0       │ offset 12    │ offset 20              │
//! │ location(0)    │ location(1)  │ location(2)            │
//! └────────────────┴──────────────┴────────────────────────┘
//! ```
//!
//! ## Why Vertices Are Pre-Projected
//!
//! Each vertex is already in normalized device coordinates when it enters
//! the queue, so the vertex shader is a pass-through and geometry from any
//! number of differently transformed draws can share one buffer and one draw
//! call. The price: once queued, a vertex cannot be re-projected, so any
//! change of texture, shader or uniforms has to flush first.

use bytemuck::{Pod, Zeroable};

use crate::math::{Color, Vec2};

/// Floats per vertex in the batch queue.
pub const STRIDE: usize = 9;

/// A vertex in local space, as produced by the draw primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Vec2,
    pub uv: Vec2,
    pub color: Color,
    pub opacity: f32,
}

impl Vertex {
    pub fn new(pos: Vec2, uv: Vec2, color: Color, opacity: f32) -> Self {
        Self { pos, uv, color, opacity }
    }
}

/// A projected vertex ready for upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<GpuVertex>() == STRIDE * 4);

impl GpuVertex {
    pub(crate) const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 20,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}
