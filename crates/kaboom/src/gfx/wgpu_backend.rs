//! # WgpuBackend — Replaying Batches on the GPU
//!
//! Draw calls arrive from the batcher one at a time during the frame, but a
//! wgpu render pass can only be recorded once the surface texture is
//! acquired. The backend therefore records each call into a frame list and
//! replays the list in `end_frame`:
//!
//! ```text
//! draw()          ─► append vertices / indices / uniform block, push Draw
//! clear_stencil() ─► push ClearStencil
//! end_frame()     ─► write_buffer(vertex, index, uniform) sub-ranges
//!                    for each run between ClearStencil markers:
//!                        begin pass (stencil cleared to 0)
//!                        set_pipeline(shader, stencil mode)
//!                        draw_indexed(range, base_vertex)
//!                    submit + present
//! ```
//!
//! Vertex, index and uniform buffers are allocated once and written with
//! `queue.write_buffer`; they only grow (to the next power of two) when a
//! frame needs more room than any previous frame.
//!
//! ## Stencil
//!
//! Every pass carries a `Stencil8` attachment. Each [`StencilMode`] maps to
//! its own pipeline variant:
//!
//! | mode       | compare    | on fail   | color written |
//! |------------|------------|-----------|---------------|
//! | `None`     | `Always`   | keep      | yes           |
//! | `Write`    | `Never`    | replace 1 | no            |
//! | `Equal`    | `Equal`    | keep      | where 1       |
//! | `NotEqual` | `NotEqual` | keep      | where not 1   |

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::backend::{DrawCall, RenderBackend, ShaderId, StencilMode, TextureId};
use super::batch::{MAX_BATCHED_INDICES, MAX_BATCHED_VERTS};
use super::gpu::GpuContext;
use super::uniform::UniformBlock;
use super::vertex::{GpuVertex, STRIDE};
use super::Viewport;
use crate::error::{KaboomError, Result};
use crate::math::Color;

const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;
const UNIFORM_BLOCK_SIZE: u64 = std::mem::size_of::<UniformBlock>() as u64;
const SHADER_TEMPLATE: &str = include_str!("shader.wgsl");

enum Command {
    Draw {
        texture: TextureId,
        shader: ShaderId,
        stencil: StencilMode,
        uniform_slot: u32,
        index_start: u32,
        index_count: u32,
        base_vertex: i32,
    },
    ClearStencil,
}

#[derive(Default)]
struct FrameData {
    vertices: Vec<GpuVertex>,
    indices: Vec<u16>,
    uniforms: Vec<UniformBlock>,
    commands: Vec<Command>,
    clear: Option<Color>,
}

pub struct WgpuBackend {
    gpu: GpuContext,
    texture_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    textures: Vec<wgpu::BindGroup>,
    shaders: Vec<wgpu::ShaderModule>,
    pipelines: HashMap<(ShaderId, StencilMode), wgpu::RenderPipeline>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    stencil_view: wgpu::TextureView,
    viewport: Option<Viewport>,
    frame: FrameData,
}

impl WgpuBackend {
    pub fn new(window: Arc<winit::window::Window>) -> Result<Self> {
        let gpu = GpuContext::new(window)?;
        let device = &gpu.device;

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kaboom texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kaboom uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_BLOCK_SIZE),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kaboom pipeline layout"),
            bind_group_layouts: &[&texture_layout, &uniform_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kaboom sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buffer = create_buffer(
            device,
            "kaboom vertex buffer",
            (MAX_BATCHED_VERTS / STRIDE * std::mem::size_of::<GpuVertex>()) as u64,
            wgpu::BufferUsages::VERTEX,
        );
        let index_buffer = create_buffer(
            device,
            "kaboom index buffer",
            (MAX_BATCHED_INDICES * 2) as u64,
            wgpu::BufferUsages::INDEX,
        );
        let uniform_buffer = create_buffer(
            device,
            "kaboom uniform buffer",
            UNIFORM_BLOCK_SIZE * 64,
            wgpu::BufferUsages::UNIFORM,
        );
        let uniform_bind_group = create_uniform_bind_group(device, &uniform_layout, &uniform_buffer);
        let (w, h) = gpu.surface_size();
        let stencil_view = create_stencil_view(device, w, h);

        Ok(Self {
            gpu,
            texture_layout,
            uniform_layout,
            pipeline_layout,
            sampler,
            textures: Vec::new(),
            shaders: Vec::new(),
            pipelines: HashMap::new(),
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            uniform_bind_group,
            stencil_view,
            viewport: None,
            frame: FrameData::default(),
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn build_pipeline(&self, shader: ShaderId, stencil: StencilMode) -> Result<wgpu::RenderPipeline> {
        let module = self
            .shaders
            .get(shader.0 as usize)
            .ok_or_else(|| KaboomError::Gpu(format!("unknown shader {}", shader.0)))?;

        let (compare, fail_op) = match stencil {
            StencilMode::None => (wgpu::CompareFunction::Always, wgpu::StencilOperation::Keep),
            StencilMode::Write => (wgpu::CompareFunction::Never, wgpu::StencilOperation::Replace),
            StencilMode::Equal => (wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep),
            StencilMode::NotEqual => (wgpu::CompareFunction::NotEqual, wgpu::StencilOperation::Keep),
        };
        let face = wgpu::StencilFaceState {
            compare,
            fail_op,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Keep,
        };

        Ok(self.gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("kaboom pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.gpu.surface_format(),
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState {
                    front: face,
                    back: face,
                    read_mask: 0xff,
                    write_mask: 0xff,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        }))
    }

    /// Grow the GPU buffers if this frame's data does not fit.
    fn ensure_capacity(&mut self, vertex_bytes: u64, index_bytes: u64, uniform_bytes: u64) {
        let device = &self.gpu.device;
        if vertex_bytes > self.vertex_buffer.size() {
            self.vertex_buffer = create_buffer(
                device,
                "kaboom vertex buffer",
                vertex_bytes.next_power_of_two(),
                wgpu::BufferUsages::VERTEX,
            );
        }
        if index_bytes > self.index_buffer.size() {
            self.index_buffer = create_buffer(
                device,
                "kaboom index buffer",
                index_bytes.next_power_of_two(),
                wgpu::BufferUsages::INDEX,
            );
        }
        if uniform_bytes > self.uniform_buffer.size() {
            self.uniform_buffer = create_buffer(
                device,
                "kaboom uniform buffer",
                uniform_bytes.next_power_of_two(),
                wgpu::BufferUsages::UNIFORM,
            );
            self.uniform_bind_group = create_uniform_bind_group(device, &self.uniform_layout, &self.uniform_buffer);
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId> {
        let device = &self.gpu.device;
        let texture = device.create_texture_with_data(
            &self.gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some("kaboom texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kaboom texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.textures.push(bind_group);
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn create_shader(&mut self, frag_src: &str) -> Result<ShaderId> {
        let source = SHADER_TEMPLATE.replace("{{user}}", frag_src);
        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kaboom shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(KaboomError::Gpu(format!("shader compilation failed: {err}")));
        }
        self.shaders.push(module);
        Ok(ShaderId(self.shaders.len() as u32 - 1))
    }

    fn begin_frame(&mut self, clear: Color) {
        self.frame.vertices.clear();
        self.frame.indices.clear();
        self.frame.uniforms.clear();
        self.frame.commands.clear();
        self.frame.clear = Some(clear);
    }

    fn draw(&mut self, call: DrawCall<'_>) {
        let frame = &mut self.frame;
        let base_vertex = frame.vertices.len() as i32;
        let index_start = frame.indices.len() as u32;
        frame.vertices.extend_from_slice(call.vertices);
        frame.indices.extend_from_slice(call.indices);
        frame.uniforms.push(call.uniform.pack());
        frame.commands.push(Command::Draw {
            texture: call.texture,
            shader: call.shader,
            stencil: call.stencil,
            uniform_slot: frame.uniforms.len() as u32 - 1,
            index_start,
            index_count: call.indices.len() as u32,
            base_vertex,
        });
    }

    fn clear_stencil(&mut self) {
        self.frame.commands.push(Command::ClearStencil);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        let (w, h) = self.gpu.surface_size();
        self.stencil_view = create_stencil_view(&self.gpu.device, w, h);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn end_frame(&mut self) -> Result<()> {
        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(KaboomError::Gpu("out of GPU memory".into()));
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
                return Ok(());
            }
        };

        // Pipelines are created lazily, before any pass borrows them.
        let needed: Vec<(ShaderId, StencilMode)> = self
            .frame
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw { shader, stencil, .. } => Some((*shader, *stencil)),
                Command::ClearStencil => None,
            })
            .collect();
        for key in needed {
            if !self.pipelines.contains_key(&key) {
                let pipeline = self.build_pipeline(key.0, key.1)?;
                self.pipelines.insert(key, pipeline);
            }
        }

        if self.frame.indices.len() % 2 == 1 {
            // write_buffer sizes must be 4-byte aligned
            self.frame.indices.push(0);
        }
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.frame.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.frame.indices);
        let uniform_bytes: &[u8] = bytemuck::cast_slice(&self.frame.uniforms);
        let (vb, ib, ub) = (vertex_bytes.len() as u64, index_bytes.len() as u64, uniform_bytes.len() as u64);
        self.ensure_capacity(vb, ib, ub);

        let queue = &self.gpu.queue;
        if vb > 0 {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.frame.vertices));
        }
        if ib > 0 {
            queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&self.frame.indices));
        }
        if ub > 0 {
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&self.frame.uniforms));
        }

        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("kaboom frame encoder"),
        });

        let clear = self.frame.clear.unwrap_or(Color::BLACK);
        let runs: Vec<&[Command]> = self
            .frame
            .commands
            .split(|c| matches!(c, Command::ClearStencil))
            .collect();
        for (i, run) in runs.iter().enumerate() {
            let load = if i == 0 {
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: clear.r as f64,
                    g: clear.g as f64,
                    b: clear.b as f64,
                    a: clear.a as f64,
                })
            } else {
                wgpu::LoadOp::Load
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kaboom pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.stencil_view,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_stencil_reference(1);
            if let Some(vp) = self.viewport {
                pass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);
            }
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            for command in run.iter() {
                let Command::Draw {
                    texture,
                    shader,
                    stencil,
                    uniform_slot,
                    index_start,
                    index_count,
                    base_vertex,
                } = command
                else {
                    continue;
                };
                let (Some(pipeline), Some(tex)) =
                    (self.pipelines.get(&(*shader, *stencil)), self.textures.get(texture.0 as usize))
                else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, tex, &[]);
                pass.set_bind_group(
                    1,
                    &self.uniform_bind_group,
                    &[(*uniform_slot as u64 * UNIFORM_BLOCK_SIZE) as u32],
                );
                pass.draw_indexed(*index_start..*index_start + *index_count, *base_vertex, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_buffer(device: &wgpu::Device, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("kaboom uniform bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(UNIFORM_BLOCK_SIZE),
            }),
        }],
    })
}

fn create_stencil_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("kaboom stencil"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STENCIL_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
