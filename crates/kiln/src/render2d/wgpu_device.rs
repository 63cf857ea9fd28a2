//! # WgpuDevice — Offscreen GPU Backend
//!
//! A [`RenderDevice`] that draws into two offscreen render targets with wgpu:
//!
//! ```text
//! ┌───────────────────────────────┐  ┌───────────────────────────────┐
//! │ color   Rgba8UnormSrgb        │  │ entity  R32Sint               │
//! │ alpha blended, cleared to the │  │ no blending, cleared to -1,   │
//! │ color passed to clear()       │  │ one entity id per pixel       │
//! └───────────────────────────────┘  └───────────────────────────────┘
//! ```
//!
//! Every pipeline writes both targets, so the entity target answers "which
//! entity is under this pixel" for picking.
//!
//! ## Pipelines
//!
//! | kind   | topology     | bind groups                                   |
//! |--------|--------------|-----------------------------------------------|
//! | quad   | TriangleList | 0: camera, 1: 16 textures + sampler (bnd. 16) |
//! | circle | TriangleList | 0: camera                                     |
//! | line   | LineList     | 0: camera                                     |
//!
//! Each draw records its own encoder and render pass (load, not clear) and
//! submits immediately. That keeps the device stateless between calls, which
//! is what the batch renderer expects: a flush is one upload and one draw.
//!
//! Line width is not configurable in wgpu; lines are always one pixel wide.

use std::collections::HashMap;

use thiserror::Error;
use wgpu::util::DeviceExt;

use super::Color;
use super::device::{BufferHandle, PrimitiveKind, RenderDevice, TextureHandle};
use super::vertex::{CameraUniform, CircleVertex, LineVertex, QuadVertex};
use crate::math::Mat4;

/// Texture units declared by the quad shader.
pub const MAX_TEXTURE_UNITS: u32 = 16;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const ENTITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Sint;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("render target size must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
}

struct DeviceTexture {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct Pipelines {
    quad: wgpu::RenderPipeline,
    circle: wgpu::RenderPipeline,
    line: wgpu::RenderPipeline,
}

/// Offscreen wgpu implementation of [`RenderDevice`].
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    color_target: wgpu::Texture,
    color_view: wgpu::TextureView,
    entity_target: wgpu::Texture,
    entity_view: wgpu::TextureView,
    pipelines: Pipelines,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Bound to units nobody has bound a texture to.
    placeholder: wgpu::TextureView,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    textures: HashMap<TextureHandle, DeviceTexture>,
    units: Vec<Option<TextureHandle>>,
    max_units: u32,
    next_buffer: u32,
    next_texture: u32,
    draws: u64,
}

impl WgpuDevice {
    /// Create a device with no window, rendering into `width` × `height`
    /// targets.
    pub fn new_headless(width: u32, height: u32) -> Result<Self, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::ZeroSize { width, height });
        }
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        log::info!("wgpu adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("kiln device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        }))?;
        let max_units = MAX_TEXTURE_UNITS.min(device.limits().max_sampled_textures_per_shader_stage);

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..MAX_TEXTURE_UNITS)
            .map(|unit| wgpu::BindGroupLayoutEntry {
                binding: unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            })
            .collect();
        texture_entries.push(wgpu::BindGroupLayoutEntry {
            binding: MAX_TEXTURE_UNITS,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture slots bind group layout"),
            entries: &texture_entries,
        });

        let pipelines = Pipelines {
            quad: create_pipeline(
                &device,
                "quad",
                include_str!("shaders/quad.wgsl"),
                &[&camera_layout, &texture_layout],
                QuadVertex::LAYOUT,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            circle: create_pipeline(
                &device,
                "circle",
                include_str!("shaders/circle.wgsl"),
                &[&camera_layout],
                CircleVertex::LAYOUT,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            line: create_pipeline(
                &device,
                "line",
                include_str!("shaders/line.wgsl"),
                &[&camera_layout],
                LineVertex::LAYOUT,
                wgpu::PrimitiveTopology::LineList,
            ),
        };

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera uniform buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera bind group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let placeholder = upload_rgba(&device, &queue, "placeholder 1x1", 1, 1, &[255; 4])
            .create_view(&wgpu::TextureViewDescriptor::default());

        let color_target = create_target(&device, "color target", width, height, COLOR_FORMAT);
        let entity_target = create_target(&device, "entity id target", width, height, ENTITY_FORMAT);
        let color_view = color_target.create_view(&wgpu::TextureViewDescriptor::default());
        let entity_view = entity_target.create_view(&wgpu::TextureViewDescriptor::default());

        let mut this = Self {
            device,
            queue,
            width,
            height,
            color_target,
            color_view,
            entity_target,
            entity_view,
            pipelines,
            camera_buffer,
            camera_bind_group,
            texture_layout,
            sampler,
            placeholder,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            units: vec![None; MAX_TEXTURE_UNITS as usize],
            max_units,
            next_buffer: 0,
            next_texture: 0,
            draws: 0,
        };
        this.clear(Color::TRANSPARENT);
        Ok(this)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The color target, for copying out or presenting.
    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color_target
    }

    /// The R32Sint entity id target.
    pub fn entity_texture(&self) -> &wgpu::Texture {
        &self.entity_target
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Draw calls submitted since creation.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    /// Clear the color target to `color` and the entity target to -1.
    pub fn clear(&mut self, color: Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[
                    Some(target_attachment(
                        &self.color_view,
                        wgpu::LoadOp::Clear(wgpu::Color {
                            r: color.r as f64,
                            g: color.g as f64,
                            b: color.b as f64,
                            a: color.a as f64,
                        }),
                    )),
                    Some(target_attachment(
                        &self.entity_view,
                        wgpu::LoadOp::Clear(wgpu::Color {
                            r: -1.0,
                            g: 0.0,
                            b: 0.0,
                            a: 0.0,
                        }),
                    )),
                ],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn buffer(&self, handle: BufferHandle) -> &wgpu::Buffer {
        match self.buffers.get(&handle) {
            Some(buffer) => buffer,
            None => panic!("buffer {handle:?} is unknown or was released"),
        }
    }

    fn texture_bind_group(&self) -> wgpu::BindGroup {
        let mut entries: Vec<wgpu::BindGroupEntry> = self
            .units
            .iter()
            .enumerate()
            .map(|(unit, bound)| {
                let view = bound
                    .and_then(|handle| self.textures.get(&handle))
                    .map_or(&self.placeholder, |t| &t.view);
                wgpu::BindGroupEntry {
                    binding: unit as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                }
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: MAX_TEXTURE_UNITS,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture slots bind group"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }

    fn submit_draw(&mut self, label: &str, record: impl FnOnce(&mut wgpu::RenderPass<'_>)) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[
                    Some(target_attachment(&self.color_view, wgpu::LoadOp::Load)),
                    Some(target_attachment(&self.entity_view, wgpu::LoadOp::Load)),
                ],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            record(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.draws += 1;
    }
}

impl RenderDevice for WgpuDevice {
    fn max_texture_units(&self) -> u32 {
        self.max_units
    }

    fn create_vertex_buffer(&mut self, kind: PrimitiveKind, size: u64) -> BufferHandle {
        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} vertex buffer", kind.name())),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert(handle, buffer);
        handle
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle {
        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad index buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.buffers.insert(handle, buffer);
        handle
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        self.queue.write_buffer(self.buffer(buffer), 0, data);
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(buffer) => buffer.destroy(),
            None => panic!("release of unknown buffer {buffer:?}"),
        }
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        let texture = upload_rgba(&self.device, &self.queue, "kiln texture", width, height, rgba);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(
            handle,
            DeviceTexture {
                view,
                width,
                height,
            },
        );
        handle
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        let Some(released) = self.textures.remove(&texture) else {
            panic!("release of unknown texture {texture:?}");
        };
        log::trace!(
            "released texture {texture:?} ({}x{})",
            released.width,
            released.height
        );
        for unit in &mut self.units {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        assert!(
            unit < self.max_units,
            "texture unit {unit} out of range (max {})",
            self.max_units
        );
        assert!(
            self.textures.contains_key(&texture),
            "bind of unknown texture {texture:?}"
        );
        self.units[unit as usize] = Some(texture);
    }

    fn set_view_projection(&mut self, view_proj: Mat4) {
        let uniform = CameraUniform {
            view_proj: view_proj.to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    fn draw_indexed(
        &mut self,
        kind: PrimitiveKind,
        vertices: BufferHandle,
        indices: BufferHandle,
        index_count: u32,
    ) {
        let vertex_buffer = self.buffer(vertices).clone();
        let index_buffer = self.buffer(indices).clone();
        let (pipeline, textures) = match kind {
            PrimitiveKind::Quad => (self.pipelines.quad.clone(), Some(self.texture_bind_group())),
            PrimitiveKind::Circle => (self.pipelines.circle.clone(), None),
            PrimitiveKind::Line => panic!("lines are drawn with draw_lines"),
        };
        self.submit_draw(kind.name(), |pass| {
            pass.set_pipeline(&pipeline);
            if let Some(textures) = &textures {
                pass.set_bind_group(1, textures, &[]);
            }
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..index_count, 0, 0..1);
        });
    }

    fn draw_lines(&mut self, vertices: BufferHandle, vertex_count: u32, width: f32) {
        if width != 1.0 {
            log::trace!("line width {width} requested; wgpu lines are one pixel wide");
        }
        let vertex_buffer = self.buffer(vertices).clone();
        let pipeline = self.pipelines.line.clone();
        self.submit_draw("line", |pass| {
            pass.set_pipeline(&pipeline);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..vertex_count, 0..1);
        });
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn target_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    }
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
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
    )
}

fn create_pipeline(
    device: &wgpu::Device,
    name: &str,
    source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    vertex_layout: wgpu::VertexBufferLayout<'static>,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{name} shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name} pipeline layout")),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{name} pipeline")),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: ENTITY_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
            ],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
