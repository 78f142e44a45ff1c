// renderer/wgpu_backend/mod.rs
//
// `RenderDevice` over wgpu. Calls are recorded into a `FrameRecording` during
// the frame and encoded into render passes in `end_frame`. Every draw binds a
// snapshot of its program's uniform block through a dynamic offset.

mod context;
mod frame;

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::DeviceError;
use crate::renderer::device::{
    ClearFlags, DepthTargetId, GeometryId, ProgramDescriptor, ProgramId, ProgramTarget, Releaser,
    RenderDevice, ResourceId, TextureId, TextureSource, Viewport,
};
use crate::renderer::pipeline_builder::{PipelineBuilder, PipelineOutput};
use crate::renderer::uniforms::{UniformLayout, UniformLocation, UniformType, UniformValue};
use crate::renderer::vertex::Vertex;
use crate::settings::RenderSettings;

use context::{RenderContext, SurfaceDepth};
use frame::{FrameRecording, PassDraw, PassTarget, RecordedPass, TextureBindingKey, UniformArena};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.231,
    g: 0.269,
    b: 0.338,
    a: 1.0,
};
const SHADOW_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const INITIAL_UNIFORM_CAPACITY: u64 = 64 * 1024;

struct GpuProgram {
    label: &'static str,
    layout: UniformLayout,
    target: ProgramTarget,
    pipeline: wgpu::RenderPipeline,
    uniform_bind_group: wgpu::BindGroup,
    block: Vec<u8>,
    /// Texture unit read by each sampler slot.
    sampler_units: Vec<u32>,
}

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuDepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct Fallbacks {
    _color: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

pub struct WgpuDevice {
    context: RenderContext,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    lit_pipeline_layout: wgpu::PipelineLayout,
    depth_pipeline_layout: wgpu::PipelineLayout,
    color_sampler: wgpu::Sampler,
    shadow_sampler: wgpu::Sampler,
    fallbacks: Fallbacks,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    arena: UniformArena,
    texture_bind_groups: HashMap<TextureBindingKey, wgpu::BindGroup>,
    programs: HashMap<ProgramId, GpuProgram>,
    geometries: HashMap<GeometryId, GpuGeometry>,
    textures: HashMap<TextureId, GpuTexture>,
    depth_targets: HashMap<DepthTargetId, GpuDepthTarget>,
    units: HashMap<u32, TextureSource>,
    current_program: Option<ProgramId>,
    frame: FrameRecording,
    next_id: u32,
    releaser: Releaser,
}

impl WgpuDevice {
    pub fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, DeviceError> {
        let context = pollster::block_on(RenderContext::new(window, settings))?;
        let device = &context.device;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Block Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lit Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let lit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lit Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let depth_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Depth Pipeline Layout"),
                bind_group_layouts: &[&uniform_layout],
                push_constant_ranges: &[],
            });

        let color_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Diffuse Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let fallbacks = create_fallbacks(device, &context.queue);
        let uniform_buffer = create_uniform_buffer(device, INITIAL_UNIFORM_CAPACITY);
        let alignment = device.limits().min_uniform_buffer_offset_alignment;

        Ok(Self {
            uniform_layout,
            texture_layout,
            lit_pipeline_layout,
            depth_pipeline_layout,
            color_sampler,
            shadow_sampler,
            fallbacks,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            arena: UniformArena::new(alignment),
            texture_bind_groups: HashMap::new(),
            programs: HashMap::new(),
            geometries: HashMap::new(),
            textures: HashMap::new(),
            depth_targets: HashMap::new(),
            units: HashMap::new(),
            current_program: None,
            frame: FrameRecording::default(),
            next_id: 1,
            releaser: Releaser::default(),
            context,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.context.config.format
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn uniform_bind_group(&self, label: &str, size: u32) -> wgpu::BindGroup {
        self.context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniform_buffer,
                        offset: 0,
                        size: NonZeroU64::new(u64::from(size)),
                    }),
                }],
            })
    }

    /// Grows the uniform buffer to hold `required` bytes. Every program's bind
    /// group points at the old buffer afterwards and is rebuilt.
    fn ensure_uniform_capacity(&mut self, required: u64) {
        if required <= self.uniform_capacity {
            return;
        }
        let capacity = required.next_power_of_two();
        log::debug!(
            "Growing uniform buffer {} -> {} bytes",
            self.uniform_capacity,
            capacity
        );
        self.uniform_buffer = create_uniform_buffer(&self.context.device, capacity);
        self.uniform_capacity = capacity;

        let rebuilt: Vec<(ProgramId, wgpu::BindGroup)> = self
            .programs
            .iter()
            .map(|(id, program)| {
                (
                    *id,
                    self.uniform_bind_group(program.label, program.layout.size()),
                )
            })
            .collect();
        for (id, bind_group) in rebuilt {
            if let Some(program) = self.programs.get_mut(&id) {
                program.uniform_bind_group = bind_group;
            }
        }
    }

    fn sampled_key(&self, program: &GpuProgram) -> Option<TextureBindingKey> {
        if program.target != ProgramTarget::Surface {
            return None;
        }
        let source = |slot: usize| {
            program
                .sampler_units
                .get(slot)
                .and_then(|unit| self.units.get(unit))
                .copied()
                .unwrap_or_default()
        };
        let color = match source(0) {
            TextureSource::Texture(id) => Some(id),
            _ => None,
        };
        let depth = match source(1) {
            // A target cannot be sampled while it is being written.
            TextureSource::Depth(id) if self.frame.target() != PassTarget::Depth(id) => Some(id),
            _ => None,
        };
        Some(TextureBindingKey { color, depth })
    }

    fn prepare_texture_bind_groups(&mut self, frame: &FrameRecording) {
        for key in frame.texture_keys() {
            if self.texture_bind_groups.contains_key(&key) {
                continue;
            }
            let color_view = key
                .color
                .and_then(|id| self.textures.get(&id))
                .map_or(&self.fallbacks.color_view, |texture| &texture.view);
            let depth_view = key
                .depth
                .and_then(|id| self.depth_targets.get(&id))
                .map_or(&self.fallbacks.depth_view, |target| &target.view);

            let bind_group = self
                .context
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Lit Texture Bind Group"),
                    layout: &self.texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(color_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.color_sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(depth_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                        },
                    ],
                });
            self.texture_bind_groups.insert(key, bind_group);
        }
    }

    fn target_size(&self, target: PassTarget) -> Option<(u32, u32)> {
        match target {
            PassTarget::Surface => Some(self.drawable_size()),
            PassTarget::Depth(id) => self
                .depth_targets
                .get(&id)
                .map(|target| (target.width, target.height)),
        }
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        pass: &RecordedPass,
    ) {
        let Some((width, height)) = self.target_size(pass.target) else {
            log::warn!("Skipping pass for a released depth target");
            return;
        };

        let depth_load = if pass.clear.contains(ClearFlags::DEPTH) {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let (color_attachments, depth_view, label) = match pass.target {
            PassTarget::Surface => {
                let load = if pass.clear.contains(ClearFlags::COLOR) {
                    wgpu::LoadOp::Clear(CLEAR_COLOR)
                } else {
                    wgpu::LoadOp::Load
                };
                (
                    vec![Some(wgpu::RenderPassColorAttachment {
                        view: surface_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    &self.context.depth.view,
                    "MainPass",
                )
            }
            PassTarget::Depth(id) => match self.depth_targets.get(&id) {
                Some(target) => (Vec::new(), &target.view, "ShadowPass"),
                None => return,
            },
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &pass.draws {
            let Some(viewport) = clamp_viewport(draw.viewport, width, height) else {
                continue;
            };
            let (Some(program), Some(geometry)) = (
                self.programs.get(&draw.program),
                self.geometries.get(&draw.geometry),
            ) else {
                continue;
            };

            render_pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(0, &program.uniform_bind_group, &[draw.uniform_offset]);
            if let Some(bind_group) = draw
                .textures
                .and_then(|key| self.texture_bind_groups.get(&key))
            {
                render_pass.set_bind_group(1, bind_group, &[]);
            }
            render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
            render_pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(
                draw.first_index..draw.first_index + draw.index_count,
                0,
                0..1,
            );
        }
    }
}

impl RenderDevice for WgpuDevice {
    fn begin_frame(&mut self) {
        self.collect_garbage();
        self.frame = FrameRecording::default();
        self.arena.clear();
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        let frame = std::mem::take(&mut self.frame);

        self.ensure_uniform_capacity(self.arena.len());
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, self.arena.bytes());
        self.prepare_texture_bind_groups(&frame);

        let output = match self.context.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.context.reconfigure();
                return Ok(());
            }
            Err(err) => return Err(DeviceError::Surface(err.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });
        for pass in frame.passes() {
            self.encode_pass(&mut encoder, &view, pass);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn drawable_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    fn create_program(&mut self, desc: ProgramDescriptor) -> Result<ProgramId, DeviceError> {
        self.ensure_uniform_capacity(u64::from(desc.layout.size()));

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.as_str().into()),
        });
        let (pipeline_layout, output) = match desc.target {
            ProgramTarget::Surface => (
                &self.lit_pipeline_layout,
                PipelineOutput::Color {
                    format: self.context.config.format,
                    depth_format: SurfaceDepth::FORMAT,
                },
            ),
            ProgramTarget::DepthOnly => (
                &self.depth_pipeline_layout,
                PipelineOutput::DepthOnly {
                    depth_format: SHADOW_DEPTH_FORMAT,
                },
            ),
        };
        let pipeline = PipelineBuilder::new(device, pipeline_layout, &shader, output)
            .with_label(desc.label)
            .with_vertex_buffer(Vertex::layout())
            .with_culling(desc.cull_back_faces)
            .build();

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(DeviceError::Program {
                label: desc.label.to_string(),
                message: error.to_string(),
            });
        }

        let uniform_bind_group = self.uniform_bind_group(desc.label, desc.layout.size());
        let id = ProgramId(self.allocate_id());
        log::debug!("Created program '{}' ({:?})", desc.label, id);
        self.programs.insert(
            id,
            GpuProgram {
                label: desc.label,
                block: vec![0; desc.layout.size() as usize],
                sampler_units: (0..desc.layout.sampler_count()).collect(),
                layout: desc.layout,
                target: desc.target,
                pipeline,
                uniform_bind_group,
            },
        );
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.layout.locate(name)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        let Some(program) = self
            .current_program
            .and_then(|id| self.programs.get_mut(&id))
        else {
            return;
        };
        let Some(slot) = program.layout.slot(location) else {
            return;
        };

        if slot.ty == UniformType::Sampler {
            match (value.as_texture_unit(), program.sampler_units.get_mut(slot.offset as usize)) {
                (Some(unit), Some(current)) => *current = unit,
                _ => log::warn!("'{}' expects a texture unit", slot.name),
            }
            return;
        }

        let written = program
            .block
            .get_mut(slot.offset as usize..)
            .is_some_and(|dst| value.write_into(slot.ty, dst));
        if !written {
            log::warn!(
                "Uniform '{}' in '{}' rejected {:?}",
                slot.name,
                program.label,
                value
            );
        }
    }

    fn create_geometry(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<GeometryId, DeviceError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(DeviceError::EmptyGeometry);
        }
        let device = &self.context.device;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let id = GeometryId(self.allocate_id());
        self.geometries.insert(
            id,
            GpuGeometry {
                vertex_buffer,
                index_buffer,
            },
        );
        Ok(id)
    }

    fn draw_indexed(&mut self, geometry: GeometryId, index_count: u32, byte_offset: u64) {
        let Some(program_id) = self.current_program else {
            log::warn!("draw_indexed without a current program");
            return;
        };
        let Some(program) = self.programs.get(&program_id) else {
            return;
        };

        let target = self.frame.target();
        let target_matches = match program.target {
            ProgramTarget::Surface => target == PassTarget::Surface,
            ProgramTarget::DepthOnly => matches!(target, PassTarget::Depth(_)),
        };
        if !target_matches {
            log::debug!(
                "Skipping draw: program '{}' cannot render into {:?}",
                program.label,
                target
            );
            return;
        }

        let textures = self.sampled_key(program);
        let uniform_offset = self.arena.push(&program.block);
        let viewport = self.frame.viewport().unwrap_or_else(|| {
            let (width, height) = self.target_size(target).unwrap_or((1, 1));
            Viewport::full(width, height)
        });

        self.frame.push_draw(PassDraw {
            program: program_id,
            geometry,
            first_index: (byte_offset / 4) as u32,
            index_count,
            uniform_offset,
            textures,
            viewport,
        });
    }

    fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureId, DeviceError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(DeviceError::TextureData {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self
            .context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Diffuse Texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
        write_rgba8(&self.context.queue, &texture, pixels, size);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                view,
            },
        );
        Ok(id)
    }

    fn create_depth_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<DepthTargetId, DeviceError> {
        let max = self.context.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::DepthTarget {
                width,
                height,
                message: format!("size must be between 1 and {max}"),
            });
        }

        let texture = self
            .context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Shadow Map"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SHADOW_DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = DepthTargetId(self.allocate_id());
        self.depth_targets.insert(
            id,
            GpuDepthTarget {
                _texture: texture,
                view,
                width,
                height,
            },
        );
        Ok(id)
    }

    fn bind_target(&mut self, target: Option<DepthTargetId>) {
        self.frame.bind_target(PassTarget::from(target));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.frame.set_viewport(viewport);
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.frame.clear(flags);
    }

    fn bind_texture(&mut self, unit: u32, source: TextureSource) {
        self.units.insert(unit, source);
    }

    fn releaser(&self) -> Releaser {
        self.releaser.clone()
    }

    fn collect_garbage(&mut self) {
        for id in self.releaser.drain() {
            match id {
                ResourceId::Program(id) => {
                    self.programs.remove(&id);
                    if self.current_program == Some(id) {
                        self.current_program = None;
                    }
                }
                ResourceId::Geometry(id) => {
                    self.geometries.remove(&id);
                }
                ResourceId::Texture(id) => {
                    self.textures.remove(&id);
                    self.texture_bind_groups
                        .retain(|key, _| key.color != Some(id));
                }
                ResourceId::DepthTarget(id) => {
                    self.depth_targets.remove(&id);
                    self.texture_bind_groups
                        .retain(|key, _| key.depth != Some(id));
                }
            }
        }
    }
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Uniform Arena"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn write_rgba8(queue: &wgpu::Queue, texture: &wgpu::Texture, pixels: &[u8], size: wgpu::Extent3d) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );
}

/// 1x1 white colour and 1x1 far-plane depth, bound when a unit is empty.
fn create_fallbacks(device: &wgpu::Device, queue: &wgpu::Queue) -> Fallbacks {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Fallback White"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_rgba8(queue, &color, &[255, 255, 255, 255], size);

    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Fallback Depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SHADOW_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Fallback Depth Clear"),
    });
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Fallback Depth Clear"),
        color_attachments: &[],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &depth_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    queue.submit(std::iter::once(encoder.finish()));

    Fallbacks {
        color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
        _color: color,
        depth_view,
        _depth: depth,
    }
}

fn clamp_viewport(viewport: Viewport, width: u32, height: u32) -> Option<Viewport> {
    if viewport.x >= width || viewport.y >= height {
        return None;
    }
    let clamped = Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width.min(width - viewport.x),
        height: viewport.height.min(height - viewport.y),
    };
    (clamped.width > 0 && clamped.height > 0).then_some(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_clamped_to_the_target() {
        let clamped = clamp_viewport(Viewport::full(2048, 2048), 1024, 768).unwrap();
        assert_eq!(clamped, Viewport::full(1024, 768));

        let offset = Viewport {
            x: 1000,
            y: 0,
            width: 100,
            height: 10,
        };
        assert_eq!(clamp_viewport(offset, 1024, 768).unwrap().width, 24);
        assert!(clamp_viewport(offset, 512, 768).is_none());
        assert!(clamp_viewport(Viewport::full(0, 10), 64, 64).is_none());
    }
}
