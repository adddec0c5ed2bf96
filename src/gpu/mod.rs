//! wgpu implementation of [`GpuBackend`].
//!
//! Owns the surface, device and queue. Pipelines are compiled from a
//! [`WgslLibrary`] inside a validation error scope, so a pipeline wgpu
//! rejects becomes a [`PipelineError::Compile`] instead of an uncaptured
//! error.
//!
//! The grid compute pass is synchronous: `current` is uploaded, the kernel
//! runs, and `next` is copied to a staging buffer and read back before the
//! draw is encoded. CPU brush painting and GPU simulation therefore always
//! see the same grid.

mod resources;

use std::collections::HashMap;
use std::sync::Arc;

use winit::window::Window;

use crate::backend::{ComputeDispatch, ComputePipelineDesc, DrawCall, GpuBackend, RenderPipelineDesc};
use crate::error::{FrameError, GpuError, PipelineError, ShaderStage};
use crate::grid::GpuCell;
use crate::scene::{BindingLayout, SceneBindings, SceneId};
use crate::shader::WgslLibrary;

use resources::{GridStorage, TextureCache};

/// Largest uniform block any scene uploads.
const UNIFORM_CAPACITY: u64 = 256;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.05,
    a: 1.0,
};

pub struct WgpuRenderPipeline {
    scene: SceneId,
    layout: BindingLayout,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl WgpuRenderPipeline {
    pub fn scene(&self) -> SceneId {
        self.scene
    }
}

pub struct WgpuComputePipeline {
    scene: SceneId,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl WgpuComputePipeline {
    pub fn scene(&self) -> SceneId {
        self.scene
    }
}

/// Commands recorded for one frame.
pub struct WgpuFrame {
    encoder: wgpu::CommandEncoder,
    output: Option<wgpu::SurfaceTexture>,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    library: WgslLibrary,
    /// Compiled shader modules by library module index.
    modules: HashMap<usize, wgpu::ShaderModule>,
    uniform_buffer: wgpu::Buffer,
    textures: TextureCache,
    grid: Option<GridStorage>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>, library: WgslLibrary) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = pick_surface_format(&surface_caps.formats)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniforms"),
            size: UNIFORM_CAPACITY,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let textures = TextureCache::new(&device, &queue);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            library,
            modules: HashMap::new(),
            uniform_buffer,
            textures,
            grid: None,
        })
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Look up `name` for `stage` and return its compiled module.
    fn function(&mut self, scene: SceneId, stage: ShaderStage, name: &str) -> Result<wgpu::ShaderModule, PipelineError> {
        let entry = self
            .library
            .entry(name)
            .filter(|entry| entry.stage == stage)
            .ok_or_else(|| PipelineError::MissingFunction {
                scene,
                stage,
                function: name.to_string(),
            })?;

        let module = self.modules.entry(entry.module).or_insert_with(|| {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(self.library.label(entry.module)),
                source: wgpu::ShaderSource::Wgsl(self.library.source(entry.module).into()),
            })
        });
        Ok(module.clone())
    }

    /// Run `build` inside a validation error scope.
    fn scoped<T>(&self, scene: SceneId, build: impl FnOnce(&wgpu::Device) -> T) -> Result<T, PipelineError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Ok(value),
            Some(err) => Err(PipelineError::Compile {
                scene,
                message: err.to_string(),
            }),
        }
    }

    fn render_bind_group(&mut self, pipeline: &WgpuRenderPipeline, bindings: SceneBindings<'_>) -> wgpu::BindGroup {
        let uniform = wgpu::BindGroupEntry {
            binding: 0,
            resource: self.uniform_buffer.as_entire_binding(),
        };

        match (pipeline.layout, bindings) {
            (BindingLayout::Textured { layers }, SceneBindings::Textures(handles)) => {
                self.textures.upload(&self.device, &self.queue, handles);
                let views = self.textures.views(handles, layers as usize);
                let mut entries = vec![
                    uniform,
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(self.textures.sampler_for(handles)),
                    },
                ];
                entries.extend(views.into_iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
                    binding: 2 + i as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                }));
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Texture Bind Group"),
                    layout: &pipeline.bind_group_layout,
                    entries: &entries,
                })
            }
            (BindingLayout::GridInstanced, SceneBindings::Grid { cells, size }) => {
                let grid = GridStorage::ensure(&mut self.grid, &self.device, size);
                let gpu_cells: Vec<GpuCell> = cells.iter().copied().map(GpuCell::from).collect();
                self.queue.write_buffer(&grid.current, 0, bytemuck::cast_slice(&gpu_cells));
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Grid Bind Group"),
                    layout: &pipeline.bind_group_layout,
                    entries: &[
                        uniform,
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: grid.current.as_entire_binding(),
                        },
                    ],
                })
            }
            (layout, bindings) => {
                if layout != BindingLayout::UniformOnly {
                    log::warn!(
                        "Scene '{}' supplied {:?} for a {:?} pipeline; binding uniforms only",
                        pipeline.scene,
                        bindings,
                        layout
                    );
                }
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Uniform Bind Group"),
                    layout: &pipeline.bind_group_layout,
                    entries: &[uniform],
                })
            }
        }
    }
}

impl GpuBackend for WgpuBackend {
    type RenderPipeline = WgpuRenderPipeline;
    type ComputePipeline = WgpuComputePipeline;
    type Frame = WgpuFrame;
    type Library = WgslLibrary;

    fn color_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc<'_>) -> Result<WgpuRenderPipeline, PipelineError> {
        let vertex = self.function(desc.scene, ShaderStage::Vertex, desc.vertex)?;
        let fragment = self.function(desc.scene, ShaderStage::Fragment, desc.fragment)?;
        let layout = desc.layout;
        let label = desc.scene.name();

        self.scoped(desc.scene, |device| {
            let bind_group_layout = resources::render_bind_group_layout(device, layout);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some(desc.vertex),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some(desc.fragment),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: desc.color_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            WgpuRenderPipeline {
                scene: desc.scene,
                layout,
                pipeline,
                bind_group_layout,
            }
        })
    }

    fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> Result<WgpuComputePipeline, PipelineError> {
        let module = self.function(desc.scene, ShaderStage::Compute, desc.entry_point)?;
        let label = desc.entry_point;

        self.scoped(desc.scene, |device| {
            let bind_group_layout = resources::compute_bind_group_layout(device);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(desc.entry_point),
                compilation_options: Default::default(),
                cache: None,
            });
            WgpuComputePipeline {
                scene: desc.scene,
                pipeline,
                bind_group_layout,
            }
        })
    }

    fn begin_frame(&mut self) -> WgpuFrame {
        WgpuFrame {
            encoder: self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            }),
            output: None,
        }
    }

    fn dispatch_compute(
        &mut self,
        _frame: &mut WgpuFrame,
        pipeline: &WgpuComputePipeline,
        dispatch: ComputeDispatch<'_>,
    ) -> Result<(), FrameError> {
        let cells = dispatch.grid;
        let grid = GridStorage::ensure(&mut self.grid, &self.device, cells.size);

        self.queue.write_buffer(&self.uniform_buffer, 0, dispatch.uniforms);
        let current: Vec<GpuCell> = cells.current.iter().copied().map(GpuCell::from).collect();
        self.queue.write_buffer(&grid.current, 0, bytemuck::cast_slice(&current));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compute Bind Group"),
            layout: &pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: grid.current.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: grid.next.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Compute Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Grid Compute Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let [x, y, z] = dispatch.workgroups;
            pass.dispatch_workgroups(x, y, z);
        }
        encoder.copy_buffer_to_buffer(&grid.next, 0, &grid.staging, 0, grid.byte_len());
        self.queue.submit(std::iter::once(encoder.finish()));

        grid.read_next(&self.device, cells.next)
    }

    fn draw(&mut self, frame: &mut WgpuFrame, pipeline: &WgpuRenderPipeline, call: DrawCall<'_>) -> Result<(), FrameError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                if matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                    self.reconfigure();
                }
                return Err(err.into());
            }
        };

        self.queue.write_buffer(&self.uniform_buffer, 0, call.uniforms);
        let bind_group = self.render_bind_group(pipeline, call.bindings);
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        {
            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..call.vertex_count, 0..call.instance_count);
        }

        frame.output = Some(output);
        Ok(())
    }

    fn commit(&mut self, frame: WgpuFrame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        if let Some(output) = frame.output {
            output.present();
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.reconfigure();
        }
    }

    fn replace_library(&mut self, library: WgslLibrary) {
        self.library = library;
        self.modules.clear();
    }
}

/// Prefer an sRGB surface format, falling back to the first one offered.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Result<wgpu::TextureFormat, GpuError> {
    formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| formats.first())
        .copied()
        .ok_or(GpuError::NoSurfaceFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn test_pick_surface_format_prefers_srgb() {
        let formats = [TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb];
        assert_eq!(pick_surface_format(&formats).ok(), Some(TextureFormat::Bgra8UnormSrgb));
        assert_eq!(
            pick_surface_format(&[TextureFormat::Rgba16Float]).ok(),
            Some(TextureFormat::Rgba16Float)
        );
    }

    #[test]
    fn test_no_surface_formats_is_its_own_error() {
        let err = pick_surface_format(&[]).unwrap_err();
        assert!(matches!(err, GpuError::NoSurfaceFormat));
        assert!(err.to_string().contains("no supported texture formats"));
    }
}
