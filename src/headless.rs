//! A [`GpuBackend`] without a GPU.
//!
//! The headless backend resolves shader functions against a name table and
//! runs compute "kernels" as CPU [`SimulationKernel`]s. Instead of pixels it
//! records what every frame would have drawn, which is what the integration
//! tests and `--headless` runs inspect.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::backend::{ComputeDispatch, ComputePipelineDesc, DrawCall, GpuBackend, RenderPipelineDesc};
use crate::error::{FrameError, PipelineError, ShaderStage};
use crate::kernel::{FallKernel, SimulationKernel};
use crate::scene::SceneId;

/// Shared kernel handle.
pub type SharedKernel = Arc<dyn SimulationKernel + Send + Sync>;

/// Named shader functions available to the headless backend.
#[derive(Clone, Default)]
pub struct HeadlessLibrary {
    vertex: HashSet<String>,
    fragment: HashSet<String>,
    kernels: HashMap<String, SharedKernel>,
}

impl HeadlessLibrary {
    /// An empty library. Every resolution against it fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every function the built-in scenes use, with [`FallKernel`] as the
    /// sand compute kernel.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for id in SceneId::ALL {
            let shaders = id.shader_ids();
            library = library.with_vertex(shaders.vertex).with_fragment(shaders.fragment);
            if let Some(compute) = shaders.compute {
                library = library.with_kernel(compute, Arc::new(FallKernel));
            }
        }
        library
    }

    pub fn with_vertex(mut self, name: &str) -> Self {
        self.vertex.insert(name.to_string());
        self
    }

    pub fn with_fragment(mut self, name: &str) -> Self {
        self.fragment.insert(name.to_string());
        self
    }

    pub fn with_kernel(mut self, name: &str, kernel: SharedKernel) -> Self {
        self.kernels.insert(name.to_string(), kernel);
        self
    }

    /// Drop `name` from every stage. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let v = self.vertex.remove(name);
        let f = self.fragment.remove(name);
        let k = self.kernels.remove(name).is_some();
        v || f || k
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.vertex.contains(name) || self.fragment.contains(name) || self.kernels.contains_key(name)
    }
}

/// A "compiled" render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessRenderPipeline {
    pub scene: SceneId,
    pub vertex: String,
    pub fragment: String,
    pub color_format: wgpu::TextureFormat,
}

/// A compute pipeline bound to a CPU kernel.
#[derive(Clone)]
pub struct HeadlessComputePipeline {
    pub scene: SceneId,
    pub entry_point: String,
    kernel: SharedKernel,
}

/// One recorded draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Scene whose uniforms were bound.
    pub scene: SceneId,
    /// Scene the bound pipeline was compiled for.
    pub pipeline_scene: SceneId,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub uniform_bytes: Vec<u8>,
}

/// One recorded compute dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    pub scene: SceneId,
    pub entry_point: String,
    pub workgroups: [u32; 3],
}

/// Everything submitted in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameRecord {
    pub dispatches: Vec<DispatchRecord>,
    pub draws: Vec<DrawRecord>,
    /// Whether a drawable was presented. Empty frames are committed but not
    /// presented.
    pub presented: bool,
}

pub struct HeadlessBackend {
    library: HeadlessLibrary,
    color_format: wgpu::TextureFormat,
    frames: Vec<FrameRecord>,
    render_compiles: usize,
    compute_compiles: usize,
    drawable_available: bool,
    size: (u32, u32),
}

impl HeadlessBackend {
    pub fn new(library: HeadlessLibrary) -> Self {
        Self {
            library,
            color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            frames: Vec::new(),
            render_compiles: 0,
            compute_compiles: 0,
            drawable_available: true,
            size: (0, 0),
        }
    }

    pub fn library(&self) -> &HeadlessLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut HeadlessLibrary {
        &mut self.library
    }

    /// Simulate the surface running out of drawables. While `false`, every
    /// draw fails with a timeout.
    pub fn set_drawable_available(&mut self, available: bool) {
        self.drawable_available = available;
    }

    /// Frames committed so far.
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    /// Drain the recorded frames.
    pub fn take_frames(&mut self) -> Vec<FrameRecord> {
        std::mem::take(&mut self.frames)
    }

    /// Number of render pipelines successfully compiled.
    pub fn render_compiles(&self) -> usize {
        self.render_compiles
    }

    pub fn compute_compiles(&self) -> usize {
        self.compute_compiles
    }

    /// Last size passed to [`resize`](GpuBackend::resize).
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    fn require(&self, scene: SceneId, stage: ShaderStage, name: &str) -> Result<(), PipelineError> {
        let present = match stage {
            ShaderStage::Vertex => self.library.vertex.contains(name),
            ShaderStage::Fragment => self.library.fragment.contains(name),
            ShaderStage::Compute => self.library.kernels.contains_key(name),
        };
        if present {
            Ok(())
        } else {
            Err(missing(scene, stage, name))
        }
    }
}

fn missing(scene: SceneId, stage: ShaderStage, name: &str) -> PipelineError {
    PipelineError::MissingFunction {
        scene,
        stage,
        function: name.to_string(),
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessLibrary::builtin())
    }
}

impl GpuBackend for HeadlessBackend {
    type RenderPipeline = HeadlessRenderPipeline;
    type ComputePipeline = HeadlessComputePipeline;
    type Frame = FrameRecord;
    type Library = HeadlessLibrary;

    fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<HeadlessRenderPipeline, PipelineError> {
        self.require(desc.scene, ShaderStage::Vertex, desc.vertex)?;
        self.require(desc.scene, ShaderStage::Fragment, desc.fragment)?;
        self.render_compiles += 1;
        Ok(HeadlessRenderPipeline {
            scene: desc.scene,
            vertex: desc.vertex.to_string(),
            fragment: desc.fragment.to_string(),
            color_format: desc.color_format,
        })
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc<'_>,
    ) -> Result<HeadlessComputePipeline, PipelineError> {
        let kernel = self
            .library
            .kernels
            .get(desc.entry_point)
            .cloned()
            .ok_or_else(|| missing(desc.scene, ShaderStage::Compute, desc.entry_point))?;
        self.compute_compiles += 1;
        Ok(HeadlessComputePipeline {
            scene: desc.scene,
            entry_point: desc.entry_point.to_string(),
            kernel,
        })
    }

    fn begin_frame(&mut self) -> FrameRecord {
        FrameRecord::default()
    }

    fn dispatch_compute(
        &mut self,
        frame: &mut FrameRecord,
        pipeline: &HeadlessComputePipeline,
        dispatch: ComputeDispatch<'_>,
    ) -> Result<(), FrameError> {
        let grid = dispatch.grid;
        pipeline.kernel.simulate(grid.current, grid.next, grid.size);
        frame.dispatches.push(DispatchRecord {
            scene: pipeline.scene,
            entry_point: pipeline.entry_point.clone(),
            workgroups: dispatch.workgroups,
        });
        Ok(())
    }

    fn draw(
        &mut self,
        frame: &mut FrameRecord,
        pipeline: &HeadlessRenderPipeline,
        call: DrawCall<'_>,
    ) -> Result<(), FrameError> {
        if !self.drawable_available {
            return Err(FrameError::Surface(wgpu::SurfaceError::Timeout));
        }
        frame.draws.push(DrawRecord {
            scene: call.scene,
            pipeline_scene: pipeline.scene,
            vertex_count: call.vertex_count,
            instance_count: call.instance_count,
            uniform_bytes: call.uniforms.to_vec(),
        });
        frame.presented = true;
        Ok(())
    }

    fn commit(&mut self, frame: FrameRecord) {
        self.frames.push(frame);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn replace_library(&mut self, library: HeadlessLibrary) {
        self.library = library;
    }
}
