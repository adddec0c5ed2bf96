//! The seam between the render loop and a GPU.
//!
//! [`GpuBackend`] is the only thing the render loop knows about the device.
//! It compiles pipelines from shader function names, runs compute dispatches
//! over the grid and encodes draws. Two implementations exist:
//!
//! - [`WgpuBackend`](crate::gpu::WgpuBackend) renders to a window surface.
//! - [`HeadlessBackend`](crate::headless::HeadlessBackend) runs kernels on the
//!   CPU and records every draw, for tests and batch runs.

use crate::error::{FrameError, PipelineError};
use crate::grid::GridSize;
use crate::scene::{BindingLayout, GridBuffers, SceneBindings, SceneId};

/// Threads per workgroup along each axis of a grid dispatch.
pub const WORKGROUP_SIZE: u32 = 16;

/// Vertices per full-screen quad or grid cell quad.
pub const QUAD_VERTICES: u32 = 6;

/// Everything needed to compile one render pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RenderPipelineDesc<'a> {
    pub scene: SceneId,
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub color_format: wgpu::TextureFormat,
    pub layout: BindingLayout,
}

/// Everything needed to compile one compute pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDesc<'a> {
    pub scene: SceneId,
    pub entry_point: &'a str,
}

/// One compute pass over the grid, reading `grid.current` and writing
/// `grid.next`.
#[derive(Debug)]
pub struct ComputeDispatch<'a> {
    pub uniforms: &'a [u8],
    pub grid: GridBuffers<'a>,
    pub workgroups: [u32; 3],
}

impl ComputeDispatch<'_> {
    /// Workgroup counts covering every cell of `size` once.
    pub fn workgroups_for(size: GridSize) -> [u32; 3] {
        [
            (size.width as u32).div_ceil(WORKGROUP_SIZE),
            (size.height as u32).div_ceil(WORKGROUP_SIZE),
            1,
        ]
    }
}

/// One draw of the active scene.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub scene: SceneId,
    pub uniforms: &'a [u8],
    pub bindings: SceneBindings<'a>,
    pub vertex_count: u32,
    pub instance_count: u32,
}

/// Device capability required by the pipeline cache and the render loop.
///
/// A frame is opened with [`begin_frame`](GpuBackend::begin_frame) and must
/// always be closed with [`commit`](GpuBackend::commit), even when nothing
/// was drawn into it.
pub trait GpuBackend {
    type RenderPipeline;
    type ComputePipeline;
    /// Per-frame command recording state.
    type Frame;
    /// Source of shader functions pipelines are compiled from.
    type Library;

    /// Format of the presentation target.
    fn color_format(&self) -> wgpu::TextureFormat;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<Self::RenderPipeline, PipelineError>;

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc<'_>,
    ) -> Result<Self::ComputePipeline, PipelineError>;

    fn begin_frame(&mut self) -> Self::Frame;

    /// Run the kernel and leave its output in `dispatch.grid.next`.
    fn dispatch_compute(
        &mut self,
        frame: &mut Self::Frame,
        pipeline: &Self::ComputePipeline,
        dispatch: ComputeDispatch<'_>,
    ) -> Result<(), FrameError>;

    fn draw(
        &mut self,
        frame: &mut Self::Frame,
        pipeline: &Self::RenderPipeline,
        call: DrawCall<'_>,
    ) -> Result<(), FrameError>;

    /// Submit the frame and present whatever was drawn.
    fn commit(&mut self, frame: Self::Frame);

    /// The presentation target changed size.
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Compile future pipelines from `library`. Pipelines already built are
    /// kept.
    fn replace_library(&mut self, library: Self::Library);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroups_cover_grid() {
        assert_eq!(ComputeDispatch::workgroups_for(GridSize::new(100, 100)), [7, 7, 1]);
        assert_eq!(ComputeDispatch::workgroups_for(GridSize::new(16, 32)), [1, 2, 1]);
        assert_eq!(ComputeDispatch::workgroups_for(GridSize::new(17, 1)), [2, 1, 1]);
    }
}
