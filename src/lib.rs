//! # hardway
//!
//! Three small real-time GPU scenes behind one render loop: a textured
//! parallax background, a pixel-art point light with a movable occluder, and
//! an interactive falling-sand grid simulated by a compute kernel.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hardway::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     let config = Config::default().with_initial_scene(SceneId::CellularSand);
//!     hardway::window::run(config)
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Scenes
//!
//! A [`Scene`] owns its simulation state, consumes pointer input and reports
//! the uniforms and bindings for its next draw. It never touches the GPU.
//! Scenes are identified by [`SceneId`], which also names the shader
//! functions each kind is drawn with.
//!
//! ### The render loop
//!
//! [`RenderLoop`] drives exactly one active scene per frame against a
//! [`GpuBackend`]. Pipelines are compiled once per scene kind and cached;
//! a scene whose pipeline cannot be built is skipped, not fatal.
//!
//! ```ignore
//! let mut render_loop = RenderLoop::new(
//!     HeadlessBackend::default(),
//!     SceneContext::default().build(SceneId::CellularSand),
//!     PipelinePolicy::Eager,
//! );
//! render_loop.handle_touch(Vec2::new(100.0, 100.0));
//! assert!(render_loop.frame().is_drawn());
//! ```
//!
//! ### Backends
//!
//! | Backend | Shaders | Compute |
//! |---------|---------|---------|
//! | [`WgpuBackend`](gpu::WgpuBackend) | WGSL library validated with naga | GPU kernel, synchronous readback |
//! | [`HeadlessBackend`] | named function table | CPU [`SimulationKernel`] |

pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod gpu;
pub mod grid;
pub mod headless;
pub mod input;
pub mod kernel;
pub mod pipeline;
pub mod render_loop;
pub mod scene;
pub mod shader;
pub mod switcher;
pub mod textures;
pub mod time;
pub mod uniforms;
pub mod window;

pub use backend::GpuBackend;
pub use config::Config;
pub use glam::Vec2;
pub use grid::{Cell, CellKind, Grid, GridResetPolicy, GridSize};
pub use headless::{HeadlessBackend, HeadlessLibrary};
pub use kernel::{FallKernel, SimulationKernel};
pub use render_loop::{FrameOutcome, PipelinePolicy, RenderLoop};
pub use scene::{Scene, SceneContext, SceneId};
pub use switcher::SceneSwitcher;
pub use uniforms::UniformPayload;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use hardway::prelude::*;
/// ```
pub mod prelude {
    pub use crate::audio::{AudioDevice, AudioPlayer, SilentAudio};
    pub use crate::backend::GpuBackend;
    pub use crate::config::Config;
    pub use crate::error::{AppError, FrameError, GpuError, PipelineError};
    pub use crate::grid::{Cell, CellKind, GridResetPolicy, GridSize};
    pub use crate::headless::{HeadlessBackend, HeadlessLibrary};
    pub use crate::render_loop::{FrameOutcome, PipelinePolicy, PointerEvent, RenderLoop, SkipReason};
    pub use crate::scene::{
        CellularSandScene, ParallaxScene, PixelLightingScene, SandSettings, Scene, SceneContext, SceneId,
    };
    pub use crate::switcher::SceneSwitcher;
    pub use crate::textures::{MemoryTextureLoader, TextureData, TextureLoader};
    pub use crate::time::Time;
    pub use crate::Vec2;
}
