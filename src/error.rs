//! Error types for hardway.
//!
//! GPU initialization failures are fatal and surface from construction.
//! Pipeline and frame errors are recoverable: the render loop logs them and
//! skips the affected frame.

use std::fmt;
use std::path::PathBuf;

use crate::scene::SceneId;

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// The surface supports no texture format on the chosen adapter.
    NoSurfaceFormat,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The shader library failed to load, parse or validate.
    ShaderLibrary(ShaderError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::NoSurfaceFormat => write!(f, "The window surface reports no supported texture formats"),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::ShaderLibrary(e) => write!(f, "Invalid shader library: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            GpuError::ShaderLibrary(e) => Some(e),
            GpuError::NoAdapter | GpuError::NoSurfaceFormat => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

impl From<ShaderError> for GpuError {
    fn from(e: ShaderError) -> Self {
        GpuError::ShaderLibrary(e)
    }
}

/// Errors raised while building a WGSL shader library.
#[derive(Debug)]
pub enum ShaderError {
    /// A source file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// A module is not valid WGSL.
    Parse { module: String, message: String },
    /// A module parsed but failed naga validation.
    Validation { module: String, message: String },
    /// Two modules export an entry point with the same name.
    DuplicateEntryPoint { name: String, first: String, second: String },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Io { path, source } => write!(f, "Failed to read {}: {}", path.display(), source),
            ShaderError::Parse { module, message } => write!(f, "{} does not parse:\n{}", module, message),
            ShaderError::Validation { module, message } => write!(f, "{} failed validation: {}", module, message),
            ShaderError::DuplicateEntryPoint { name, first, second } => {
                write!(f, "Entry point '{}' is defined in both {} and {}", name, first, second)
            }
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Shader stage a pipeline function was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
            ShaderStage::Compute => write!(f, "compute"),
        }
    }
}

/// Errors raised while resolving a scene's pipeline.
///
/// All of these are recoverable. A scene whose pipeline fails to resolve is
/// simply not drawn until a later resolution succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The shader library has no function with this name for this stage.
    MissingFunction {
        scene: SceneId,
        stage: ShaderStage,
        function: String,
    },
    /// The backend rejected the pipeline.
    Compile { scene: SceneId, message: String },
}

impl PipelineError {
    /// Scene whose pipeline failed.
    pub fn scene(&self) -> SceneId {
        match self {
            PipelineError::MissingFunction { scene, .. } => *scene,
            PipelineError::Compile { scene, .. } => *scene,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingFunction {
                scene,
                stage,
                function,
            } => write!(
                f,
                "Scene '{}' requires {} function '{}' which is not in the shader library",
                scene.name(),
                stage,
                function
            ),
            PipelineError::Compile { scene, message } => {
                write!(f, "Failed to compile pipeline for scene '{}': {}", scene.name(), message)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Errors that drop a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// No drawable was available this frame.
    Surface(wgpu::SurfaceError),
    /// Reading the simulated grid back from the GPU failed.
    BufferMapping(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Surface(e) => write!(f, "Surface unavailable: {}", e),
            FrameError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Surface(e) => Some(e),
            FrameError::BufferMapping(_) => None,
        }
    }
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(e: wgpu::SurfaceError) -> Self {
        FrameError::Surface(e)
    }
}

/// Errors that can occur during texture loading.
#[derive(Debug)]
pub enum TextureError {
    /// Failed to decode the image.
    ImageLoad(image::ImageError),
    /// Failed to read file from disk.
    Io(std::io::Error),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::ImageLoad(e) => write!(f, "Failed to load image: {}", e),
            TextureError::Io(e) => write!(f, "Failed to read texture file: {}", e),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::ImageLoad(e) => Some(e),
            TextureError::Io(e) => Some(e),
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::ImageLoad(e)
    }
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        TextureError::Io(e)
    }
}

/// Errors that can occur while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the file.
    Io(std::io::Error),
    /// The file is not valid configuration JSON.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors that can occur when running the windowed application.
#[derive(Debug)]
pub enum AppError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Configuration could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            AppError::Window(e) => write!(f, "Failed to create window: {}", e),
            AppError::Gpu(e) => write!(f, "GPU error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::EventLoop(e) => Some(e),
            AppError::Window(e) => Some(e),
            AppError::Gpu(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for AppError {
    fn from(e: winit::error::EventLoopError) -> Self {
        AppError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for AppError {
    fn from(e: winit::error::OsError) -> Self {
        AppError::Window(e)
    }
}

impl From<GpuError> for AppError {
    fn from(e: GpuError) -> Self {
        AppError::Gpu(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}
