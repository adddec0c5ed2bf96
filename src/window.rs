//! Windowed host.
//!
//! Opens a winit window, builds a [`WgpuBackend`] on it and drives a
//! [`RenderLoop`] from redraw requests. Pointer input goes to the active
//! scene; keys `1`-`3` select scenes through a [`SceneSwitcher`] and `R`
//! reloads the shader library.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::audio::AudioDevice;
use crate::config::Config;
use crate::error::{AppError, FrameError, GpuError};
use crate::gpu::WgpuBackend;
use crate::input::{InputAction, PointerInput};
use crate::render_loop::{FrameOutcome, PointerEvent, RenderLoop, SkipReason};
use crate::scene::{SceneContext, SceneId};
use crate::shader::WgslLibrary;
use crate::switcher::SceneSwitcher;
use crate::textures::ImageTextureLoader;

/// Frames between window title refreshes.
const TITLE_INTERVAL: u64 = 30;

/// Texture and audio collaborators reading from the configured asset directory.
pub fn scene_context(config: &Config) -> SceneContext {
    let textures = Arc::new(ImageTextureLoader::new(&config.asset_dir));
    SceneContext::new(textures, audio_device(config)).with_sand(config.sand.clone())
}

#[cfg(feature = "audio")]
fn audio_device(config: &Config) -> Arc<dyn AudioDevice> {
    Arc::new(crate::audio::RodioAudio::new(&config.asset_dir))
}

#[cfg(not(feature = "audio"))]
fn audio_device(_config: &Config) -> Arc<dyn AudioDevice> {
    Arc::new(crate::audio::SilentAudio)
}

/// The configured shader library, or the built-in one.
pub fn load_shaders(config: &Config) -> Result<WgslLibrary, GpuError> {
    let library = match &config.shader_path {
        Some(dir) => {
            log::info!("Loading shaders from {}", dir.display());
            WgslLibrary::from_dir(dir)?
        }
        None => WgslLibrary::builtin()?,
    };
    Ok(library)
}

/// Open a window and run until it is closed.
pub fn run(config: Config) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    config: Config,
    switcher: SceneSwitcher,
    window: Option<Arc<Window>>,
    render_loop: Option<RenderLoop<WgpuBackend>>,
    input: PointerInput,
    /// Fatal error raised inside the event loop.
    error: Option<AppError>,
}

impl App {
    fn new(config: Config) -> Self {
        let switcher = SceneSwitcher::new(scene_context(&config)).with_retained_scenes(config.retain_scenes);
        Self {
            config,
            switcher,
            window: None,
            render_loop: None,
            input: PointerInput::new(),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let scene = self.switcher.initial(self.config.initial_scene);
        let screen = scene.screen_size();
        let attrs = Window::default_attributes()
            .with_title(format!("hardway - {}", scene.name()))
            .with_inner_size(winit::dpi::LogicalSize::new(screen.width, screen.height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let library = load_shaders(&self.config)?;
        let backend = pollster::block_on(WgpuBackend::new(window.clone(), library))?;

        let mut render_loop = RenderLoop::new(backend, scene, self.config.pipeline_policy);
        let size = window.inner_size();
        render_loop.resize(size.width, size.height);

        self.render_loop = Some(render_loop);
        self.window = Some(window);
        Ok(())
    }

    fn apply(&mut self, event_loop: &ActiveEventLoop, action: InputAction) {
        let Some(render_loop) = &mut self.render_loop else {
            return;
        };
        match action {
            InputAction::Pointer(PointerEvent::Moved(position)) => render_loop.handle_touch(position),
            InputAction::Pointer(PointerEvent::Released) => render_loop.handle_touch_end(),
            InputAction::SelectScene(id) => {
                if self.switcher.select(render_loop, id) {
                    self.update_title(id);
                }
            }
            InputAction::ReloadShaders => match load_shaders(&self.config) {
                Ok(library) => render_loop.reload_shaders(library),
                Err(e) => log::error!("Shader reload failed, keeping current library: {}", e),
            },
            InputAction::Quit => event_loop.exit(),
        }
    }

    fn update_title(&self, id: SceneId) {
        let (Some(window), Some(render_loop)) = (&self.window, &self.render_loop) else {
            return;
        };
        let title = match render_loop.active_scene().debug_info() {
            Some(info) => format!("hardway - {} | {}", id.name(), info),
            None => format!("hardway - {} | {:.0} fps", id.name(), render_loop.stats().fps),
        };
        window.set_title(&title);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(render_loop) = &mut self.render_loop else {
            return;
        };
        if let FrameOutcome::Skipped(SkipReason::Frame(FrameError::Surface(wgpu::SurfaceError::OutOfMemory))) =
            render_loop.frame()
        {
            log::error!("Surface out of memory, exiting");
            event_loop.exit();
            return;
        }

        let stats = render_loop.stats();
        let id = render_loop.active_scene().id();
        if stats.frames % TITLE_INTERVAL == 0 {
            self.update_title(id);
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("{}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(render_loop) = &mut self.render_loop {
                    render_loop.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            other => {
                if let Some(action) = self.input.handle_event(&other) {
                    self.apply(event_loop, action);
                }
            }
        }
    }
}
