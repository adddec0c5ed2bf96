//! Scene abstraction.
//!
//! A scene is one self-contained real-time simulation: it advances its own
//! state once per frame, reacts to pointer input, and describes what the
//! render loop should bind and draw. Scenes never see the GPU backend.
//!
//! Three scenes ship with the crate:
//!
//! | Scene | Draw | Extra bindings |
//! |-------|------|----------------|
//! | [`ParallaxScene`] | full-screen quad | three texture layers |
//! | [`PixelLightingScene`] | full-screen quad | none |
//! | [`CellularSandScene`] | one quad per grid cell | grid buffer, compute kernel |

mod lighting;
mod parallax;
mod sand;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioDevice, SilentAudio};
use crate::grid::{Cell, GridSize};
use crate::textures::{MemoryTextureLoader, TextureHandle, TextureLoader};
use crate::uniforms::UniformPayload;

pub use lighting::PixelLightingScene;
pub use parallax::ParallaxScene;
pub use sand::{CellularSandScene, SandSettings};

/// Fixed timestep every scene advances by per frame.
pub const FRAME_DT: f32 = 1.0 / 60.0;

/// Identity of a scene kind. Keys the pipeline cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneId {
    Parallax,
    PixelLighting,
    CellularSand,
}

impl SceneId {
    pub const ALL: [SceneId; 3] = [SceneId::Parallax, SceneId::PixelLighting, SceneId::CellularSand];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            SceneId::Parallax => "Parallax",
            SceneId::PixelLighting => "PixelLighting",
            SceneId::CellularSand => "CellularSand",
        }
    }

    /// Name accepted on the command line and in config files.
    pub fn slug(&self) -> &'static str {
        match self {
            SceneId::Parallax => "parallax",
            SceneId::PixelLighting => "pixel-lighting",
            SceneId::CellularSand => "cellular-sand",
        }
    }

    /// Shader functions the scene kind is drawn with.
    pub fn shader_ids(&self) -> ShaderIds {
        match self {
            SceneId::Parallax => ShaderIds {
                vertex: "parallaxVertexShader",
                fragment: "parallaxFragmentShader",
                compute: None,
            },
            SceneId::PixelLighting => ShaderIds {
                vertex: "pixelLightingVertexShader",
                fragment: "pixelLightingFragmentShader",
                compute: None,
            },
            SceneId::CellularSand => ShaderIds {
                vertex: "cellularSandVertexShader",
                fragment: "cellularSandFragmentShader",
                compute: Some("cellularSandCompute"),
            },
        }
    }

    /// Resources the scene's pipeline expects besides its uniforms.
    pub fn binding_layout(&self) -> BindingLayout {
        match self {
            SceneId::Parallax => BindingLayout::Textured {
                layers: ParallaxScene::LAYERS.len() as u32,
            },
            SceneId::PixelLighting => BindingLayout::UniformOnly,
            SceneId::CellularSand => BindingLayout::GridInstanced,
        }
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SceneId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SceneId::ALL
            .into_iter()
            .find(|id| id.slug().eq_ignore_ascii_case(s) || id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = SceneId::ALL.iter().map(|id| id.slug()).collect();
                format!("unknown scene '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// Pipeline binding shape for a scene kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingLayout {
    /// Uniforms only.
    UniformOnly,
    /// Uniforms, `layers` textures and one sampler, all fragment-visible.
    Textured { layers: u32 },
    /// Uniforms and a read-only cell buffer indexed by instance.
    GridInstanced,
}

/// Shader function names. These strings are the contract with the shader
/// library and must match its entry points exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderIds {
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub compute: Option<&'static str>,
}

/// Logical screen size a scene was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Scene-specific resources to bind for the draw.
#[derive(Debug, Clone, Copy)]
pub enum SceneBindings<'a> {
    None,
    /// Texture layers in binding order. Missing layers are `None`.
    Textures(&'a [Option<TextureHandle>]),
    /// The grid buffer to draw, one instance per cell.
    Grid { cells: &'a [Cell], size: GridSize },
}

impl SceneBindings<'_> {
    /// Number of instances the draw needs.
    pub fn instance_count(&self) -> u32 {
        match self {
            SceneBindings::Grid { size, .. } => size.cell_count() as u32,
            SceneBindings::None | SceneBindings::Textures(_) => 1,
        }
    }
}

/// Simulation buffers handed to a compute dispatch.
#[derive(Debug)]
pub struct GridBuffers<'a> {
    pub current: &'a [Cell],
    pub next: &'a mut [Cell],
    pub size: GridSize,
}

/// Capability interface every simulation implements.
///
/// The render loop calls [`update`](Scene::update) exactly once per frame
/// and always from the thread that delivers input, so implementations need
/// no locking.
pub trait Scene {
    /// Identity used to key the pipeline cache.
    fn id(&self) -> SceneId;

    fn name(&self) -> &str {
        self.id().name()
    }

    fn shader_ids(&self) -> ShaderIds;

    fn screen_size(&self) -> ScreenSize;

    /// Advance the simulation by one frame.
    fn update(&mut self);

    /// Consume one pointer sample, in viewport coordinates.
    fn handle_touch(&mut self, position: Vec2);

    /// The pointer was released.
    fn handle_touch_end(&mut self) {}

    /// Size of the view pointer positions are measured against.
    fn set_viewport_size(&mut self, _size: Vec2) {}

    /// Called once the scene is active and its pipeline has been requested.
    fn did_enter_scene(&mut self) {}

    /// Called right before the scene stops being active.
    fn will_exit_scene(&mut self) {}

    fn uniforms(&self) -> UniformPayload;

    fn bindings(&self) -> SceneBindings<'_> {
        SceneBindings::None
    }

    /// Buffers for the compute pass, if the scene declares a kernel.
    fn grid_buffers(&mut self) -> Option<GridBuffers<'_>> {
        None
    }

    /// Human-readable status line, shown in the window title.
    fn debug_info(&self) -> Option<String> {
        None
    }
}

/// Collaborators handed to scenes at construction.
#[derive(Clone)]
pub struct SceneContext {
    pub textures: Arc<dyn TextureLoader>,
    pub audio: Arc<dyn AudioDevice>,
    pub sand: SandSettings,
}

impl SceneContext {
    pub fn new(textures: Arc<dyn TextureLoader>, audio: Arc<dyn AudioDevice>) -> Self {
        Self {
            textures,
            audio,
            sand: SandSettings::default(),
        }
    }

    pub fn with_sand(mut self, sand: SandSettings) -> Self {
        self.sand = sand;
        self
    }

    /// Construct a fresh scene of kind `id`.
    pub fn build(&self, id: SceneId) -> Box<dyn Scene> {
        match id {
            SceneId::Parallax => Box::new(ParallaxScene::new(self.textures.as_ref(), self.audio.as_ref())),
            SceneId::PixelLighting => Box::new(PixelLightingScene::new()),
            SceneId::CellularSand => Box::new(CellularSandScene::new(&self.sand)),
        }
    }
}

impl Default for SceneContext {
    /// No textures, no sound.
    fn default() -> Self {
        Self::new(Arc::new(MemoryTextureLoader::new()), Arc::new(SilentAudio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_id_parsing() {
        assert_eq!("parallax".parse::<SceneId>(), Ok(SceneId::Parallax));
        assert_eq!("Pixel-Lighting".parse::<SceneId>(), Ok(SceneId::PixelLighting));
        assert_eq!("CellularSand".parse::<SceneId>(), Ok(SceneId::CellularSand));
        assert!("sandbox".parse::<SceneId>().is_err());
    }

    #[test]
    fn test_built_scenes_report_their_id() {
        let ctx = SceneContext::default();
        for id in SceneId::ALL {
            let scene = ctx.build(id);
            assert_eq!(scene.id(), id);
            assert_eq!(scene.uniforms().scene_id(), id);
            assert_eq!(scene.name(), id.name());
        }
    }

    #[test]
    fn test_only_sand_declares_compute() {
        let ctx = SceneContext::default();
        for id in SceneId::ALL {
            let has_compute = ctx.build(id).shader_ids().compute.is_some();
            assert_eq!(has_compute, id == SceneId::CellularSand);
        }
    }
}
