//! Application configuration.
//!
//! A [`Config`] can be loaded from JSON, built in code with the `with_*`
//! setters, or both; command-line flags are applied on top by `main`.
//! Every field has a default, so an empty `{}` file is valid.
//!
//! ```json
//! {
//!   "initial_scene": "cellular-sand",
//!   "asset_dir": "assets",
//!   "pipeline_policy": "lazy",
//!   "sand": { "brush_radius": 8, "reset_policy": "retain" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::render_loop::PipelinePolicy;
use crate::scene::{SandSettings, SceneId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scene shown at startup.
    pub initial_scene: SceneId,
    /// Directory holding textures and audio files.
    pub asset_dir: PathBuf,
    /// Directory of `.wgsl` files to use instead of the built-in shader
    /// library. Reloaded from disk on request.
    pub shader_path: Option<PathBuf>,
    pub pipeline_policy: PipelinePolicy,
    /// Park exited scenes instead of dropping them.
    pub retain_scenes: bool,
    pub sand: SandSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_scene: SceneId::Parallax,
            asset_dir: PathBuf::from("assets"),
            shader_path: None,
            pipeline_policy: PipelinePolicy::Eager,
            retain_scenes: false,
            sand: SandSettings::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn with_initial_scene(mut self, scene: SceneId) -> Self {
        self.initial_scene = scene;
        self
    }

    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    pub fn with_shader_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shader_path = Some(path.into());
        self
    }

    pub fn with_pipeline_policy(mut self, policy: PipelinePolicy) -> Self {
        self.pipeline_policy = policy;
        self
    }

    pub fn with_retained_scenes(mut self, retain: bool) -> Self {
        self.retain_scenes = retain;
        self
    }

    pub fn with_sand(mut self, sand: SandSettings) -> Self {
        self.sand = sand;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridResetPolicy;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = Config::from_json(
            r#"{
                "initial_scene": "cellular-sand",
                "pipeline_policy": "lazy",
                "sand": { "brush_radius": 8, "reset_policy": "retain" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.initial_scene, SceneId::CellularSand);
        assert_eq!(config.pipeline_policy, PipelinePolicy::Lazy);
        assert_eq!(config.sand.brush_radius, 8);
        assert_eq!(config.sand.reset_policy, GridResetPolicy::Retain);
        assert_eq!(config.asset_dir, PathBuf::from("assets"));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(Config::from_json("{ nope"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Config::from_file("/no/such/config.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("hardway-config-{}.json", std::process::id()));
        let config = Config::default()
            .with_initial_scene(SceneId::PixelLighting)
            .with_retained_scenes(true);
        config.save(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
        std::fs::remove_file(&path).ok();
    }
}
