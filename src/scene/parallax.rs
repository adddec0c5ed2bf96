//! Three-layer scrolling background with ambient music.

use glam::Vec2;

use super::{Scene, SceneBindings, SceneId, ScreenSize, ShaderIds, FRAME_DT};
use crate::audio::{AudioDevice, AudioPlayer};
use crate::textures::{TextureHandle, TextureLoader};
use crate::uniforms::{ParallaxUniforms, UniformPayload};

pub struct ParallaxScene {
    uniforms: ParallaxUniforms,
    layers: [Option<TextureHandle>; 3],
    audio: Box<dyn AudioPlayer>,
}

impl ParallaxScene {
    /// Texture names, back to front.
    pub const LAYERS: [&'static str; 3] = [
        "cyberpunk_street_background",
        "cyberpunk_street_midground",
        "cyberpunk_street_foreground",
    ];
    pub const AMBIENT_TRACK: &'static str = "pixel-art-parallex-intro-sound";

    /// Scroll speed of each layer in texels per frame, back to front.
    const SCROLL_SPEEDS: [f32; 3] = [1.0, 2.0, 3.0];

    pub fn new(textures: &dyn TextureLoader, audio: &dyn AudioDevice) -> Self {
        let layers = Self::LAYERS.map(|name| textures.load(name));
        let missing = layers.iter().filter(|l| l.is_none()).count();
        if missing > 0 {
            log::warn!("Parallax scene is missing {} of {} texture layers", missing, layers.len());
        }
        Self {
            uniforms: ParallaxUniforms::default(),
            layers,
            audio: audio.create_player(),
        }
    }

    pub fn layers(&self) -> &[Option<TextureHandle>; 3] {
        &self.layers
    }
}

impl Scene for ParallaxScene {
    fn id(&self) -> SceneId {
        SceneId::Parallax
    }

    fn shader_ids(&self) -> ShaderIds {
        SceneId::Parallax.shader_ids()
    }

    fn screen_size(&self) -> ScreenSize {
        ScreenSize::new(1024, 850)
    }

    fn update(&mut self) {
        let [back, mid, fore] = Self::SCROLL_SPEEDS;
        self.uniforms.scrolling_back += back;
        self.uniforms.scrolling_mid += mid;
        self.uniforms.scrolling_fore += fore;
        self.uniforms.time += FRAME_DT;
    }

    fn handle_touch(&mut self, _position: Vec2) {}

    fn did_enter_scene(&mut self) {
        self.audio.play(Self::AMBIENT_TRACK, true);
    }

    fn will_exit_scene(&mut self) {
        self.audio.stop();
    }

    fn uniforms(&self) -> UniformPayload {
        UniformPayload::Parallax(self.uniforms)
    }

    fn bindings(&self) -> SceneBindings<'_> {
        SceneBindings::Textures(&self.layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textures::{MemoryTextureLoader, TextureData};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl AudioDevice for Recorder {
        fn create_player(&self) -> Box<dyn AudioPlayer> {
            Box::new(RecordingPlayer(self.calls.clone()))
        }
    }

    struct RecordingPlayer(Arc<Mutex<Vec<String>>>);

    impl AudioPlayer for RecordingPlayer {
        fn play(&mut self, name: &str, looping: bool) {
            self.0.lock().unwrap().push(format!("play {name} {looping}"));
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().push("stop".into());
        }
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn set_volume(&mut self, _volume: f32) {}
    }

    #[test]
    fn test_layers_scroll_at_different_speeds() {
        let mut scene = ParallaxScene::new(&MemoryTextureLoader::new(), &Recorder::default());
        for _ in 0..10 {
            scene.update();
        }
        let UniformPayload::Parallax(u) = scene.uniforms() else {
            panic!("parallax scene produced foreign uniforms");
        };
        assert_eq!((u.scrolling_back, u.scrolling_mid, u.scrolling_fore), (10.0, 20.0, 30.0));
        assert!((u.time - 10.0 * FRAME_DT).abs() < 1e-5);
    }

    #[test]
    fn test_lifecycle_drives_audio() {
        let device = Recorder::default();
        let mut scene = ParallaxScene::new(&MemoryTextureLoader::new(), &device);
        scene.did_enter_scene();
        scene.will_exit_scene();
        let calls = device.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![format!("play {} true", ParallaxScene::AMBIENT_TRACK), "stop".to_string()]);
    }

    #[test]
    fn test_missing_layers_stay_empty() {
        let loader = MemoryTextureLoader::new()
            .with_texture(ParallaxScene::LAYERS[1], TextureData::solid(1, 2, 3, 255));
        let scene = ParallaxScene::new(&loader, &Recorder::default());
        let present: Vec<bool> = scene.layers().iter().map(Option::is_some).collect();
        assert_eq!(present, vec![false, true, false]);
        assert!(matches!(scene.bindings(), SceneBindings::Textures(layers) if layers.len() == 3));
    }
}
