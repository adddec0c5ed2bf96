//! Scene selection through the switcher, including what each scene keeps
//! or releases when it stops being active.

use std::sync::{Arc, Mutex};

use glam::Vec2;
use hardway::audio::{AudioDevice, AudioPlayer};
use hardway::grid::GridResetPolicy;
use hardway::headless::HeadlessBackend;
use hardway::render_loop::{PipelinePolicy, RenderLoop};
use hardway::scene::{ParallaxScene, SandSettings, SceneContext, SceneId};
use hardway::switcher::SceneSwitcher;
use hardway::textures::{MemoryTextureLoader, TextureData};

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default, Clone)]
struct AudioLog(Arc<Mutex<Vec<String>>>);

impl AudioLog {
    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl AudioDevice for AudioLog {
    fn create_player(&self) -> Box<dyn AudioPlayer> {
        Box::new(self.clone())
    }
}

impl AudioPlayer for AudioLog {
    fn play(&mut self, name: &str, looping: bool) {
        self.0.lock().unwrap().push(format!("play {name} looping={looping}"));
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().push("stop".to_string());
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}
}

fn setup(
    context: SceneContext,
    retain: bool,
    initial: SceneId,
) -> (SceneSwitcher, RenderLoop<HeadlessBackend>) {
    let switcher = SceneSwitcher::new(context).with_retained_scenes(retain);
    let render_loop = RenderLoop::new(
        HeadlessBackend::default(),
        switcher.initial(initial),
        PipelinePolicy::Eager,
    );
    (switcher, render_loop)
}

fn sand_context(reset_policy: GridResetPolicy) -> SceneContext {
    SceneContext::default().with_sand(SandSettings {
        reset_policy,
        seed: Some(1),
        ..SandSettings::default()
    })
}

fn particle_line(render_loop: &RenderLoop<HeadlessBackend>) -> String {
    render_loop.active_scene().debug_info().unwrap_or_default()
}

// ============================================================================
// Parallax audio
// ============================================================================

#[test]
fn test_parallax_audio_follows_scene_lifecycle() {
    let audio = AudioLog::default();
    let context = SceneContext::new(Arc::new(MemoryTextureLoader::new()), Arc::new(audio.clone()));
    let (mut switcher, mut render_loop) = setup(context, false, SceneId::Parallax);

    let play = format!("play {} looping=true", ParallaxScene::AMBIENT_TRACK);
    assert_eq!(audio.calls(), vec![play.clone()]);

    render_loop.frame();
    switcher.select(&mut render_loop, SceneId::PixelLighting);
    assert_eq!(audio.calls(), vec![play.clone(), "stop".to_string()]);

    switcher.select(&mut render_loop, SceneId::Parallax);
    assert_eq!(audio.calls(), vec![play.clone(), "stop".to_string(), play]);
}

#[test]
fn test_parallax_draws_without_textures() {
    let (_switcher, mut render_loop) = setup(SceneContext::default(), false, SceneId::Parallax);
    assert!(render_loop.frame().is_drawn());
}

#[test]
fn test_parallax_with_all_layers() {
    let mut textures = MemoryTextureLoader::new();
    for name in ParallaxScene::LAYERS {
        textures = textures.with_texture(name, TextureData::solid(10, 20, 30, 255));
    }
    let context = SceneContext::new(Arc::new(textures), Arc::new(AudioLog::default()));
    let (_switcher, mut render_loop) = setup(context, false, SceneId::Parallax);

    assert!(render_loop.frame().is_drawn());
    let draw = &render_loop.backend().frames()[0].draws[0];
    assert_eq!((draw.vertex_count, draw.instance_count), (6, 1));
}

// ============================================================================
// Grid reset policies
// ============================================================================

#[test]
fn test_reset_on_exit_clears_parked_sand() {
    let (mut switcher, mut render_loop) = setup(sand_context(GridResetPolicy::ResetOnExit), true, SceneId::CellularSand);
    render_loop.handle_touch(Vec2::new(100.0, 100.0));
    render_loop.frame();
    assert!(particle_line(&render_loop).starts_with("Particles: 69 "));

    switcher.select(&mut render_loop, SceneId::PixelLighting);
    switcher.select(&mut render_loop, SceneId::CellularSand);
    render_loop.frame();
    assert!(particle_line(&render_loop).starts_with("Particles: 0 "), "{}", particle_line(&render_loop));
}

#[test]
fn test_retain_keeps_sand_and_lands_open_gesture() {
    let (mut switcher, mut render_loop) = setup(sand_context(GridResetPolicy::Retain), true, SceneId::CellularSand);
    render_loop.handle_touch(Vec2::new(100.0, 100.0));
    render_loop.frame();

    // Switching away mid-gesture commits the suspended sand.
    switcher.select(&mut render_loop, SceneId::PixelLighting);
    assert_eq!(switcher.parked(), 1);
    switcher.select(&mut render_loop, SceneId::CellularSand);
    assert_eq!(switcher.parked(), 1);

    let line = particle_line(&render_loop);
    assert!(line.starts_with("Particles: 69 (suspended 0, falling 69)"), "{line}");
}

#[test]
fn test_fresh_scenes_without_retention() {
    let (mut switcher, mut render_loop) = setup(sand_context(GridResetPolicy::Retain), false, SceneId::CellularSand);
    render_loop.handle_touch(Vec2::new(100.0, 100.0));
    render_loop.frame();

    switcher.select(&mut render_loop, SceneId::Parallax);
    switcher.select(&mut render_loop, SceneId::CellularSand);
    assert_eq!(switcher.parked(), 0);
    assert!(particle_line(&render_loop).starts_with("Particles: 0 "));
}

#[test]
fn test_selecting_active_scene_keeps_state() {
    let (mut switcher, mut render_loop) = setup(sand_context(GridResetPolicy::ResetOnExit), false, SceneId::CellularSand);
    render_loop.handle_touch(Vec2::new(100.0, 100.0));
    render_loop.frame();

    assert!(!switcher.select(&mut render_loop, SceneId::CellularSand));
    assert!(particle_line(&render_loop).starts_with("Particles: 69 "));
}
