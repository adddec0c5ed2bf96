//! Flickering point light with a movable occluder.

use glam::Vec2;

use super::{Scene, SceneId, ScreenSize, ShaderIds, FRAME_DT};
use crate::time::Time;
use crate::uniforms::{PixelLightingUniforms, UniformPayload};

pub struct PixelLightingScene {
    uniforms: PixelLightingUniforms,
    clock: Time,
}

impl PixelLightingScene {
    const SCREEN: ScreenSize = ScreenSize::new(200, 200);
    /// Screen pixels per logical pixel.
    pub const SCALE_FACTOR: f32 = 3.0;

    pub fn new() -> Self {
        Self {
            uniforms: PixelLightingUniforms::for_screen(Self::SCREEN.width as f32, Self::SCREEN.height as f32),
            clock: Time::new(),
        }
    }

    pub fn light_position(&self) -> Vec2 {
        self.uniforms.light_position()
    }

    pub fn obstacle_position(&self) -> Vec2 {
        self.uniforms.obstacle_position()
    }

    pub fn fps(&self) -> f32 {
        self.clock.fps()
    }
}

impl Default for PixelLightingScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for PixelLightingScene {
    fn id(&self) -> SceneId {
        SceneId::PixelLighting
    }

    fn shader_ids(&self) -> ShaderIds {
        SceneId::PixelLighting.shader_ids()
    }

    fn screen_size(&self) -> ScreenSize {
        Self::SCREEN
    }

    fn update(&mut self) {
        self.uniforms.time += FRAME_DT;
        self.clock.update();
    }

    fn handle_touch(&mut self, position: Vec2) {
        self.uniforms.obstacle_position = (position / Self::SCALE_FACTOR).to_array();
    }

    fn uniforms(&self) -> UniformPayload {
        UniformPayload::PixelLighting(self.uniforms)
    }

    fn debug_info(&self) -> Option<String> {
        let u = &self.uniforms;
        let light = self.light_position();
        Some(format!(
            "FPS: {} | Light: ({}, {}) | Time: {:.2} | Intensity: {:.2} | Range: {:.2} | Flicker: {:.2} | Screen: {}x{}",
            self.clock.fps() as i32,
            light.x as i32,
            light.y as i32,
            u.time,
            u.intensity,
            u.range,
            u.flicker_rate,
            Self::SCREEN.width,
            Self::SCREEN.height,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_moves_obstacle_in_logical_pixels() {
        let mut scene = PixelLightingScene::new();
        scene.handle_touch(Vec2::new(300.0, 150.0));
        assert_eq!(scene.obstacle_position(), Vec2::new(100.0, 50.0));
        // The light itself never follows the pointer.
        assert_eq!(scene.light_position(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_update_advances_time() {
        let mut scene = PixelLightingScene::new();
        for _ in 0..60 {
            scene.update();
        }
        let UniformPayload::PixelLighting(u) = scene.uniforms() else {
            panic!("lighting scene produced foreign uniforms");
        };
        assert!((u.time - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_debug_info_mentions_screen() {
        let scene = PixelLightingScene::new();
        let info = scene.debug_info().unwrap_or_default();
        assert!(info.contains("Screen: 200x200"));
        assert!(info.contains("Light: (100, 100)"));
    }
}
