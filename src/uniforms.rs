//! Per-scene uniform blocks.
//!
//! Each scene kind has one fixed `#[repr(C)]` struct whose byte layout
//! matches the `Uniforms` struct declared in that scene's WGSL file. Padding
//! fields stand in for WGSL's alignment rules (a `vec2<f32>` is 8-byte
//! aligned) and round each block up to a multiple of 16 bytes.
//!
//! The render loop never inspects a scene's concrete type. It receives a
//! [`UniformPayload`] and switches on the tag.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::scene::SceneId;

/// Scroll offsets for the three parallax layers.
///
/// ```wgsl
/// struct Uniforms {
///     scrolling_back: f32,
///     scrolling_mid: f32,
///     scrolling_fore: f32,
///     time: f32,
/// };
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParallaxUniforms {
    pub scrolling_back: f32,
    pub scrolling_mid: f32,
    pub scrolling_fore: f32,
    pub time: f32,
}

/// Point light with a single rectangular occluder.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PixelLightingUniforms {
    pub light_position: [f32; 2],
    pub time: f32,
    pub intensity: f32,
    pub range: f32,
    pub bounce_rate: f32,
    pub flicker_rate: f32,
    pub flicker_amplitude: f32,
    pub global_illumination: f32,
    pub _pad0: f32,
    pub obstacle_position: [f32; 2],
    pub obstacle_size: [f32; 2],
    pub _pad1: [f32; 2],
}

impl PixelLightingUniforms {
    /// Light in the centre of the screen, obstacle a quarter of the way in.
    pub fn for_screen(width: f32, height: f32) -> Self {
        Self {
            light_position: [width / 2.0, height / 2.0],
            time: 0.0,
            intensity: 0.4,
            range: 0.95,
            bounce_rate: 0.9,
            flicker_rate: 4.0,
            flicker_amplitude: 0.003,
            global_illumination: 0.03,
            _pad0: 0.0,
            obstacle_position: [width / 4.0, height / 4.0],
            obstacle_size: [10.0, 10.0],
            _pad1: [0.0; 2],
        }
    }

    pub fn light_position(&self) -> Vec2 {
        Vec2::from(self.light_position)
    }

    pub fn obstacle_position(&self) -> Vec2 {
        Vec2::from(self.obstacle_position)
    }
}

/// Simulation parameters shared by the sand render and compute shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CellularSandUniforms {
    pub grid_width: i32,
    pub grid_height: i32,
    pub time: f32,
    pub _pad0: f32,
    pub mouse_position: [f32; 2],
    /// 1.0 while the brush is down, 0.0 otherwise.
    pub is_mouse_down: f32,
    pub brush_size: f32,
    pub frame_counter: i32,
    pub _pad1: [i32; 3],
}

impl CellularSandUniforms {
    pub fn new(grid_width: usize, grid_height: usize, brush_size: f32) -> Self {
        Self {
            grid_width: grid_width as i32,
            grid_height: grid_height as i32,
            time: 0.0,
            _pad0: 0.0,
            mouse_position: [0.0; 2],
            is_mouse_down: 0.0,
            brush_size,
            frame_counter: 0,
            _pad1: [0; 3],
        }
    }
}

/// Uniform block of whichever scene is active, tagged by kind.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformPayload {
    Parallax(ParallaxUniforms),
    PixelLighting(PixelLightingUniforms),
    CellularSand(CellularSandUniforms),
}

impl UniformPayload {
    /// Scene kind this payload belongs to.
    pub fn scene_id(&self) -> SceneId {
        match self {
            UniformPayload::Parallax(_) => SceneId::Parallax,
            UniformPayload::PixelLighting(_) => SceneId::PixelLighting,
            UniformPayload::CellularSand(_) => SceneId::CellularSand,
        }
    }

    /// Raw bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformPayload::Parallax(u) => bytemuck::bytes_of(u),
            UniformPayload::PixelLighting(u) => bytemuck::bytes_of(u),
            UniformPayload::CellularSand(u) => bytemuck::bytes_of(u),
        }
    }
}
