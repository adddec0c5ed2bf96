//! Per-frame driver.
//!
//! A [`RenderLoop`] owns the backend, the pipeline cache and the single
//! active scene. Each call to [`frame`](RenderLoop::frame) runs, in order:
//!
//! 1. `update()` on the active scene
//! 2. pointer events queued since the last frame
//! 3. pipeline resolution (compiling on first use)
//! 4. the compute pass, if the scene declares a kernel
//! 5. one draw with the scene's uniforms and bindings
//! 6. commit and present
//!
//! Pointer events are applied after `update()` so that sand painted into the
//! current buffer is simulated and drawn in the same frame instead of being
//! swapped away. If resolution fails the frame is committed empty and the
//! loop carries on.

use std::mem;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::backend::{ComputeDispatch, DrawCall, GpuBackend, QUAD_VERTICES};
use crate::error::{FrameError, PipelineError};
use crate::pipeline::{PipelineCache, PipelineEntry};
use crate::scene::Scene;
use crate::time::Time;

/// When the pipeline of an incoming scene is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelinePolicy {
    /// During the switch, before `did_enter_scene`.
    #[default]
    Eager,
    /// On the first frame that needs it.
    Lazy,
}

/// Pointer input waiting for the next frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved(Vec2),
    Released,
}

/// Why a frame drew nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Pipeline(PipelineError),
    Frame(FrameError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Drawn,
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, FrameOutcome::Drawn)
    }
}

/// Running totals since the loop was created.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub frames: u64,
    pub drawn: u64,
    pub skipped: u64,
    pub fps: f32,
}

pub struct RenderLoop<B: GpuBackend> {
    backend: B,
    cache: PipelineCache<B>,
    scene: Box<dyn Scene>,
    policy: PipelinePolicy,
    pending: Vec<PointerEvent>,
    viewport: Option<Vec2>,
    clock: Time,
    stats: FrameStats,
}

impl<B: GpuBackend> RenderLoop<B> {
    /// Start rendering `scene`. The scene is entered immediately.
    pub fn new(backend: B, scene: Box<dyn Scene>, policy: PipelinePolicy) -> Self {
        let mut render_loop = Self {
            backend,
            cache: PipelineCache::new(),
            scene,
            policy,
            pending: Vec::new(),
            viewport: None,
            clock: Time::new(),
            stats: FrameStats::default(),
        };
        render_loop.enter_active_scene();
        render_loop
    }

    /// Render one frame of the active scene.
    pub fn frame(&mut self) -> FrameOutcome {
        self.clock.update();
        self.stats.frames += 1;

        self.scene.update();
        for event in self.pending.drain(..) {
            match event {
                PointerEvent::Moved(position) => self.scene.handle_touch(position),
                PointerEvent::Released => self.scene.handle_touch_end(),
            }
        }

        let mut frame = self.backend.begin_frame();
        let entry = match self.resolve_active() {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("Skipping frame {}: {}", self.stats.frames, err);
                return self.skip(frame, SkipReason::Pipeline(err));
            }
        };

        if let Err(err) = self.encode(&mut frame, &entry) {
            log::warn!("Dropped frame {}: {}", self.stats.frames, err);
            return self.skip(frame, SkipReason::Frame(err));
        }

        self.backend.commit(frame);
        self.stats.drawn += 1;
        FrameOutcome::Drawn
    }

    fn encode(&mut self, frame: &mut B::Frame, entry: &PipelineEntry<B>) -> Result<(), FrameError> {
        let uniforms = self.scene.uniforms();
        debug_assert_eq!(uniforms.scene_id(), entry.scene, "uniforms bound to a foreign pipeline");

        if let Some(compute) = &entry.compute {
            if let Some(grid) = self.scene.grid_buffers() {
                let workgroups = ComputeDispatch::workgroups_for(grid.size);
                self.backend.dispatch_compute(
                    frame,
                    compute,
                    ComputeDispatch {
                        uniforms: uniforms.as_bytes(),
                        grid,
                        workgroups,
                    },
                )?;
            }
        }

        let bindings = self.scene.bindings();
        self.backend.draw(
            frame,
            &entry.render,
            DrawCall {
                scene: uniforms.scene_id(),
                uniforms: uniforms.as_bytes(),
                bindings,
                vertex_count: QUAD_VERTICES,
                instance_count: bindings.instance_count(),
            },
        )
    }

    fn skip(&mut self, frame: B::Frame, reason: SkipReason) -> FrameOutcome {
        self.backend.commit(frame);
        self.stats.skipped += 1;
        FrameOutcome::Skipped(reason)
    }

    fn resolve_active(&mut self) -> Result<Arc<PipelineEntry<B>>, PipelineError> {
        let format = self.backend.color_format();
        self.cache
            .resolve(&mut self.backend, self.scene.id(), &self.scene.shader_ids(), format)
    }

    fn enter_active_scene(&mut self) {
        if let Some(viewport) = self.viewport {
            self.scene.set_viewport_size(viewport);
        }
        if self.policy == PipelinePolicy::Eager {
            // The cache logs failures; frames report them as skips.
            let _ = self.resolve_active();
        }
        self.scene.did_enter_scene();
    }

    /// Replace the active scene, returning the outgoing one.
    ///
    /// Runs `will_exit_scene` on the outgoing scene and `did_enter_scene` on
    /// the incoming one exactly once each. Pointer events queued for the
    /// outgoing scene are dropped.
    pub fn switch_scene(&mut self, incoming: Box<dyn Scene>) -> Box<dyn Scene> {
        if !self.pending.is_empty() {
            log::debug!("Dropping {} pointer events queued for '{}'", self.pending.len(), self.scene.name());
            self.pending.clear();
        }
        self.scene.will_exit_scene();
        let outgoing = mem::replace(&mut self.scene, incoming);
        log::info!("Switched scene '{}' -> '{}'", outgoing.name(), self.scene.name());
        self.enter_active_scene();
        outgoing
    }

    /// Queue a pointer sample for the active scene.
    pub fn handle_touch(&mut self, position: Vec2) {
        self.pending.push(PointerEvent::Moved(position));
    }

    /// Queue the end of the current gesture.
    pub fn handle_touch_end(&mut self) {
        self.pending.push(PointerEvent::Released);
    }

    /// Propagate a new viewport to the backend and the active scene.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
        self.set_viewport(Vec2::new(width as f32, height as f32));
    }

    /// Change the size pointer positions are measured against, without
    /// touching the backend.
    pub fn set_viewport(&mut self, viewport: Vec2) {
        self.viewport = Some(viewport);
        self.scene.set_viewport_size(viewport);
    }

    /// Swap in a new shader library and retry every failed scene.
    pub fn reload_shaders(&mut self, library: B::Library) {
        self.backend.replace_library(library);
        self.cache.clear_failures();
        log::info!("Shader library reloaded");
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            fps: self.clock.fps(),
            ..self.stats
        }
    }

    pub fn active_scene(&self) -> &dyn Scene {
        self.scene.as_ref()
    }

    pub fn active_scene_mut(&mut self) -> &mut dyn Scene {
        self.scene.as_mut()
    }

    pub fn policy(&self) -> PipelinePolicy {
        self.policy
    }

    pub fn cache(&self) -> &PipelineCache<B> {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::scene::{CellularSandScene, PixelLightingScene, SandSettings, SceneId};

    fn sand_loop() -> RenderLoop<HeadlessBackend> {
        let scene = CellularSandScene::new(&SandSettings {
            seed: Some(5),
            ..SandSettings::default()
        });
        RenderLoop::new(HeadlessBackend::default(), Box::new(scene), PipelinePolicy::Eager)
    }

    #[test]
    fn test_eager_policy_compiles_on_construction() {
        let render_loop = sand_loop();
        assert!(render_loop.cache().contains(SceneId::CellularSand));
        assert_eq!(render_loop.backend().compute_compiles(), 1);
    }

    #[test]
    fn test_lazy_policy_compiles_on_first_frame() {
        let mut render_loop = RenderLoop::new(
            HeadlessBackend::default(),
            Box::new(PixelLightingScene::new()),
            PipelinePolicy::Lazy,
        );
        assert!(render_loop.cache().is_empty());
        assert!(render_loop.frame().is_drawn());
        assert_eq!(render_loop.cache().len(), 1);
    }

    #[test]
    fn test_grid_draw_is_instanced_per_cell() {
        let mut render_loop = sand_loop();
        render_loop.frame();
        let frames = render_loop.backend_mut().take_frames();
        let draw = &frames[0].draws[0];
        assert_eq!(draw.vertex_count, 6);
        assert_eq!(draw.instance_count, 100 * 100);
        assert_eq!(frames[0].dispatches[0].workgroups, [7, 7, 1]);
    }

    #[test]
    fn test_painted_sand_survives_the_frame() {
        let mut render_loop = sand_loop();
        render_loop.handle_touch(Vec2::new(100.0, 100.0));
        render_loop.frame();
        render_loop.frame();

        let info = render_loop.active_scene().debug_info().unwrap_or_default();
        assert!(info.starts_with("Particles: 69 (suspended 69"), "{info}");
    }

    #[test]
    fn test_released_sand_falls() {
        let mut render_loop = sand_loop();
        render_loop.handle_touch(Vec2::new(100.0, 20.0));
        render_loop.handle_touch_end();
        for _ in 0..300 {
            render_loop.frame();
        }
        let info = render_loop.active_scene().debug_info().unwrap_or_default();
        assert!(info.starts_with("Particles: 69 (suspended 0, falling 69)"), "{info}");
        assert_eq!(render_loop.stats().drawn, 300);
    }
}
