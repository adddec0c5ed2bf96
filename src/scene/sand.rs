//! Falling-sand cellular automaton.
//!
//! Pointer input paints *suspended* sand into the current buffer; releasing
//! the pointer commits every suspended cell to *falling* in one step. The
//! per-cell transition rule runs in the compute pass, outside this type.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{GridBuffers, Scene, SceneBindings, SceneId, ScreenSize, ShaderIds, FRAME_DT};
use crate::grid::{Brush, Cell, CellKind, Grid, GridResetPolicy, GridSize, ParticleCounts};
use crate::uniforms::{CellularSandUniforms, UniformPayload};

/// Tunables for [`CellularSandScene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandSettings {
    /// Brush radius in cells.
    pub brush_radius: i32,
    pub reset_policy: GridResetPolicy,
    /// Fixed seed for colour jitter. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SandSettings {
    fn default() -> Self {
        Self {
            brush_radius: 5,
            reset_policy: GridResetPolicy::default(),
            seed: None,
        }
    }
}

pub struct CellularSandScene {
    grid: Grid,
    brush: Brush,
    reset_policy: GridResetPolicy,
    uniforms: CellularSandUniforms,
    viewport: Vec2,
    rng: StdRng,
}

impl CellularSandScene {
    const SCREEN: ScreenSize = ScreenSize::new(200, 200);

    pub fn new(settings: &SandSettings) -> Self {
        let size = GridSize::default();
        let brush = Brush::new(settings.brush_radius);
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            grid: Grid::new(size),
            brush,
            reset_policy: settings.reset_policy,
            uniforms: CellularSandUniforms::new(size.width, size.height, brush.radius as f32),
            viewport: Self::SCREEN.as_vec2(),
            rng,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Cell at grid coordinates `(x, y)` in the current buffer.
    pub fn cell(&self, x: i64, y: i64) -> Option<Cell> {
        self.grid.cell(x, y).copied()
    }

    pub fn brush(&self) -> Brush {
        self.brush
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn is_mouse_down(&self) -> bool {
        self.uniforms.is_mouse_down > 0.0
    }

    pub fn frame_counter(&self) -> i32 {
        self.uniforms.frame_counter
    }

    /// Suspended, falling and total particle counts. Read-only.
    pub fn count_particles(&self) -> ParticleCounts {
        self.grid.count_particles()
    }

    /// Paint sand that starts falling immediately, bypassing suspension.
    /// Returns the number of cells spawned.
    pub fn spawn_falling_at(&mut self, position: Vec2) -> usize {
        self.paint(position, CellKind::Falling)
    }

    /// Turn the cell at `(x, y)` into a wall. Returns `false` off-grid.
    pub fn set_wall(&mut self, x: i64, y: i64) -> bool {
        let in_bounds = self.grid.size().index(x, y).is_some();
        if in_bounds {
            self.grid.place_wall_rect(x, y, x + 1, y + 1);
        }
        in_bounds
    }

    pub fn place_wall_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64) {
        self.grid.place_wall_rect(x0, y0, x1, y1);
    }

    fn paint(&mut self, position: Vec2, kind: CellKind) -> usize {
        let Some(center) = self.grid.size().map_position(position, self.viewport) else {
            log::debug!("Ignoring pointer sample {:?} for viewport {:?}", position, self.viewport);
            return 0;
        };
        self.grid.paint(center, &self.brush, kind, &mut self.rng)
    }
}

impl Scene for CellularSandScene {
    fn id(&self) -> SceneId {
        SceneId::CellularSand
    }

    fn shader_ids(&self) -> ShaderIds {
        SceneId::CellularSand.shader_ids()
    }

    fn screen_size(&self) -> ScreenSize {
        Self::SCREEN
    }

    fn update(&mut self) {
        self.uniforms.time += FRAME_DT;
        self.uniforms.frame_counter = self.uniforms.frame_counter.wrapping_add(1);
        self.grid.swap();
    }

    fn handle_touch(&mut self, position: Vec2) {
        self.uniforms.mouse_position = position.to_array();
        self.uniforms.is_mouse_down = 1.0;
        self.paint(position, CellKind::Suspended);
    }

    fn handle_touch_end(&mut self) {
        let converted = self.grid.commit_suspended();
        self.uniforms.is_mouse_down = 0.0;
        if converted > 0 {
            log::debug!("Released {} suspended cells", converted);
        }
    }

    fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport = size;
    }

    fn will_exit_scene(&mut self) {
        self.uniforms.is_mouse_down = 0.0;
        match self.reset_policy {
            GridResetPolicy::ResetOnExit => self.grid.reset(),
            GridResetPolicy::Retain => {
                // A gesture cut short by the switch still lands.
                self.grid.commit_suspended();
            }
        }
    }

    fn uniforms(&self) -> UniformPayload {
        UniformPayload::CellularSand(self.uniforms)
    }

    fn bindings(&self) -> SceneBindings<'_> {
        SceneBindings::Grid {
            cells: self.grid.current(),
            size: self.grid.size(),
        }
    }

    fn grid_buffers(&mut self) -> Option<GridBuffers<'_>> {
        let size = self.grid.size();
        let (current, next) = self.grid.buffers_mut();
        Some(GridBuffers { current, next, size })
    }

    fn debug_info(&self) -> Option<String> {
        let counts = self.count_particles();
        Some(format!(
            "Particles: {} (suspended {}, falling {}) | Frame: {}",
            counts.total, counts.suspended, counts.falling, self.uniforms.frame_counter
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> CellularSandScene {
        CellularSandScene::new(&SandSettings {
            seed: Some(11),
            ..SandSettings::default()
        })
    }

    #[test]
    fn test_touch_in_centre_paints_full_brush() {
        let mut scene = scene();
        scene.handle_touch(Vec2::new(100.0, 100.0));
        let counts = scene.count_particles();
        assert_eq!(counts.suspended, 69);
        assert_eq!(counts.falling, 0);
        assert!(scene.is_mouse_down());
    }

    #[test]
    fn test_repeated_touch_is_idempotent() {
        let mut scene = scene();
        scene.handle_touch(Vec2::new(40.0, 60.0));
        let first = scene.grid().current().to_vec();
        scene.handle_touch(Vec2::new(40.0, 60.0));
        assert_eq!(scene.grid().current(), &first[..]);
    }

    #[test]
    fn test_release_commits_every_suspended_cell() {
        let mut scene = scene();
        scene.handle_touch(Vec2::new(20.0, 20.0));
        scene.handle_touch(Vec2::new(150.0, 120.0));
        let before = scene.count_particles();

        scene.handle_touch_end();
        let after = scene.count_particles();

        assert_eq!(after.suspended, 0);
        assert_eq!(after.falling, before.falling + before.suspended);
        assert_eq!(scene.grid().current(), scene.grid().next());
        assert!(!scene.is_mouse_down());
    }

    #[test]
    fn test_touch_respects_viewport() {
        let mut scene = scene();
        scene.set_viewport_size(Vec2::new(400.0, 400.0));
        scene.handle_touch(Vec2::new(0.0, 0.0));
        // Brush centred on the corner cell: quarter disc of radius 5.
        assert_eq!(scene.count_particles().suspended, 26);
        assert!(scene.cell(0, 0).is_some_and(|c| c.kind == CellKind::Suspended));
    }

    #[test]
    fn test_far_away_touch_is_skipped() {
        let mut scene = scene();
        for position in [Vec2::new(1.0e30, 1.0e30), Vec2::new(-1.0e30, 100.0), Vec2::new(f32::MAX, 0.0)] {
            scene.handle_touch(position);
        }
        assert_eq!(scene.count_particles(), ParticleCounts::default());
    }

    #[test]
    fn test_oversized_brush_setting_is_clamped() {
        let mut scene = CellularSandScene::new(&SandSettings {
            brush_radius: 50_000,
            seed: Some(3),
            ..SandSettings::default()
        });
        scene.handle_touch(Vec2::new(100.0, 100.0));
        let size = scene.grid().size();
        assert_eq!(scene.count_particles().suspended, size.cell_count());
    }

    #[test]
    fn test_spawn_falling_skips_suspension() {
        let mut scene = scene();
        let spawned = scene.spawn_falling_at(Vec2::new(100.0, 100.0));
        assert_eq!(spawned, 69);
        assert_eq!(scene.count_particles().falling, 69);
        assert!(!scene.is_mouse_down());
    }

    #[test]
    fn test_walls_survive_touch() {
        let mut scene = scene();
        assert!(scene.set_wall(50, 50));
        assert!(!scene.set_wall(100, 0));
        scene.handle_touch(Vec2::new(100.0, 100.0));
        assert_eq!(scene.cell(50, 50).map(|c| c.kind), Some(CellKind::Wall));
        assert_eq!(scene.count_particles().suspended, 68);
    }

    #[test]
    fn test_update_swaps_and_counts_frames() {
        let mut scene = scene();
        scene.handle_touch(Vec2::new(100.0, 100.0));
        scene.update();
        assert_eq!(scene.frame_counter(), 1);
        // Nothing has written `next` yet, so the swap exposes an empty buffer.
        assert_eq!(scene.count_particles().total, 0);
        assert_eq!(scene.grid().next().iter().filter(|c| !c.is_empty()).count(), 69);
    }

    #[test]
    fn test_reset_policies_on_exit() {
        let mut reset = scene();
        reset.handle_touch(Vec2::new(100.0, 100.0));
        reset.will_exit_scene();
        assert_eq!(reset.count_particles().total, 0);
        assert!(reset.grid().next().iter().all(Cell::is_empty));

        let mut kept = CellularSandScene::new(&SandSettings {
            reset_policy: GridResetPolicy::Retain,
            seed: Some(3),
            ..SandSettings::default()
        });
        kept.handle_touch(Vec2::new(100.0, 100.0));
        kept.will_exit_scene();
        let counts = kept.count_particles();
        assert_eq!((counts.suspended, counts.falling), (0, 69));
    }

    #[test]
    fn test_seeded_scenes_paint_identical_colours() {
        let mut a = scene();
        let mut b = scene();
        a.handle_touch(Vec2::new(90.0, 90.0));
        b.handle_touch(Vec2::new(90.0, 90.0));
        assert_eq!(a.grid().current(), b.grid().current());
    }

    #[test]
    fn test_uniforms_track_pointer() {
        let mut scene = scene();
        scene.handle_touch(Vec2::new(12.0, 34.0));
        let UniformPayload::CellularSand(u) = scene.uniforms() else {
            panic!("sand scene produced foreign uniforms");
        };
        assert_eq!(u.mouse_position, [12.0, 34.0]);
        assert_eq!(u.is_mouse_down, 1.0);
        assert_eq!((u.grid_width, u.grid_height), (100, 100));
        assert_eq!(u.brush_size, 5.0);
    }
}
