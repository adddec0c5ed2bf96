//! Double-buffered cell grid for the falling-sand scene.
//!
//! The grid owns two flat buffers of [`Cell`]s, `current` and `next`. The
//! simulation kernel reads `current` and writes `next`; once per frame the two
//! swap roles. Brush painting only ever touches `current`.
//!
//! Every coordinate lookup goes through [`GridSize::index`], which returns
//! `None` for anything outside `0..width` × `0..height`. Out-of-range brush
//! offsets are skipped, never clamped.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Width of the sand grid in cells.
pub const GRID_WIDTH: usize = 100;
/// Height of the sand grid in cells.
pub const GRID_HEIGHT: usize = 100;

/// State of a single grid cell.
///
/// The discriminants are the codes the shaders see, so they must not change.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellKind {
    #[default]
    Empty = 0,
    /// Released sand, moved by the simulation kernel.
    Falling = 1,
    /// Static obstacle. Only placed by setup code.
    Wall = 2,
    /// Sand held in place while the brush is down.
    Suspended = 3,
}

impl CellKind {
    /// Shader-side code for this kind.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Parse a shader-side code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(CellKind::Empty),
            1 => Some(CellKind::Falling),
            2 => Some(CellKind::Wall),
            3 => Some(CellKind::Suspended),
            _ => None,
        }
    }
}

/// One cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    pub kind: CellKind,
    /// Linear RGBA colour.
    pub color: [f32; 4],
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        kind: CellKind::Empty,
        color: [0.0; 4],
    };

    pub fn new(kind: CellKind, color: [f32; 4]) -> Self {
        Self { kind, color }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kind == CellKind::Empty
    }
}

/// GPU layout of a [`Cell`].
///
/// Matches `struct Cell { kind: u32, color: vec4<f32> }` in WGSL, where the
/// vec4 is 16-byte aligned.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GpuCell {
    pub kind: u32,
    pub _pad: [u32; 3],
    pub color: [f32; 4],
}

impl From<Cell> for GpuCell {
    fn from(cell: Cell) -> Self {
        Self {
            kind: cell.kind.code(),
            _pad: [0; 3],
            color: cell.color,
        }
    }
}

impl GpuCell {
    /// Convert back to a CPU cell. Unknown codes read as empty.
    pub fn to_cell(self) -> Cell {
        match CellKind::from_code(self.kind) {
            Some(kind) => Cell::new(kind, self.color),
            None => Cell::EMPTY,
        }
    }
}

/// Grid dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
}

impl GridSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Flat index of `(x, y)`, or `None` if the coordinate is off the grid.
    #[inline]
    pub fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Map a position in viewport space onto grid coordinates.
    ///
    /// Uses `floor(position / viewport * size)`. Returns `None` for a
    /// degenerate viewport or a non-finite position. The result may still lie
    /// outside the grid, and saturates for positions beyond the `i64` range;
    /// callers bounds-check each cell they touch.
    pub fn map_position(&self, position: Vec2, viewport: Vec2) -> Option<(i64, i64)> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 || !position.is_finite() {
            return None;
        }
        let gx = (position.x / viewport.x * self.width as f32).floor();
        let gy = (position.y / viewport.y * self.height as f32).floor();
        Some((gx as i64, gy as i64))
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(GRID_WIDTH, GRID_HEIGHT)
    }
}

/// Circular paint region, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brush {
    pub radius: i32,
}

impl Brush {
    /// Largest radius a brush can have. Larger values are clamped.
    pub const MAX_RADIUS: i32 = 1 << 12;

    pub fn new(radius: i32) -> Self {
        Self {
            radius: radius.clamp(0, Self::MAX_RADIUS),
        }
    }

    /// Whether the offset `(dx, dy)` from the centre lies inside the disc,
    /// i.e. `dx² + dy² ≤ radius²`.
    #[inline]
    pub fn covers(&self, dx: i64, dy: i64) -> bool {
        let r = self.radius.max(0) as u64;
        let (dx, dy) = (dx.unsigned_abs(), dy.unsigned_abs());
        dx <= r && dy <= r && dx * dx + dy * dy <= r * r
    }
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Result of a full-grid particle scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParticleCounts {
    pub suspended: usize,
    pub falling: usize,
    pub total: usize,
}

/// What happens to the grid when its scene is exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GridResetPolicy {
    /// Clear both buffers on every exit.
    #[default]
    ResetOnExit,
    /// Keep the grid as it was; buffers are allocated once per scene.
    Retain,
}

/// Jittered sand colour.
pub fn sand_color<R: Rng + ?Sized>(rng: &mut R) -> [f32; 4] {
    [
        rng.gen_range(0.85..=0.95),
        rng.gen_range(0.75..=0.85),
        rng.gen_range(0.45..=0.55),
        1.0,
    ]
}

/// The double-buffered grid.
#[derive(Debug, Clone)]
pub struct Grid {
    size: GridSize,
    current: Vec<Cell>,
    next: Vec<Cell>,
}

impl Grid {
    /// Allocate an all-empty grid.
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            current: vec![Cell::EMPTY; size.cell_count()],
            next: vec![Cell::EMPTY; size.cell_count()],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// The buffer being drawn and painted this frame.
    pub fn current(&self) -> &[Cell] {
        &self.current
    }

    /// The buffer the kernel writes into.
    pub fn next(&self) -> &[Cell] {
        &self.next
    }

    /// Read `current` and write `next` at the same time.
    pub fn buffers_mut(&mut self) -> (&[Cell], &mut [Cell]) {
        (&self.current, &mut self.next)
    }

    /// Cell at `(x, y)` in `current`.
    pub fn cell(&self, x: i64, y: i64) -> Option<&Cell> {
        self.size.index(x, y).map(|i| &self.current[i])
    }

    /// Overwrite the cell at `(x, y)` in `current`. Returns `false` off-grid.
    pub fn set(&mut self, x: i64, y: i64, cell: Cell) -> bool {
        match self.size.index(x, y) {
            Some(i) => {
                self.current[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Exchange the roles of `current` and `next`.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// Empty both buffers.
    pub fn reset(&mut self) {
        self.current.fill(Cell::EMPTY);
        self.next.fill(Cell::EMPTY);
    }

    /// Copy `current` into `next`.
    pub fn sync_next(&mut self) {
        self.next.copy_from_slice(&self.current);
    }

    /// Paint `kind` into every empty in-bounds cell under the brush.
    ///
    /// Occupied cells are left alone, so painting twice at the same spot is
    /// the same as painting once. Returns the number of cells written.
    pub fn paint<R: Rng + ?Sized>(
        &mut self,
        center: (i64, i64),
        brush: &Brush,
        kind: CellKind,
        rng: &mut R,
    ) -> usize {
        let (cx, cy) = center;
        let r = brush.radius as i64;
        let (width, height) = (self.size.width as i64, self.size.height as i64);

        // Only the part of the brush's bounding box that overlaps the grid.
        let (x0, x1) = (cx.saturating_sub(r).max(0), cx.saturating_add(r).min(width - 1));
        let (y0, y1) = (cy.saturating_sub(r).max(0), cy.saturating_add(r).min(height - 1));

        let mut spawned = 0;
        for y in y0..=y1 {
            for x in x0..=x1 {
                if !brush.covers(x - cx, y - cy) {
                    continue;
                }
                let Some(index) = self.size.index(x, y) else {
                    continue;
                };
                if self.current[index].is_empty() {
                    self.current[index] = Cell::new(kind, sand_color(rng));
                    spawned += 1;
                }
            }
        }
        spawned
    }

    /// Turn every suspended cell into falling sand and mirror the result
    /// into `next` so the coming swap cannot bring the old state back.
    ///
    /// Returns the number of cells converted.
    pub fn commit_suspended(&mut self) -> usize {
        let mut converted = 0;
        for cell in &mut self.current {
            if cell.kind == CellKind::Suspended {
                cell.kind = CellKind::Falling;
                converted += 1;
            }
        }
        self.sync_next();
        converted
    }

    /// Count suspended and falling cells in `current`.
    pub fn count_particles(&self) -> ParticleCounts {
        let mut counts = ParticleCounts::default();
        for cell in &self.current {
            match cell.kind {
                CellKind::Suspended => counts.suspended += 1,
                CellKind::Falling => counts.falling += 1,
                CellKind::Empty | CellKind::Wall => {}
            }
        }
        counts.total = counts.suspended + counts.falling;
        counts
    }

    /// Place walls over the rectangle `[x0, x1) × [y0, y1)`, clipped to the
    /// grid.
    pub fn place_wall_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64) {
        const WALL_COLOR: [f32; 4] = [0.35, 0.35, 0.4, 1.0];
        for y in y0..y1 {
            for x in x0..x1 {
                if let Some(i) = self.size.index(x, y) {
                    self.current[i] = Cell::new(CellKind::Wall, WALL_COLOR);
                    self.next[i] = self.current[i];
                }
            }
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(GridSize::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_radius_five_brush_covers_69_cells() {
        let mut grid = Grid::default();
        let spawned = grid.paint((50, 50), &Brush::new(5), CellKind::Suspended, &mut rng());
        assert_eq!(spawned, 69);
        assert_eq!(grid.count_particles().suspended, 69);
    }

    #[test]
    fn test_paint_is_idempotent() {
        let mut grid = Grid::default();
        let mut rng = rng();
        grid.paint((20, 30), &Brush::new(4), CellKind::Suspended, &mut rng);
        let once = grid.current().to_vec();
        let again = grid.paint((20, 30), &Brush::new(4), CellKind::Suspended, &mut rng);
        assert_eq!(again, 0);
        assert_eq!(grid.current(), &once[..]);
    }

    #[test]
    fn test_paint_clips_at_corner() {
        let mut grid = Grid::default();
        // Only the quarter disc with dx, dy >= 0 lands on the grid.
        let spawned = grid.paint((0, 0), &Brush::new(2), CellKind::Suspended, &mut rng());
        assert_eq!(spawned, 6);
    }

    #[test]
    fn test_paint_far_off_grid_spawns_nothing() {
        let mut grid = Grid::default();
        let spawned = grid.paint((-50, 500), &Brush::new(5), CellKind::Suspended, &mut rng());
        assert_eq!(spawned, 0);
        assert_eq!(grid.count_particles(), ParticleCounts::default());
    }

    #[test]
    fn test_paint_skips_walls() {
        let mut grid = Grid::default();
        grid.place_wall_rect(48, 48, 53, 53);
        let spawned = grid.paint((50, 50), &Brush::new(5), CellKind::Suspended, &mut rng());
        assert_eq!(spawned, 69 - 25);
        assert_eq!(grid.cell(50, 50).map(|c| c.kind), Some(CellKind::Wall));
    }

    #[test]
    fn test_paint_at_extreme_center_spawns_nothing() {
        let mut grid = Grid::default();
        let mut rng = rng();
        for center in [(i64::MAX, i64::MAX), (i64::MIN, 50), (50, i64::MIN)] {
            assert_eq!(grid.paint(center, &Brush::new(5), CellKind::Suspended, &mut rng), 0);
        }
        assert_eq!(grid.count_particles(), ParticleCounts::default());
    }

    #[test]
    fn test_huge_brush_is_clamped_and_fills_grid() {
        let brush = Brush::new(50_000);
        assert_eq!(brush.radius, Brush::MAX_RADIUS);
        assert_eq!(Brush::new(-3).radius, 0);

        let mut grid = Grid::new(GridSize::new(100, 100));
        let spawned = grid.paint((50, 50), &brush, CellKind::Suspended, &mut rng());
        assert_eq!(spawned, 100 * 100);
    }

    #[test]
    fn test_brush_covers_disc() {
        let brush = Brush::new(Brush::MAX_RADIUS);
        let r = Brush::MAX_RADIUS as i64;
        assert!(brush.covers(r, 0));
        assert!(brush.covers(0, -r));
        assert!(!brush.covers(r, 1));
        assert!(!brush.covers(i64::MAX, 0));
        assert!(!brush.covers(0, i64::MIN));
    }

    #[test]
    fn test_sand_color_ranges() {
        let mut rng = rng();
        for _ in 0..1000 {
            let [r, g, b, a] = sand_color(&mut rng);
            assert!((0.85..=0.95).contains(&r));
            assert!((0.75..=0.85).contains(&g));
            assert!((0.45..=0.55).contains(&b));
            assert_eq!(a, 1.0);
        }
    }

    #[test]
    fn test_commit_converts_and_mirrors() {
        let mut grid = Grid::default();
        grid.paint((10, 10), &Brush::new(3), CellKind::Suspended, &mut rng());
        let before = grid.count_particles();

        let converted = grid.commit_suspended();
        let after = grid.count_particles();

        assert_eq!(converted, before.suspended);
        assert_eq!(after.suspended, 0);
        assert_eq!(after.falling, before.falling + before.suspended);
        assert_eq!(grid.current(), grid.next());
    }

    #[test]
    fn test_swap_exchanges_buffers() {
        let mut grid = Grid::default();
        grid.set(1, 1, Cell::new(CellKind::Falling, [1.0; 4]));
        grid.swap();
        assert!(grid.cell(1, 1).is_some_and(|c| c.is_empty()));
        assert_eq!(grid.next()[101].kind, CellKind::Falling);
    }

    #[test]
    fn test_index_bounds() {
        let size = GridSize::new(4, 3);
        assert_eq!(size.index(0, 0), Some(0));
        assert_eq!(size.index(3, 2), Some(11));
        assert_eq!(size.index(4, 0), None);
        assert_eq!(size.index(0, 3), None);
        assert_eq!(size.index(-1, 1), None);
    }

    #[test]
    fn test_map_position() {
        let size = GridSize::default();
        let viewport = Vec2::new(200.0, 200.0);
        assert_eq!(size.map_position(Vec2::new(101.0, 100.0), viewport), Some((50, 50)));
        assert_eq!(size.map_position(Vec2::new(-1.0, 0.0), viewport), Some((-1, 0)));
        assert_eq!(size.map_position(Vec2::new(1.0, 1.0), Vec2::ZERO), None);
        assert_eq!(size.map_position(Vec2::new(f32::NAN, 1.0), viewport), None);
    }

    #[test]
    fn test_gpu_cell_layout() {
        assert_eq!(std::mem::size_of::<GpuCell>(), 32);
        let cell = Cell::new(CellKind::Suspended, [0.9, 0.8, 0.5, 1.0]);
        assert_eq!(GpuCell::from(cell).to_cell(), cell);

        let bogus = GpuCell {
            kind: 42,
            _pad: [0; 3],
            color: [1.0; 4],
        };
        assert!(bogus.to_cell().is_empty());
    }
}
