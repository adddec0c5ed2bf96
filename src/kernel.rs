//! Pluggable cell-transition rules.
//!
//! A kernel reads the whole `current` buffer and writes every cell of `next`.
//! Kernels must conserve the number of non-empty cells; walls may absorb sand
//! only if a kernel documents it.
//!
//! [`FallKernel`] is the CPU twin of the `cellularSandCompute` WGSL entry
//! point: each cell decides its own next state from itself and its vertical
//! neighbours, so the result does not depend on iteration order.

use crate::grid::{Cell, CellKind, GridSize};

/// A transition rule `simulate(current) -> next`.
pub trait SimulationKernel {
    /// Write the successor of `current` into `next`.
    ///
    /// Both slices have `size.cell_count()` elements.
    fn simulate(&self, current: &[Cell], next: &mut [Cell], size: GridSize);
}

/// Falling cells drop one row per step into the empty cell below them.
///
/// Row `y + 1` is below row `y`. Suspended cells and walls never move.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallKernel;

impl SimulationKernel for FallKernel {
    fn simulate(&self, current: &[Cell], next: &mut [Cell], size: GridSize) {
        for y in 0..size.height as i64 {
            for x in 0..size.width as i64 {
                let Some(i) = size.index(x, y) else { continue };
                let here = current[i];
                next[i] = match here.kind {
                    CellKind::Falling => match size.index(x, y + 1) {
                        Some(below) if current[below].is_empty() => Cell::EMPTY,
                        _ => here,
                    },
                    CellKind::Empty => match size.index(x, y - 1) {
                        Some(above) if current[above].kind == CellKind::Falling => current[above],
                        _ => here,
                    },
                    CellKind::Wall | CellKind::Suspended => here,
                };
            }
        }
    }
}

/// Copies `current` to `next` unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillKernel;

impl SimulationKernel for StillKernel {
    fn simulate(&self, current: &[Cell], next: &mut [Cell], _size: GridSize) {
        next.copy_from_slice(current);
    }
}

/// Number of non-empty, non-wall cells.
pub fn sand_count(cells: &[Cell]) -> usize {
    cells
        .iter()
        .filter(|c| matches!(c.kind, CellKind::Falling | CellKind::Suspended))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Brush, Grid};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn step(grid: &mut Grid, kernel: &dyn SimulationKernel) {
        let size = grid.size();
        let (current, next) = grid.buffers_mut();
        kernel.simulate(current, next, size);
        grid.swap();
    }

    #[test]
    fn test_falling_cell_drops_one_row() {
        let mut grid = Grid::default();
        grid.set(5, 5, Cell::new(CellKind::Falling, [1.0; 4]));
        step(&mut grid, &FallKernel);
        assert!(grid.cell(5, 5).is_some_and(|c| c.is_empty()));
        assert_eq!(grid.cell(5, 6).map(|c| c.kind), Some(CellKind::Falling));
    }

    #[test]
    fn test_falling_cell_rests_on_bottom_row() {
        let mut grid = Grid::default();
        let bottom = grid.size().height as i64 - 1;
        grid.set(3, bottom, Cell::new(CellKind::Falling, [1.0; 4]));
        step(&mut grid, &FallKernel);
        assert_eq!(grid.cell(3, bottom).map(|c| c.kind), Some(CellKind::Falling));
    }

    #[test]
    fn test_suspended_cells_hold_still() {
        let mut grid = Grid::default();
        grid.set(7, 7, Cell::new(CellKind::Suspended, [1.0; 4]));
        step(&mut grid, &FallKernel);
        assert_eq!(grid.cell(7, 7).map(|c| c.kind), Some(CellKind::Suspended));
        assert!(grid.cell(7, 8).is_some_and(|c| c.is_empty()));
    }

    #[test]
    fn test_wall_stops_sand() {
        let mut grid = Grid::default();
        grid.place_wall_rect(0, 10, 100, 11);
        grid.set(4, 9, Cell::new(CellKind::Falling, [1.0; 4]));
        step(&mut grid, &FallKernel);
        assert_eq!(grid.cell(4, 9).map(|c| c.kind), Some(CellKind::Falling));
    }

    #[test]
    fn test_fall_kernel_conserves_sand() {
        let mut grid = Grid::default();
        let mut rng = StdRng::seed_from_u64(3);
        grid.place_wall_rect(20, 60, 80, 62);
        grid.paint((50, 20), &Brush::new(6), CellKind::Suspended, &mut rng);
        grid.paint((30, 40), &Brush::new(3), CellKind::Suspended, &mut rng);
        grid.commit_suspended();
        let before = sand_count(grid.current());

        for _ in 0..250 {
            step(&mut grid, &FallKernel);
            assert_eq!(sand_count(grid.current()), before);
        }
        // Everything has landed by now.
        let settled = grid.current().to_vec();
        step(&mut grid, &FallKernel);
        assert_eq!(grid.current(), &settled[..]);
    }

    #[test]
    fn test_still_kernel_copies() {
        let mut grid = Grid::default();
        grid.set(1, 2, Cell::new(CellKind::Falling, [0.5; 4]));
        let snapshot = grid.current().to_vec();
        step(&mut grid, &StillKernel);
        assert_eq!(grid.current(), &snapshot[..]);
    }
}
