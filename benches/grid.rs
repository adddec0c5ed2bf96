//! Benchmarks for the CPU side of the sand grid.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use hardway::grid::{Brush, CellKind, Grid, GridSize};
use hardway::kernel::{FallKernel, SimulationKernel};

fn bench_paint(c: &mut Criterion) {
    let mut group = c.benchmark_group("brush_paint");

    for radius in [2, 5, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &radius| {
            let brush = Brush::new(radius);
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let mut grid = Grid::new(GridSize::new(100, 100));
                black_box(grid.paint((50, 50), &brush, CellKind::Suspended, &mut rng))
            })
        });
    }

    group.finish();
}

fn bench_fall_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("fall_kernel");

    for side in [100, 256, 512] {
        let size = GridSize::new(side, side);
        let mut grid = Grid::new(size);
        let mut rng = StdRng::seed_from_u64(11);
        let brush = Brush::new(side as i32 / 4);
        grid.paint((side as i64 / 2, side as i64 / 4), &brush, CellKind::Falling, &mut rng);

        group.bench_with_input(BenchmarkId::from_parameter(side), &size, |b, &size| {
            b.iter(|| {
                let (current, next) = grid.buffers_mut();
                FallKernel.simulate(black_box(current), next, size);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_paint, bench_fall_kernel);
criterion_main!(benches);
