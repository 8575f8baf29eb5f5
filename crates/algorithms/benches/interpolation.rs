//! Benchmarks for grid interpolation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use soilmap_algorithms::interpolation::{
    build_grid, Estimator, Extent, GridParams, IdwEstimator, InterpolationGrid,
    OrdinaryKrigingEstimator, SamplePoint,
};

fn create_samples(n: usize) -> Vec<SamplePoint> {
    let mut rng = 42u64;
    let mut next = move || {
        rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (rng >> 33) as f64 / (1u64 << 31) as f64
    };

    (0..n)
        .map(|_| {
            let x = -58.50 + next() * 0.01;
            let y = -34.61 + next() * 0.01;
            let value = 5.0 + 100.0 * (x + 58.5) + ((x * 900.0).sin() + (y * 700.0).cos());
            SamplePoint::new(x, y, value)
        })
        .collect()
}

fn create_grid(samples: &[SamplePoint], max_cells: usize) -> InterpolationGrid {
    let extent = Extent::from_points(samples.iter().map(|p| (p.x, p.y))).unwrap();
    let params = GridParams {
        resolution_m: 1.0,
        min_cells: 100,
        max_cells,
    };
    build_grid(&extent, &params).unwrap()
}

fn bench_idw(c: &mut Criterion) {
    let mut group = c.benchmark_group("idw");
    let samples = create_samples(200);

    for cells in [100, 250, 500].iter() {
        let grid = create_grid(&samples, *cells);
        group.bench_with_input(BenchmarkId::from_parameter(cells), cells, |b, _| {
            b.iter(|| IdwEstimator::default().estimate(black_box(&samples), &grid).unwrap())
        });
    }

    group.finish();
}

fn bench_kriging(c: &mut Criterion) {
    let mut group = c.benchmark_group("kriging");
    group.sample_size(10);

    for n in [50, 200].iter() {
        let samples = create_samples(*n);
        let grid = create_grid(&samples, 100);
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| {
                OrdinaryKrigingEstimator::default()
                    .estimate(black_box(&samples), &grid)
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_idw, bench_kriging);
criterion_main!(benches);
