//! Benchmarks for map algebra operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geocomp_algorithms::map_algebra::{focal, zonal_statistics, EdgeMode, FocalParams, FocalStatistic};
use geocomp_core::{GeoTransform, Neighborhood, Raster};

fn create_surface(size: usize) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));

    for row in 0..size {
        for col in 0..size {
            let base = (row + col) as f64;
            let variation = ((row * 7 + col * 13) % 100) as f64 / 10.0;
            r.set(row, col, base + variation).unwrap();
        }
    }
    r
}

fn create_zones(size: usize) -> Raster<i32> {
    let mut z = Raster::new(size, size);
    z.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    for row in 0..size {
        for col in 0..size {
            z.set(row, col, ((row / 32) * 16 + col / 32) as i32).unwrap();
        }
    }
    z
}

fn bench_focal(c: &mut Criterion) {
    let mut group = c.benchmark_group("focal_mean_3x3");
    let params = FocalParams::new(Neighborhood::square(1), FocalStatistic::Mean, EdgeMode::Reflect);

    for size in [256, 512, 1024].iter() {
        let surface = create_surface(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| focal(black_box(&surface), &params).unwrap())
        });
    }

    group.finish();
}

fn bench_zonal(c: &mut Criterion) {
    let mut group = c.benchmark_group("zonal_statistics");

    for size in [256, 512, 1024].iter() {
        let surface = create_surface(*size);
        let zones = create_zones(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| zonal_statistics(black_box(&surface), black_box(&zones)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_focal, bench_zonal);
criterion_main!(benches);
