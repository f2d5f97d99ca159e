//! Benchmarks for the predicate engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geocomp_algorithms::predicates::{matrix, MatrixOptions, Predicate};
use geocomp_core::Geometry;

fn create_points(n: usize) -> Vec<Geometry> {
    (0..n)
        .map(|i| {
            let x = ((i * 37) % 1000) as f64 / 10.0;
            let y = ((i * 91) % 1000) as f64 / 10.0;
            Geometry::point(x, y).unwrap()
        })
        .collect()
}

fn create_cells(side: usize) -> Vec<Geometry> {
    let step = 100.0 / side as f64;
    (0..side * side)
        .map(|i| {
            let (x, y) = ((i % side) as f64 * step, (i / side) as f64 * step);
            Geometry::rect(x, y, x + step, y + step).unwrap()
        })
        .collect()
}

fn bench_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("intersects_matrix");
    let cells = create_cells(20);

    for n in [100, 1000, 5000].iter() {
        let points = create_points(*n);

        for prefilter in [true, false] {
            let options = MatrixOptions {
                bbox_prefilter: prefilter,
            };
            let id = format!("{}/{}", if prefilter { "rtree" } else { "brute" }, n);
            group.bench_with_input(BenchmarkId::from_parameter(id), n, |b, _| {
                b.iter(|| matrix(black_box(&points), &cells, Predicate::Intersects, &options).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_matrix);
criterion_main!(benches);
