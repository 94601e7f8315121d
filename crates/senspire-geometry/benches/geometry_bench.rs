// Benchmarks for polygon validation and area computation

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use geo_types::{Coord, LineString, Polygon};
use senspire_geometry::{AreaMethod, GeometryStore, compute_area, validate_polygon};

/// Regular n-gon around a point near Bordeaux
fn ngon(n: usize) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = (0..n)
        .map(|i| {
            let theta = (i as f64) * std::f64::consts::TAU / (n as f64);
            Coord {
                x: -0.58 + 0.01 * theta.cos(),
                y: 44.84 + 0.01 * theta.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::from(coords), vec![])
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_polygon");
    for n in [8, 64, 256] {
        let poly = ngon(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &poly, |b, poly| {
            b.iter(|| validate_polygon(black_box(poly)))
        });
    }
    group.finish();
}

fn bench_area(c: &mut Criterion) {
    let poly = ngon(64);
    c.bench_function("area_geodesic_64", |b| {
        b.iter(|| compute_area(black_box(&poly), AreaMethod::Geodesic))
    });
    c.bench_function("area_planar_64", |b| {
        b.iter(|| compute_area(black_box(&poly), AreaMethod::Planar))
    });
}

fn bench_measure(c: &mut Criterion) {
    let store = GeometryStore::default();
    let poly = ngon(64);
    c.bench_function("measure_64", |b| b.iter(|| store.measure(black_box(&poly))));
}

criterion_group!(benches, bench_validate, bench_area, bench_measure);
criterion_main!(benches);
