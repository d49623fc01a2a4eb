//! Benchmark for height sampling and tile building.
//!
//! Run with: cargo bench --package terragen_procedural --bench terrain_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use terragen_procedural::{FlatZone, HeightField, HeightFieldParams, TileMeshBuilder};
use terragen_shared::{GridCoord, Vec2};

fn benchmark_height_sampling(c: &mut Criterion) {
    let field = HeightField::new(HeightFieldParams::default(), FlatZone::default());

    let mut group = c.benchmark_group("height_field");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_samples", |b| {
        b.iter(|| {
            for i in 0..1000 {
                let p = Vec2::new(i as f32 * 97.0 + 10_000.0, i as f32 * 13.0 - 4000.0);
                black_box(field.height(black_box(p)));
            }
        });
    });
    group.finish();
}

fn benchmark_tile_build(c: &mut Criterion) {
    let field = HeightField::new(HeightFieldParams::default(), FlatZone::default());
    let builder = TileMeshBuilder::new(20, 20, 2000.0).expect("valid grid");

    c.bench_function("tile_lod1", |b| {
        let mut x = 0i32;
        b.iter(|| {
            x = x.wrapping_add(1);
            black_box(builder.build(&field, GridCoord::new(x % 64, 3), 1))
        });
    });

    c.bench_function("tile_lod4", |b| {
        b.iter(|| black_box(builder.build(&field, GridCoord::new(5, 5), 4)));
    });
}

criterion_group!(benches, benchmark_height_sampling, benchmark_tile_build);
criterion_main!(benches);
