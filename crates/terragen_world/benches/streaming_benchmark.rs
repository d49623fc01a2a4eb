//! Benchmark for streaming ticks, replacement picks and foliage passes.
//!
//! Run with: cargo bench --package terragen_world --bench streaming_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use terragen_procedural::{MemoryLayoutStore, TileMeshBuilder};
use terragen_shared::{GridCoord, Vec2, Vec3};
use terragen_world::foliage::{
    FoliagePlacer, FoliageRng, FoliageSpecies, FoliageStrategy, InstanceBuffer, PlacementContext,
    ScatterSettings,
};
use terragen_world::{
    InstanceBackend, MeshSections, NoNavigation, TerrainConfig, TickServices, TileCache,
    TraceFilter, WorldController, WorldState,
};

fn small_world() -> TerrainConfig {
    let mut config = TerrainConfig::default();
    config.grid.x_vertex_count = 8;
    config.grid.y_vertex_count = 8;
    config.grid.cell_size = 250.0;
    config.foliage.seed = Some(11);
    config.foliage.species = vec![FoliageSpecies {
        name: "grass".to_string(),
        ..FoliageSpecies::default()
    }];
    config
}

fn benchmark_walk(c: &mut Criterion) {
    let mut state = WorldState::new(small_world(), &MemoryLayoutStore::new()).expect("state");
    let tracer = state.tracer();
    let mut mesh = MeshSections::new();
    let mut nav = NoNavigation;
    let mut controller = WorldController::new();
    let mut step = 0u32;

    c.bench_function("tick_blocking_walk", |b| {
        b.iter(|| {
            step = step.wrapping_add(1);
            let player = Vec3::new((step % 2000) as f32 * 40.0, 0.0, 300.0);
            let mut services = TickServices {
                tracer: &tracer,
                mesh: &mut mesh,
                navigation: &mut nav,
            };
            black_box(controller.tick_blocking(&mut state, player, &mut services).expect("tick"))
        });
    });
}

fn benchmark_replacement_pick(c: &mut Criterion) {
    let mut cache = TileCache::new(Vec2::new(500.0, 500.0), 2000.0);
    let near = Vec2::new(0.0, 0.0);
    for y in -10..10 {
        for x in -10..10 {
            let coord = GridCoord::new(x, y);
            cache.enqueue(coord, 1);
            cache.allocate_or_reuse(coord, 1, near);
        }
    }

    let mut group = c.benchmark_group("tile_cache");
    group.throughput(Throughput::Elements(cache.len() as u64));
    group.bench_function("pick_400", |b| {
        b.iter(|| black_box(cache.pick_replacement_candidate(black_box(Vec2::new(3000.0, -1200.0)))));
    });
    group.finish();
}

fn benchmark_foliage(c: &mut Criterion) {
    let state = WorldState::new(small_world(), &MemoryLayoutStore::new()).expect("state");
    let tracer = state.tracer();
    let builder = TileMeshBuilder::new(20, 20, 100.0).expect("valid grid");
    let mesh = builder.build(state.field(), GridCoord::new(0, 0), 1);
    let filter = TraceFilter::new();
    let placer = FoliagePlacer::new(
        vec![FoliageSpecies::default()],
        FoliageStrategy::Both,
        ScatterSettings::default(),
    );

    c.bench_function("foliage_tile_400", |b| {
        b.iter(|| {
            let mut pools: Vec<Box<dyn InstanceBackend>> = vec![Box::new(InstanceBuffer::new())];
            let mut rng = FoliageRng::new(3);
            let mut ctx = PlacementContext {
                tracer: &tracer,
                filter: &filter,
                pools: &mut pools,
                rng: &mut rng,
            };
            black_box(placer.populate_tile(&mesh.vertices, &mut ctx))
        });
    });
}

criterion_group!(benches, benchmark_walk, benchmark_replacement_pick, benchmark_foliage);
criterion_main!(benches);
