//! # Foliage Integration Tests
//!
//! Placement passes against a counting tracer, and bulk retirement against
//! the headless instance buffer.

use std::cell::Cell;
use std::sync::Arc;

use terragen_procedural::{FlatZone, HeightField, HeightFieldParams};
use terragen_shared::{Aabb, Transform, Vec3};
use terragen_world::foliage::{
    FloatRange, FoliagePlacer, FoliageRng, FoliageSpecies, FoliageStrategy, InstanceBuffer,
    PlacementContext, RetirementPool, ScatterSettings,
};
use terragen_world::{HeightFieldTracer, InstanceBackend, RayCaster, TraceFilter, TraceHit};

/// Forwards to a flat-terrain tracer and counts calls.
struct CountingTracer {
    inner: HeightFieldTracer,
    calls: Cell<u32>,
}

impl CountingTracer {
    fn new() -> Self {
        let field = HeightField::new(HeightFieldParams::default(), FlatZone::default());
        Self {
            inner: HeightFieldTracer::new(Arc::new(field)),
            calls: Cell::new(0),
        }
    }
}

impl RayCaster for CountingTracer {
    fn trace(&self, start: Vec3, end: Vec3, filter: &TraceFilter) -> Option<TraceHit> {
        self.calls.set(self.calls.get() + 1);
        self.inner.trace(start, end, filter)
    }
}

fn pools(count: usize) -> Vec<Box<dyn InstanceBackend>> {
    (0..count).map(|_| Box::new(InstanceBuffer::new()) as Box<dyn InstanceBackend>).collect()
}

fn always_grows(strategy: FoliageStrategy) -> FoliagePlacer {
    let species = FoliageSpecies {
        name: "reed".to_string(),
        initial_seed_density: 10.0,
        ..FoliageSpecies::default()
    };
    let scatter = ScatterSettings {
        growth_probability_percentage: 100.0,
        ..ScatterSettings::default()
    };
    FoliagePlacer::new(vec![species], strategy, scatter)
}

/// Scenario: a vertex below the species' height band never traces.
#[test]
fn test_height_band_skips_vertex() {
    let species = FoliageSpecies {
        name: "pine".to_string(),
        height: FloatRange::new(100.0, 200.0),
        initial_seed_density: 10.0,
        ..FoliageSpecies::default()
    };
    let placer = FoliagePlacer::new(vec![species], FoliageStrategy::Both, ScatterSettings::default());
    let tracer = CountingTracer::new();
    let filter = TraceFilter::new();
    let mut pools = pools(1);
    let mut rng = FoliageRng::new(5);
    let mut ctx = PlacementContext {
        tracer: &tracer,
        filter: &filter,
        pools: &mut pools,
        rng: &mut rng,
    };

    let vertices = [Vec3::new(0.0, 0.0, 50.0), Vec3::new(100.0, 0.0, 50.0)];
    let stats = placer.populate_tile(&vertices, &mut ctx);

    assert_eq!(tracer.calls.get(), 0);
    assert_eq!(stats.placed, 0);
    assert_eq!(pools[0].instance_count(), 0);
}

#[test]
fn test_scatter_places_on_flat_ground() {
    let placer = always_grows(FoliageStrategy::Scatter);
    let tracer = CountingTracer::new();
    let filter = TraceFilter::new();
    let mut pools = pools(1);
    let mut rng = FoliageRng::new(9);
    let mut ctx = PlacementContext {
        tracer: &tracer,
        filter: &filter,
        pools: &mut pools,
        rng: &mut rng,
    };

    let vertices: Vec<Vec3> = (0..10).map(|i| Vec3::new(i as f32 * 100.0, 0.0, 250.0)).collect();
    let stats = placer.populate_tile(&vertices, &mut ctx);

    assert_eq!(tracer.calls.get(), 10, "one scatter trace per vertex");
    assert_eq!(stats.traces, 10);
    assert_eq!(stats.placed, 10);
    assert_eq!(pools[0].instance_count(), 10);
    for id in pools[0].instance_ids() {
        let transform = pools[0].instance_transform(id).expect("live");
        assert!((transform.position.z - 250.0).abs() < 1e-3);
    }
}

#[test]
fn test_same_seed_same_forest() {
    let vertices: Vec<Vec3> = (0..6)
        .flat_map(|y| (0..6).map(move |x| Vec3::new(x as f32 * 100.0, y as f32 * 100.0, 250.0)))
        .collect();

    let grow = || {
        let placer = always_grows(FoliageStrategy::Both);
        let tracer = CountingTracer::new();
        let filter = TraceFilter::new();
        let mut pools = pools(1);
        let mut rng = FoliageRng::new(77);
        let mut ctx = PlacementContext {
            tracer: &tracer,
            filter: &filter,
            pools: &mut pools,
            rng: &mut rng,
        };
        placer.populate_tile(&vertices, &mut ctx);
        let mut positions: Vec<(i64, i64)> = pools[0]
            .instance_ids()
            .into_iter()
            .filter_map(|id| pools[0].instance_transform(id))
            .map(|t| ((t.position.x * 100.0) as i64, (t.position.y * 100.0) as i64))
            .collect();
        positions.sort_unstable();
        positions
    };

    let first = grow();
    assert!(!first.is_empty());
    assert_eq!(first, grow());
}

#[test]
fn test_retirement_removes_exactly_the_region() {
    let mut pools = pools(2);
    for x in 0..10 {
        let position = Vec3::new(x as f32 * 100.0, 0.0, 250.0);
        pools[0].add_instance(Transform::from_position(position));
        pools[1].add_instance(Transform::from_position(position + Vec3::new(0.0, 50.0, 0.0)));
    }

    let left = Aabb::from_corners(Vec3::new(-1.0, -1.0, -1000.0), Vec3::new(450.0, 100.0, 1000.0));
    let overlapping = Aabb::from_corners(Vec3::new(250.0, -1.0, -1000.0), Vec3::new(650.0, 100.0, 1000.0));

    let mut retirement = RetirementPool::new();
    assert_eq!(retirement.mark_region(&left, &pools), 10);
    assert_eq!(retirement.mark_region(&overlapping, &pools), 4, "already marked ids are not counted");
    assert_eq!(retirement.flush(&mut pools), 14);
    assert!(retirement.is_empty());

    for pool in &pools {
        assert_eq!(pool.instance_count(), 3);
        for id in pool.instance_ids() {
            let x = pool.instance_transform(id).expect("live").position.x;
            assert!(x > 650.0);
        }
    }
    assert_eq!(retirement.flush(&mut pools), 0);
}
