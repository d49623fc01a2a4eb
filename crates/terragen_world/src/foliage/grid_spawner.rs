//! # Grid-Trace Spawner
//!
//! Foliage on a coarse cell grid of its own, independent of terrain tiles.
//! A cell that enters the window around the player is sampled on a
//! jittered lattice, and every sample hit goes through [`GridTraceRule`].
//! A cell that leaves the window has its instances marked for retirement
//! by box.
//!
//! ```text
//! player cell   round(player / cell_size)
//! window        |cell - player cell| <= cell_count / 2 on both axes
//! samples       every sub_cell_size, ± sub_cell_random_offset, kept in the cell
//! ```
//!
//! A centre trace that misses leaves the cell untouched for this tick,
//! on both the spawn and the removal side.

use std::collections::BTreeSet;

use terragen_shared::{Aabb, GridCoord, Vec2, Vec3};

use crate::collaborators::TraceHit;
use crate::config::GridSpawnerConfig;
use crate::foliage::placement::{FoliagePlacer, PlacementContext, PlacementStats};
use crate::foliage::retirement::RetirementPool;
use crate::foliage::rules::GridTraceRule;

/// Distance kept between samples and the cell edge, so an instance never
/// falls inside a neighbour's retirement box.
const EDGE_INSET: f32 = 1.0;

/// What one spawner update did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridSpawnReport {
    /// Cells populated this update.
    pub spawned: Vec<GridCoord>,
    /// Cells forgotten this update.
    pub removed: Vec<GridCoord>,
    /// Far cells kept because the centre trace missed.
    pub removal_skipped: u32,
    /// Instances marked for retirement.
    pub marked: usize,
    /// Sample traces and placements.
    pub placement: PlacementStats,
}

/// Streams grid-trace foliage around the player.
#[derive(Clone, Debug)]
pub struct GridSpawner {
    config: GridSpawnerConfig,
    rule: GridTraceRule,
    spawned: BTreeSet<GridCoord>,
}

impl GridSpawner {
    /// Spawner with no populated cells.
    #[must_use]
    pub fn new(config: GridSpawnerConfig) -> Self {
        let rule = GridTraceRule {
            min_spawn_height: config.min_spawn_height,
            supported_surface: config.supported_surface,
        };
        Self {
            config,
            rule,
            spawned: BTreeSet::new(),
        }
    }

    /// Active settings.
    #[must_use]
    pub fn config(&self) -> &GridSpawnerConfig {
        &self.config
    }

    /// Number of populated cells.
    #[must_use]
    pub fn spawned_count(&self) -> usize {
        self.spawned.len()
    }

    /// True if `cell` is populated.
    #[must_use]
    pub fn is_spawned(&self, cell: GridCoord) -> bool {
        self.spawned.contains(&cell)
    }

    /// Cell nearest to `location`.
    #[must_use]
    pub fn cell_of(&self, location: Vec2) -> GridCoord {
        let size = self.config.cell_size;
        GridCoord::from_world_rounded(location, Vec2::new(size, size))
    }

    /// Centre of `cell`.
    #[must_use]
    pub fn cell_center(&self, cell: GridCoord) -> Vec2 {
        Vec2::new(cell.x as f32, cell.y as f32) * self.config.cell_size
    }

    /// Retirement box of `cell` for ground at `z`.
    #[must_use]
    pub fn cell_bounds(&self, cell: GridCoord, z: f32) -> Aabb {
        let center = self.cell_center(cell);
        let half = self.config.cell_size * 0.5;
        let reach = self.config.trace_distance;
        Aabb::from_corners(
            Vec3::new(center.x - half, center.y - half, z - reach),
            Vec3::new(center.x + half, center.y + half, z + reach),
        )
    }

    /// Retires cells that left the window, then populates new ones.
    ///
    /// Retired instances are only marked; the caller flushes `retirement`.
    pub fn update(
        &mut self,
        player: Vec3,
        placer: &FoliagePlacer,
        ctx: &mut PlacementContext<'_>,
        retirement: &mut RetirementPool,
    ) -> GridSpawnReport {
        let mut report = GridSpawnReport::default();
        let player_cell = self.cell_of(player.xy());

        self.remove_far_cells(player, player_cell, ctx, retirement, &mut report);

        let half = self.config.half_window();
        for dy in -half..=half {
            for dx in -half..=half {
                let cell = player_cell.offset(dx, dy);
                if self.spawned.contains(&cell) {
                    continue;
                }
                let Some(ground) = self.trace(self.cell_center(cell), player.z, ctx) else {
                    continue;
                };
                self.spawned.insert(cell);
                report.placement += self.populate_cell(cell, ground.location.z, placer, ctx);
                report.spawned.push(cell);
            }
        }

        if !report.spawned.is_empty() || !report.removed.is_empty() {
            tracing::debug!(
                "Grid spawner at cell ({}, {}): {} cells spawned, {} removed, {} instances placed",
                player_cell.x,
                player_cell.y,
                report.spawned.len(),
                report.removed.len(),
                report.placement.placed
            );
        }
        report
    }

    fn remove_far_cells(
        &mut self,
        player: Vec3,
        player_cell: GridCoord,
        ctx: &mut PlacementContext<'_>,
        retirement: &mut RetirementPool,
        report: &mut GridSpawnReport,
    ) {
        let half = self.config.half_window();
        let far: Vec<GridCoord> = self
            .spawned
            .iter()
            .copied()
            .filter(|c| (c.x - player_cell.x).abs() > half || (c.y - player_cell.y).abs() > half)
            .collect();

        for cell in far {
            let Some(ground) = self.trace(self.cell_center(cell), player.z, ctx) else {
                report.removal_skipped += 1;
                continue;
            };
            let bounds = self.cell_bounds(cell, ground.location.z);
            report.marked += retirement.mark_region(&bounds, &*ctx.pools);
            self.spawned.remove(&cell);
            report.removed.push(cell);
        }
    }

    fn populate_cell(
        &self,
        cell: GridCoord,
        ground_z: f32,
        placer: &FoliagePlacer,
        ctx: &mut PlacementContext<'_>,
    ) -> PlacementStats {
        let mut stats = PlacementStats::default();
        let center = self.cell_center(cell);
        let half = self.config.cell_size * 0.5;
        let inner = (half - EDGE_INSET).max(0.0);
        let step = self.config.sub_cell_size;
        let jitter = self.config.sub_cell_random_offset;
        let samples = (self.config.cell_size / step).ceil().max(1.0) as u32;

        for iy in 0..samples {
            for ix in 0..samples {
                let x = -half + ix as f32 * step + ctx.rng.frand_range(-jitter, jitter);
                let y = -half + iy as f32 * step + ctx.rng.frand_range(-jitter, jitter);
                let sample = center + Vec2::new(x.clamp(-inner, inner), y.clamp(-inner, inner));

                stats.traces += 1;
                match self.trace(sample, ground_z, ctx) {
                    Some(hit) => stats += placer.place_on_hit(&self.rule, &hit, ctx),
                    None => stats.misses += 1,
                }
            }
        }
        stats
    }

    fn trace(&self, location: Vec2, z: f32, ctx: &PlacementContext<'_>) -> Option<TraceHit> {
        let reach = self.config.trace_distance;
        ctx.tracer.trace(
            Vec3::from_xy(location, z + reach),
            Vec3::from_xy(location, z - reach),
            ctx.filter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use terragen_procedural::{FlatZone, HeightField, HeightFieldParams};

    use crate::backends::HeightFieldTracer;
    use crate::collaborators::{InstanceBackend, SurfaceType, TraceFilter};
    use crate::foliage::instances::InstanceBuffer;
    use crate::foliage::placement::{FoliageStrategy, ScatterSettings};
    use crate::foliage::random::FoliageRng;
    use crate::foliage::species::FoliageSpecies;

    fn flat_tracer() -> HeightFieldTracer {
        let zone = FlatZone {
            radius: 1.0e7,
            ..FlatZone::default()
        };
        HeightFieldTracer::new(Arc::new(HeightField::new(HeightFieldParams::default(), zone)))
    }

    /// 3x3 cells of 1000, four samples per cell.
    fn small_grid() -> GridSpawnerConfig {
        GridSpawnerConfig {
            enabled: true,
            cell_size: 1000.0,
            sub_cell_size: 500.0,
            cell_count: 2,
            min_spawn_height: 0.0,
            ..GridSpawnerConfig::default()
        }
    }

    fn placer() -> FoliagePlacer {
        let species = FoliageSpecies {
            name: "grass".to_string(),
            initial_seed_density: 10.0,
            ..FoliageSpecies::default()
        };
        FoliagePlacer::new(vec![species], FoliageStrategy::Both, ScatterSettings::default())
    }

    struct Rig {
        tracer: HeightFieldTracer,
        filter: TraceFilter,
        pools: Vec<Box<dyn InstanceBackend>>,
        rng: FoliageRng,
        retirement: RetirementPool,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                tracer: flat_tracer(),
                filter: TraceFilter::new(),
                pools: vec![Box::new(InstanceBuffer::new())],
                rng: FoliageRng::new(21),
                retirement: RetirementPool::new(),
            }
        }

        fn update(&mut self, spawner: &mut GridSpawner, placer: &FoliagePlacer, player: Vec3) -> GridSpawnReport {
            let mut ctx = PlacementContext {
                tracer: &self.tracer,
                filter: &self.filter,
                pools: &mut self.pools,
                rng: &mut self.rng,
            };
            spawner.update(player, placer, &mut ctx, &mut self.retirement)
        }
    }

    #[test]
    fn test_cell_math() {
        let spawner = GridSpawner::new(GridSpawnerConfig::default());
        assert_eq!(spawner.cell_of(Vec2::new(2400.0, -2600.0)), GridCoord::new(0, -1));
        assert_eq!(spawner.cell_center(GridCoord::new(2, -1)), Vec2::new(10_000.0, -5000.0));

        let bounds = spawner.cell_bounds(GridCoord::new(1, 0), 250.0);
        assert_eq!(bounds.min, Vec3::new(2500.0, -2500.0, -4750.0));
        assert_eq!(bounds.max, Vec3::new(7500.0, 2500.0, 5250.0));
    }

    #[test]
    fn test_window_populates_each_cell_once() {
        let mut rig = Rig::new();
        let placer = placer();
        let mut spawner = GridSpawner::new(small_grid());
        let player = Vec3::new(100.0, 100.0, 300.0);

        let first = rig.update(&mut spawner, &placer, player);
        assert_eq!(first.spawned.len(), 9);
        assert_eq!(first.placement.traces, 36);
        assert_eq!(first.placement.placed, 36);
        assert_eq!(rig.pools[0].instance_count(), 36);
        assert!(spawner.is_spawned(GridCoord::new(-1, 1)));

        let second = rig.update(&mut spawner, &placer, player);
        assert!(second.spawned.is_empty());
        assert_eq!(second.placement.traces, 0);
        assert_eq!(rig.pools[0].instance_count(), 36);
    }

    #[test]
    fn test_samples_stay_inside_their_cell() {
        let mut rig = Rig::new();
        let placer = placer();
        let mut spawner = GridSpawner::new(GridSpawnerConfig {
            sub_cell_random_offset: 400.0,
            ..small_grid()
        });
        rig.update(&mut spawner, &placer, Vec3::new(0.0, 0.0, 300.0));

        let window = Aabb::from_corners(Vec3::new(-1500.0, -1500.0, 0.0), Vec3::new(1500.0, 1500.0, 500.0));
        for id in rig.pools[0].instance_ids() {
            let position = rig.pools[0].instance_transform(id).expect("live").position;
            assert!(window.contains(position), "{position:?} escaped the window");
        }
    }

    #[test]
    fn test_leaving_cells_are_retired() {
        let mut rig = Rig::new();
        let placer = placer();
        let mut spawner = GridSpawner::new(small_grid());
        rig.update(&mut spawner, &placer, Vec3::new(0.0, 0.0, 300.0));

        // One cell east: the western column leaves, a new eastern column arrives.
        let report = rig.update(&mut spawner, &placer, Vec3::new(1000.0, 0.0, 300.0));
        let mut removed = report.removed.clone();
        removed.sort_unstable();
        assert_eq!(removed, vec![GridCoord::new(-1, -1), GridCoord::new(-1, 0), GridCoord::new(-1, 1)]);
        assert_eq!(report.spawned.len(), 3);
        assert_eq!(report.marked, 12);
        assert_eq!(spawner.spawned_count(), 9);

        assert_eq!(rig.retirement.flush(&mut rig.pools), 12);
        assert_eq!(rig.pools[0].instance_count(), 36);
        for id in rig.pools[0].instance_ids() {
            let x = rig.pools[0].instance_transform(id).expect("live").position.x;
            assert!(x > -500.0, "instance at x={x} should have been retired");
        }
    }

    #[test]
    fn test_required_surface_blocks_bare_hits() {
        let mut rig = Rig::new();
        let placer = placer();
        let mut spawner = GridSpawner::new(GridSpawnerConfig {
            supported_surface: Some(SurfaceType(3)),
            ..small_grid()
        });

        let report = rig.update(&mut spawner, &placer, Vec3::new(0.0, 0.0, 300.0));
        assert_eq!(report.spawned.len(), 9, "cells are tracked even when nothing grows");
        assert_eq!(report.placement.placed, 0);
        assert_eq!(report.placement.rejected, 36);
    }
}
