//! # Foliage Placement Engine
//!
//! Runs once per committed tile, over the tile's vertices.
//!
//! ## Passes
//!
//! ```text
//! direct vertex:  height band -> density roll -> cluster walk
//!                 -> seeds around each step -> trace ±2000 -> rule
//! scatter:        height band -> growth roll -> jittered offset
//!                 -> trace ±20000 -> rule
//! ```
//!
//! Both passes draw from the same `FoliageRng`. Which ones run is chosen by
//! `FoliageStrategy`; with `Both` they compound.

use serde::{Deserialize, Serialize};
use terragen_shared::Vec3;

use crate::collaborators::{InstanceBackend, RayCaster, TraceFilter, TraceHit};
use crate::foliage::random::FoliageRng;
use crate::foliage::rules::{PlacementDecision, PlacementRule, TerrainSeedRule};
use crate::foliage::species::FoliageSpecies;

/// Half-height of the seed validation trace.
pub const SEED_TRACE_HALF_HEIGHT: f32 = 2000.0;

/// Half-height of the scatter trace.
pub const SCATTER_TRACE_HALF_HEIGHT: f32 = 20_000.0;

/// Which vertex passes run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoliageStrategy {
    /// Cluster walk from each vertex.
    DirectVertex,
    /// Single jittered trace per vertex.
    Scatter,
    /// Both passes.
    #[default]
    Both,
}

impl FoliageStrategy {
    fn direct(self) -> bool {
        matches!(self, Self::DirectVertex | Self::Both)
    }

    fn scatter(self) -> bool {
        matches!(self, Self::Scatter | Self::Both)
    }
}

/// Scatter-pass tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScatterSettings {
    /// Chance in `[0, 100]` that a vertex spawns a scatter attempt.
    pub growth_probability_percentage: f32,
    /// Base offset added on every axis.
    pub instance_offset: f32,
    /// Random variation around `instance_offset`.
    pub instance_offset_variation: f32,
}

impl Default for ScatterSettings {
    fn default() -> Self {
        Self {
            growth_probability_percentage: 20.0,
            instance_offset: 1000.0,
            instance_offset_variation: 200.0,
        }
    }
}

/// Counters for one placement run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    /// Ray casts issued.
    pub traces: u32,
    /// Ray casts that found nothing.
    pub misses: u32,
    /// Hits rejected by the rule.
    pub rejected: u32,
    /// Instances added.
    pub placed: u32,
}

impl std::ops::AddAssign for PlacementStats {
    fn add_assign(&mut self, rhs: Self) {
        self.traces += rhs.traces;
        self.misses += rhs.misses;
        self.rejected += rhs.rejected;
        self.placed += rhs.placed;
    }
}

/// Borrowed collaborators for one placement run.
pub struct PlacementContext<'a> {
    /// Ray-cast oracle.
    pub tracer: &'a dyn RayCaster,
    /// Filter applied to every trace.
    pub filter: &'a TraceFilter,
    /// One instance backend per species, same order as the species list.
    pub pools: &'a mut [Box<dyn InstanceBackend>],
    /// Session random stream.
    pub rng: &'a mut FoliageRng,
}

/// Places foliage for committed tiles.
#[derive(Clone, Debug)]
pub struct FoliagePlacer {
    species: Vec<FoliageSpecies>,
    strategy: FoliageStrategy,
    scatter: ScatterSettings,
    rule: TerrainSeedRule,
}

impl FoliagePlacer {
    /// Creates a placer. Invalid species are skipped with a warning; the
    /// remaining ones keep their relative order.
    #[must_use]
    pub fn new(species: Vec<FoliageSpecies>, strategy: FoliageStrategy, scatter: ScatterSettings) -> Self {
        let species = species
            .into_iter()
            .filter(|s| match s.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Skipping foliage species: {}", e);
                    false
                }
            })
            .collect();

        Self {
            species,
            strategy,
            scatter,
            rule: TerrainSeedRule::default(),
        }
    }

    /// Accepted species, in pool order.
    #[must_use]
    pub fn species(&self) -> &[FoliageSpecies] {
        &self.species
    }

    /// Active strategy.
    #[must_use]
    pub fn strategy(&self) -> FoliageStrategy {
        self.strategy
    }

    /// Runs the configured passes over every vertex of a tile.
    pub fn populate_tile(&self, vertices: &[Vec3], ctx: &mut PlacementContext<'_>) -> PlacementStats {
        let mut stats = PlacementStats::default();
        for &vertex in vertices {
            if self.strategy.direct() {
                stats += self.direct_vertex(vertex, ctx);
            }
            if self.strategy.scatter() {
                stats += self.scatter_vertex(vertex, ctx);
            }
        }
        tracing::debug!(
            "Foliage pass over {} vertices: {} placed, {} rejected, {} misses",
            vertices.len(),
            stats.placed,
            stats.rejected,
            stats.misses
        );
        stats
    }

    /// Direct-vertex pass for one location.
    pub fn direct_vertex(&self, location: Vec3, ctx: &mut PlacementContext<'_>) -> PlacementStats {
        let mut stats = PlacementStats::default();
        for (index, species) in self.species.iter().enumerate() {
            if !species.height.contains(location.z) {
                continue;
            }
            if species.initial_seed_density < ctx.rng.frand_range(0.0, 10.0) {
                continue;
            }

            let steps = ctx.rng.rand_range(0, species.num_steps);
            let mut cluster_base = location;
            for _ in 0..steps {
                cluster_base += ctx.rng.unit_vector() * species.average_spread_distance;
                let seeds = ctx.rng.rand_range(0, species.seeds_per_step);
                for _ in 0..seeds {
                    let seed = cluster_base + ctx.rng.unit_vector() * species.spread_variance;
                    let hit = trace_vertical(seed, SEED_TRACE_HALF_HEIGHT, ctx, &mut stats);
                    if let Some(hit) = hit {
                        self.place(&self.rule, index, &hit, ctx, &mut stats);
                    }
                }
            }
        }
        stats
    }

    /// Scatter pass for one location.
    pub fn scatter_vertex(&self, location: Vec3, ctx: &mut PlacementContext<'_>) -> PlacementStats {
        let mut stats = PlacementStats::default();
        for (index, species) in self.species.iter().enumerate() {
            if !species.height.contains(location.z) {
                continue;
            }
            if ctx.rng.frand_range(0.0, 100.0) >= self.scatter.growth_probability_percentage {
                continue;
            }

            let target = location + self.randomise_offset(ctx.rng);
            let hit = trace_vertical(target, SCATTER_TRACE_HALF_HEIGHT, ctx, &mut stats);
            if let Some(hit) = hit {
                self.place(&self.rule, index, &hit, ctx, &mut stats);
            }
        }
        stats
    }

    /// Applies `rule` to `hit` for every species.
    pub fn place_on_hit(&self, rule: &dyn PlacementRule, hit: &TraceHit, ctx: &mut PlacementContext<'_>) -> PlacementStats {
        let mut stats = PlacementStats::default();
        for index in 0..self.species.len() {
            self.place(rule, index, hit, ctx, &mut stats);
        }
        stats
    }

    /// Re-applies every instance transform so backends refresh their state.
    pub fn refresh(pools: &mut [Box<dyn InstanceBackend>]) {
        for pool in pools.iter_mut() {
            for id in pool.instance_ids() {
                if let Some(transform) = pool.instance_transform(id) {
                    pool.update_instance_transform(id, transform);
                }
            }
        }
    }

    fn randomise_offset(&self, rng: &mut FoliageRng) -> Vec3 {
        let base = self.scatter.instance_offset;
        let var = self.scatter.instance_offset_variation;
        Vec3::new(
            base + rng.frand_range(-var, var),
            base + rng.frand_range(-var, var),
            base + rng.frand_range(-var, var),
        )
    }

    fn place(
        &self,
        rule: &dyn PlacementRule,
        index: usize,
        hit: &TraceHit,
        ctx: &mut PlacementContext<'_>,
        stats: &mut PlacementStats,
    ) {
        let species = &self.species[index];
        match rule.evaluate(species, hit, ctx.rng) {
            PlacementDecision::Place(transform) => {
                if let Some(pool) = ctx.pools.get_mut(index) {
                    pool.add_instance(transform);
                    stats.placed += 1;
                } else {
                    tracing::warn!("No instance pool for species '{}'", species.name);
                }
            }
            PlacementDecision::Reject(reason) => {
                tracing::trace!("'{}' rejected at {:?}: {:?}", species.name, hit.location, reason);
                stats.rejected += 1;
            }
        }
    }
}

fn trace_vertical(
    location: Vec3,
    half_height: f32,
    ctx: &PlacementContext<'_>,
    stats: &mut PlacementStats,
) -> Option<TraceHit> {
    stats.traces += 1;
    let start = location + Vec3::new(0.0, 0.0, half_height);
    let end = location - Vec3::new(0.0, 0.0, half_height);
    let hit = ctx.tracer.trace(start, end, ctx.filter);
    if hit.is_none() {
        stats.misses += 1;
    }
    hit
}
