//! # World Frame Controller
//!
//! Drives streaming once per tick. Steps run in this order:
//!
//! ```text
//! (a) player cell      round(position / tile span)
//! (b) evict            tiles outside ±cell_count/2 on either axis
//! (c) enqueue          missing tiles in the window, LOD by ring
//! (d) commit           finished mesh -> section -> foliage; schedule next
//! (e) grid spawner     retire cells that left its window, populate new ones
//! (f) relocate         sea and props back to the player
//! (g) retire           one bulk removal per species
//! (h) navigation       rebuild, every tick
//! ```
//!
//! ## Ordering
//!
//! - A section's foliage is marked for retirement before the section is
//!   cleared: the bounding box comes from the section's vertices.
//! - The forced-removal entry of the generation target is drained before
//!   its new mesh is committed.
//! - Ray misses skip the tile for this tick; the next tick tries again.
//! - Ground traces span the player's Z ± the trace distance, widened to
//!   the terrain's vertical extent so high players still find valleys.

use terragen_procedural::TileMesh;
use terragen_shared::{GridCoord, Vec2, Vec3};

use crate::collaborators::{
    ComponentId, MeshBackend, MeshSectionId, NavigationRebuilder, RayCaster, TraceFilter,
};
use crate::error::WorldResult;
use crate::foliage::{
    tile_retirement_bounds, FoliagePlacer, GridSpawnReport, PlacementContext, PlacementStats,
};
use crate::pipeline::GeneratedTile;
use crate::state::{FollowerKind, WorldState};
use crate::tile_cache::SlotAllocation;

/// Engine services borrowed for one tick.
pub struct TickServices<'a> {
    /// Physics ray casts.
    pub tracer: &'a dyn RayCaster,
    /// Mesh submission.
    pub mesh: &'a mut dyn MeshBackend,
    /// Navigation rebuilds.
    pub navigation: &'a mut dyn NavigationRebuilder,
}

/// A tile drawn during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommittedTile {
    /// Tile coordinate.
    pub coord: GridCoord,
    /// LOD it was drawn at.
    pub lod: u32,
    /// Section it was drawn into.
    pub allocation: SlotAllocation,
}

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Player tile.
    pub player_cell: GridCoord,
    /// Tiles forgotten this tick.
    pub evicted: Vec<GridCoord>,
    /// Far tiles kept because the ground trace missed.
    pub eviction_skipped: u32,
    /// Newly tracked tiles.
    pub enqueued: u32,
    /// Window tiles skipped because the ground trace missed.
    pub ground_misses: u32,
    /// Drawn tiles scheduled for a new LOD.
    pub lod_changes: u32,
    /// Tile drawn this tick.
    pub committed: Option<CommittedTile>,
    /// Finished tile dropped because it was no longer queued.
    pub discarded: Option<GridCoord>,
    /// Tile handed to the worker this tick.
    pub submitted: Option<GridCoord>,
    /// Foliage placed on the committed tile.
    pub foliage: PlacementStats,
    /// Grid-trace spawner activity, when it is enabled.
    pub grid: Option<GridSpawnReport>,
    /// Followers moved.
    pub relocated: u32,
    /// Foliage instances removed.
    pub retired: usize,
}

/// Per-tick streaming driver.
#[derive(Clone, Debug)]
pub struct WorldController {
    filter: TraceFilter,
    ticks: u64,
}

impl Default for WorldController {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldController {
    /// Controller whose ground traces ignore the sea.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: TraceFilter::new().ignoring(ComponentId::SEA),
            ticks: 0,
        }
    }

    /// Ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick, collecting a finished tile only if it is ready.
    ///
    /// # Errors
    ///
    /// Pipeline-contract failures (`WorkerDisconnected`).
    pub fn tick(&mut self, state: &mut WorldState, player: Vec3, services: &mut TickServices<'_>) -> WorldResult<TickReport> {
        self.run(state, player, services, false)
    }

    /// Runs one tick, blocking until the in-flight tile (if any) is done.
    ///
    /// # Errors
    ///
    /// As `tick`.
    pub fn tick_blocking(
        &mut self,
        state: &mut WorldState,
        player: Vec3,
        services: &mut TickServices<'_>,
    ) -> WorldResult<TickReport> {
        self.run(state, player, services, true)
    }

    fn run(
        &mut self,
        state: &mut WorldState,
        player: Vec3,
        services: &mut TickServices<'_>,
        blocking: bool,
    ) -> WorldResult<TickReport> {
        self.ticks += 1;
        state.player_position = player;

        let player_cell = GridCoord::from_world_rounded(player.xy(), state.tile_span());
        let mut report = TickReport {
            player_cell,
            ..TickReport::default()
        };

        self.evict_far_tiles(state, player, player_cell, services, &mut report);
        self.enqueue_window(state, player, player_cell, services.tracer, &mut report);

        let finished = if blocking { state.pipeline.wait()? } else { state.pipeline.poll()? };
        if let Some(tile) = finished {
            self.commit(state, player, tile, services, &mut report);
        }
        if !state.pipeline.is_busy() {
            if let Some(target) = state.cache.closest_queued(player.xy()) {
                let lod = state.cache.get(target).map_or(1, |slot| slot.lod);
                state.pipeline.submit(target, lod, &mut state.cache)?;
                report.submitted = Some(target);
            }
        }

        report.grid = run_grid_spawner(state, player, services.tracer, &self.filter);
        report.relocated = relocate_followers(state, player);
        report.retired = state.retirement.flush(&mut state.pools);
        services.navigation.rebuild();

        if !report.evicted.is_empty() || report.committed.is_some() {
            tracing::debug!(
                "Tick {}: cell ({}, {}), {} evicted, {} enqueued, committed {:?}",
                self.ticks,
                player_cell.x,
                player_cell.y,
                report.evicted.len(),
                report.enqueued,
                report.committed.map(|c| c.coord)
            );
        }
        Ok(report)
    }

    fn ground_trace(&self, state: &WorldState, tracer: &dyn RayCaster, coord: GridCoord, player_z: f32) -> bool {
        let center = state.cache.tile_center(coord);
        let reach = state.config.streaming.ground_trace_distance;
        let extent = state.layout.params.vertical_extent();
        let start = Vec3::from_xy(center, (player_z + reach).max(extent + reach));
        let end = Vec3::from_xy(center, (player_z - reach).min(-extent - reach));
        tracer.trace(start, end, &self.filter).is_some()
    }

    fn evict_far_tiles(
        &self,
        state: &mut WorldState,
        player: Vec3,
        player_cell: GridCoord,
        services: &mut TickServices<'_>,
        report: &mut TickReport,
    ) {
        let half = state.config.streaming.half_window();
        let far: Vec<GridCoord> = state
            .cache
            .iter()
            .map(|(coord, _)| coord)
            .filter(|c| (c.x - player_cell.x).abs() > half || (c.y - player_cell.y).abs() > half)
            .collect();

        for coord in far {
            if !self.ground_trace(state, services.tracer, coord, player.z) {
                tracing::debug!("No ground under far tile ({}, {}), kept", coord.x, coord.y);
                report.eviction_skipped += 1;
                continue;
            }
            for section in state.cache.evict(coord) {
                retire_section(state, services.mesh, section);
            }
            tracing::debug!("Evicted tile ({}, {})", coord.x, coord.y);
            report.evicted.push(coord);
        }
    }

    fn enqueue_window(
        &self,
        state: &mut WorldState,
        player: Vec3,
        player_cell: GridCoord,
        tracer: &dyn RayCaster,
        report: &mut TickReport,
    ) {
        let half = state.config.streaming.half_window();
        for dy in -half..=half {
            for dx in -half..=half {
                let coord = player_cell.offset(dx, dy);
                let ring = dx.unsigned_abs().max(dy.unsigned_abs());
                let lod = state.config.streaming.lod_for_ring(ring);

                match state.cache.get(coord) {
                    Some(slot) if slot.is_assigned() => {
                        if slot.lod != lod && state.cache.request_lod_change(coord, lod) {
                            report.lod_changes += 1;
                        }
                    }
                    Some(_) => {
                        state.cache.enqueue(coord, lod);
                    }
                    None => {
                        if self.ground_trace(state, tracer, coord, player.z) {
                            state.cache.enqueue(coord, lod);
                            report.enqueued += 1;
                        } else {
                            report.ground_misses += 1;
                        }
                    }
                }
            }
        }
    }

    fn commit(
        &self,
        state: &mut WorldState,
        player: Vec3,
        tile: GeneratedTile,
        services: &mut TickServices<'_>,
        report: &mut TickReport,
    ) {
        let coord = tile.coord;
        if state.cache.get(coord).map_or(true, |slot| slot.is_assigned()) {
            tracing::debug!("Discarding stale tile ({}, {})", coord.x, coord.y);
            report.discarded = Some(coord);
            return;
        }

        if let Some(section) = state.cache.drain_forced_removal(coord).and_then(|slot| slot.section) {
            retire_section(state, services.mesh, section);
        }

        let allocation = state.cache.allocate_or_reuse(coord, tile.lod, player.xy());
        if let SlotAllocation::Reused { section, .. } = allocation {
            retire_section(state, services.mesh, section);
        }

        let section = allocation.section();
        services.mesh.create_section(section, &tile.mesh, true);
        report.foliage = populate(state, services.tracer, &self.filter, &tile.mesh);
        report.committed = Some(CommittedTile {
            coord,
            lod: tile.lod,
            allocation,
        });
    }
}

/// Marks a section's foliage for retirement, then clears the section.
fn retire_section(state: &mut WorldState, mesh: &mut dyn MeshBackend, section: MeshSectionId) {
    let extent = state.layout.params.vertical_extent();
    if let Some(bounds) = mesh.section_vertices(section).and_then(|v| tile_retirement_bounds(v, extent)) {
        state.retirement.mark_region(&bounds, &state.pools);
    }
    mesh.clear_section(section);
}

fn populate(state: &mut WorldState, tracer: &dyn RayCaster, filter: &TraceFilter, mesh: &TileMesh) -> PlacementStats {
    if state.pools.is_empty() {
        return PlacementStats::default();
    }
    let mut ctx = PlacementContext {
        tracer,
        filter,
        pools: &mut state.pools,
        rng: &mut state.rng,
    };
    let stats = state.placer.populate_tile(&mesh.vertices, &mut ctx);
    FoliagePlacer::refresh(&mut state.pools);
    stats
}

fn run_grid_spawner(
    state: &mut WorldState,
    player: Vec3,
    tracer: &dyn RayCaster,
    filter: &TraceFilter,
) -> Option<GridSpawnReport> {
    let spawner = state.grid_spawner.as_mut()?;
    let mut ctx = PlacementContext {
        tracer,
        filter,
        pools: &mut state.pools,
        rng: &mut state.rng,
    };
    let report = spawner.update(player, &state.placer, &mut ctx, &mut state.retirement);
    if report.placement.placed > 0 {
        FoliagePlacer::refresh(&mut state.pools);
    }
    Some(report)
}

fn relocate_followers(state: &mut WorldState, player: Vec3) -> u32 {
    let threshold = state.config.streaming.relocate_distance;
    let sea_level = state.config.sea.level;
    let mut moved = 0;
    for follower in &mut state.followers {
        if follower.position.distance_2d(player) <= threshold {
            continue;
        }
        let z = match follower.kind {
            FollowerKind::Sea => sea_level,
            FollowerKind::Prop => follower.position.z,
        };
        follower.position = Vec3::from_xy(Vec2::new(player.x, player.y), z);
        moved += 1;
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MeshSections;
    use crate::collaborators::TraceHit;
    use crate::config::TerrainConfig;
    use terragen_procedural::MemoryLayoutStore;

    struct CountingNav(u32);

    impl NavigationRebuilder for CountingNav {
        fn rebuild(&mut self) {
            self.0 += 1;
        }
    }

    /// Hits nothing.
    struct Void;

    impl RayCaster for Void {
        fn trace(&self, _start: Vec3, _end: Vec3, _filter: &TraceFilter) -> Option<TraceHit> {
            None
        }
    }

    fn small_config() -> TerrainConfig {
        let mut config = TerrainConfig::default();
        config.grid.x_vertex_count = 6;
        config.grid.y_vertex_count = 6;
        config.grid.cell_size = 100.0;
        config.grid.replaceable_distance = Some(5000.0);
        config.streaming.relocate_distance = 1000.0;
        config.foliage.seed = Some(1);
        config
    }

    #[test]
    fn test_no_ground_enqueues_nothing() {
        let mut state = WorldState::new(small_config(), &MemoryLayoutStore::new()).expect("state");
        let mut mesh = MeshSections::new();
        let mut nav = CountingNav(0);
        let mut controller = WorldController::new();
        let report = controller
            .tick(
                &mut state,
                Vec3::ZERO,
                &mut TickServices {
                    tracer: &Void,
                    mesh: &mut mesh,
                    navigation: &mut nav,
                },
            )
            .expect("tick");
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.ground_misses, 25);
        assert!(report.submitted.is_none());
        assert_eq!(nav.0, 1, "navigation rebuilds every tick");
    }

    #[test]
    fn test_followers_relocate() {
        let mut state = WorldState::new(small_config(), &MemoryLayoutStore::new()).expect("state");
        let prop = state.add_prop(Vec3::new(0.0, 0.0, 77.0));
        let player = Vec3::new(5000.0, 0.0, 400.0);

        assert_eq!(relocate_followers(&mut state, player), 2);
        assert_eq!(state.followers[0].position, Vec3::new(5000.0, 0.0, 0.0), "sea forced to sea level");
        assert_eq!(state.followers[prop].position, Vec3::new(5000.0, 0.0, 77.0), "props keep their height");
        assert_eq!(relocate_followers(&mut state, player), 0);
    }
}
