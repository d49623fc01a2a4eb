//! # Foliage
//!
//! Procedural vegetation on committed tiles.
//!
//! - `species`: per-species rule sets
//! - `random`: the session's seeded stream
//! - `rules`: placement-rule interface and its variants
//! - `placement`: direct-vertex and scatter passes
//! - `instances`: headless instanced backend
//! - `retirement`: bulk removal of foliage on evicted tiles
//! - `grid_spawner`: foliage streamed on a cell grid of its own

pub mod grid_spawner;
pub mod instances;
pub mod placement;
pub mod random;
pub mod retirement;
pub mod rules;
pub mod species;

pub use grid_spawner::{GridSpawnReport, GridSpawner};
pub use instances::InstanceBuffer;
pub use placement::{
    FoliagePlacer, FoliageStrategy, PlacementContext, PlacementStats, ScatterSettings,
    SCATTER_TRACE_HALF_HEIGHT, SEED_TRACE_HALF_HEIGHT,
};
pub use random::FoliageRng;
pub use retirement::{tile_retirement_bounds, RetirementPool};
pub use rules::{GridTraceRule, PlacementDecision, PlacementRule, RejectReason, TerrainSeedRule};
pub use species::{FloatRange, FoliageSpecies};
