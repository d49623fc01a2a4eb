//! # TERRAGEN World
//!
//! The streaming half of TERRAGEN: keeps a window of terrain tiles around a
//! moving player, grows foliage on them and places the player and goals.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── update loop (single writer) ────────────────────────┐
//! │                                                                             │
//! │  WorldController::tick ─► TileCache ─► GenerationPipeline ──┐               │
//! │          │                    ▲                             │ bounded(1)    │
//! │          │                    └── commit ◄── GeneratedTile ◄┘               │
//! │          ▼                                                                  │
//! │  FoliagePlacer ─► InstanceBackend ◄─ RetirementPool                         │
//! │  GridSpawner ──┘                                                            │
//! │                                                                             │
//! │  SpawnOrchestrator ─► ActorFactory / Possession / PathOracle                │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!                     terragen-mesh worker: TileMeshBuilder::build
//! ```
//!
//! ## Core Components
//!
//! - `WorldState`: everything the session mutates
//! - `WorldController`: per-tick eviction, enqueueing, commit and relocation
//! - `TileCache`: resident tiles and their mesh sections
//! - `GenerationPipeline`: one background mesh worker, one job in flight
//! - `foliage`: species, placement passes, instance pools, retirement,
//!   grid-trace spawner
//! - `SpawnOrchestrator`: player, goals, health pickups, companion
//!
//! ## Example
//!
//! ```rust,ignore
//! use terragen_procedural::MemoryLayoutStore;
//! use terragen_world::{MeshSections, NoNavigation, TerrainConfig, TickServices, WorldController, WorldState};
//!
//! let mut state = WorldState::new(TerrainConfig::default(), &MemoryLayoutStore::new())?;
//! let tracer = state.tracer();
//! let mut mesh = MeshSections::new();
//! let mut nav = NoNavigation;
//! let mut controller = WorldController::new();
//!
//! let report = controller.tick(
//!     &mut state,
//!     player_position,
//!     &mut TickServices { tracer: &tracer, mesh: &mut mesh, navigation: &mut nav },
//! )?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod backends;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod foliage;
pub mod pipeline;
pub mod spawn;
pub mod state;
pub mod tile_cache;

pub use backends::{HeightFieldTracer, MeshSections};
pub use collaborators::{
    ActorHandle, ComponentId, InstanceBackend, InstanceId, MeshBackend, MeshSectionId,
    NavigationRebuilder, NoNavigation, OpenTerrain, PathOracle, Possession, RayCaster,
    SurfaceType, TraceFilter, TraceHit,
};
pub use config::{
    FoliageConfig, GridConfig, GridSpawnerConfig, HeightFieldConfig, SeaConfig, SpawnConfig,
    StreamingConfig, TerrainConfig,
};
pub use controller::{CommittedTile, TickReport, TickServices, WorldController};
pub use error::{WorldError, WorldResult};
pub use pipeline::{GeneratedTile, GenerationPipeline};
pub use spawn::{
    ActorFactory, ActorKind, PlayerSpawn, SpawnFn, SpawnOrchestrator, SpawnReport, SpawnServices,
};
pub use state::{Follower, FollowerKind, WorldState};
pub use tile_cache::{SlotAllocation, TileCache, TileSlot};
