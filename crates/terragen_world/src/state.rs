//! # World State
//!
//! Everything the session mutates, owned in one place and handed to the
//! controller and the spawn orchestrator by reference. Built at session
//! start, dropped at session end; dropping it stops the mesh worker.

use std::sync::Arc;

use terragen_procedural::{resolve_layout, save_layout, HeightField, LayoutStore, SavedLayout};
use terragen_shared::{Vec2, Vec3};

use crate::backends::HeightFieldTracer;
use crate::collaborators::InstanceBackend;
use crate::config::TerrainConfig;
use crate::error::WorldResult;
use crate::foliage::{FoliagePlacer, FoliageRng, GridSpawner, InstanceBuffer, RetirementPool};
use crate::pipeline::GenerationPipeline;
use crate::tile_cache::TileCache;

/// What a follower is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowerKind {
    /// Sea plane; forced to sea level when relocated.
    Sea,
    /// Movable prop; keeps its height when relocated.
    Prop,
}

/// Actor that stays near the player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Follower {
    /// Relocation rule.
    pub kind: FollowerKind,
    /// Current position.
    pub position: Vec3,
    /// Uniform scale.
    pub scale: f32,
}

/// Mutable session state.
pub struct WorldState {
    /// Session configuration.
    pub config: TerrainConfig,
    /// Height-field parameters in use.
    pub layout: SavedLayout,
    /// Resident tiles.
    pub cache: TileCache,
    /// Background mesh generation.
    pub pipeline: GenerationPipeline,
    /// Foliage passes.
    pub placer: FoliagePlacer,
    /// One instance backend per accepted species.
    pub pools: Vec<Box<dyn InstanceBackend>>,
    /// Grid-trace spawner, when enabled.
    pub grid_spawner: Option<GridSpawner>,
    /// Instances waiting for bulk removal.
    pub retirement: RetirementPool,
    /// Session random stream.
    pub rng: FoliageRng,
    /// Sea and props following the player.
    pub followers: Vec<Follower>,
    /// Last known player position.
    pub player_position: Vec3,
}

impl WorldState {
    /// Builds a session with headless instance buffers.
    ///
    /// # Errors
    ///
    /// Invalid configuration, layout storage failures or a worker that
    /// cannot be started.
    pub fn new(config: TerrainConfig, store: &dyn LayoutStore) -> WorldResult<Self> {
        Self::with_pools(config, store, |_| Box::new(InstanceBuffer::new()))
    }

    /// Builds a session, creating each species' instance backend with
    /// `make_pool(species_index)`.
    ///
    /// # Errors
    ///
    /// As `new`.
    pub fn with_pools(
        config: TerrainConfig,
        store: &dyn LayoutStore,
        mut make_pool: impl FnMut(usize) -> Box<dyn InstanceBackend>,
    ) -> WorldResult<Self> {
        config.validate()?;

        let mut rng = config.foliage.rng();
        let layout = resolve_layout(
            config.height_field.layout,
            &config.height_field.params,
            store,
            rng.rng_mut(),
        )?;
        let field = Arc::new(HeightField::new(layout.params, config.height_field.flat_zone()));

        let builder = config.grid.builder()?;
        let cache = TileCache::new(builder.tile_span(), config.grid.replaceable_distance());
        let pipeline = GenerationPipeline::new(field, builder)?;

        let placer = FoliagePlacer::new(
            config.foliage.species.clone(),
            config.foliage.strategy,
            config.foliage.scatter_settings(),
        );
        let pools = (0..placer.species().len()).map(&mut make_pool).collect();
        let grid_spawner = config.grid_spawner.enabled.then(|| GridSpawner::new(config.grid_spawner));

        let mut followers = Vec::new();
        if config.sea.enabled {
            followers.push(Follower {
                kind: FollowerKind::Sea,
                position: Vec3::new(0.0, 0.0, config.sea.level),
                scale: config.sea.scale,
            });
        }

        let player_position = layout.player_position.unwrap_or(Vec3::ZERO);

        tracing::info!(
            "World session started: {} species, foliage seed {}, grid spawner {}, replaceable distance {}",
            placer.species().len(),
            rng.seed(),
            if grid_spawner.is_some() { "on" } else { "off" },
            cache.replaceable_distance()
        );

        Ok(Self {
            config,
            layout,
            cache,
            pipeline,
            placer,
            pools,
            grid_spawner,
            retirement: RetirementPool::new(),
            rng,
            followers,
            player_position,
        })
    }

    /// Height field shared with the worker.
    #[must_use]
    pub fn field(&self) -> &Arc<HeightField> {
        self.pipeline.field()
    }

    /// Distance between neighbouring tile origins.
    #[must_use]
    pub fn tile_span(&self) -> Vec2 {
        self.pipeline.builder().tile_span()
    }

    /// Headless ray caster over this session's terrain and sea.
    #[must_use]
    pub fn tracer(&self) -> HeightFieldTracer {
        let tracer = HeightFieldTracer::new(Arc::clone(self.field()));
        if self.config.sea.enabled {
            tracer.with_sea(self.config.sea.level)
        } else {
            tracer
        }
    }

    /// Adds a prop that follows the player. Returns its follower index.
    pub fn add_prop(&mut self, position: Vec3) -> usize {
        self.followers.push(Follower {
            kind: FollowerKind::Prop,
            position,
            scale: 1.0,
        });
        self.followers.len() - 1
    }

    /// Live foliage instances over every species.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.pools.iter().map(|p| p.instance_count()).sum()
    }

    /// Persists the current layout and player position.
    ///
    /// # Errors
    ///
    /// Encoding or storage failures.
    pub fn save_layout(&mut self, store: &dyn LayoutStore) -> WorldResult<()> {
        self.layout.player_position = Some(self.player_position);
        save_layout(store, &self.layout)?;
        tracing::info!("Terrain layout saved at player position {:?}", self.player_position);
        Ok(())
    }
}

impl std::fmt::Debug for WorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldState")
            .field("layout", &self.layout)
            .field("cache", &self.cache)
            .field("pipeline", &self.pipeline)
            .field("species", &self.placer.species().len())
            .field("grid_spawner", &self.grid_spawner.as_ref().map(GridSpawner::spawned_count))
            .field("followers", &self.followers)
            .field("player_position", &self.player_position)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terragen_procedural::{load_layout, HeightFieldParams, LayoutSource, MemoryLayoutStore};

    fn config() -> TerrainConfig {
        let mut config = TerrainConfig::default();
        config.foliage.seed = Some(3);
        config
    }

    #[test]
    fn test_new_session_defaults() {
        let state = WorldState::new(config(), &MemoryLayoutStore::new()).expect("state");
        assert_eq!(state.layout.params, HeightFieldParams::default());
        assert_eq!(state.followers.len(), 1);
        assert_eq!(state.followers[0].kind, FollowerKind::Sea);
        assert_eq!(state.followers[0].scale, 4000.0);
        assert!(state.pools.is_empty());
        assert!(state.cache.is_empty());
        assert!(state.grid_spawner.is_none());
    }

    #[test]
    fn test_saved_layout_restores_player() {
        let store = MemoryLayoutStore::new();
        let mut first = WorldState::new(config(), &store).expect("state");
        first.player_position = Vec3::new(100.0, 200.0, 300.0);
        first.save_layout(&store).expect("save");
        assert!(load_layout(&store).expect("load").is_some());

        let mut config = config();
        config.height_field.layout = LayoutSource::Saved;
        let second = WorldState::new(config, &store).expect("state");
        assert_eq!(second.player_position, Vec3::new(100.0, 200.0, 300.0));
        assert_eq!(second.layout.params, first.layout.params);
    }

    #[test]
    fn test_grid_spawner_enabled() {
        let mut config = config();
        config.grid_spawner.enabled = true;
        config.grid_spawner.cell_size = 1000.0;
        let state = WorldState::new(config, &MemoryLayoutStore::new()).expect("state");
        let spawner = state.grid_spawner.as_ref().expect("enabled");
        assert_eq!(spawner.config().cell_size, 1000.0);
        assert_eq!(spawner.spawned_count(), 0);
    }

    #[test]
    fn test_sea_disabled() {
        let mut config = config();
        config.sea.enabled = false;
        let mut state = WorldState::new(config, &MemoryLayoutStore::new()).expect("state");
        assert!(state.followers.is_empty());
        assert_eq!(state.add_prop(Vec3::new(1.0, 2.0, 3.0)), 0);
    }
}
