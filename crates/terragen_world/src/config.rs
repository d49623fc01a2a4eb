//! # World Configuration
//!
//! Every tunable of the streaming world, loadable from TOML. Each section
//! falls back to its defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [grid]
//! x_vertex_count = 20
//! cell_size = 2000.0
//!
//! [streaming]
//! cell_count = 4
//!
//! [[foliage.species]]
//! name = "grass"
//! height = { min = 250.0, max = 1500.0 }
//!
//! [grid_spawner]
//! enabled = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use terragen_procedural::{FlatZone, HeightFieldParams, LayoutSource, TileMeshBuilder};
use terragen_shared::Vec3;

use crate::collaborators::SurfaceType;
use crate::error::{WorldError, WorldResult};
use crate::foliage::{FoliageRng, FoliageSpecies, FoliageStrategy, ScatterSettings};

/// Tile grid dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Full-detail vertices per tile along X.
    pub x_vertex_count: u32,
    /// Full-detail vertices per tile along Y.
    pub y_vertex_count: u32,
    /// Spacing between full-detail vertices.
    pub cell_size: f32,
    /// Sections along X used to size the replacement threshold.
    pub sections_x: u32,
    /// Sections along Y used to size the replacement threshold.
    pub sections_y: u32,
    /// Overrides the derived replacement threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaceable_distance: Option<f32>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            x_vertex_count: 20,
            y_vertex_count: 20,
            cell_size: 2000.0,
            sections_x: 2,
            sections_y: 2,
            replaceable_distance: None,
        }
    }
}

impl GridConfig {
    /// Distance beyond which a drawn tile may give up its section.
    ///
    /// `cell_size * (sections_x + sections_y) / 2 * (x + y)` unless
    /// overridden.
    #[must_use]
    pub fn replaceable_distance(&self) -> f32 {
        self.replaceable_distance.unwrap_or_else(|| {
            self.cell_size * (self.sections_x + self.sections_y) as f32 / 2.0
                * (self.x_vertex_count + self.y_vertex_count) as f32
        })
    }

    /// Mesh builder for this grid.
    ///
    /// # Errors
    ///
    /// Propagates the builder's parameter checks.
    pub fn builder(&self) -> WorldResult<TileMeshBuilder> {
        Ok(TileMeshBuilder::new(self.x_vertex_count, self.y_vertex_count, self.cell_size)?)
    }
}

/// Height-field setup.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightFieldConfig {
    /// Radius of the flat spawn zone.
    pub flat_radius: f32,
    /// Height of the flat spawn zone.
    pub flat_height: f32,
    /// Blend band outside the flat zone.
    pub transition_width: f32,
    /// Noise parameters for `custom`, `randomized` and the `saved` fallback.
    pub params: HeightFieldParams,
    /// Where the session's parameters come from.
    pub layout: LayoutSource,
}

impl Default for HeightFieldConfig {
    fn default() -> Self {
        let flat = FlatZone::default();
        Self {
            flat_radius: flat.radius,
            flat_height: flat.height,
            transition_width: flat.transition_width,
            params: HeightFieldParams::default(),
            layout: LayoutSource::Default,
        }
    }
}

impl HeightFieldConfig {
    /// Flat-zone settings.
    #[must_use]
    pub fn flat_zone(&self) -> FlatZone {
        FlatZone {
            radius: self.flat_radius,
            height: self.flat_height,
            transition_width: self.transition_width,
        }
    }
}

/// Streaming window around the player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Window width in tiles; tiles within `cell_count / 2` stay resident.
    pub cell_count: u32,
    /// Half-height of the ground traces around the player's Z; the span
    /// always covers the terrain's vertical extent.
    pub ground_trace_distance: f32,
    /// Rings (Chebyshev distance in tiles) kept at full detail.
    pub full_detail_radius: u32,
    /// Coarsest LOD factor.
    pub max_lod: u32,
    /// Followers farther than this (2D) snap back to the player.
    pub relocate_distance: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cell_count: 4,
            ground_trace_distance: 5000.0,
            full_detail_radius: 1,
            max_lod: 4,
            relocate_distance: 10_000.0,
        }
    }
}

impl StreamingConfig {
    /// Resident half-window in tiles.
    #[inline]
    #[must_use]
    pub fn half_window(&self) -> i32 {
        (self.cell_count / 2) as i32
    }

    /// LOD factor for a tile `ring` tiles away from the player's tile.
    ///
    /// Full detail up to `full_detail_radius`, then one step coarser per
    /// ring, capped at `max_lod`.
    #[must_use]
    pub fn lod_for_ring(&self, ring: u32) -> u32 {
        let max_lod = self.max_lod.max(1);
        if ring <= self.full_detail_radius {
            1
        } else {
            (1 + ring - self.full_detail_radius).min(max_lod)
        }
    }
}

/// Sea plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeaConfig {
    /// Whether the sea follows the player.
    pub enabled: bool,
    /// Height of the sea plane.
    pub level: f32,
    /// Uniform scale of the sea plane.
    pub scale: f32,
}

impl Default for SeaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 0.0,
            scale: 4000.0,
        }
    }
}

/// Foliage placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageConfig {
    /// Which vertex passes run.
    pub strategy: FoliageStrategy,
    /// Scatter chance per vertex and species, in percent.
    pub growth_probability_percentage: f32,
    /// Scatter base offset.
    pub instance_offset: f32,
    /// Scatter offset variation.
    pub instance_offset_variation: f32,
    /// Fixed stream seed; a fresh session seed is drawn when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Species, in instance-pool order.
    pub species: Vec<FoliageSpecies>,
}

impl Default for FoliageConfig {
    fn default() -> Self {
        let scatter = ScatterSettings::default();
        Self {
            strategy: FoliageStrategy::default(),
            growth_probability_percentage: scatter.growth_probability_percentage,
            instance_offset: scatter.instance_offset,
            instance_offset_variation: scatter.instance_offset_variation,
            seed: None,
            species: Vec::new(),
        }
    }
}

impl FoliageConfig {
    /// Scatter-pass settings.
    #[must_use]
    pub fn scatter_settings(&self) -> ScatterSettings {
        ScatterSettings {
            growth_probability_percentage: self.growth_probability_percentage,
            instance_offset: self.instance_offset,
            instance_offset_variation: self.instance_offset_variation,
        }
    }

    /// Random stream for this session.
    #[must_use]
    pub fn rng(&self) -> FoliageRng {
        self.seed.map_or_else(FoliageRng::from_session_seed, FoliageRng::new)
    }
}

/// Grid-trace foliage spawner, independent of terrain tiles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpawnerConfig {
    /// Runs the spawner every tick.
    pub enabled: bool,
    /// Edge length of a spawner cell.
    pub cell_size: f32,
    /// Spacing of the sample lattice inside a cell.
    pub sub_cell_size: f32,
    /// Random offset applied to each sample on X and Y.
    pub sub_cell_random_offset: f32,
    /// Window width in cells; cells within `cell_count / 2` stay populated.
    pub cell_count: u32,
    /// Half-height of every spawner trace.
    pub trace_distance: f32,
    /// Hits below this height place nothing.
    pub min_spawn_height: f32,
    /// Required surface type for placement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_surface: Option<SurfaceType>,
}

impl Default for GridSpawnerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cell_size: 5000.0,
            sub_cell_size: 500.0,
            sub_cell_random_offset: 200.0,
            cell_count: 4,
            trace_distance: 5000.0,
            min_spawn_height: 250.0,
            supported_surface: None,
        }
    }
}

impl GridSpawnerConfig {
    /// Populated half-window in cells.
    #[inline]
    #[must_use]
    pub fn half_window(&self) -> i32 {
        (self.cell_count / 2) as i32
    }
}

/// Player, goal and companion placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Attempts to find a player spawn point.
    pub player_tries: u32,
    /// Half-size of the square searched for the player.
    pub player_search_extent: f32,
    /// Player trace start height.
    pub player_trace_top: f32,
    /// Player trace end height.
    pub player_trace_bottom: f32,
    /// Lift above the hit for spawned actors.
    pub spawn_height_offset: f32,
    /// Player position when every attempt fails.
    pub fallback_position: Vec3,
    /// Lowest acceptable spawn height.
    pub min_height_above_terrain: f32,
    /// Steepest acceptable spawn slope, in degrees.
    pub max_slope: f32,
    /// Required surface type when the hit reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_surface: Option<SurfaceType>,
    /// Attempts per goal.
    pub goal_tries: u32,
    /// One goal per entry, at this distance from the player.
    pub goal_distances: Vec<f32>,
    /// Half-height of the goal traces.
    pub goal_trace_half_height: f32,
    /// Spawn a health pickup at every goal.
    pub health_pickups: bool,
    /// Spawn the companion next to the player.
    pub companion: bool,
    /// Companion distance in front of the player.
    pub companion_forward: f32,
    /// Companion distance to the player's right.
    pub companion_right: f32,
    /// Half-height of the companion trace.
    pub companion_trace_half_height: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            player_tries: 100,
            player_search_extent: 80_000.0,
            player_trace_top: 1500.0,
            player_trace_bottom: 500.0,
            spawn_height_offset: 100.0,
            fallback_position: Vec3::new(0.0, 0.0, 550.0),
            min_height_above_terrain: 250.0,
            max_slope: 45.0,
            supported_surface: None,
            goal_tries: 250,
            goal_distances: vec![2000.0, 2000.0, 2500.0],
            goal_trace_half_height: 500.0,
            health_pickups: true,
            companion: true,
            companion_forward: 600.0,
            companion_right: 150.0,
            companion_trace_half_height: 600.0,
        }
    }
}

/// Complete world configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Tile grid.
    pub grid: GridConfig,
    /// Height field.
    pub height_field: HeightFieldConfig,
    /// Streaming window.
    pub streaming: StreamingConfig,
    /// Sea plane.
    pub sea: SeaConfig,
    /// Foliage.
    pub foliage: FoliageConfig,
    /// Grid-trace foliage spawner.
    pub grid_spawner: GridSpawnerConfig,
    /// Spawning.
    pub spawn: SpawnConfig,
}

impl TerrainConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `ConfigParse` for malformed TOML, `InvalidConfig` for bad values.
    pub fn from_toml_str(text: &str) -> WorldResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| WorldError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> WorldResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded terrain configuration from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// Invalid foliage species are not rejected here; the placer skips
    /// them individually.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> WorldResult<()> {
        self.grid.builder()?;
        if self.grid.sections_x == 0 || self.grid.sections_y == 0 {
            return Err(WorldError::InvalidConfig("section counts must be >= 1".to_string()));
        }
        let replaceable = self.grid.replaceable_distance();
        if !(replaceable.is_finite() && replaceable > 0.0) {
            return Err(WorldError::InvalidConfig(format!(
                "replaceable distance must be positive, got {replaceable}"
            )));
        }

        self.height_field.flat_zone().validate()?;
        self.height_field.params.validate()?;

        let streaming = &self.streaming;
        if streaming.max_lod == 0 {
            return Err(WorldError::InvalidConfig("max_lod must be >= 1".to_string()));
        }
        if !(streaming.ground_trace_distance > 0.0 && streaming.relocate_distance >= 0.0) {
            return Err(WorldError::InvalidConfig(
                "trace and relocate distances must be positive".to_string(),
            ));
        }

        let foliage = &self.foliage;
        if !(0.0..=100.0).contains(&foliage.growth_probability_percentage) {
            return Err(WorldError::InvalidConfig(format!(
                "growth probability must be in [0, 100], got {}",
                foliage.growth_probability_percentage
            )));
        }
        if foliage.instance_offset_variation < 0.0 {
            return Err(WorldError::InvalidConfig("offset variation must be >= 0".to_string()));
        }

        let grid = &self.grid_spawner;
        if !(grid.cell_size > 0.0 && grid.sub_cell_size > 0.0 && grid.trace_distance > 0.0) {
            return Err(WorldError::InvalidConfig(
                "grid spawner sizes and trace distance must be positive".to_string(),
            ));
        }
        if grid.sub_cell_random_offset < 0.0 {
            return Err(WorldError::InvalidConfig("grid spawner offset must be >= 0".to_string()));
        }

        let spawn = &self.spawn;
        if spawn.player_trace_top <= spawn.player_trace_bottom {
            return Err(WorldError::InvalidConfig(
                "player trace must run downwards".to_string(),
            ));
        }
        if spawn.player_search_extent < 0.0 || spawn.goal_distances.iter().any(|d| *d < 0.0) {
            return Err(WorldError::InvalidConfig("spawn distances must be >= 0".to_string()));
        }

        Ok(())
    }
}
