//! # Goal/Spawn Orchestrator
//!
//! One-shot placement of the player, the goals, the health pickups and the
//! companion, by rejection sampling over ray casts.
//!
//! ## Budgets
//!
//! | Search  | Tries | Sample                           | On failure        |
//! |---------|-------|----------------------------------|-------------------|
//! | Player  | 100   | uniform point in ±80000 square   | fallback position |
//! | Goal    | 250   | random direction at fixed radius | goal skipped      |
//!
//! Actor types are resolved through an `ActorFactory` filled at startup.

use std::collections::HashMap;

use terragen_shared::{Quaternion, Transform, Vec3};

use crate::collaborators::{
    ActorHandle, ComponentId, PathOracle, Possession, RayCaster, TraceFilter, TraceHit,
};
use crate::config::SpawnConfig;
use crate::foliage::FoliageRng;

/// Spawnable actor kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorKind {
    /// The player character.
    Player,
    /// Companion that starts next to the player.
    Companion,
    /// Health item placed at goals.
    HealthPickup,
}

/// Spawns one actor kind. `None` if the engine refused the spawn.
pub type SpawnFn = Box<dyn FnMut(Transform) -> Option<ActorHandle>>;

/// Startup-registered spawn closures keyed by kind.
#[derive(Default)]
pub struct ActorFactory {
    spawners: HashMap<ActorKind, SpawnFn>,
}

impl ActorFactory {
    /// Empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the spawner for `kind`.
    pub fn register(&mut self, kind: ActorKind, spawn: impl FnMut(Transform) -> Option<ActorHandle> + 'static) {
        self.spawners.insert(kind, Box::new(spawn));
    }

    /// Whether `kind` can be spawned.
    #[must_use]
    pub fn is_registered(&self, kind: ActorKind) -> bool {
        self.spawners.contains_key(&kind)
    }

    /// Spawns `kind` at `transform`.
    pub fn spawn(&mut self, kind: ActorKind, transform: Transform) -> Option<ActorHandle> {
        let Some(spawn) = self.spawners.get_mut(&kind) else {
            tracing::warn!("No spawner registered for {:?}", kind);
            return None;
        };
        let handle = spawn(transform);
        if handle.is_none() {
            tracing::warn!("Failed to spawn {:?} at {:?}", kind, transform.position);
        }
        handle
    }
}

impl std::fmt::Debug for ActorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorFactory")
            .field("kinds", &self.spawners.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collaborators borrowed for a spawn pass.
pub struct SpawnServices<'a> {
    /// Physics ray casts.
    pub tracer: &'a dyn RayCaster,
    /// Reachability checks for goals.
    pub paths: &'a dyn PathOracle,
    /// Actor spawning.
    pub factory: &'a mut ActorFactory,
    /// Player possession.
    pub possession: &'a mut dyn Possession,
}

/// Player spawn point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerSpawn {
    /// Where the player goes.
    pub position: Vec3,
    /// True when every attempt failed.
    pub used_fallback: bool,
    /// Attempts made.
    pub attempts: u32,
}

/// Result of the session spawn pass.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnReport {
    /// The possessed player.
    pub player: ActorHandle,
    /// Player spawn point.
    pub player_spawn: PlayerSpawn,
    /// Goal positions, one per configured distance; `None` when skipped.
    pub goals: Vec<Option<Vec3>>,
    /// Spawned health pickups.
    pub health_pickups: Vec<ActorHandle>,
    /// Spawned companion.
    pub companion: Option<ActorHandle>,
}

/// Places the player and goals once per session.
#[derive(Clone, Debug)]
pub struct SpawnOrchestrator {
    config: SpawnConfig,
    filter: TraceFilter,
    player_spawned: bool,
}

impl SpawnOrchestrator {
    /// Orchestrator whose traces ignore the sea.
    #[must_use]
    pub fn new(config: SpawnConfig) -> Self {
        Self {
            config,
            filter: TraceFilter::new().ignoring(ComponentId::SEA),
            player_spawned: false,
        }
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Whether the session's player has been spawned.
    #[must_use]
    pub fn player_spawned(&self) -> bool {
        self.player_spawned
    }

    /// Terrain component, supported surface, minimum height, maximum slope.
    #[must_use]
    pub fn is_location_suitable(&self, hit: &TraceHit) -> bool {
        if hit.component != ComponentId::TERRAIN {
            return false;
        }
        if let (Some(expected), Some(actual)) = (self.config.supported_surface, hit.surface) {
            if expected != actual {
                return false;
            }
        }
        hit.location.z >= self.config.min_height_above_terrain && hit.slope_degrees() <= self.config.max_slope
    }

    /// Searches for a player spawn point.
    pub fn find_player_spawn(&self, tracer: &dyn RayCaster, rng: &mut FoliageRng) -> PlayerSpawn {
        let cfg = &self.config;
        for attempt in 1..=cfg.player_tries {
            let point = rng.point_in_square(cfg.player_search_extent);
            let start = Vec3::from_xy(point, cfg.player_trace_top);
            let end = Vec3::from_xy(point, cfg.player_trace_bottom);
            if let Some(hit) = tracer.trace(start, end, &self.filter) {
                if self.is_location_suitable(&hit) {
                    return PlayerSpawn {
                        position: hit.location + Vec3::new(0.0, 0.0, cfg.spawn_height_offset),
                        used_fallback: false,
                        attempts: attempt,
                    };
                }
            }
        }

        tracing::warn!("No suitable spawn location found, using fallback location");
        PlayerSpawn {
            position: cfg.fallback_position,
            used_fallback: true,
            attempts: cfg.player_tries,
        }
    }

    /// Searches for a goal `distance` away from `player`. `None` when the
    /// budget runs out.
    pub fn find_goal(
        &self,
        player: Vec3,
        distance: f32,
        tracer: &dyn RayCaster,
        paths: &dyn PathOracle,
        rng: &mut FoliageRng,
    ) -> Option<Vec3> {
        let cfg = &self.config;
        let lift = Vec3::new(0.0, 0.0, cfg.goal_trace_half_height);
        for _ in 0..cfg.goal_tries {
            let direction = rng.unit_vector_2d();
            let target = player + Vec3::from_xy(direction * distance, 0.0);
            let Some(hit) = tracer.trace(target + lift, target - lift, &self.filter) else {
                continue;
            };
            if !self.is_location_suitable(&hit) {
                continue;
            }
            let goal = hit.location + Vec3::new(0.0, 0.0, cfg.spawn_height_offset);
            if paths.is_reachable(player, goal) {
                return Some(goal);
            }
        }

        tracing::debug!("No goal found {} units from the player after {} tries", distance, cfg.goal_tries);
        None
    }

    /// Companion transform: in front of and to the right of `player`, on
    /// the terrain, facing the player.
    #[must_use]
    pub fn find_companion(&self, player: &Transform, tracer: &dyn RayCaster) -> Option<Transform> {
        let cfg = &self.config;
        let anchor = player.position
            + player.rotation.forward() * cfg.companion_forward
            + player.rotation.right() * cfg.companion_right;
        let lift = Vec3::new(0.0, 0.0, cfg.companion_trace_half_height);

        let Some(hit) = tracer.trace(anchor + lift, anchor - lift, &TraceFilter::new()) else {
            tracing::warn!("Could not find the ground for the companion");
            return None;
        };
        if hit.component != ComponentId::TERRAIN {
            tracing::warn!("Companion trace hit {:?}, not the terrain", hit.component);
            return None;
        }

        let position = Vec3::new(anchor.x, anchor.y, hit.location.z + cfg.spawn_height_offset);
        let to_player = player.position - position;
        let yaw = to_player.y.atan2(to_player.x).to_degrees();
        Some(Transform::new(position, Quaternion::from_yaw_degrees(yaw), 1.0))
    }

    /// Health-pickup transform at a goal: re-traced onto the terrain.
    #[must_use]
    pub fn find_health_pickup(&self, goal: Vec3, tracer: &dyn RayCaster) -> Option<Transform> {
        let lift = Vec3::new(0.0, 0.0, self.config.goal_trace_half_height);
        let hit = tracer.trace(goal + lift, goal - lift, &TraceFilter::new())?;
        (hit.component == ComponentId::TERRAIN).then(|| {
            Transform::from_position(hit.location + Vec3::new(0.0, 0.0, self.config.spawn_height_offset))
        })
    }

    /// Spawns and possesses the player, then places goals, health pickups
    /// and the companion. Does nothing after the first successful call, or
    /// when no player spawner is registered.
    pub fn spawn_session(&mut self, services: &mut SpawnServices<'_>, rng: &mut FoliageRng) -> Option<SpawnReport> {
        if self.player_spawned {
            return None;
        }
        if !services.factory.is_registered(ActorKind::Player) {
            tracing::warn!("Player spawner is not registered");
            return None;
        }

        let player_spawn = self.find_player_spawn(services.tracer, rng);
        let player_transform = Transform::from_position(player_spawn.position);
        let player = services.factory.spawn(ActorKind::Player, player_transform)?;
        services.possession.possess(player);
        self.player_spawned = true;
        tracing::info!("Player spawned at {:?}", player_spawn.position);

        let distances = self.config.goal_distances.clone();
        let goals: Vec<Option<Vec3>> = distances
            .iter()
            .map(|&d| self.find_goal(player_spawn.position, d, services.tracer, services.paths, rng))
            .collect();

        let mut health_pickups = Vec::new();
        if self.config.health_pickups {
            for goal in goals.iter().flatten() {
                if let Some(transform) = self.find_health_pickup(*goal, services.tracer) {
                    if let Some(handle) = services.factory.spawn(ActorKind::HealthPickup, transform) {
                        health_pickups.push(handle);
                    }
                }
            }
        }

        let companion = if self.config.companion {
            self.find_companion(&player_transform, services.tracer)
                .and_then(|t| services.factory.spawn(ActorKind::Companion, t))
        } else {
            None
        };

        Some(SpawnReport {
            player,
            player_spawn,
            goals,
            health_pickups,
            companion,
        })
    }
}
