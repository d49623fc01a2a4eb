//! # Placement Rules
//!
//! A placement rule decides, for one species and one ray-cast hit, whether
//! an instance goes there and with what transform.
//!
//! - `TerrainSeedRule`: used by the mesh-vertex passes. The hit must be on
//!   the terrain and inside the species' slope band.
//! - `GridTraceRule`: grid-trace spawning. Minimum spawn height, surface
//!   type, height band, density and slope are all checked against the hit.

use terragen_shared::{Quaternion, Transform, Vec3};

use crate::collaborators::{ComponentId, SurfaceType, TraceHit};
use crate::foliage::random::FoliageRng;
use crate::foliage::species::FoliageSpecies;

/// Why a hit was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The hit was not on the terrain mesh.
    NotTerrain,
    /// The surface type differs from the supported one.
    SurfaceMismatch,
    /// A surface type is required and the hit reported none.
    MissingSurface,
    /// Below the rule's minimum spawn height.
    BelowMinHeight,
    /// Outside the species' height band.
    OutsideHeightBand,
    /// Failed the density roll.
    Density,
    /// Outside the species' slope band.
    Slope,
}

/// Outcome of evaluating a rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlacementDecision {
    /// Place an instance with this transform.
    Place(Transform),
    /// Do not place.
    Reject(RejectReason),
}

impl PlacementDecision {
    /// Transform to place with, if accepted.
    #[must_use]
    pub fn transform(self) -> Option<Transform> {
        match self {
            Self::Place(t) => Some(t),
            Self::Reject(_) => None,
        }
    }
}

/// Placement strategy for one hit.
pub trait PlacementRule {
    /// Evaluates `hit` for `species`, drawing any randomness from `rng`.
    fn evaluate(&self, species: &FoliageSpecies, hit: &TraceHit, rng: &mut FoliageRng) -> PlacementDecision;
}

fn in_slope_band(species: &FoliageSpecies, hit: &TraceHit) -> bool {
    species.ground_slope.contains(hit.slope_degrees())
}

/// Rule for seeds found by walking the terrain mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainSeedRule {
    /// Component that counts as terrain.
    pub terrain: ComponentId,
}

impl Default for TerrainSeedRule {
    fn default() -> Self {
        Self {
            terrain: ComponentId::TERRAIN,
        }
    }
}

impl PlacementRule for TerrainSeedRule {
    fn evaluate(&self, species: &FoliageSpecies, hit: &TraceHit, rng: &mut FoliageRng) -> PlacementDecision {
        if hit.component != self.terrain {
            return PlacementDecision::Reject(RejectReason::NotTerrain);
        }
        if !in_slope_band(species, hit) {
            return PlacementDecision::Reject(RejectReason::Slope);
        }

        let position = hit.location + Vec3::new(0.0, 0.0, species.z_offset.sample(rng));
        let scale = species.scale.sample(rng);
        let yaw = if species.random_yaw {
            Quaternion::from_yaw_degrees(rng.frand_range(0.0, 360.0))
        } else {
            Quaternion::IDENTITY
        };
        let rotation = if species.align_to_normal {
            Quaternion::from_z_axis(hit.normal) * yaw
        } else {
            yaw
        };

        PlacementDecision::Place(Transform::new(position, rotation, scale))
    }
}

/// Rule for grid-trace spawning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridTraceRule {
    /// Hits below this height are ignored.
    pub min_spawn_height: f32,
    /// Required surface type. Hits without one are rejected while set.
    pub supported_surface: Option<SurfaceType>,
}

impl Default for GridTraceRule {
    fn default() -> Self {
        Self {
            min_spawn_height: 250.0,
            supported_surface: None,
        }
    }
}

impl PlacementRule for GridTraceRule {
    fn evaluate(&self, species: &FoliageSpecies, hit: &TraceHit, rng: &mut FoliageRng) -> PlacementDecision {
        if hit.location.z < self.min_spawn_height {
            return PlacementDecision::Reject(RejectReason::BelowMinHeight);
        }
        if let Some(expected) = self.supported_surface {
            match hit.surface {
                None => return PlacementDecision::Reject(RejectReason::MissingSurface),
                Some(actual) if actual != expected => {
                    return PlacementDecision::Reject(RejectReason::SurfaceMismatch);
                }
                Some(_) => {}
            }
        }
        if !species.height.contains(hit.location.z) {
            return PlacementDecision::Reject(RejectReason::OutsideHeightBand);
        }
        if species.initial_seed_density < rng.frand_range(0.0, 10.0) {
            return PlacementDecision::Reject(RejectReason::Density);
        }
        if !in_slope_band(species, hit) {
            return PlacementDecision::Reject(RejectReason::Slope);
        }

        let rotation = if species.align_to_normal {
            Quaternion::from_z_axis(hit.normal)
        } else {
            Quaternion::from_yaw_degrees(rng.frand_range(0.0, 360.0))
        };
        let scale = species.scale.sample(rng);

        PlacementDecision::Place(Transform::new(hit.location, rotation, scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foliage::species::FloatRange;

    fn hit(z: f32, normal: Vec3, component: ComponentId) -> TraceHit {
        TraceHit {
            location: Vec3::new(10.0, 20.0, z),
            normal,
            component,
            surface: Some(SurfaceType(1)),
        }
    }

    #[test]
    fn test_seed_rule_requires_terrain() {
        let mut rng = FoliageRng::new(1);
        let decision = TerrainSeedRule::default().evaluate(
            &FoliageSpecies::default(),
            &hit(300.0, Vec3::UP, ComponentId::SEA),
            &mut rng,
        );
        assert_eq!(decision, PlacementDecision::Reject(RejectReason::NotTerrain));
    }

    #[test]
    fn test_seed_rule_slope_band() {
        let mut rng = FoliageRng::new(1);
        let steep = Vec3::new(1.0, 0.0, 0.5).normalize_or_zero();
        let decision = TerrainSeedRule::default().evaluate(
            &FoliageSpecies::default(),
            &hit(300.0, steep, ComponentId::TERRAIN),
            &mut rng,
        );
        assert_eq!(decision, PlacementDecision::Reject(RejectReason::Slope));
    }

    #[test]
    fn test_seed_rule_transform() {
        let mut rng = FoliageRng::new(9);
        let species = FoliageSpecies {
            z_offset: FloatRange::new(5.0, 10.0),
            scale: FloatRange::new(0.5, 2.0),
            random_yaw: false,
            ..FoliageSpecies::default()
        };
        let t = TerrainSeedRule::default()
            .evaluate(&species, &hit(300.0, Vec3::UP, ComponentId::TERRAIN), &mut rng)
            .transform()
            .expect("accepted");
        assert!(t.position.z >= 305.0 && t.position.z < 310.0);
        assert!(t.scale >= 0.5 && t.scale < 2.0);
        assert_eq!(t.rotation, Quaternion::IDENTITY);
    }

    #[test]
    fn test_grid_rule_checks() {
        let mut rng = FoliageRng::new(4);
        let rule = GridTraceRule {
            min_spawn_height: 250.0,
            supported_surface: Some(SurfaceType(1)),
        };
        let species = FoliageSpecies {
            initial_seed_density: 10.0,
            height: FloatRange::new(0.0, 1000.0),
            ..FoliageSpecies::default()
        };

        let low = rule.evaluate(&species, &hit(100.0, Vec3::UP, ComponentId::TERRAIN), &mut rng);
        assert_eq!(low, PlacementDecision::Reject(RejectReason::BelowMinHeight));

        let high = rule.evaluate(&species, &hit(1500.0, Vec3::UP, ComponentId::TERRAIN), &mut rng);
        assert_eq!(high, PlacementDecision::Reject(RejectReason::OutsideHeightBand));

        let mut wrong_surface = hit(500.0, Vec3::UP, ComponentId::TERRAIN);
        wrong_surface.surface = Some(SurfaceType(7));
        assert_eq!(
            rule.evaluate(&species, &wrong_surface, &mut rng),
            PlacementDecision::Reject(RejectReason::SurfaceMismatch)
        );

        let ok = rule.evaluate(&species, &hit(500.0, Vec3::UP, ComponentId::TERRAIN), &mut rng);
        assert!(ok.transform().is_some(), "density 10 always passes");
    }

    #[test]
    fn test_grid_rule_needs_surface_when_set() {
        let mut rng = FoliageRng::new(4);
        let species = FoliageSpecies {
            initial_seed_density: 10.0,
            height: FloatRange::new(0.0, 1000.0),
            ..FoliageSpecies::default()
        };
        let mut bare = hit(500.0, Vec3::UP, ComponentId::TERRAIN);
        bare.surface = None;

        let strict = GridTraceRule {
            min_spawn_height: 250.0,
            supported_surface: Some(SurfaceType(1)),
        };
        assert_eq!(
            strict.evaluate(&species, &bare, &mut rng),
            PlacementDecision::Reject(RejectReason::MissingSurface)
        );

        let open = GridTraceRule {
            supported_surface: None,
            ..strict
        };
        assert!(open.evaluate(&species, &bare, &mut rng).transform().is_some());
    }

    #[test]
    fn test_grid_rule_aligns_to_normal() {
        let mut rng = FoliageRng::new(4);
        let species = FoliageSpecies {
            initial_seed_density: 10.0,
            align_to_normal: true,
            ..FoliageSpecies::default()
        };
        let normal = Vec3::new(0.0, 0.3, 1.0).normalize_or_zero();
        let t = GridTraceRule::default()
            .evaluate(&species, &hit(500.0, normal, ComponentId::TERRAIN), &mut rng)
            .transform()
            .expect("accepted");
        assert!((t.rotation.rotate(Vec3::UP) - normal).length() < 1e-4);
    }
}
