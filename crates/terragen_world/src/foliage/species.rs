//! Foliage species: immutable per-species placement rules.

use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};
use crate::foliage::random::FoliageRng;

/// Closed interval `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl FloatRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies inside, bounds included.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Uniform sample from the range.
    pub fn sample(&self, rng: &mut FoliageRng) -> f32 {
        rng.frand_range(self.min, self.max)
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Rule set for one kind of vegetation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageSpecies {
    /// Display name, used in logs.
    pub name: String,
    /// Terrain heights the species grows at.
    pub height: FloatRange,
    /// Ground slope band in degrees.
    pub ground_slope: FloatRange,
    /// Seed density in `[0, 10]`; higher passes the density check more often.
    pub initial_seed_density: f32,
    /// Uniform scale range.
    pub scale: FloatRange,
    /// Maximum cluster walk steps.
    pub num_steps: u32,
    /// Maximum seeds per cluster step.
    pub seeds_per_step: u32,
    /// Length of one cluster walk step.
    pub average_spread_distance: f32,
    /// Seed scatter radius around a step.
    pub spread_variance: f32,
    /// Vertical offset applied to the impact point.
    pub z_offset: FloatRange,
    /// Random rotation about up.
    pub random_yaw: bool,
    /// Align the instance's up axis with the surface normal.
    pub align_to_normal: bool,
}

impl Default for FoliageSpecies {
    fn default() -> Self {
        Self {
            name: "foliage".to_string(),
            height: FloatRange::new(0.0, 10_000.0),
            ground_slope: FloatRange::new(0.0, 45.0),
            initial_seed_density: 1.0,
            scale: FloatRange::new(1.0, 1.0),
            num_steps: 3,
            seeds_per_step: 5,
            average_spread_distance: 50.0,
            spread_variance: 150.0,
            z_offset: FloatRange::new(0.0, 0.0),
            random_yaw: true,
            align_to_normal: false,
        }
    }
}

impl FoliageSpecies {
    /// Checks the entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSpecies` for an empty name, inverted or non-finite
    /// ranges, a density outside `[0, 10]` or negative spread values.
    pub fn validate(&self) -> WorldResult<()> {
        let fail = |reason: &str| {
            Err(WorldError::InvalidSpecies {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        if self.name.trim().is_empty() {
            return fail("name is empty");
        }
        for (label, range) in [
            ("height", self.height),
            ("ground_slope", self.ground_slope),
            ("scale", self.scale),
            ("z_offset", self.z_offset),
        ] {
            if !range.is_valid() {
                return fail(&format!("{label} range is inverted or not finite"));
            }
        }
        if self.scale.min <= 0.0 {
            return fail("scale must be positive");
        }
        if !(0.0..=10.0).contains(&self.initial_seed_density) {
            return fail("initial_seed_density must be within [0, 10]");
        }
        if !(self.average_spread_distance >= 0.0 && self.spread_variance >= 0.0) {
            return fail("spread values must be >= 0");
        }
        Ok(())
    }
}
