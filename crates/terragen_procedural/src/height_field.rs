//! # Noise Height Field
//!
//! The terrain surface as a pure function of a ground-plane location.
//!
//! ## Layers
//!
//! ```text
//! height = mountain + land + hills + bumps
//!
//! mountain: scale 1/mountain_scale, amplitude mountain_height
//! land:     scale 1/land_scale,     amplitude land_height
//! hills:    scale 0.001,            amplitude 500
//! bumps:    scale 0.01,             amplitude 100
//! ```
//!
//! Inside the flat zone around the origin the height is pinned, so the
//! player always spawns on level ground. Across the transition band it
//! blends linearly into the layered noise.

use rand::Rng;
use serde::{Deserialize, Serialize};
use terragen_shared::{Vec2, Vec3};

use crate::error::{ProceduralError, ProceduralResult};
use crate::noise::GradientNoise;

/// Added to every layer's sample position.
const SAMPLE_JITTER: f64 = 0.1;

/// Step used for finite-difference normals.
const NORMAL_SAMPLE_OFFSET: f32 = 50.0;

/// Terrain-shape parameters.
///
/// Chosen once per session (default, custom, randomised or loaded) and
/// fixed for the lifetime of every `HeightField` built from them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightFieldParams {
    /// Offset added to every noise sample; moves the world to another region.
    pub p_balance: [f64; 2],
    /// Amplitude of the mountain layer.
    pub mountain_height: f64,
    /// Horizontal scale of the mountain layer (world units per noise cell).
    pub mountain_scale: f64,
    /// Amplitude of the land layer.
    pub land_height: f64,
    /// Horizontal scale of the land layer.
    pub land_scale: f64,
}

impl Default for HeightFieldParams {
    fn default() -> Self {
        Self {
            p_balance: [0.0, 0.0],
            mountain_height: 4000.0,
            mountain_scale: 50_000.0,
            land_height: 2000.0,
            land_scale: 60_000.0,
        }
    }
}

impl HeightFieldParams {
    /// Randomises `self` into a new layout.
    ///
    /// `p_balance` is drawn from `[0, 1e6)` per axis, heights are scaled by
    /// `[0.4, 1.5)`, the mountain scale by `[0.6, 2)` and the land scale by
    /// `[0.8, 2)`.
    #[must_use]
    pub fn randomized<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        Self {
            p_balance: [rng.gen_range(0.0..1_000_000.0), rng.gen_range(0.0..1_000_000.0)],
            mountain_height: self.mountain_height * rng.gen_range(0.4..1.5),
            land_height: self.land_height * rng.gen_range(0.4..1.5),
            mountain_scale: self.mountain_scale * rng.gen_range(0.6..2.0),
            land_scale: self.land_scale * rng.gen_range(0.8..2.0),
        }
    }

    /// Vertical half-extent that bounds every procedural height.
    #[inline]
    #[must_use]
    pub fn vertical_extent(&self) -> f32 {
        (self.mountain_height + self.land_height) as f32
    }

    /// Checks that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for non-finite values or non-positive scales.
    pub fn validate(&self) -> ProceduralResult<()> {
        let values = [
            ("p_balance.x", self.p_balance[0]),
            ("p_balance.y", self.p_balance[1]),
            ("mountain_height", self.mountain_height),
            ("land_height", self.land_height),
            ("mountain_scale", self.mountain_scale),
            ("land_scale", self.land_scale),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(ProceduralError::InvalidParameter(format!("{name} is not finite")));
            }
        }
        if self.mountain_scale <= 0.0 || self.land_scale <= 0.0 {
            return Err(ProceduralError::InvalidParameter(
                "layer scales must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Guaranteed-flat spawn area around the world origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatZone {
    /// Radius of the pinned area.
    pub radius: f32,
    /// Height inside the pinned area.
    pub height: f32,
    /// Width of the blend band outside `radius`.
    pub transition_width: f32,
}

impl Default for FlatZone {
    fn default() -> Self {
        Self {
            radius: 3000.0,
            height: 250.0,
            transition_width: 3000.0,
        }
    }
}

impl FlatZone {
    /// Checks the zone dimensions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for negative or non-finite dimensions.
    pub fn validate(&self) -> ProceduralResult<()> {
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(ProceduralError::InvalidParameter("flat radius must be >= 0".to_string()));
        }
        if !(self.transition_width.is_finite() && self.transition_width >= 0.0) {
            return Err(ProceduralError::InvalidParameter(
                "transition width must be >= 0".to_string(),
            ));
        }
        if !self.height.is_finite() {
            return Err(ProceduralError::InvalidParameter("flat height is not finite".to_string()));
        }
        Ok(())
    }
}

/// One octave of the layered noise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseLayer {
    /// Multiplier applied to the world location.
    pub scale: f64,
    /// Multiplier applied to the noise value.
    pub amplitude: f64,
    /// Constant shift of the sample position (both axes).
    pub offset: f64,
}

/// Deterministic terrain height function.
#[derive(Debug)]
pub struct HeightField {
    params: HeightFieldParams,
    flat: FlatZone,
    layers: [NoiseLayer; 4],
    noise: GradientNoise,
}

impl HeightField {
    /// Builds a height field over the fixed noise lattice.
    #[must_use]
    pub fn new(params: HeightFieldParams, flat: FlatZone) -> Self {
        let layers = [
            NoiseLayer {
                scale: 1.0 / params.mountain_scale,
                amplitude: params.mountain_height,
                offset: 0.1,
            },
            NoiseLayer {
                scale: 1.0 / params.land_scale,
                amplitude: params.land_height,
                offset: 0.2,
            },
            NoiseLayer {
                scale: 0.001,
                amplitude: 500.0,
                offset: 0.3,
            },
            NoiseLayer {
                scale: 0.01,
                amplitude: 100.0,
                offset: 0.4,
            },
        ];

        Self {
            params,
            flat,
            layers,
            noise: GradientNoise::default(),
        }
    }

    /// Parameters this field was built from.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &HeightFieldParams {
        &self.params
    }

    /// Flat spawn zone.
    #[inline]
    #[must_use]
    pub fn flat_zone(&self) -> &FlatZone {
        &self.flat
    }

    /// Noise layers, macro first.
    #[must_use]
    pub fn layers(&self) -> &[NoiseLayer] {
        &self.layers
    }

    /// Terrain height at `location`.
    #[must_use]
    pub fn height(&self, location: Vec2) -> f32 {
        let distance = location.length();
        if distance <= self.flat.radius {
            return self.flat.height;
        }

        let procedural = self.procedural_height(location);
        if distance <= self.flat.radius + self.flat.transition_width {
            let t = (distance - self.flat.radius) / self.flat.transition_width;
            return self.flat.height + (procedural - self.flat.height) * t;
        }

        procedural
    }

    /// Raw layered-noise height, ignoring the flat zone.
    #[must_use]
    pub fn procedural_height(&self, location: Vec2) -> f32 {
        let x = f64::from(location.x);
        let y = f64::from(location.y);
        let [bx, by] = self.params.p_balance;

        let sum: f64 = self
            .layers
            .iter()
            .map(|layer| {
                let sx = x * layer.scale + layer.offset + bx + SAMPLE_JITTER;
                let sy = y * layer.scale + layer.offset + by + SAMPLE_JITTER;
                self.noise.sample(sx, sy) * layer.amplitude
            })
            .sum();

        sum as f32
    }

    /// Surface normal at `location` by central differences.
    #[must_use]
    pub fn normal_at(&self, location: Vec2) -> Vec3 {
        let dx = Vec2::new(NORMAL_SAMPLE_OFFSET, 0.0);
        let dy = Vec2::new(0.0, NORMAL_SAMPLE_OFFSET);
        let slope_x = (self.height(location + dx) - self.height(location - dx)) / (2.0 * NORMAL_SAMPLE_OFFSET);
        let slope_y = (self.height(location + dy) - self.height(location - dy)) / (2.0 * NORMAL_SAMPLE_OFFSET);
        Vec3::new(-slope_x, -slope_y, 1.0).normalize_or_zero()
    }

    /// Surface point at `location`.
    #[inline]
    #[must_use]
    pub fn surface_point(&self, location: Vec2) -> Vec3 {
        Vec3::from_xy(location, self.height(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn field() -> HeightField {
        HeightField::new(HeightFieldParams::default(), FlatZone::default())
    }

    #[test]
    fn test_flat_zone_ignores_parameters() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let params = HeightFieldParams::default().randomized(&mut rng);
            let field = HeightField::new(params, FlatZone::default());
            for &(x, y) in &[(0.0, 0.0), (2999.0, 0.0), (-1500.0, 2000.0), (2121.0, -2121.0)] {
                assert_eq!(field.height(Vec2::new(x, y)), 250.0, "not flat at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_outside_transition_is_procedural() {
        let field = field();
        let p = Vec2::new(25_000.0, -13_000.0);
        assert_eq!(field.height(p), field.procedural_height(p));
    }

    #[test]
    fn test_transition_starts_at_flat_height() {
        let field = field();
        let just_outside = Vec2::new(3000.5, 0.0);
        let h = field.height(just_outside);
        assert!((h - 250.0).abs() < 5.0, "transition should start near flat height, got {h}");
    }

    #[test]
    fn test_height_is_deterministic() {
        let a = field();
        let b = field();
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 731.0 - 50_000.0, i as f32 * -417.0 + 9000.0);
            assert_eq!(a.height(p).to_bits(), b.height(p).to_bits());
        }
    }

    #[test]
    fn test_height_is_bounded_by_amplitudes() {
        let field = field();
        let bound = 4000.0 + 2000.0 + 500.0 + 100.0;
        for i in 0..500 {
            let p = Vec2::new(i as f32 * 1999.0, i as f32 * 877.0);
            assert!(field.height(p).abs() <= bound);
        }
    }

    #[test]
    fn test_flat_normal_points_up() {
        let field = field();
        let n = field.normal_at(Vec2::new(100.0, 100.0));
        assert!((n - Vec3::UP).length() < 1e-5);
    }

    #[test]
    fn test_randomized_ranges() {
        let base = HeightFieldParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..100 {
            let p = base.randomized(&mut rng);
            assert!((0.0..1_000_000.0).contains(&p.p_balance[0]));
            assert!((0.0..1_000_000.0).contains(&p.p_balance[1]));
            assert!(p.mountain_height >= 4000.0 * 0.4 && p.mountain_height < 4000.0 * 1.5);
            assert!(p.land_height >= 2000.0 * 0.4 && p.land_height < 2000.0 * 1.5);
            assert!(p.mountain_scale >= 50_000.0 * 0.6 && p.mountain_scale < 50_000.0 * 2.0);
            assert!(p.land_scale >= 60_000.0 * 0.8 && p.land_scale < 60_000.0 * 2.0);
        }
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let params = HeightFieldParams {
            land_scale: 0.0,
            ..HeightFieldParams::default()
        };
        assert!(params.validate().is_err());
        assert!(HeightFieldParams::default().validate().is_ok());
    }
}
