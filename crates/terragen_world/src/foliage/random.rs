//! Seeded random stream shared by every foliage and spawn decision.
//!
//! One `FoliageRng` is created per session and passed by `&mut` into each
//! placement call, so a fixed seed and species list reproduce the whole
//! session.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use terragen_shared::{Vec2, Vec3};

/// Upper bound (inclusive) of a freshly drawn session seed.
pub const MAX_SESSION_SEED: u64 = 1000;

/// Explicit seeded stream.
#[derive(Clone, Debug)]
pub struct FoliageRng {
    seed: u64,
    rng: ChaCha8Rng,
}

impl FoliageRng {
    /// Stream starting from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Stream from a fresh seed in `0..=MAX_SESSION_SEED`.
    #[must_use]
    pub fn from_session_seed() -> Self {
        let seed = rand::thread_rng().gen_range(0..=MAX_SESSION_SEED);
        tracing::info!("Foliage seed {}", seed);
        Self::new(seed)
    }

    /// Seed this stream started from.
    #[inline]
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform float in `[min, max)`; `min` when the range is empty.
    pub fn frand_range(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    /// Uniform integer in `[min, max]`; `min` when the range is empty.
    pub fn rand_range(&mut self, min: u32, max: u32) -> u32 {
        if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        }
    }

    /// Uniform direction on the unit sphere.
    pub fn unit_vector(&mut self) -> Vec3 {
        loop {
            let v = Vec3::new(
                self.rng.gen_range(-1.0..=1.0),
                self.rng.gen_range(-1.0..=1.0),
                self.rng.gen_range(-1.0..=1.0),
            );
            let len_sq = v.length_squared();
            if len_sq > 1e-4 && len_sq <= 1.0 {
                return v * (1.0 / len_sq.sqrt());
            }
        }
    }

    /// Uniform horizontal direction.
    pub fn unit_vector_2d(&mut self) -> Vec2 {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        Vec2::new(angle.cos(), angle.sin())
    }

    /// Uniform point in the square `[-half, half]^2`.
    pub fn point_in_square(&mut self, half: f32) -> Vec2 {
        Vec2::new(self.frand_range(-half, half), self.frand_range(-half, half))
    }

    /// Underlying generator, for APIs that take any `Rng`.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = FoliageRng::new(17);
        let mut b = FoliageRng::new(17);
        for _ in 0..100 {
            assert_eq!(a.frand_range(0.0, 10.0).to_bits(), b.frand_range(0.0, 10.0).to_bits());
            assert_eq!(a.unit_vector(), b.unit_vector());
        }
    }

    #[test]
    fn test_ranges() {
        let mut rng = FoliageRng::new(3);
        for _ in 0..1000 {
            let f = rng.frand_range(-2.0, 5.0);
            assert!((-2.0..5.0).contains(&f));
            assert!(rng.rand_range(0, 4) <= 4);
            assert!((rng.unit_vector().length() - 1.0).abs() < 1e-4);
            assert!((rng.unit_vector_2d().length() - 1.0).abs() < 1e-4);
        }
        assert_eq!(rng.frand_range(3.0, 3.0), 3.0);
        assert_eq!(rng.rand_range(2, 2), 2);
    }

    #[test]
    fn test_session_seed_bounds() {
        let rng = FoliageRng::from_session_seed();
        assert!(rng.seed() <= MAX_SESSION_SEED);
    }
}
