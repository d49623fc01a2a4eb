//! # Gradient Noise Implementation
//!
//! Classic 2D gradient (Perlin) noise over a fixed permutation lattice.
//!
//! ## Determinism Guarantee
//!
//! Given the same `NoiseSeed`, this implementation produces **exactly** the
//! same values on any platform, any time. The height field relies on this so
//! that a vertex shared by two tiles gets the same height no matter which
//! tile generated it.

/// Seed for a noise lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoiseSeed(u64);

impl NoiseSeed {
    /// Creates a new noise seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for a specific purpose.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        // FNV-1a style mixing
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

impl Default for NoiseSeed {
    fn default() -> Self {
        Self(0x7E44_A6E2_5EED_0001)
    }
}

/// Pre-computed permutation table, doubled to avoid index wrapping.
#[derive(Debug)]
struct PermutationTable {
    perm: [u8; 512],
}

impl PermutationTable {
    fn new(seed: NoiseSeed) -> Self {
        let mut perm = [0u8; 512];
        for (i, p) in perm.iter_mut().take(256).enumerate() {
            *p = i as u8;
        }

        // Fisher-Yates shuffle driven by xorshift64
        let mut rng_state = seed.value() | 1;
        for i in (1..256).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;

            let j = (rng_state as usize) % (i + 1);
            perm.swap(i, j);
        }

        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> usize {
        usize::from(self.perm[index & 511])
    }
}

/// 2D gradient noise generator.
///
/// Produces smooth values roughly in `[-1, 1]`, exactly zero on integer
/// lattice points.
#[derive(Debug)]
pub struct GradientNoise {
    table: PermutationTable,
}

impl GradientNoise {
    /// Creates a new generator from a seed.
    #[must_use]
    pub fn new(seed: NoiseSeed) -> Self {
        Self {
            table: PermutationTable::new(seed),
        }
    }

    /// Samples noise at `(x, y)`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let xi = fast_floor(x);
        let yi = fast_floor(y);
        let xf = x - f64::from(xi);
        let yf = y - f64::from(yi);

        let u = fade(xf);
        let v = fade(yf);

        let ix = (xi & 255) as usize;
        let iy = (yi & 255) as usize;

        let a = self.table.get(ix) + iy;
        let b = self.table.get(ix + 1) + iy;
        let aa = self.table.get(a);
        let ab = self.table.get(a + 1);
        let ba = self.table.get(b);
        let bb = self.table.get(b + 1);

        let x1 = lerp(grad(aa, xf, yf), grad(ba, xf - 1.0, yf), u);
        let x2 = lerp(grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0), u);
        lerp(x1, x2, v)
    }
}

impl Default for GradientNoise {
    fn default() -> Self {
        Self::new(NoiseSeed::default())
    }
}

/// Quintic fade curve `6t^5 - 15t^4 + 10t^3`.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with one of eight lattice gradients.
#[inline]
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}

/// Fast floor function.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) {
        xi - 1
    } else {
        xi
    }
}
