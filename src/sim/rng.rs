use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Seeded random stream shared by field initialization and per-step noise.
///
/// Backed by ChaCha8, whose output is specified independently of platform and word size. The
/// stream only ever advances; initialization draws first, then each noisy step draws one
/// sample per cell in row-major order.
#[derive(Clone, Debug)]
pub struct FieldRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl FieldRng {
    /// Create a stream from an explicit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this stream was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform sample in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.inner.r#gen::<f32>()
    }

    /// Gaussian sample with mean 0 and the given standard deviation.
    pub fn normal(&mut self, std_dev: f64) -> f64 {
        let z: f64 = self.inner.sample(StandardNormal);
        z * std_dev
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sim/rng.rs"]
mod tests;
