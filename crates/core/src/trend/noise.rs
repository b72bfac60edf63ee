use rand::Rng;

pub const NOISE_LOW: f64 = 0.99;
pub const NOISE_HIGH: f64 = 1.01;

/// Multiplicative jitter applied to every synthesized history point.
pub trait NoiseSource {
    fn sample(&mut self) -> f64;
}

/// Uniform jitter in `[NOISE_LOW, NOISE_HIGH]`.
#[derive(Debug)]
pub struct UniformNoise<R> {
    rng: R,
}

impl<R: Rng> UniformNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> NoiseSource for UniformNoise<R> {
    fn sample(&mut self) -> f64 {
        self.rng.gen_range(NOISE_LOW..=NOISE_HIGH)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub f64);

impl NoiseSource for FixedNoise {
    fn sample(&mut self) -> f64 {
        self.0
    }
}
