use crate::common::Configuration;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Draws random configurations inside the device bounds.
pub trait ConfigurationShooter: Send + Sync {
    fn name(&self) -> &str;

    fn shoot(&self, bounds: &[(f64, f64)], rng: &mut StdRng) -> Configuration;
}

#[derive(Debug, Clone, Default)]
pub struct UniformShooter;

impl ConfigurationShooter for UniformShooter {
    fn name(&self) -> &str {
        "Uniform"
    }

    fn shoot(&self, bounds: &[(f64, f64)], rng: &mut StdRng) -> Configuration {
        Configuration::new(
            bounds
                .iter()
                .map(|&(lo, hi)| if hi > lo { rng.gen_range(lo..=hi) } else { lo })
                .collect(),
        )
    }
}

/// Normal distribution around the middle of the bounds, clamped to them.
/// `spread` is the standard deviation as a fraction of each dof's range.
#[derive(Debug, Clone)]
pub struct GaussianShooter {
    pub spread: f64,
}

impl Default for GaussianShooter {
    fn default() -> Self {
        Self { spread: 0.25 }
    }
}

impl ConfigurationShooter for GaussianShooter {
    fn name(&self) -> &str {
        "Gaussian"
    }

    fn shoot(&self, bounds: &[(f64, f64)], rng: &mut StdRng) -> Configuration {
        Configuration::new(
            bounds
                .iter()
                .map(|&(lo, hi)| {
                    let center = 0.5 * (lo + hi);
                    match Normal::new(center, self.spread * (hi - lo)) {
                        Ok(normal) if hi > lo => normal.sample(rng).clamp(lo, hi),
                        _ => center,
                    }
                })
                .collect(),
        )
    }
}
