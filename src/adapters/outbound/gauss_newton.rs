use crate::common::Configuration;
use crate::domains::ports::{ConstraintSystem, NumericalSolver, Projection, SolverSettings};
use nalgebra::{DMatrix, DVector};

const SINGULAR_VALUE_EPS: f64 = 1e-9;
const MIN_STEP_SCALE: f64 = 1.0 / 1024.0;
const IMPROVEMENT_EPS: f64 = 1e-12;

/// Hierarchical Gauss-Newton projection.
///
/// Each iteration solves the levels in precedence order, every level in the
/// null space of the ones before it, then backtracks along the step until the
/// level residuals improve lexicographically. The first level is the hard
/// one: its residual is reported and decides convergence.
#[derive(Debug, Clone, Default)]
pub struct GaussNewtonSolver;

impl GaussNewtonSolver {
    pub fn new() -> Self {
        Self
    }

    fn level_residuals(system: &dyn ConstraintSystem, q: &Configuration) -> Vec<f64> {
        (0..system.level_count())
            .map(|level| system.level_value_and_jacobian(level, q).0.norm())
            .collect()
    }

    fn priority_step(system: &dyn ConstraintSystem, q: &Configuration) -> DVector<f64> {
        let n = q.dim();
        let mut step = DVector::zeros(n);
        let mut null_space = DMatrix::<f64>::identity(n, n);
        for level in 0..system.level_count() {
            let (value, jacobian) = system.level_value_and_jacobian(level, q);
            if value.is_empty() {
                continue;
            }
            let projected = &jacobian * &null_space;
            let pinv = projected
                .clone()
                .pseudo_inverse(SINGULAR_VALUE_EPS)
                .unwrap_or_else(|_| DMatrix::zeros(n, value.len()));
            step += &pinv * (-&value - &jacobian * &step);
            null_space -= &pinv * &projected;
        }
        step
    }
}

/// Residuals below `threshold` count as zero, so a satisfied level never
/// blocks progress on the levels after it.
fn improves(candidate: &[f64], current: &[f64], threshold: f64) -> bool {
    let effective = |r: f64| if r <= threshold { 0.0 } else { r };
    for (c, o) in candidate.iter().zip(current) {
        let (c, o) = (effective(*c), effective(*o));
        if c < o - IMPROVEMENT_EPS {
            return true;
        }
        if c > o + IMPROVEMENT_EPS {
            return false;
        }
    }
    false
}

impl NumericalSolver for GaussNewtonSolver {
    fn name(&self) -> &str {
        "GaussNewton"
    }

    fn project(&self, system: &dyn ConstraintSystem, q: &Configuration, settings: &SolverSettings) -> Projection {
        if system.level_count() == 0 {
            return Projection {
                config: q.clone(),
                residual: 0.0,
                converged: true,
            };
        }
        let mut current = q.clone();
        let mut residuals = Self::level_residuals(system, &current);

        for _ in 0..settings.max_iterations {
            if residuals.iter().all(|r| *r <= settings.error_threshold) {
                break;
            }
            let step = Self::priority_step(system, &current);
            if step.norm() < IMPROVEMENT_EPS {
                break;
            }
            let mut scale = 1.0;
            let mut accepted = None;
            while scale >= MIN_STEP_SCALE {
                let candidate = Configuration::from(current.to_vector() + &step * scale);
                let candidate_residuals = Self::level_residuals(system, &candidate);
                if improves(&candidate_residuals, &residuals, settings.error_threshold) {
                    accepted = Some((candidate, candidate_residuals));
                    break;
                }
                scale *= 0.5;
            }
            match accepted {
                Some((candidate, candidate_residuals)) => {
                    current = candidate;
                    residuals = candidate_residuals;
                }
                None => break,
            }
        }

        let residual = residuals[0];
        tracing::trace!(residual, "projection finished");
        Projection {
            config: current,
            residual,
            converged: residual <= settings.error_threshold,
        }
    }
}
