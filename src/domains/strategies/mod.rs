pub mod optimizer;
pub mod planner;
pub mod projection;
pub mod registry;
pub mod sampler;
pub mod steering;
pub mod validation;

pub use optimizer::*;
pub use planner::*;
pub use projection::*;
pub use registry::*;
pub use sampler::*;
pub use steering::*;
pub use validation::*;

use crate::common::{Configuration, DomainResult};
use crate::domains::paths::Path;
use crate::domains::ports::CollisionChecker;

const MIN_PREFIX_LENGTH: f64 = 1e-9;

/// Tuning values handed to strategy factories.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParameters {
    /// Longest step a planner extends a tree by.
    pub extension_step: f64,
    /// Nodes further apart than this are never connected directly.
    pub connection_radius: f64,
    pub neighbours: usize,
    pub discretization_step: f64,
    pub shortcut_iterations: usize,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            extension_step: 0.5,
            connection_radius: 1.5,
            neighbours: 8,
            discretization_step: 0.05,
            shortcut_iterations: 30,
        }
    }
}

/// Steering, projection and validation chained into one local planning call.
#[derive(Clone, Copy)]
pub struct LocalPlanner<'a> {
    pub steering: &'a dyn SteeringMethod,
    pub validation: &'a dyn PathValidation,
    pub projector: Option<(&'a dyn PathProjector, ProjectionContext<'a>)>,
    pub checker: &'a dyn CollisionChecker,
}

impl<'a> LocalPlanner<'a> {
    fn candidate(&self, from: &Configuration, to: &Configuration) -> DomainResult<Option<Path>> {
        let Some(path) = self.steering.steer(from, to)? else {
            return Ok(None);
        };
        Ok(match &self.projector {
            Some((projector, ctx)) => projector.project(&path, ctx),
            None => Some(path),
        })
    }

    /// A fully valid local path from `from` to `to`, if one exists.
    pub fn connect(&self, from: &Configuration, to: &Configuration) -> DomainResult<Option<Path>> {
        let Some(path) = self.candidate(from, to)? else {
            return Ok(None);
        };
        let report = self.validation.validate(&path, self.checker);
        Ok(report.valid.then_some(path))
    }

    /// Steers towards `to`, at most `max_length` away, and keeps the valid
    /// prefix of the result.
    pub fn extend(&self, from: &Configuration, to: &Configuration, max_length: f64) -> DomainResult<Option<Path>> {
        let distance = from.distance(to);
        let target = if distance > max_length && distance > 0.0 {
            from.interpolate(to, max_length / distance)
        } else {
            to.clone()
        };
        let Some(path) = self.candidate(from, &target)? else {
            return Ok(None);
        };
        let report = self.validation.validate(&path, self.checker);
        if report.valid {
            return Ok(Some(path));
        }
        if report.valid_until <= MIN_PREFIX_LENGTH {
            return Ok(None);
        }
        Ok(Some(path.extract(0.0, report.valid_until)?))
    }
}
