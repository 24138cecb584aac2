use crate::common::{Configuration, DomainResult};
use crate::domains::paths::Path;

/// Produces a candidate local path between two configurations. The path is
/// not validated; `None` means no candidate exists.
pub trait SteeringMethod: Send + Sync {
    fn name(&self) -> &str;

    fn steer(&self, from: &Configuration, to: &Configuration) -> DomainResult<Option<Path>>;
}

/// Linear interpolation between the endpoints.
#[derive(Debug, Clone, Default)]
pub struct StraightSteering;

impl SteeringMethod for StraightSteering {
    fn name(&self) -> &str {
        "Straight"
    }

    fn steer(&self, from: &Configuration, to: &Configuration) -> DomainResult<Option<Path>> {
        Ok(Some(Path::straight(from, to)?))
    }
}

/// Straight line split into segments no longer than `step`, so projectors
/// and optimizers get intermediate waypoints to work on.
#[derive(Debug, Clone)]
pub struct DiscretizedSteering {
    pub step: f64,
}

impl SteeringMethod for DiscretizedSteering {
    fn name(&self) -> &str {
        "Discretized"
    }

    fn steer(&self, from: &Configuration, to: &Configuration) -> DomainResult<Option<Path>> {
        let straight = Path::straight(from, to)?;
        Ok(Some(Path::new(straight.sample(self.step))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discretized_segments_are_short() {
        let steering = DiscretizedSteering { step: 0.25 };
        let path = steering
            .steer(&Configuration::new(vec![0.0]), &Configuration::new(vec![1.0]))
            .unwrap()
            .unwrap();
        assert_eq!(path.waypoints().len(), 5);
        assert!((path.length() - 1.0).abs() < 1e-12);
    }
}
