use super::LocalPlanner;
use crate::common::DomainResult;
use crate::domains::paths::Path;
use rand::rngs::StdRng;
use rand::Rng;

/// Post-processing of a stored path. Returns the improved path, or a copy of
/// the input when nothing could be improved.
pub trait PathOptimizer: Send + Sync {
    fn name(&self) -> &str;

    fn optimize(&self, path: &Path, local: &LocalPlanner<'_>, rng: &mut StdRng) -> DomainResult<Path>;
}

/// Repeatedly picks two random points on the path and replaces the part
/// between them by a direct local path when that is valid and shorter.
#[derive(Debug, Clone)]
pub struct RandomShortcut {
    pub iterations: usize,
}

impl PathOptimizer for RandomShortcut {
    fn name(&self) -> &str {
        "RandomShortcut"
    }

    fn optimize(&self, path: &Path, local: &LocalPlanner<'_>, rng: &mut StdRng) -> DomainResult<Path> {
        let mut current = path.clone();
        for _ in 0..self.iterations {
            let length = current.length();
            if length <= f64::EPSILON {
                break;
            }
            let a: f64 = rng.gen_range(0.0..=length);
            let b: f64 = rng.gen_range(0.0..=length);
            let (s1, s2) = if a <= b { (a, b) } else { (b, a) };
            let q1 = current.config_at_param(s1)?;
            let q2 = current.config_at_param(s2)?;
            let Some(shortcut) = local.connect(&q1, &q2)? else {
                continue;
            };
            if shortcut.length() + 1e-9 >= s2 - s1 {
                continue;
            }
            let mut candidate = current.extract(0.0, s1)?;
            candidate.concatenate(&shortcut)?;
            candidate.concatenate(&current.extract(s2, length)?)?;
            current = candidate;
        }
        Ok(current)
    }
}

/// Greedy pass over the waypoints: from each kept waypoint, jump to the
/// furthest later waypoint reachable by a valid direct path.
#[derive(Debug, Clone, Default)]
pub struct SimpleShortcut;

impl PathOptimizer for SimpleShortcut {
    fn name(&self) -> &str {
        "SimpleShortcut"
    }

    fn optimize(&self, path: &Path, local: &LocalPlanner<'_>, _rng: &mut StdRng) -> DomainResult<Path> {
        let waypoints = path.waypoints();
        let mut result = Path::new(vec![waypoints[0].clone()])?;
        let mut i = 0;
        while i + 1 < waypoints.len() {
            let mut jumped = false;
            for j in (i + 2..waypoints.len()).rev() {
                if let Some(shortcut) = local.connect(&waypoints[i], &waypoints[j])? {
                    result.concatenate(&shortcut)?;
                    i = j;
                    jumped = true;
                    break;
                }
            }
            if !jumped {
                result.concatenate(&Path::straight(&waypoints[i], &waypoints[i + 1])?)?;
                i += 1;
            }
        }
        Ok(result)
    }
}
