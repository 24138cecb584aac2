use crate::domains::paths::Path;
use crate::domains::ports::CollisionChecker;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    /// Arc length up to which the path is known to be valid.
    pub valid_until: f64,
}

impl ValidationReport {
    fn whole(path: &Path) -> Self {
        Self {
            valid: true,
            valid_until: path.length(),
        }
    }
}

pub trait PathValidation: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, path: &Path, checker: &dyn CollisionChecker) -> ValidationReport;
}

/// Checks samples spaced at most `tolerance` apart, from the start.
#[derive(Debug, Clone)]
pub struct DiscretizedValidation {
    pub tolerance: f64,
}

impl PathValidation for DiscretizedValidation {
    fn name(&self) -> &str {
        "Discretized"
    }

    fn validate(&self, path: &Path, checker: &dyn CollisionChecker) -> ValidationReport {
        scan_prefix(path, checker, self.tolerance, path.length())
    }
}

/// Checks endpoints, then midpoints breadth-first until intervals are
/// shorter than `tolerance`. Collisions in the middle of long paths are found
/// early; the valid prefix is only computed once a collision is known.
#[derive(Debug, Clone)]
pub struct DichotomyValidation {
    pub tolerance: f64,
}

impl PathValidation for DichotomyValidation {
    fn name(&self) -> &str {
        "Dichotomy"
    }

    fn validate(&self, path: &Path, checker: &dyn CollisionChecker) -> ValidationReport {
        let length = path.length();
        let valid_at = |s: f64| path.config_at_param(s).map(|q| checker.is_valid(&q)).unwrap_or(false);
        if !valid_at(0.0) {
            return ValidationReport { valid: false, valid_until: 0.0 };
        }
        if !valid_at(length) {
            return scan_prefix(path, checker, self.tolerance, length);
        }
        let mut intervals = VecDeque::from([(0.0, length)]);
        while let Some((a, b)) = intervals.pop_front() {
            if b - a <= self.tolerance {
                continue;
            }
            let middle = 0.5 * (a + b);
            if !valid_at(middle) {
                return scan_prefix(path, checker, self.tolerance, middle);
            }
            intervals.push_back((a, middle));
            intervals.push_back((middle, b));
        }
        ValidationReport::whole(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoValidation;

impl PathValidation for NoValidation {
    fn name(&self) -> &str {
        "NoValidation"
    }

    fn validate(&self, path: &Path, _checker: &dyn CollisionChecker) -> ValidationReport {
        ValidationReport::whole(path)
    }
}

/// Walks from the start in steps of at most `step` until `up_to`, stopping at
/// the first invalid sample.
fn scan_prefix(path: &Path, checker: &dyn CollisionChecker, step: f64, up_to: f64) -> ValidationReport {
    let length = path.length();
    let count = if step > 0.0 { (up_to / step).ceil() as usize } else { 1 }.max(1);
    let mut last_valid = 0.0;
    for i in 0..=count {
        let s = (up_to * i as f64 / count as f64).min(length);
        let ok = path.config_at_param(s).map(|q| checker.is_valid(&q)).unwrap_or(false);
        if !ok {
            return ValidationReport {
                valid: false,
                valid_until: last_valid,
            };
        }
        last_valid = s;
    }
    ValidationReport {
        valid: up_to >= length,
        valid_until: last_valid,
    }
}
