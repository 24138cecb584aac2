use crate::common::{Configuration, DomainError, DomainResult};
use serde::{Deserialize, Serialize};

/// Piecewise-linear trajectory through configuration space, parameterized by
/// arc length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PathRecord")]
pub struct Path {
    waypoints: Vec<Configuration>,
}

/// Serialized form of a `Path`; decoding goes through `Path::new`.
#[derive(Deserialize)]
struct PathRecord {
    waypoints: Vec<Configuration>,
}

impl TryFrom<PathRecord> for Path {
    type Error = DomainError;

    fn try_from(record: PathRecord) -> DomainResult<Self> {
        Path::new(record.waypoints)
    }
}

impl Path {
    /// A path needs at least one waypoint; all waypoints share a dimension.
    pub fn new(waypoints: Vec<Configuration>) -> DomainResult<Self> {
        let first = waypoints
            .first()
            .ok_or_else(|| DomainError::invalid_argument("a path needs at least one waypoint"))?;
        let dim = first.dim();
        for waypoint in &waypoints {
            waypoint.ensure_dim(dim)?;
        }
        Ok(Self { waypoints })
    }

    pub fn straight(start: &Configuration, end: &Configuration) -> DomainResult<Self> {
        Self::new(vec![start.clone(), end.clone()])
    }

    pub fn waypoints(&self) -> &[Configuration] {
        &self.waypoints
    }

    pub fn start(&self) -> &Configuration {
        &self.waypoints[0]
    }

    pub fn end(&self) -> &Configuration {
        &self.waypoints[self.waypoints.len() - 1]
    }

    pub fn dim(&self) -> usize {
        self.start().dim()
    }

    pub fn length(&self) -> f64 {
        self.waypoints.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Configuration at arc length `s`, `s` in `[0, length]`.
    pub fn config_at_param(&self, s: f64) -> DomainResult<Configuration> {
        let length = self.length();
        if !s.is_finite() || s < 0.0 || s > length + 1e-12 {
            return Err(DomainError::invalid_argument(format!(
                "parameter {} outside [0, {}]",
                s, length
            )));
        }
        let mut travelled = 0.0;
        for w in self.waypoints.windows(2) {
            let segment = w[0].distance(&w[1]);
            if travelled + segment >= s {
                if segment <= f64::EPSILON {
                    return Ok(w[0].clone());
                }
                return Ok(w[0].interpolate(&w[1], (s - travelled) / segment));
            }
            travelled += segment;
        }
        Ok(self.end().clone())
    }

    /// Sub-path between arc lengths `from` and `to` (`from <= to`).
    pub fn extract(&self, from: f64, to: f64) -> DomainResult<Path> {
        if from > to {
            return Err(DomainError::invalid_argument(format!("empty interval [{}, {}]", from, to)));
        }
        let mut waypoints = vec![self.config_at_param(from)?];
        let mut travelled = 0.0;
        for w in self.waypoints.windows(2) {
            travelled += w[0].distance(&w[1]);
            if travelled > from && travelled < to {
                waypoints.push(w[1].clone());
            }
        }
        waypoints.push(self.config_at_param(to)?);
        Path::new(waypoints)
    }

    /// Appends `other`, dropping its first waypoint when it repeats our last one.
    pub fn concatenate(&mut self, other: &Path) -> DomainResult<()> {
        other.start().ensure_dim(self.dim())?;
        let skip = usize::from(other.start().approx_eq(self.end(), 1e-12));
        self.waypoints.extend(other.waypoints.iter().skip(skip).cloned());
        Ok(())
    }

    pub fn reversed(&self) -> Path {
        let mut waypoints = self.waypoints.clone();
        waypoints.reverse();
        Path { waypoints }
    }

    /// Evenly spaced samples no further apart than `step`, endpoints included.
    pub fn sample(&self, step: f64) -> Vec<Configuration> {
        let length = self.length();
        let count = if step > 0.0 { (length / step).ceil() as usize } else { 1 }.max(1);
        (0..=count)
            .filter_map(|i| self.config_at_param(length * i as f64 / count as f64).ok())
            .collect()
    }
}
