use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::ops::Index;

use super::{DomainError, DomainResult};

/// A point of the robot's configuration space: one real value per degree of freedom.
///
/// Values are copied in and out of every store; nothing hands out interior
/// references that could be mutated behind a store's back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration(Vec<f64>);

impl Configuration {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.0)
    }

    /// Euclidean distance; the metric every roadmap query uses.
    pub fn distance(&self, other: &Configuration) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Linear interpolation, `t` in [0, 1].
    pub fn interpolate(&self, other: &Configuration, t: f64) -> Configuration {
        Configuration(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a + t * (b - a))
                .collect(),
        )
    }

    pub fn approx_eq(&self, other: &Configuration, tolerance: f64) -> bool {
        self.dim() == other.dim() && self.distance(other) <= tolerance
    }

    pub fn ensure_dim(&self, expected: usize) -> DomainResult<()> {
        if self.dim() != expected {
            return Err(DomainError::invalid_argument(format!(
                "configuration has {} dofs, expected {}",
                self.dim(),
                expected
            )));
        }
        Ok(())
    }
}

impl Index<usize> for Configuration {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl From<Vec<f64>> for Configuration {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for Configuration {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

impl From<DVector<f64>> for Configuration {
    fn from(v: DVector<f64>) -> Self {
        Self(v.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_and_interpolation() {
        let a = Configuration::new(vec![0.0, 0.0]);
        let b = Configuration::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert_eq!(a.interpolate(&b, 0.5), Configuration::new(vec![1.5, 2.0]));
    }

    #[test]
    fn test_dimension_check() {
        let q = Configuration::zeros(3);
        assert!(q.ensure_dim(3).is_ok());
        assert!(matches!(q.ensure_dim(2), Err(DomainError::InvalidArgument { .. })));
    }
}
