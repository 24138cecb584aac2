use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::ports::{CollisionChecker, Device};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Sphere { center: [f64; 3], radius: f64 },
    /// Axis-aligned box.
    Box { center: [f64; 3], half_extents: [f64; 3] },
}

impl Shape {
    /// Signed distance from `point` to the surface, negative inside.
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        match self {
            Shape::Sphere { center, radius } => (point - Point3::from(*center)).norm() - radius,
            Shape::Box { center, half_extents } => {
                let d = (point - Point3::from(*center)).abs() - Vector3::from(*half_extents);
                let outside = d.map(|v| v.max(0.0)).norm();
                let inside = d.x.max(d.y).max(d.z).min(0.0);
                outside + inside
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub name: String,
    #[serde(flatten)]
    pub shape: Shape,
}

/// Collision checking of a device against static workspace obstacles.
///
/// A configuration is valid when it lies inside the device bounds and every
/// monitored joint origin keeps at least `clearance` from every obstacle.
pub struct ObstacleField {
    device: Arc<dyn Device>,
    obstacles: Vec<Obstacle>,
    monitored: Vec<String>,
    clearance: f64,
}

impl ObstacleField {
    /// Monitors every joint of `device`.
    pub fn new(device: Arc<dyn Device>, clearance: f64) -> Self {
        let monitored = device.joint_names();
        Self {
            device,
            obstacles: Vec::new(),
            monitored,
            clearance,
        }
    }

    pub fn with_obstacle(mut self, name: &str, shape: Shape) -> DomainResult<Self> {
        if self.obstacles.iter().any(|o| o.name == name) {
            return Err(DomainError::DuplicateName { name: name.to_string() });
        }
        let degenerate = match &shape {
            Shape::Sphere { radius, .. } => *radius <= 0.0,
            Shape::Box { half_extents, .. } => half_extents.iter().any(|h| *h <= 0.0),
        };
        if degenerate {
            return Err(DomainError::invalid_argument(format!("obstacle {} has no volume", name)));
        }
        self.obstacles.push(Obstacle {
            name: name.to_string(),
            shape,
        });
        Ok(self)
    }

    /// Restricts checking to the named joints.
    pub fn monitoring(mut self, joints: &[&str]) -> DomainResult<Self> {
        let known = self.device.joint_names();
        if let Some(unknown) = joints.iter().find(|j| !known.iter().any(|k| k == *j)) {
            return Err(DomainError::invalid_geometry(format!("unknown joint {}", unknown)));
        }
        self.monitored = joints.iter().map(|j| j.to_string()).collect();
        Ok(self)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    fn within_bounds(&self, q: &Configuration) -> bool {
        let bounds = self.device.bounds();
        q.dim() == bounds.len()
            && q.as_slice()
                .iter()
                .zip(&bounds)
                .all(|(v, (lo, hi))| v.is_finite() && *v >= *lo && *v <= *hi)
    }
}

impl CollisionChecker for ObstacleField {
    fn is_valid(&self, q: &Configuration) -> bool {
        if !self.within_bounds(q) {
            return false;
        }
        self.monitored.iter().all(|joint| {
            let Some(pose) = self.device.joint_transform(joint, q) else {
                return false;
            };
            let origin = Point3::from(pose.translation.vector);
            self.obstacles
                .iter()
                .all(|o| o.shape.signed_distance(&origin) >= self.clearance)
        })
    }

    fn object_names(&self) -> Vec<String> {
        self.obstacles.iter().map(|o| o.name.clone()).collect()
    }

    fn distance_to_object(&self, object: &str, point: &Point3<f64>) -> Option<f64> {
        self.obstacles
            .iter()
            .find(|o| o.name == object)
            .map(|o| o.shape.signed_distance(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::KinematicChain;
    use approx::assert_relative_eq;

    fn field() -> ObstacleField {
        let device = Arc::new(KinematicChain::planar_point("point", 5.0).unwrap());
        ObstacleField::new(device, 0.1)
            .with_obstacle(
                "pillar",
                Shape::Sphere {
                    center: [0.0, 0.0, 0.0],
                    radius: 1.0,
                },
            )
            .unwrap()
            .monitoring(&["y"])
            .unwrap()
    }

    #[test]
    fn test_sphere_blocks_configurations() {
        let field = field();
        assert!(!field.is_valid(&Configuration::new(vec![0.5, 0.0])));
        assert!(!field.is_valid(&Configuration::new(vec![1.05, 0.0])));
        assert!(field.is_valid(&Configuration::new(vec![2.0, 0.0])));
        assert!(!field.is_valid(&Configuration::new(vec![6.0, 0.0])));
    }

    #[test]
    fn test_box_distance() {
        let shape = Shape::Box {
            center: [0.0, 0.0, 0.0],
            half_extents: [1.0, 1.0, 1.0],
        };
        assert_relative_eq!(shape.signed_distance(&Point3::new(3.0, 0.0, 0.0)), 2.0);
        assert_relative_eq!(shape.signed_distance(&Point3::new(0.5, 0.0, 0.0)), -0.5);
        assert_relative_eq!(shape.signed_distance(&Point3::new(2.0, 2.0, 1.0)), 2f64.sqrt());
    }

    #[test]
    fn test_object_queries() {
        let field = field();
        assert_eq!(field.object_names(), vec!["pillar".to_string()]);
        let d = field.distance_to_object("pillar", &Point3::new(0.0, 3.0, 0.0)).unwrap();
        assert_relative_eq!(d, 2.0);
        assert!(field.distance_to_object("wall", &Point3::origin()).is_none());
        assert!(field.monitoring(&["z"]).is_err());
    }
}
