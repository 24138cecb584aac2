use crate::common::{Configuration, DomainResult};
use nalgebra::{DMatrix, DVector, Isometry3, Point3, Vector3};
use std::ops::Range;
use std::path::Path;

/// Kinematic model of the robot a problem is defined for.
///
/// Joint and COM queries return `None` for names the model does not know;
/// constraint creation turns that into `InvalidGeometry`.
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    fn config_size(&self) -> usize;

    /// Lower/upper bound per degree of freedom.
    fn bounds(&self) -> Vec<(f64, f64)>;

    fn joint_names(&self) -> Vec<String>;

    /// Indices of the configuration entries driven by `joint`.
    fn joint_dofs(&self, joint: &str) -> Option<Range<usize>>;

    fn dof_index(&self, dof_name: &str) -> Option<usize>;

    /// World pose of `joint` at configuration `q`.
    fn joint_transform(&self, joint: &str, q: &Configuration) -> Option<Isometry3<f64>>;

    /// Center of mass of the subtree rooted at `com`; the empty name means the whole robot.
    fn center_of_mass(&self, com: &str, q: &Configuration) -> Option<Vector3<f64>>;
}

/// Collision checking against the problem's environment.
pub trait CollisionChecker: Send + Sync {
    fn is_valid(&self, q: &Configuration) -> bool;

    fn object_names(&self) -> Vec<String>;

    /// Distance from `point` to the surface of the named environment object.
    fn distance_to_object(&self, object: &str, point: &Point3<f64>) -> Option<f64>;
}

/// A stack of constraints split into priority levels, highest precedence first.
pub trait ConstraintSystem {
    fn config_size(&self) -> usize;

    fn level_count(&self) -> usize;

    fn level_value_and_jacobian(&self, level: usize, q: &Configuration) -> (DVector<f64>, DMatrix<f64>);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub error_threshold: f64,
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            error_threshold: 1e-4,
            max_iterations: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub config: Configuration,
    pub residual: f64,
    pub converged: bool,
}

/// Projects configurations onto the manifold a `ConstraintSystem` defines.
pub trait NumericalSolver: Send + Sync {
    fn name(&self) -> &str;

    fn project(&self, system: &dyn ConstraintSystem, q: &Configuration, settings: &SolverSettings) -> Projection;
}

/// Storage backend for encoded roadmap files.
pub trait RoadmapStore: Send + Sync {
    fn save_roadmap_bytes(&self, location: &Path, bytes: &[u8]) -> DomainResult<()>;
    fn load_roadmap_bytes(&self, location: &Path) -> DomainResult<Vec<u8>>;
}
