use crate::common::Configuration;
use crate::domains::paths::Path;
use crate::domains::ports::{ConstraintSystem, NumericalSolver, SolverSettings};

const MAX_DICHOTOMY_DEPTH: usize = 12;

/// Solver, constraint system and budget a projector works with.
#[derive(Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub system: &'a dyn ConstraintSystem,
    pub solver: &'a dyn NumericalSolver,
    pub settings: SolverSettings,
}

impl ProjectionContext<'_> {
    /// `None` when the solver does not converge.
    pub fn project_config(&self, q: &Configuration) -> Option<Configuration> {
        if self.system.level_count() == 0 {
            return Some(q.clone());
        }
        let projection = self.solver.project(self.system, q, &self.settings);
        projection.converged.then_some(projection.config)
    }
}

/// Maps a path whose waypoints may violate the constraints onto a path that
/// stays on the constraint manifold. `None` when that fails.
pub trait PathProjector: Send + Sync {
    fn name(&self) -> &str;

    fn project(&self, path: &Path, ctx: &ProjectionContext<'_>) -> Option<Path>;
}

/// Leaves paths untouched.
#[derive(Debug, Clone, Default)]
pub struct NoProjector;

impl PathProjector for NoProjector {
    fn name(&self) -> &str {
        "None"
    }

    fn project(&self, path: &Path, _ctx: &ProjectionContext<'_>) -> Option<Path> {
        Some(path.clone())
    }
}

/// Projects samples taken every `step` along the path and rejects the result
/// when two consecutive projections jump apart.
#[derive(Debug, Clone)]
pub struct ProgressiveProjector {
    pub step: f64,
}

impl PathProjector for ProgressiveProjector {
    fn name(&self) -> &str {
        "Progressive"
    }

    fn project(&self, path: &Path, ctx: &ProjectionContext<'_>) -> Option<Path> {
        let mut projected: Vec<Configuration> = Vec::new();
        for sample in path.sample(self.step) {
            let q = ctx.project_config(&sample)?;
            if let Some(previous) = projected.last() {
                if previous.distance(&q) > 2.0 * self.step {
                    return None;
                }
            }
            projected.push(q);
        }
        Path::new(projected).ok()
    }
}

/// Projects the endpoints, then recursively the midpoints of every segment
/// longer than `tolerance`.
#[derive(Debug, Clone)]
pub struct DichotomyProjector {
    pub tolerance: f64,
}

impl DichotomyProjector {
    fn refine(
        &self,
        a: &Configuration,
        b: &Configuration,
        depth: usize,
        ctx: &ProjectionContext<'_>,
        out: &mut Vec<Configuration>,
    ) -> Option<()> {
        if a.distance(b) <= self.tolerance {
            out.push(b.clone());
            return Some(());
        }
        if depth >= MAX_DICHOTOMY_DEPTH {
            return None;
        }
        let middle = ctx.project_config(&a.interpolate(b, 0.5))?;
        self.refine(a, &middle, depth + 1, ctx, out)?;
        self.refine(&middle, b, depth + 1, ctx, out)
    }
}

impl PathProjector for DichotomyProjector {
    fn name(&self) -> &str {
        "Dichotomy"
    }

    fn project(&self, path: &Path, ctx: &ProjectionContext<'_>) -> Option<Path> {
        let projected: Vec<Configuration> = path
            .waypoints()
            .iter()
            .map(|q| ctx.project_config(q))
            .collect::<Option<Vec<_>>>()?;
        let mut out = vec![projected[0].clone()];
        for pair in projected.windows(2) {
            self.refine(&pair[0], &pair[1], 0, ctx, &mut out)?;
        }
        Path::new(out).ok()
    }
}
