pub mod diffusing;
pub mod prm;

pub use diffusing::DiffusingPlanner;
pub use prm::PrmPlanner;

use super::{ConfigurationShooter, LocalPlanner, ProjectionContext, StrategyParameters};
use crate::common::{Configuration, DomainResult};
use crate::domains::planning::CancellationToken;
use crate::domains::roadmap::{EdgeDirection, Roadmap};
use rand::rngs::StdRng;

/// Everything a planner may touch during one unit of work.
pub struct PlannerContext<'a> {
    pub roadmap: &'a mut Roadmap,
    pub local: LocalPlanner<'a>,
    pub shooter: &'a dyn ConfigurationShooter,
    /// Projection applied to random samples when the problem has constraints.
    pub sample_projection: Option<ProjectionContext<'a>>,
    pub bounds: &'a [(f64, f64)],
    pub rng: &'a mut StdRng,
    pub cancel: &'a CancellationToken,
    pub params: &'a StrategyParameters,
}

impl PlannerContext<'_> {
    /// Random sample, projected onto the constraints. Not collision checked.
    pub fn sample(&mut self) -> Option<Configuration> {
        let q = self.shooter.shoot(self.bounds, self.rng);
        match &self.sample_projection {
            Some(projection) => projection.project_config(&q),
            None => Some(q),
        }
    }

    pub fn sample_valid(&mut self) -> Option<Configuration> {
        self.sample().filter(|q| self.local.checker.is_valid(q))
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A roadmap-building algorithm driven one step at a time.
///
/// Steps must check `ctx.cancelled()` between expensive operations and
/// return early when it is set; the controller decides what happens next.
pub trait PathPlanner: Send {
    fn name(&self) -> &str;

    /// Called once after the init and goal nodes are in the roadmap.
    fn start(&mut self, ctx: &mut PlannerContext<'_>) -> DomainResult<()> {
        connect_init_and_goals(ctx)
    }

    fn one_step(&mut self, ctx: &mut PlannerContext<'_>) -> DomainResult<()>;
}

/// Tries a direct local path from the init node to every goal it cannot reach yet.
pub fn connect_init_and_goals(ctx: &mut PlannerContext<'_>) -> DomainResult<()> {
    let Some(init) = ctx.roadmap.init_node() else {
        return Ok(());
    };
    let goals = ctx.roadmap.goal_nodes().to_vec();
    for goal in goals {
        if ctx.cancelled() {
            return Ok(());
        }
        if ctx.roadmap.reaches(init, goal) {
            continue;
        }
        let from = ctx.roadmap.node(init)?.config.clone();
        let to = ctx.roadmap.node(goal)?.config.clone();
        if let Some(path) = ctx.local.connect(&from, &to)? {
            ctx.roadmap.add_edge(init, goal, path, EdgeDirection::BothWays, None)?;
        }
    }
    Ok(())
}
