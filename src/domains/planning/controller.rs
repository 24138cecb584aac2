use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::paths::Path;
use crate::domains::roadmap::Roadmap;
use crate::domains::strategies::{PathPlanner, PlannerContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningState {
    Idle,
    Ready,
    Stepping,
    Solved,
    Interrupted,
    Failed,
}

impl PlanningState {
    fn from_code(code: u8) -> Self {
        match code {
            1 => PlanningState::Ready,
            2 => PlanningState::Stepping,
            3 => PlanningState::Solved,
            4 => PlanningState::Interrupted,
            5 => PlanningState::Failed,
            _ => PlanningState::Idle,
        }
    }

    /// Planning is over and only `finish` remains.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanningState::Solved | PlanningState::Interrupted | PlanningState::Failed)
    }
}

/// Planning state readable without holding the controller, so observers
/// see `Stepping` while a step is running on another thread.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    code: Arc<AtomicU8>,
}

impl StateHandle {
    pub fn get(&self) -> PlanningState {
        PlanningState::from_code(self.code.load(Ordering::Acquire))
    }

    fn set(&self, state: PlanningState) {
        self.code.store(state as u8, Ordering::Release);
    }
}

/// What a single call to `execute_one_step` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub finished: bool,
    pub state: PlanningState,
    pub steps: usize,
}

/// Step-by-step planning state machine.
///
/// ```text
/// Idle -> Ready -> Stepping -> {Solved, Interrupted, Failed} -> Idle
/// ```
///
/// The controller owns the planner for the duration of one planning query;
/// roadmap and strategies are lent to it through a `PlannerContext` per call.
pub struct PlanningController {
    state: StateHandle,
    planner: Option<Box<dyn PathPlanner>>,
    steps: usize,
    max_iterations: usize,
    failure: Option<String>,
}

impl fmt::Debug for PlanningController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanningController")
            .field("state", &self.state.get())
            .field("planner", &self.planner.as_ref().map(|p| p.name().to_string()))
            .field("steps", &self.steps)
            .field("max_iterations", &self.max_iterations)
            .field("failure", &self.failure)
            .finish()
    }
}

impl PlanningController {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            state: StateHandle::default(),
            planner: None,
            steps: 0,
            max_iterations,
            failure: None,
        }
    }

    pub fn state(&self) -> PlanningState {
        self.state.get()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn planner_name(&self) -> Option<&str> {
        self.planner.as_ref().map(|p| p.name())
    }

    /// Inserts the query into the roadmap and starts `planner`. Any previous
    /// query is dropped. Returns whether init and a goal are already connected,
    /// in which case the controller goes straight to `Solved`.
    pub fn prepare(
        &mut self,
        mut planner: Box<dyn PathPlanner>,
        init: Configuration,
        goals: Vec<Configuration>,
        ctx: &mut PlannerContext<'_>,
    ) -> DomainResult<bool> {
        if goals.is_empty() {
            return Err(DomainError::not_configured("no goal configuration"));
        }
        self.state.set(PlanningState::Idle);
        self.planner = None;
        self.steps = 0;
        self.failure = None;

        ctx.roadmap.reset_query();
        let init_node = ctx.roadmap.add_or_get_node(init);
        ctx.roadmap.set_init_node(init_node)?;
        for goal in goals {
            let goal_node = ctx.roadmap.add_or_get_node(goal);
            ctx.roadmap.add_goal_node(goal_node)?;
        }

        if let Err(e) = planner.start(ctx) {
            self.fail(e.to_string());
            return Err(e);
        }
        self.planner = Some(planner);
        let connected = ctx.roadmap.init_connected_to_goal();
        self.state.set(if connected { PlanningState::Solved } else { PlanningState::Ready });
        Ok(connected)
    }

    /// Runs one unit of planner work. Returns `true` once planning is over.
    pub fn execute_one_step(&mut self, ctx: &mut PlannerContext<'_>) -> DomainResult<StepReport> {
        match self.state.get() {
            PlanningState::Idle => return Err(DomainError::NoActivePlanning),
            state if state.is_terminal() => return Ok(self.report(true)),
            _ => {}
        }
        if ctx.cancelled() {
            self.state.set(PlanningState::Interrupted);
            return Ok(self.report(true));
        }
        let Some(planner) = self.planner.as_mut() else {
            return Err(DomainError::NoActivePlanning);
        };

        self.state.set(PlanningState::Stepping);
        if let Err(e) = planner.one_step(ctx) {
            self.fail(e.to_string());
            return Err(e);
        }
        self.steps += 1;

        if ctx.cancelled() {
            self.state.set(PlanningState::Interrupted);
        } else if ctx.roadmap.init_connected_to_goal() {
            self.state.set(PlanningState::Solved);
        } else if self.steps >= self.max_iterations {
            self.fail(format!("maximal number of iterations reached: {}", self.max_iterations));
        }
        Ok(self.report(self.state.get().is_terminal()))
    }

    /// Ends the query and extracts the connecting path, if the roadmap has one.
    pub fn finish(&mut self, roadmap: &Roadmap) -> DomainResult<Option<Path>> {
        if self.state.get() == PlanningState::Idle {
            return Err(DomainError::NoActivePlanning);
        }
        let path = roadmap.solution_path()?;
        self.state.set(PlanningState::Idle);
        self.planner = None;
        Ok(path)
    }

    fn fail(&mut self, reason: String) {
        self.state.set(PlanningState::Failed);
        self.failure = Some(reason);
    }

    fn report(&self, finished: bool) -> StepReport {
        StepReport {
            finished,
            state: self.state.get(),
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::planning::CancellationToken;
    use crate::domains::ports::CollisionChecker;
    use crate::domains::roadmap::EdgeDirection;
    use crate::domains::strategies::{
        LocalPlanner, NoValidation, StraightSteering, StrategyParameters, UniformShooter,
    };
    use nalgebra::Point3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Free;

    impl CollisionChecker for Free {
        fn is_valid(&self, _q: &Configuration) -> bool {
            true
        }
        fn object_names(&self) -> Vec<String> {
            Vec::new()
        }
        fn distance_to_object(&self, _object: &str, _point: &Point3<f64>) -> Option<f64> {
            None
        }
    }

    /// Connects init to the first goal on its `solve_at`-th step, or never.
    struct Scripted {
        solve_at: Option<usize>,
        calls: usize,
        cancel_during: Option<CancellationToken>,
    }

    impl PathPlanner for Scripted {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn start(&mut self, _ctx: &mut PlannerContext<'_>) -> DomainResult<()> {
            Ok(())
        }

        fn one_step(&mut self, ctx: &mut PlannerContext<'_>) -> DomainResult<()> {
            self.calls += 1;
            if let Some(token) = &self.cancel_during {
                token.cancel();
            }
            if Some(self.calls) == self.solve_at {
                let init = ctx.roadmap.init_node().unwrap();
                let goal = ctx.roadmap.goal_nodes()[0];
                let path = Path::straight(
                    &ctx.roadmap.node(init)?.config.clone(),
                    &ctx.roadmap.node(goal)?.config.clone(),
                )?;
                ctx.roadmap.add_edge(init, goal, path, EdgeDirection::BothWays, None)?;
            }
            Ok(())
        }
    }

    fn run<R>(cancel: &CancellationToken, roadmap: &mut Roadmap, f: impl FnOnce(&mut PlannerContext<'_>) -> R) -> R {
        let steering = StraightSteering;
        let validation = NoValidation;
        let shooter = UniformShooter;
        let params = StrategyParameters::default();
        let bounds = vec![(-1.0, 1.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = PlannerContext {
            roadmap,
            local: LocalPlanner {
                steering: &steering,
                validation: &validation,
                projector: None,
                checker: &Free,
            },
            shooter: &shooter,
            sample_projection: None,
            bounds: &bounds,
            rng: &mut rng,
            cancel,
            params: &params,
        };
        f(&mut ctx)
    }

    fn scripted(solve_at: Option<usize>) -> Box<dyn PathPlanner> {
        Box::new(Scripted {
            solve_at,
            calls: 0,
            cancel_during: None,
        })
    }

    fn q(x: f64) -> Configuration {
        Configuration::new(vec![x])
    }

    #[test]
    fn test_step_without_prepare_fails() {
        let mut controller = PlanningController::new(10);
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        let result = run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx));
        assert!(matches!(result, Err(DomainError::NoActivePlanning)));
        let result = controller.finish(&roadmap);
        assert!(matches!(result, Err(DomainError::NoActivePlanning)));
    }

    #[test]
    fn test_solved_after_scripted_steps() {
        let mut controller = PlanningController::new(10);
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        let connected = run(&cancel, &mut roadmap, |ctx| {
            controller.prepare(scripted(Some(3)), q(0.0), vec![q(1.0)], ctx)
        })
        .unwrap();
        assert!(!connected);
        assert_eq!(controller.state(), PlanningState::Ready);

        let mut reports = Vec::new();
        loop {
            let report = run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap();
            reports.push(report);
            if report.finished {
                break;
            }
        }
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].state, PlanningState::Stepping);
        assert_eq!(controller.state(), PlanningState::Solved);

        let path = controller.finish(&roadmap).unwrap();
        assert!(path.is_some());
        assert_eq!(controller.state(), PlanningState::Idle);
    }

    #[test]
    fn test_iteration_cap_fails_planning() {
        let mut controller = PlanningController::new(2);
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        run(&cancel, &mut roadmap, |ctx| controller.prepare(scripted(None), q(0.0), vec![q(1.0)], ctx)).unwrap();
        assert!(!run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap().finished);
        let report = run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap();
        assert!(report.finished);
        assert_eq!(report.state, PlanningState::Failed);
        assert!(controller.failure().is_some());

        let path = controller.finish(&roadmap).unwrap();
        assert!(path.is_none());
    }

    #[test]
    fn test_cancel_observed_inside_step() {
        let mut controller = PlanningController::new(10);
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        let planner = Box::new(Scripted {
            solve_at: None,
            calls: 0,
            cancel_during: Some(cancel.clone()),
        });
        run(&cancel, &mut roadmap, |ctx| controller.prepare(planner, q(0.0), vec![q(1.0)], ctx)).unwrap();
        let report = run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap();
        assert!(report.finished);
        assert_eq!(report.state, PlanningState::Interrupted);
    }

    #[test]
    fn test_prepare_detects_existing_connection() {
        let mut controller = PlanningController::new(10);
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        let a = roadmap.add_node(q(0.0));
        let b = roadmap.add_node(q(1.0));
        roadmap
            .add_edge(a, b, Path::straight(&q(0.0), &q(1.0)).unwrap(), EdgeDirection::BothWays, None)
            .unwrap();

        let connected = run(&cancel, &mut roadmap, |ctx| {
            controller.prepare(scripted(None), q(0.0), vec![q(1.0)], ctx)
        })
        .unwrap();
        assert!(connected);
        assert!(run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap().finished);
        assert_eq!(roadmap.node_count(), 2);
    }

    #[test]
    fn test_one_way_edge_from_goal_to_init_is_not_a_solution() {
        let mut controller = PlanningController::new(1);
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        let goal = roadmap.add_node(q(1.0));
        let init = roadmap.add_node(q(0.0));
        roadmap
            .add_edge(goal, init, Path::straight(&q(1.0), &q(0.0)).unwrap(), EdgeDirection::OneWay, None)
            .unwrap();

        let connected = run(&cancel, &mut roadmap, |ctx| {
            controller.prepare(scripted(None), q(0.0), vec![q(1.0)], ctx)
        })
        .unwrap();
        assert!(!connected);
        assert_eq!(controller.state(), PlanningState::Ready);
        let report = run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap();
        assert_eq!(report.state, PlanningState::Failed);
    }

    #[test]
    fn test_state_handle_follows_the_controller() {
        let mut controller = PlanningController::new(10);
        let handle = controller.state_handle();
        let cancel = CancellationToken::new();
        let mut roadmap = Roadmap::new();
        assert_eq!(handle.get(), PlanningState::Idle);
        run(&cancel, &mut roadmap, |ctx| controller.prepare(scripted(None), q(0.0), vec![q(1.0)], ctx)).unwrap();
        assert_eq!(handle.get(), PlanningState::Ready);
        cancel.cancel();
        run(&cancel, &mut roadmap, |ctx| controller.execute_one_step(ctx)).unwrap();
        assert_eq!(handle.get(), PlanningState::Interrupted);
        controller.finish(&roadmap).unwrap();
        assert_eq!(handle.get(), PlanningState::Idle);
    }
}
