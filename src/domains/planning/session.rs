use super::cancel::CancellationToken;
use super::controller::{PlanningController, PlanningState, StateHandle, StepReport};
use super::events::PlanningEvent;
use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::configurations::ConfigurationSet;
use crate::domains::constraints::{
    ApplyOutcome, ConstraintKind, ConstraintSet, EvaluationContext, Point, StackSelection, ValueAndJacobian,
};
use crate::domains::logger::DynLogger;
use crate::domains::paths::{Path, PathBank, PathId};
use crate::domains::ports::{CollisionChecker, Device, NumericalSolver, RoadmapStore, SolverSettings};
use crate::domains::roadmap::{self, EdgeDirection, EdgeView, Roadmap, RoadmapNode};
use crate::domains::strategies::{
    LocalPlanner, PlannerContext, ProjectionContext, StrategyParameters, StrategyRegistry, StrategySelection,
};
use chrono::Utc;
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Tolerance used to match path endpoints against roadmap configurations.
const ENDPOINT_TOLERANCE: f64 = 1e-9;

/// The capabilities a problem is defined by.
#[derive(Clone)]
pub struct ProblemDefinition {
    pub name: String,
    pub device: Arc<dyn Device>,
    pub environment: Arc<dyn CollisionChecker>,
}

/// Per-session tuning, usually derived from the application config.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub solver: SolverSettings,
    pub max_planning_iterations: usize,
    pub parameters: StrategyParameters,
    pub random_seed: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            solver: SolverSettings::default(),
            max_planning_iterations: 10_000,
            parameters: StrategyParameters::default(),
            random_seed: 0,
        }
    }
}

/// Collaborators a session is wired with.
#[derive(Clone)]
pub struct SessionServices {
    pub solver: Arc<dyn NumericalSolver>,
    pub roadmap_store: Arc<dyn RoadmapStore>,
    pub strategies: Arc<StrategyRegistry>,
    pub logger: DynLogger,
}

/// Kinds of names `get_available` can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailableKind {
    PathPlanner,
    SteeringMethod,
    PathValidation,
    PathProjector,
    ConfigurationShooter,
    PathOptimizer,
    SelectedPathOptimizers,
    NumericalConstraint,
    Problem,
}

impl std::str::FromStr for AvailableKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pathplanner" => Ok(AvailableKind::PathPlanner),
            "steeringmethod" => Ok(AvailableKind::SteeringMethod),
            "pathvalidation" => Ok(AvailableKind::PathValidation),
            "pathprojector" => Ok(AvailableKind::PathProjector),
            "configurationshooter" => Ok(AvailableKind::ConfigurationShooter),
            "pathoptimizer" => Ok(AvailableKind::PathOptimizer),
            "selectedpathoptimizer" | "selectedpathoptimizers" => Ok(AvailableKind::SelectedPathOptimizers),
            "numericalconstraint" | "constraint" => Ok(AvailableKind::NumericalConstraint),
            "problem" => Ok(AvailableKind::Problem),
            _ => Err(DomainError::invalid_argument(format!("type \"{}\" not known", s))),
        }
    }
}

/// One planning problem and everything scoped to it: constraints,
/// configurations, roadmap, stored paths, strategy selection and the
/// step-by-step controller.
///
/// Mutating planning calls are serialized on the controller mutex. Queries
/// only take the read side of the lock guarding what they inspect. Locks are
/// always taken in this order: controller, selection, constraints,
/// configurations, roadmap, paths, rng, events. Interruption goes through the
/// cancellation token and reading the planning state through its handle;
/// neither takes a lock.
pub struct ProblemSession {
    id: String,
    problem: ProblemDefinition,
    services: SessionServices,
    params: StrategyParameters,
    controller: Mutex<PlanningController>,
    state: StateHandle,
    selection: RwLock<StrategySelection>,
    constraints: RwLock<ConstraintSet>,
    configurations: RwLock<ConfigurationSet>,
    roadmap: RwLock<Roadmap>,
    paths: RwLock<PathBank>,
    rng: Mutex<StdRng>,
    events: Mutex<Vec<PlanningEvent>>,
    cancel: CancellationToken,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn optional_joint(joint: &str) -> Option<String> {
    (!joint.is_empty()).then(|| joint.to_string())
}

fn check_tolerance(tolerance: f64) -> DomainResult<()> {
    if !(tolerance > 0.0) || !tolerance.is_finite() {
        return Err(DomainError::invalid_argument(format!("tolerance must be positive, got {}", tolerance)));
    }
    Ok(())
}

impl ProblemSession {
    pub fn new(id: &str, problem: ProblemDefinition, services: SessionServices, settings: SessionSettings) -> Self {
        let dimension = problem.device.config_size();
        let controller = PlanningController::new(settings.max_planning_iterations);
        Self {
            id: id.to_string(),
            params: settings.parameters,
            state: controller.state_handle(),
            controller: Mutex::new(controller),
            selection: RwLock::new(StrategySelection::default()),
            constraints: RwLock::new(ConstraintSet::new(settings.solver)),
            configurations: RwLock::new(ConfigurationSet::new(dimension)),
            roadmap: RwLock::new(Roadmap::new()),
            paths: RwLock::new(PathBank::new()),
            rng: Mutex::new(StdRng::seed_from_u64(settings.random_seed)),
            events: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            problem,
            services,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn problem_name(&self) -> &str {
        &self.problem.name
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.problem.device
    }

    fn evaluation_context(&self) -> EvaluationContext<'_> {
        EvaluationContext {
            device: self.problem.device.as_ref(),
            environment: self.problem.environment.as_ref(),
        }
    }

    fn record(&self, event: PlanningEvent) {
        lock(&self.events).push(event);
    }

    /// Events recorded since the last call, oldest first.
    pub fn take_events(&self) -> Vec<PlanningEvent> {
        std::mem::take(&mut *lock(&self.events))
    }

    pub fn set_random_seed(&self, seed: u64) {
        *lock(&self.rng) = StdRng::seed_from_u64(seed);
    }

    // ---- constraints -------------------------------------------------------

    pub fn create_constraint(&self, name: &str, kind: ConstraintKind) -> DomainResult<()> {
        let kind_name = kind.kind_name().to_string();
        write(&self.constraints).register(name, kind, &self.evaluation_context())?;
        self.record(PlanningEvent::ConstraintRegistered {
            session_id: self.id.clone(),
            name: name.to_string(),
            kind: kind_name,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// `rotation` is a quaternion given as `[x, y, z, w]`. An empty `joint1`
    /// means the world frame.
    pub fn create_orientation_constraint(
        &self,
        name: &str,
        joint1: &str,
        joint2: &str,
        rotation: [f64; 4],
        mask: &[bool],
    ) -> DomainResult<()> {
        let [x, y, z, w] = rotation;
        self.create_constraint(
            name,
            ConstraintKind::Orientation {
                joint1: optional_joint(joint1),
                joint2: joint2.to_string(),
                target: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
                mask: mask.to_vec(),
            },
        )
    }

    /// `transform` is `[x, y, z, qx, qy, qz, qw]`.
    pub fn create_transformation_constraint(
        &self,
        name: &str,
        joint1: &str,
        joint2: &str,
        transform: [f64; 7],
        mask: &[bool],
    ) -> DomainResult<()> {
        let [x, y, z, qx, qy, qz, qw] = transform;
        let target = Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
        );
        self.create_constraint(
            name,
            ConstraintKind::Transformation {
                joint1: optional_joint(joint1),
                joint2: joint2.to_string(),
                target,
                mask: mask.to_vec(),
            },
        )
    }

    pub fn create_position_constraint(
        &self,
        name: &str,
        joint1: &str,
        joint2: &str,
        point1: Point,
        point2: Point,
        mask: &[bool],
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::Position {
                joint1: optional_joint(joint1),
                joint2: joint2.to_string(),
                point1,
                point2,
                mask: mask.to_vec(),
            },
        )
    }

    pub fn create_relative_com_constraint(
        &self,
        name: &str,
        com: &str,
        joint: &str,
        point: Point,
        mask: &[bool],
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::RelativeCom {
                com: com.to_string(),
                joint: joint.to_string(),
                point,
                mask: mask.to_vec(),
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_com_between_feet(
        &self,
        name: &str,
        com: &str,
        joint_left: &str,
        joint_right: &str,
        point_left: Point,
        point_right: Point,
        joint_reference: &str,
        mask: &[bool],
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::ComBetweenFeet {
                com: com.to_string(),
                joint_left: joint_left.to_string(),
                joint_right: joint_right.to_string(),
                point_left,
                point_right,
                joint_reference: joint_reference.to_string(),
                mask: mask.to_vec(),
            },
        )
    }

    pub fn create_convex_shape_contact_constraint(
        &self,
        name: &str,
        floor_joints: &[&str],
        object_joints: &[&str],
        points: &[Point],
        object_triangles: &[Vec<usize>],
        floor_triangles: &[Vec<usize>],
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::ConvexShapeContact {
                floor_joints: floor_joints.iter().map(|j| j.to_string()).collect(),
                object_joints: object_joints.iter().map(|j| j.to_string()).collect(),
                points: points.to_vec(),
                object_triangles: object_triangles.to_vec(),
                floor_triangles: floor_triangles.to_vec(),
            },
        )
    }

    #[deprecated(note = "use create_convex_shape_contact_constraint")]
    pub fn create_static_stability_gravity_constraint(
        &self,
        name: &str,
        floor_joints: &[&str],
        object_joints: &[&str],
        points: &[Point],
        object_triangles: &[Vec<usize>],
        floor_triangles: &[Vec<usize>],
    ) -> DomainResult<()> {
        self.services
            .logger
            .warn("create_static_stability_gravity_constraint is deprecated, registering a convex shape contact");
        self.create_convex_shape_contact_constraint(name, floor_joints, object_joints, points, object_triangles, floor_triangles)
    }

    pub fn create_static_stability_constraint(
        &self,
        name: &str,
        joints: &[&str],
        points: &[Point],
        normals: &[Point],
        com_root_joint: &str,
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::StaticStability {
                joints: joints.iter().map(|j| j.to_string()).collect(),
                points: points.to_vec(),
                normals: normals.to_vec(),
                com_root_joint: com_root_joint.to_string(),
            },
        )
    }

    pub fn create_configuration_constraint(&self, name: &str, goal: Configuration) -> DomainResult<()> {
        self.create_constraint(name, ConstraintKind::Configuration { goal })
    }

    pub fn create_distance_between_joint_constraint(
        &self,
        name: &str,
        joint1: &str,
        joint2: &str,
        distance: f64,
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::DistanceBetweenJoints {
                joint1: joint1.to_string(),
                joint2: joint2.to_string(),
                distance,
            },
        )
    }

    pub fn create_distance_between_joint_and_objects(
        &self,
        name: &str,
        joint: &str,
        objects: &[&str],
        distance: f64,
    ) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::DistanceBetweenJointAndObjects {
                joint: joint.to_string(),
                objects: objects.iter().map(|o| o.to_string()).collect(),
                distance,
            },
        )
    }

    pub fn create_locked_joint(&self, name: &str, joint: &str, value: &[f64]) -> DomainResult<()> {
        self.create_constraint(
            name,
            ConstraintKind::LockedJoint {
                joint: joint.to_string(),
                value: value.to_vec(),
            },
        )
    }

    pub fn add_passive_dofs(&self, constraint: &str, dof_names: &[&str]) -> DomainResult<()> {
        write(&self.constraints).add_passive_dofs(constraint, dof_names, &self.evaluation_context())
    }

    pub fn set_constant_right_hand_side(&self, constraint: &str, constant: bool) -> DomainResult<()> {
        write(&self.constraints).set_constant_right_hand_side(constraint, constant)
    }

    pub fn get_constant_right_hand_side(&self, constraint: &str) -> DomainResult<bool> {
        read(&self.constraints).constant_right_hand_side(constraint)
    }

    pub fn reset_constraints(&self) {
        write(&self.constraints).reset();
        self.record(PlanningEvent::ConstraintsReset {
            session_id: self.id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn reset_goal_constraints(&self) {
        write(&self.constraints).reset_goal_constraints();
    }

    pub fn set_numerical_constraints(&self, name: &str, constraints: &[&str], priorities: &[i64]) -> DomainResult<()> {
        write(&self.constraints).set_numerical_constraints(name, constraints, priorities)
    }

    pub fn set_goal_numerical_constraints(&self, name: &str, constraints: &[&str], priorities: &[i64]) -> DomainResult<()> {
        write(&self.constraints).set_goal_numerical_constraints(name, constraints, priorities)
    }

    pub fn lock_joint(&self, joint: &str, value: &[f64]) -> DomainResult<()> {
        write(&self.constraints).lock_joint(joint, value, &self.evaluation_context())
    }

    pub fn add_goal_lock_joint(&self, joint: &str, value: &[f64]) -> DomainResult<()> {
        write(&self.constraints).add_goal_lock_joint(joint, value, &self.evaluation_context())
    }

    pub fn set_error_threshold(&self, threshold: f64) -> DomainResult<()> {
        write(&self.constraints).set_error_threshold(threshold)
    }

    pub fn set_max_iterations(&self, iterations: i64) -> DomainResult<()> {
        write(&self.constraints).set_max_iterations(iterations)
    }

    pub fn solver_settings(&self) -> SolverSettings {
        *read(&self.constraints).settings()
    }

    pub fn apply_constraints(&self, input: &Configuration) -> DomainResult<ApplyOutcome> {
        read(&self.constraints).apply_constraints(self.services.solver.as_ref(), self.evaluation_context(), input)
    }

    pub fn compute_value_and_jacobian(&self, q: &Configuration) -> DomainResult<ValueAndJacobian> {
        read(&self.constraints).compute_value_and_jacobian(self.evaluation_context(), q)
    }

    /// Shoots and projects up to `max_iterations` times; the first projected
    /// sample that converges and is collision free wins.
    pub fn generate_valid_config(&self, max_iterations: usize) -> DomainResult<ApplyOutcome> {
        let shooter = read(&self.selection)
            .shooter
            .clone()
            .ok_or_else(|| DomainError::not_configured("no configuration shooter selected"))?;
        let constraints = read(&self.constraints);
        let bounds = self.problem.device.bounds();
        let mut last = ApplyOutcome {
            success: false,
            output: Configuration::zeros(self.problem.device.config_size()),
            residual_error: f64::INFINITY,
        };
        for _ in 0..max_iterations {
            let sample = shooter.shoot(&bounds, &mut lock(&self.rng));
            let outcome =
                constraints.apply_constraints(self.services.solver.as_ref(), self.evaluation_context(), &sample)?;
            if outcome.success && self.problem.environment.is_valid(&outcome.output) {
                return Ok(outcome);
            }
            last = ApplyOutcome { success: false, ..outcome };
        }
        Ok(last)
    }

    // ---- configurations ----------------------------------------------------

    pub fn set_initial_config(&self, config: Configuration) -> DomainResult<()> {
        write(&self.configurations).set_initial(config)
    }

    pub fn get_initial_config(&self) -> DomainResult<Configuration> {
        read(&self.configurations).initial()
    }

    pub fn add_goal_config(&self, config: Configuration) -> DomainResult<()> {
        write(&self.configurations).add_goal(config)
    }

    pub fn get_goal_configs(&self) -> Vec<Configuration> {
        read(&self.configurations).goals()
    }

    pub fn reset_goal_configs(&self) {
        write(&self.configurations).reset_goals();
    }

    // ---- strategy selection ------------------------------------------------

    pub fn select_path_planner(&self, name: &str) -> DomainResult<()> {
        let factory = self.services.strategies.planner(name)?;
        write(&self.selection).planner = Some((name.to_string(), factory));
        Ok(())
    }

    pub fn select_steering_method(&self, name: &str) -> DomainResult<()> {
        let steering = self.services.strategies.steering(name, &self.params)?;
        write(&self.selection).steering = Some(steering);
        Ok(())
    }

    pub fn select_path_validation(&self, name: &str, tolerance: f64) -> DomainResult<()> {
        check_tolerance(tolerance)?;
        let validation = self.services.strategies.validation(name, tolerance)?;
        write(&self.selection).validation = Some((validation, tolerance));
        Ok(())
    }

    pub fn select_path_projector(&self, name: &str, tolerance: f64) -> DomainResult<()> {
        check_tolerance(tolerance)?;
        let projector = self.services.strategies.projector(name, tolerance)?;
        write(&self.selection).projector = Some((projector, tolerance));
        Ok(())
    }

    pub fn select_configuration_shooter(&self, name: &str) -> DomainResult<()> {
        let shooter = self.services.strategies.shooter(name, &self.params)?;
        write(&self.selection).shooter = Some(shooter);
        Ok(())
    }

    pub fn add_path_optimizer(&self, name: &str) -> DomainResult<()> {
        let optimizer = self.services.strategies.optimizer(name, &self.params)?;
        write(&self.selection).optimizers.push(optimizer);
        Ok(())
    }

    pub fn clear_path_optimizers(&self) {
        write(&self.selection).optimizers.clear();
    }

    /// Lists names of the given kind. Problem names live in the service that
    /// owns the sessions, so asking a session for them is an error.
    pub fn get_available(&self, kind: AvailableKind) -> DomainResult<Vec<String>> {
        let strategies = &self.services.strategies;
        Ok(match kind {
            AvailableKind::PathPlanner => strategies.planner_names(),
            AvailableKind::SteeringMethod => strategies.steering_names(),
            AvailableKind::PathValidation => strategies.validation_names(),
            AvailableKind::PathProjector => strategies.projector_names(),
            AvailableKind::ConfigurationShooter => strategies.shooter_names(),
            AvailableKind::PathOptimizer => strategies.optimizer_names(),
            AvailableKind::SelectedPathOptimizers => read(&self.selection).optimizer_names(),
            AvailableKind::NumericalConstraint => read(&self.constraints).registry().names(),
            AvailableKind::Problem => {
                return Err(DomainError::invalid_argument("problems are listed by the session service"))
            }
        })
    }

    // ---- planning ----------------------------------------------------------

    /// Lock-free, so it can be polled while another thread is stepping.
    pub fn planning_state(&self) -> PlanningState {
        self.state.get()
    }

    /// Builds the context a planner works in from the current selection and
    /// constraints, then runs `f` with it. Takes the selection, constraints,
    /// roadmap and rng locks for the duration of `f`.
    fn with_planner_context<R>(&self, f: impl FnOnce(&mut PlannerContext<'_>) -> DomainResult<R>) -> DomainResult<R> {
        let selection = read(&self.selection);
        if let Some(missing) = selection.missing_for_planning() {
            return Err(DomainError::not_configured(missing));
        }
        let constraints = read(&self.constraints);
        let reference = read(&self.configurations).initial().ok();
        let resolved = constraints.resolve(StackSelection::Problem, self.evaluation_context(), reference.as_ref())?;
        let projection = (!resolved.is_empty()).then(|| ProjectionContext {
            system: &resolved,
            solver: self.services.solver.as_ref(),
            settings: *constraints.settings(),
        });

        let (Some(steering), Some((validation, _)), Some(shooter)) =
            (selection.steering.as_ref(), selection.validation.as_ref(), selection.shooter.as_ref())
        else {
            return Err(DomainError::not_configured("strategies are not selected"));
        };
        let local = LocalPlanner {
            steering: steering.as_ref(),
            validation: validation.as_ref(),
            projector: match (&selection.projector, projection) {
                (Some((projector, _)), Some(ctx)) => Some((projector.as_ref(), ctx)),
                _ => None,
            },
            checker: self.problem.environment.as_ref(),
        };

        let bounds = self.problem.device.bounds();
        let mut roadmap = write(&self.roadmap);
        let mut rng = lock(&self.rng);
        let mut ctx = PlannerContext {
            roadmap: &mut roadmap,
            local,
            shooter: shooter.as_ref(),
            sample_projection: projection,
            bounds: &bounds,
            rng: &mut rng,
            cancel: &self.cancel,
            params: &self.params,
        };
        f(&mut ctx)
    }

    /// Initial config and goals, with goals projected onto the problem and
    /// goal stacks. Goals that cannot be projected are dropped.
    fn planning_query(&self) -> DomainResult<(Configuration, Vec<Configuration>)> {
        let constraints = read(&self.constraints);
        let (init, goals) = {
            let configurations = read(&self.configurations);
            (configurations.initial()?, configurations.goals())
        };
        if goals.is_empty() {
            return Err(DomainError::not_configured("no goal configuration"));
        }
        if constraints.goal_stack().is_empty() {
            return Ok((init, goals));
        }

        let resolved = constraints.resolve(StackSelection::ProblemAndGoal, self.evaluation_context(), Some(&init))?;
        let mut projected = Vec::with_capacity(goals.len());
        for goal in goals {
            let outcome = constraints.project_with(self.services.solver.as_ref(), &resolved, &goal);
            if outcome.success {
                projected.push(outcome.output);
            } else {
                self.services.logger.warn(&format!(
                    "goal configuration dropped: projection residual {:.3e}",
                    outcome.residual_error
                ));
            }
        }
        if projected.is_empty() {
            return Err(DomainError::not_configured("no goal configuration satisfies the goal constraints"));
        }
        Ok((init, projected))
    }

    fn prepare_locked(&self, controller: &mut PlanningController) -> DomainResult<bool> {
        let factory = {
            let selection = read(&self.selection);
            if let Some(missing) = selection.missing_for_planning() {
                return Err(DomainError::not_configured(missing));
            }
            selection.planner.as_ref().map(|(_, factory)| factory.clone())
        }
        .ok_or_else(|| DomainError::not_configured("no path planner selected"))?;
        let (init, goals) = self.planning_query()?;

        self.cancel.reset();
        let planner = factory(&self.params);
        let planner_name = planner.name().to_string();
        let connected = self.with_planner_context(|ctx| controller.prepare(planner, init, goals, ctx))?;
        self.services
            .logger
            .info(&format!("planning prepared with {} (already connected: {})", planner_name, connected));
        self.record(PlanningEvent::PlanningPrepared {
            session_id: self.id.clone(),
            planner: planner_name,
            already_connected: connected,
            timestamp: Utc::now(),
        });
        Ok(connected)
    }

    fn step_locked(&self, controller: &mut PlanningController) -> DomainResult<StepReport> {
        if controller.state() == PlanningState::Idle {
            return Err(DomainError::NoActivePlanning);
        }
        let result = self.with_planner_context(|ctx| {
            let report = controller.execute_one_step(ctx)?;
            tracing::debug!(
                steps = report.steps,
                nodes = ctx.roadmap.node_count(),
                components = ctx.roadmap.component_count(),
                "planning step"
            );
            Ok((report, ctx.roadmap.node_count(), ctx.roadmap.component_count()))
        });
        let (report, nodes, components) = match result {
            Ok(value) => value,
            Err(e) => {
                if controller.state() == PlanningState::Failed {
                    self.services.logger.error(&format!("planning failed: {}", e));
                    self.record(PlanningEvent::PlanningFailed {
                        session_id: self.id.clone(),
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                return Err(e);
            }
        };
        self.record(PlanningEvent::PlanningStepExecuted {
            session_id: self.id.clone(),
            step: report.steps,
            nodes,
            components,
            timestamp: Utc::now(),
        });
        if report.finished {
            self.record_outcome(controller, report);
        }
        Ok(report)
    }

    fn record_outcome(&self, controller: &PlanningController, report: StepReport) {
        let event = match report.state {
            PlanningState::Solved => PlanningEvent::PlanningSolved {
                session_id: self.id.clone(),
                steps: report.steps,
                timestamp: Utc::now(),
            },
            PlanningState::Interrupted => {
                self.services.logger.info("planning interrupted");
                PlanningEvent::PlanningInterrupted {
                    session_id: self.id.clone(),
                    steps: report.steps,
                    timestamp: Utc::now(),
                }
            }
            PlanningState::Failed => {
                let reason = controller.failure().unwrap_or("unknown").to_string();
                self.services.logger.warn(&format!("planning failed: {}", reason));
                PlanningEvent::PlanningFailed {
                    session_id: self.id.clone(),
                    reason,
                    timestamp: Utc::now(),
                }
            }
            _ => return,
        };
        self.record(event);
    }

    fn finish_locked(&self, controller: &mut PlanningController) -> DomainResult<Option<PathId>> {
        if controller.state() == PlanningState::Idle {
            return Err(DomainError::NoActivePlanning);
        }
        let path = controller.finish(&read(&self.roadmap))?;
        Ok(path.map(|p| self.store_path(p, "roadmap")))
    }

    /// Validates the configuration, inserts init and goal nodes and starts the
    /// selected planner. Returns whether init and a goal are already connected.
    pub fn prepare_solve_step_by_step(&self) -> DomainResult<bool> {
        let mut controller = lock(&self.controller);
        self.prepare_locked(&mut controller)
    }

    /// One unit of planner work; `true` once planning is over.
    pub fn execute_one_step(&self) -> DomainResult<bool> {
        let mut controller = lock(&self.controller);
        Ok(self.step_locked(&mut controller)?.finished)
    }

    /// Ends the current query. Returns the id of the extracted path, if the
    /// roadmap connects init to a goal.
    pub fn finish_solve_step_by_step(&self) -> DomainResult<Option<PathId>> {
        let mut controller = lock(&self.controller);
        self.finish_locked(&mut controller)
    }

    /// Requests the running step to stop at its next checkpoint. Safe to call
    /// from any thread at any time.
    pub fn interrupt_path_planning(&self) {
        self.cancel.cancel();
    }

    /// prepare, step until finished, finish, then run the optimizer chain on
    /// the found path. Returns the found path id followed by the optimizer
    /// outputs; empty when no path was found.
    pub fn solve(&self) -> DomainResult<Vec<PathId>> {
        let mut controller = lock(&self.controller);
        self.prepare_locked(&mut controller)?;
        while !self.step_locked(&mut controller)?.finished {}
        let Some(found) = self.finish_locked(&mut controller)? else {
            return Ok(Vec::new());
        };
        let mut ids = vec![found];
        ids.extend(self.optimize_path(found)?);
        Ok(ids)
    }

    // ---- paths -------------------------------------------------------------

    fn store_path(&self, path: Path, origin: &str) -> PathId {
        let length = path.length();
        let id = write(&self.paths).add(path);
        self.record(PlanningEvent::PathStored {
            session_id: self.id.clone(),
            path_id: id,
            length,
            origin: origin.to_string(),
            timestamp: Utc::now(),
        });
        id
    }

    /// Runs `f` with a local planner built from the selected steering method,
    /// validation and projector.
    fn with_local_planner<R>(
        &self,
        reference: Option<&Configuration>,
        f: impl FnOnce(&LocalPlanner<'_>) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let selection = read(&self.selection);
        let steering = selection
            .steering
            .as_ref()
            .ok_or_else(|| DomainError::not_configured("no steering method selected"))?;
        let (validation, _) = selection
            .validation
            .as_ref()
            .ok_or_else(|| DomainError::not_configured("no path validation selected"))?;
        let constraints = read(&self.constraints);
        let resolved = constraints.resolve(StackSelection::Problem, self.evaluation_context(), reference)?;
        let projector = match &selection.projector {
            Some((projector, _)) if !resolved.is_empty() => Some((
                projector.as_ref(),
                ProjectionContext {
                    system: &resolved,
                    solver: self.services.solver.as_ref(),
                    settings: *constraints.settings(),
                },
            )),
            _ => None,
        };
        let local = LocalPlanner {
            steering: steering.as_ref(),
            validation: validation.as_ref(),
            projector,
            checker: self.problem.environment.as_ref(),
        };
        f(&local)
    }

    /// Builds and validates a single local path. On success it is stored and
    /// added to the roadmap as a two-way edge; on failure nothing changes.
    pub fn direct_path(&self, start: &Configuration, end: &Configuration) -> DomainResult<Option<PathId>> {
        let dim = self.problem.device.config_size();
        start.ensure_dim(dim)?;
        end.ensure_dim(dim)?;
        let Some(path) = self.with_local_planner(Some(start), |local| local.connect(start, end))? else {
            return Ok(None);
        };
        let id = self.store_path(path.clone(), "direct");
        let mut roadmap = write(&self.roadmap);
        let from = roadmap.add_or_get_node(path.start().clone());
        let to = roadmap.add_or_get_node(path.end().clone());
        roadmap.add_edge(from, to, path, EdgeDirection::BothWays, Some(id))?;
        Ok(Some(id))
    }

    /// Extends a stored path in place with a validated local path to `config`.
    pub fn append_direct_path(&self, path_id: PathId, config: &Configuration) -> DomainResult<()> {
        config.ensure_dim(self.problem.device.config_size())?;
        let end = read(&self.paths).get(path_id)?.end().clone();
        let segment = self
            .with_local_planner(Some(&end), |local| local.connect(&end, config))?
            .ok_or_else(|| DomainError::ValidationFailed {
                reason: format!("no valid local path from the end of path {}", path_id),
            })?;
        write(&self.paths).extend(path_id, &segment)
    }

    /// Re-projects every waypoint of a stored path. On success the projected
    /// path is stored under a new id; the original is never modified.
    pub fn project_path(&self, path_id: PathId) -> DomainResult<Option<PathId>> {
        let path = read(&self.paths).get(path_id)?.clone();
        let projected = {
            let selection = read(&self.selection);
            let constraints = read(&self.constraints);
            let resolved = constraints.resolve(StackSelection::Problem, self.evaluation_context(), Some(path.start()))?;
            let ctx = ProjectionContext {
                system: &resolved,
                solver: self.services.solver.as_ref(),
                settings: *constraints.settings(),
            };
            let waypoints: Option<Vec<Configuration>> = path.waypoints().iter().map(|q| ctx.project_config(q)).collect();
            match (waypoints, &selection.projector) {
                (None, _) => None,
                (Some(waypoints), Some((projector, _))) => projector.project(&Path::new(waypoints)?, &ctx),
                (Some(waypoints), None) => Some(Path::new(waypoints)?),
            }
        };
        Ok(projected.map(|p| self.store_path(p, "projection")))
    }

    /// Runs the optimizer chain in order, each stage consuming the previous
    /// output. Every stage output is stored under a new id.
    pub fn optimize_path(&self, path_id: PathId) -> DomainResult<Vec<PathId>> {
        let mut current = read(&self.paths).get(path_id)?.clone();
        let optimizers = read(&self.selection).optimizers.clone();
        if optimizers.is_empty() {
            return Ok(Vec::new());
        }
        let start = current.start().clone();
        let outputs = self.with_local_planner(Some(&start), |local| {
            let mut outputs = Vec::with_capacity(optimizers.len());
            for optimizer in &optimizers {
                let optimized = optimizer.optimize(&current, local, &mut lock(&self.rng))?;
                tracing::debug!(
                    optimizer = optimizer.name(),
                    before = current.length(),
                    after = optimized.length(),
                    "path optimized"
                );
                current = optimized.clone();
                outputs.push((optimizer.name().to_string(), optimized));
            }
            Ok(outputs)
        })?;
        Ok(outputs
            .into_iter()
            .map(|(name, path)| self.store_path(path, &name))
            .collect())
    }

    pub fn number_paths(&self) -> usize {
        read(&self.paths).len()
    }

    pub fn path_length(&self, path_id: PathId) -> DomainResult<f64> {
        Ok(read(&self.paths).get(path_id)?.length())
    }

    pub fn config_at_param(&self, path_id: PathId, param: f64) -> DomainResult<Configuration> {
        read(&self.paths).get(path_id)?.config_at_param(param)
    }

    pub fn get_waypoints(&self, path_id: PathId) -> DomainResult<Vec<Configuration>> {
        Ok(read(&self.paths).get(path_id)?.waypoints().to_vec())
    }

    pub fn get_path(&self, path_id: PathId) -> DomainResult<Path> {
        Ok(read(&self.paths).get(path_id)?.clone())
    }

    // ---- roadmap -----------------------------------------------------------

    /// Inserts `config` as a node if it satisfies the constraints and is
    /// collision free. An identical existing node is reused.
    pub fn add_config_to_roadmap(&self, config: &Configuration) -> DomainResult<bool> {
        config.ensure_dim(self.problem.device.config_size())?;
        let satisfied = read(&self.constraints).is_satisfied(self.evaluation_context(), config)?;
        if !satisfied || !self.problem.environment.is_valid(config) {
            return Ok(false);
        }
        write(&self.roadmap).add_or_get_node(config.clone());
        Ok(true)
    }

    /// Adds an edge carrying stored path `path_id`. Returns `false`, changing
    /// nothing, when the path does not run from `config1` to `config2`.
    pub fn add_edge_to_roadmap(
        &self,
        config1: &Configuration,
        config2: &Configuration,
        path_id: PathId,
        both_edges: bool,
    ) -> DomainResult<bool> {
        let mut roadmap = write(&self.roadmap);
        let path = read(&self.paths).get(path_id)?.clone();
        if !path.start().approx_eq(config1, ENDPOINT_TOLERANCE) || !path.end().approx_eq(config2, ENDPOINT_TOLERANCE) {
            return Ok(false);
        }
        let from = roadmap.add_or_get_node(config1.clone());
        let to = roadmap.add_or_get_node(config2.clone());
        let direction = if both_edges { EdgeDirection::BothWays } else { EdgeDirection::OneWay };
        roadmap.add_edge(from, to, path, direction, Some(path_id))?;
        Ok(true)
    }

    pub fn number_nodes(&self) -> usize {
        read(&self.roadmap).node_count()
    }

    pub fn number_edges(&self) -> usize {
        read(&self.roadmap).edge_count()
    }

    pub fn number_connected_components(&self) -> usize {
        read(&self.roadmap).component_count()
    }

    pub fn node(&self, id: usize) -> DomainResult<RoadmapNode> {
        read(&self.roadmap).node(id).cloned()
    }

    pub fn edge(&self, id: usize) -> DomainResult<EdgeView> {
        read(&self.roadmap).edge(id)
    }

    pub fn nodes(&self) -> Vec<Configuration> {
        read(&self.roadmap).nodes()
    }

    pub fn nodes_connected_component(&self, component: i64) -> DomainResult<Vec<Configuration>> {
        read(&self.roadmap).nodes_in_component(component)
    }

    pub fn connected_component_of_node(&self, id: usize) -> DomainResult<usize> {
        read(&self.roadmap).component_of_node(id)
    }

    pub fn connected_component_of_edge(&self, id: usize) -> DomainResult<usize> {
        read(&self.roadmap).component_of_edge(id)
    }

    /// Nearest node configuration and its distance. A negative `component`
    /// searches the whole roadmap. `None` when there is no node to search.
    pub fn get_nearest_config(&self, config: &Configuration, component: i64) -> DomainResult<Option<(Configuration, f64)>> {
        config.ensure_dim(self.problem.device.config_size())?;
        read(&self.roadmap).nearest_config(config, component)
    }

    pub fn clear_roadmap(&self) {
        write(&self.roadmap).clear();
        self.record(PlanningEvent::RoadmapCleared {
            session_id: self.id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn reset_roadmap(&self) {
        self.clear_roadmap();
    }

    pub fn save_roadmap(&self, location: &FsPath) -> DomainResult<()> {
        let (bytes, nodes) = {
            let roadmap = read(&self.roadmap);
            (roadmap::encode(&roadmap)?, roadmap.node_count())
        };
        self.services.roadmap_store.save_roadmap_bytes(location, &bytes)?;
        self.services
            .logger
            .info(&format!("roadmap saved to {} ({} nodes)", location.display(), nodes));
        self.record(PlanningEvent::RoadmapSaved {
            session_id: self.id.clone(),
            location: location.display().to_string(),
            nodes,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Replaces the roadmap with the one stored at `location`. Nothing changes
    /// when the file cannot be read or belongs to a device of another size.
    /// Corrupt or foreign files are reported as I/O failures.
    pub fn read_roadmap(&self, location: &FsPath) -> DomainResult<()> {
        let bytes = self.services.roadmap_store.load_roadmap_bytes(location)?;
        let loaded = roadmap::decode(&bytes).map_err(|e| match e {
            DomainError::Serialization(reason) => {
                DomainError::IoFailure(io::Error::new(io::ErrorKind::InvalidData, reason))
            }
            other => other,
        })?;
        let dim = self.problem.device.config_size();
        if let Some(bad) = loaded.nodes().iter().find(|q| q.dim() != dim) {
            return Err(DomainError::invalid_argument(format!(
                "roadmap nodes have {} dofs, the device has {}",
                bad.dim(),
                dim
            )));
        }
        let nodes = loaded.node_count();
        *write(&self.roadmap) = loaded;
        self.services
            .logger
            .info(&format!("roadmap read from {} ({} nodes)", location.display(), nodes));
        self.record(PlanningEvent::RoadmapLoaded {
            session_id: self.id.clone(),
            location: location.display().to_string(),
            nodes,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
