use crate::adapters::outbound::{FilesystemRoadmapStore, GaussNewtonSolver};
use crate::common::{
    ApplicationError, ApplicationResult, DomainError, DomainResult, EventEnvelope, EventJournal, EventMetadata,
};
use crate::config::Config;
use crate::domains::logger::{DynLogger, ScopedLogger};
use crate::domains::planning::{AvailableKind, ProblemDefinition, ProblemSession, SessionServices};
use crate::domains::ports::{NumericalSolver, RoadmapStore};
use crate::domains::strategies::StrategyRegistry;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Owns the registered problems and one session per problem name.
pub struct SessionService {
    config: Config,
    problems: RwLock<BTreeMap<String, ProblemDefinition>>,
    sessions: RwLock<BTreeMap<String, Arc<ProblemSession>>>,
    solver: Arc<dyn NumericalSolver>,
    roadmap_store: Arc<dyn RoadmapStore>,
    strategies: Arc<StrategyRegistry>,
    logger: DynLogger,
    journal: Option<Arc<dyn EventJournal>>,
}

impl SessionService {
    pub fn new(
        config: Config,
        solver: Arc<dyn NumericalSolver>,
        roadmap_store: Arc<dyn RoadmapStore>,
        strategies: Arc<StrategyRegistry>,
        logger: DynLogger,
    ) -> Self {
        Self {
            config,
            problems: RwLock::new(BTreeMap::new()),
            sessions: RwLock::new(BTreeMap::new()),
            solver,
            roadmap_store,
            strategies,
            logger,
            journal: None,
        }
    }

    /// Service wired with the shipped solver, the filesystem roadmap store
    /// and every built-in strategy.
    pub fn from_config(config: Config, logger: DynLogger) -> Self {
        let store = FilesystemRoadmapStore::new(config.roadmap.data_dir.clone());
        Self::new(
            config,
            Arc::new(GaussNewtonSolver::new()),
            Arc::new(store),
            Arc::new(StrategyRegistry::with_builtins()),
            logger,
        )
    }

    pub fn with_journal(mut self, journal: Arc<dyn EventJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn register_problem(&self, problem: ProblemDefinition) -> DomainResult<()> {
        let mut problems = self.problems.write().unwrap_or_else(PoisonError::into_inner);
        if problems.contains_key(&problem.name) {
            return Err(DomainError::DuplicateName { name: problem.name });
        }
        info!(problem = %problem.name, device = problem.device.name(), "problem registered");
        problems.insert(problem.name.clone(), problem);
        Ok(())
    }

    pub fn problem_names(&self) -> Vec<String> {
        self.problems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Session for `name`, created on first use with the configured strategy
    /// defaults. The flag is `true` when the session was created by this call.
    pub fn select_problem(&self, name: &str) -> DomainResult<(Arc<ProblemSession>, bool)> {
        if let Some(session) = self.sessions.read().unwrap_or_else(PoisonError::into_inner).get(name) {
            return Ok((session.clone(), false));
        }
        let problem = self
            .problems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::UnknownProblem { name: name.to_string() })?;

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(name) {
            return Ok((session.clone(), false));
        }
        let session_id = Uuid::new_v4().to_string();
        let services = SessionServices {
            solver: self.solver.clone(),
            roadmap_store: self.roadmap_store.clone(),
            strategies: self.strategies.clone(),
            logger: ScopedLogger::new(self.logger.clone(), name, &session_id).into_dyn(),
        };
        let session = ProblemSession::new(&session_id, problem, services, self.config.session_settings());
        self.apply_defaults(&session)?;
        let session = Arc::new(session);
        sessions.insert(name.to_string(), session.clone());
        info!(problem = name, session = %session_id, "session created");
        Ok((session, true))
    }

    pub fn session(&self, name: &str) -> DomainResult<Arc<ProblemSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::UnknownProblem { name: name.to_string() })
    }

    fn apply_defaults(&self, session: &ProblemSession) -> DomainResult<()> {
        let planning = &self.config.planning;
        if let Some(planner) = &planning.planner {
            session.select_path_planner(planner)?;
        }
        if let Some(steering) = &planning.steering {
            session.select_steering_method(steering)?;
        }
        if let Some(shooter) = &planning.shooter {
            session.select_configuration_shooter(shooter)?;
        }
        if let Some(validation) = &self.config.validation {
            session.select_path_validation(&validation.name, validation.tolerance)?;
        }
        if let Some(projection) = &self.config.projection {
            session.select_path_projector(&projection.name, projection.tolerance)?;
        }
        for optimizer in &self.config.optimizers.chain {
            session.add_path_optimizer(optimizer)?;
        }
        Ok(())
    }

    /// Names of the given kind (case-insensitive, e.g. `"PathPlanner"`).
    /// Constraint names and the optimizer chain belong to a session, so
    /// `problem` must name one for those.
    pub fn get_available(&self, what: &str, problem: Option<&str>) -> DomainResult<Vec<String>> {
        let kind: AvailableKind = what.parse()?;
        match kind {
            AvailableKind::Problem => Ok(self.problem_names()),
            AvailableKind::PathPlanner => Ok(self.strategies.planner_names()),
            AvailableKind::SteeringMethod => Ok(self.strategies.steering_names()),
            AvailableKind::PathValidation => Ok(self.strategies.validation_names()),
            AvailableKind::PathProjector => Ok(self.strategies.projector_names()),
            AvailableKind::ConfigurationShooter => Ok(self.strategies.shooter_names()),
            AvailableKind::PathOptimizer => Ok(self.strategies.optimizer_names()),
            AvailableKind::NumericalConstraint | AvailableKind::SelectedPathOptimizers => {
                let name = problem.ok_or_else(|| DomainError::not_configured("no problem selected"))?;
                self.session(name)?.get_available(kind)
            }
        }
    }

    /// Drains the session's recorded events into the journal. Returns how
    /// many were written; without a journal they are discarded.
    pub async fn flush_events(&self, session: &ProblemSession) -> ApplicationResult<usize> {
        let events = session.take_events();
        let Some(journal) = &self.journal else {
            debug!(count = events.len(), "no journal configured, events dropped");
            return Ok(0);
        };
        let metadata = EventMetadata::from_source(session.problem_name());
        let envelopes = events
            .iter()
            .map(|event| EventEnvelope::new(event, metadata.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DomainError::from)?;
        let count = envelopes.len();
        journal
            .append_events(session.id(), envelopes)
            .await
            .map_err(ApplicationError::Journal)?;
        Ok(count)
    }

    /// Flushes and forgets the session of `name`. `false` when there was none.
    pub async fn close_session(&self, name: &str) -> ApplicationResult<bool> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match removed {
            Some(session) => {
                session.interrupt_path_planning();
                self.flush_events(&session).await?;
                info!(problem = name, session = session.id(), "session closed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
