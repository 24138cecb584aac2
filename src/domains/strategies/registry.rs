use super::*;
use crate::common::{DomainError, DomainResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type PlannerFactory = Arc<dyn Fn(&StrategyParameters) -> Box<dyn PathPlanner> + Send + Sync>;
pub type SteeringFactory = Arc<dyn Fn(&StrategyParameters) -> Arc<dyn SteeringMethod> + Send + Sync>;
pub type ValidationFactory = Arc<dyn Fn(f64) -> Arc<dyn PathValidation> + Send + Sync>;
pub type ProjectorFactory = Arc<dyn Fn(f64) -> Arc<dyn PathProjector> + Send + Sync>;
pub type ShooterFactory = Arc<dyn Fn(&StrategyParameters) -> Arc<dyn ConfigurationShooter> + Send + Sync>;
pub type OptimizerFactory = Arc<dyn Fn(&StrategyParameters) -> Arc<dyn PathOptimizer> + Send + Sync>;

/// Named strategy factories, one table per strategy kind.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    planners: BTreeMap<String, PlannerFactory>,
    steering: BTreeMap<String, SteeringFactory>,
    validations: BTreeMap<String, ValidationFactory>,
    projectors: BTreeMap<String, ProjectorFactory>,
    shooters: BTreeMap<String, ShooterFactory>,
    optimizers: BTreeMap<String, OptimizerFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("planners", &self.planners.keys().collect::<Vec<_>>())
            .field("steering", &self.steering.keys().collect::<Vec<_>>())
            .field("validations", &self.validations.keys().collect::<Vec<_>>())
            .field("projectors", &self.projectors.keys().collect::<Vec<_>>())
            .field("shooters", &self.shooters.keys().collect::<Vec<_>>())
            .field("optimizers", &self.optimizers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every strategy shipped with the crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_planner("DiffusingPlanner", |_| Box::new(DiffusingPlanner::new()));
        registry.register_planner("PRM", |_| Box::new(PrmPlanner));

        registry.register_steering("Straight", |_| Arc::new(StraightSteering));
        registry.register_steering("Discretized", |p| {
            Arc::new(DiscretizedSteering {
                step: p.discretization_step,
            })
        });

        registry.register_validation("Discretized", |tolerance| Arc::new(DiscretizedValidation { tolerance }));
        registry.register_validation("Dichotomy", |tolerance| Arc::new(DichotomyValidation { tolerance }));
        registry.register_validation("NoValidation", |_| Arc::new(NoValidation));

        registry.register_projector("None", |_| Arc::new(NoProjector));
        registry.register_projector("Progressive", |step| Arc::new(ProgressiveProjector { step }));
        registry.register_projector("Dichotomy", |tolerance| Arc::new(DichotomyProjector { tolerance }));

        registry.register_shooter("Uniform", |_| Arc::new(UniformShooter));
        registry.register_shooter("Gaussian", |_| Arc::new(GaussianShooter::default()));

        registry.register_optimizer("RandomShortcut", |p| {
            Arc::new(RandomShortcut {
                iterations: p.shortcut_iterations,
            })
        });
        registry.register_optimizer("SimpleShortcut", |_| Arc::new(SimpleShortcut));
        registry
    }

    pub fn register_planner<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&StrategyParameters) -> Box<dyn PathPlanner> + Send + Sync + 'static,
    {
        self.planners.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_steering<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&StrategyParameters) -> Arc<dyn SteeringMethod> + Send + Sync + 'static,
    {
        self.steering.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_validation<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(f64) -> Arc<dyn PathValidation> + Send + Sync + 'static,
    {
        self.validations.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_projector<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(f64) -> Arc<dyn PathProjector> + Send + Sync + 'static,
    {
        self.projectors.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_shooter<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&StrategyParameters) -> Arc<dyn ConfigurationShooter> + Send + Sync + 'static,
    {
        self.shooters.insert(name.to_string(), Arc::new(factory));
    }

    pub fn register_optimizer<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&StrategyParameters) -> Arc<dyn PathOptimizer> + Send + Sync + 'static,
    {
        self.optimizers.insert(name.to_string(), Arc::new(factory));
    }

    pub fn planner(&self, name: &str) -> DomainResult<PlannerFactory> {
        lookup(&self.planners, "planner", name)
    }

    pub fn steering(&self, name: &str, params: &StrategyParameters) -> DomainResult<Arc<dyn SteeringMethod>> {
        Ok(lookup(&self.steering, "steering method", name)?(params))
    }

    pub fn validation(&self, name: &str, tolerance: f64) -> DomainResult<Arc<dyn PathValidation>> {
        Ok(lookup(&self.validations, "path validation", name)?(tolerance))
    }

    pub fn projector(&self, name: &str, tolerance: f64) -> DomainResult<Arc<dyn PathProjector>> {
        Ok(lookup(&self.projectors, "path projector", name)?(tolerance))
    }

    pub fn shooter(&self, name: &str, params: &StrategyParameters) -> DomainResult<Arc<dyn ConfigurationShooter>> {
        Ok(lookup(&self.shooters, "configuration shooter", name)?(params))
    }

    pub fn optimizer(&self, name: &str, params: &StrategyParameters) -> DomainResult<Arc<dyn PathOptimizer>> {
        Ok(lookup(&self.optimizers, "path optimizer", name)?(params))
    }

    pub fn planner_names(&self) -> Vec<String> {
        self.planners.keys().cloned().collect()
    }

    pub fn steering_names(&self) -> Vec<String> {
        self.steering.keys().cloned().collect()
    }

    pub fn validation_names(&self) -> Vec<String> {
        self.validations.keys().cloned().collect()
    }

    pub fn projector_names(&self) -> Vec<String> {
        self.projectors.keys().cloned().collect()
    }

    pub fn shooter_names(&self) -> Vec<String> {
        self.shooters.keys().cloned().collect()
    }

    pub fn optimizer_names(&self) -> Vec<String> {
        self.optimizers.keys().cloned().collect()
    }
}

fn lookup<T: Clone>(table: &BTreeMap<String, T>, kind: &'static str, name: &str) -> DomainResult<T> {
    table.get(name).cloned().ok_or_else(|| DomainError::UnknownStrategy {
        kind,
        name: name.to_string(),
    })
}

/// Strategies currently bound in a session.
#[derive(Clone, Default)]
pub struct StrategySelection {
    pub planner: Option<(String, PlannerFactory)>,
    pub steering: Option<Arc<dyn SteeringMethod>>,
    pub validation: Option<(Arc<dyn PathValidation>, f64)>,
    pub projector: Option<(Arc<dyn PathProjector>, f64)>,
    pub shooter: Option<Arc<dyn ConfigurationShooter>>,
    pub optimizers: Vec<Arc<dyn PathOptimizer>>,
}

impl fmt::Debug for StrategySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySelection")
            .field("planner", &self.planner.as_ref().map(|(n, _)| n))
            .field("steering", &self.steering.as_ref().map(|s| s.name().to_string()))
            .field("validation", &self.validation.as_ref().map(|(v, t)| (v.name().to_string(), *t)))
            .field("projector", &self.projector.as_ref().map(|(p, t)| (p.name().to_string(), *t)))
            .field("shooter", &self.shooter.as_ref().map(|s| s.name().to_string()))
            .field("optimizers", &self.optimizer_names())
            .finish()
    }
}

impl StrategySelection {
    pub fn optimizer_names(&self) -> Vec<String> {
        self.optimizers.iter().map(|o| o.name().to_string()).collect()
    }

    /// What is still missing before planning can start, if anything.
    pub fn missing_for_planning(&self) -> Option<&'static str> {
        if self.planner.is_none() {
            Some("no path planner selected")
        } else if self.steering.is_none() {
            Some("no steering method selected")
        } else if self.validation.is_none() {
            Some("no path validation selected")
        } else if self.shooter.is_none() {
            Some("no configuration shooter selected")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(registry.planner_names(), vec!["DiffusingPlanner".to_string(), "PRM".to_string()]);
        assert!(registry.validation("Dichotomy", 0.05).is_ok());
        assert_eq!(registry.projector("Progressive", 0.1).unwrap().name(), "Progressive");
        assert_eq!(registry.optimizer_names().len(), 2);
    }

    #[test]
    fn test_unknown_name_is_a_lookup_miss() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry.shooter("Sobol", &StrategyParameters::default()).err();
        assert!(matches!(
            err,
            Some(DomainError::UnknownStrategy { kind: "configuration shooter", .. })
        ));
    }

    #[test]
    fn test_custom_strategies_can_be_registered() {
        let mut registry = StrategyRegistry::with_builtins();
        registry.register_steering("Reversed", |_| Arc::new(StraightSteering));
        assert!(registry.steering_names().contains(&"Reversed".to_string()));

        let mut selection = StrategySelection::default();
        assert_eq!(selection.missing_for_planning(), Some("no path planner selected"));
        selection.planner = Some(("PRM".to_string(), registry.planner("PRM").unwrap()));
        assert_eq!(selection.missing_for_planning(), Some("no steering method selected"));
    }
}
