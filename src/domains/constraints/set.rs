use super::kind::{ConstraintKind, EvaluationContext};
use super::registry::ConstraintRegistry;
use super::stack::{ConstraintStack, ResolvedStack};
use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::ports::{ConstraintSystem, NumericalSolver, SolverSettings};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSelection {
    Problem,
    /// Problem stack followed by the goal stack.
    ProblemAndGoal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub success: bool,
    pub output: Configuration,
    pub residual_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueAndJacobian {
    pub value: DVector<f64>,
    pub jacobian: DMatrix<f64>,
}

/// The constraint registry together with the problem and goal stacks and
/// the solver budget they are projected with.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    registry: ConstraintRegistry,
    problem_stack: ConstraintStack,
    goal_stack: ConstraintStack,
    settings: SolverSettings,
}

impl ConstraintSet {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            registry: ConstraintRegistry::new(),
            problem_stack: ConstraintStack::new("problem"),
            goal_stack: ConstraintStack::new("goal"),
            settings,
        }
    }

    pub fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }

    pub fn problem_stack(&self) -> &ConstraintStack {
        &self.problem_stack
    }

    pub fn goal_stack(&self) -> &ConstraintStack {
        &self.goal_stack
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn register(&mut self, name: &str, kind: ConstraintKind, ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        self.registry.register(name, kind, ctx)
    }

    pub fn set_constant_right_hand_side(&mut self, name: &str, constant: bool) -> DomainResult<()> {
        self.registry.set_constant_right_hand_side(name, constant)
    }

    pub fn constant_right_hand_side(&self, name: &str) -> DomainResult<bool> {
        self.registry.constant_right_hand_side(name)
    }

    pub fn add_passive_dofs(&mut self, name: &str, dof_names: &[&str], ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        self.registry.add_passive_dofs(name, dof_names, ctx)
    }

    /// Clears the registry and both stacks.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.problem_stack.clear();
        self.goal_stack.clear();
    }

    pub fn reset_goal_constraints(&mut self) {
        self.goal_stack.clear();
    }

    pub fn set_numerical_constraints(&mut self, name: &str, constraint_names: &[&str], priorities: &[i64]) -> DomainResult<()> {
        self.problem_stack.replace(name, constraint_names, priorities, &self.registry)
    }

    pub fn set_goal_numerical_constraints(&mut self, name: &str, constraint_names: &[&str], priorities: &[i64]) -> DomainResult<()> {
        self.goal_stack.replace(name, constraint_names, priorities, &self.registry)
    }

    pub fn lock_joint(&mut self, joint: &str, value: &[f64], ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        self.registry.upsert_locked_joint(joint, value.to_vec(), ctx)?;
        self.problem_stack.push(joint, 0);
        Ok(())
    }

    pub fn add_goal_lock_joint(&mut self, joint: &str, value: &[f64], ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        self.registry.upsert_locked_joint(joint, value.to_vec(), ctx)?;
        self.goal_stack.push(joint, 0);
        Ok(())
    }

    pub fn set_error_threshold(&mut self, threshold: f64) -> DomainResult<()> {
        if !(threshold > 0.0) || !threshold.is_finite() {
            return Err(DomainError::invalid_argument(format!("error threshold must be positive, got {}", threshold)));
        }
        self.settings.error_threshold = threshold;
        Ok(())
    }

    pub fn set_max_iterations(&mut self, iterations: i64) -> DomainResult<()> {
        if iterations <= 0 {
            return Err(DomainError::invalid_argument(format!("max iterations must be positive, got {}", iterations)));
        }
        self.settings.max_iterations = iterations as usize;
        Ok(())
    }

    pub fn resolve<'a>(
        &'a self,
        selection: StackSelection,
        ctx: EvaluationContext<'a>,
        reference: Option<&Configuration>,
    ) -> DomainResult<ResolvedStack<'a>> {
        let stacks: Vec<&ConstraintStack> = match selection {
            StackSelection::Problem => vec![&self.problem_stack],
            StackSelection::ProblemAndGoal => vec![&self.problem_stack, &self.goal_stack],
        };
        ResolvedStack::resolve(&stacks, &self.registry, ctx, reference)
    }

    /// Projects `input` onto the problem stack. Non-convergence is reported
    /// through `success`, never as an error.
    pub fn apply_constraints(
        &self,
        solver: &dyn NumericalSolver,
        ctx: EvaluationContext<'_>,
        input: &Configuration,
    ) -> DomainResult<ApplyOutcome> {
        input.ensure_dim(ctx.device.config_size())?;
        let resolved = self.resolve(StackSelection::Problem, ctx, Some(input))?;
        Ok(self.project_with(solver, &resolved, input))
    }

    pub fn project_with(&self, solver: &dyn NumericalSolver, resolved: &ResolvedStack<'_>, input: &Configuration) -> ApplyOutcome {
        if resolved.is_empty() {
            return ApplyOutcome {
                success: true,
                output: input.clone(),
                residual_error: 0.0,
            };
        }
        let projection = solver.project(resolved, input, &self.settings);
        ApplyOutcome {
            success: projection.converged,
            output: projection.config,
            residual_error: projection.residual,
        }
    }

    pub fn compute_value_and_jacobian(&self, ctx: EvaluationContext<'_>, q: &Configuration) -> DomainResult<ValueAndJacobian> {
        q.ensure_dim(ctx.device.config_size())?;
        let resolved = self.resolve(StackSelection::Problem, ctx, None)?;
        let (value, jacobian) = resolved.value_and_jacobian(q);
        Ok(ValueAndJacobian { value, jacobian })
    }

    /// Whether `q` satisfies the hard level of the problem stack within the
    /// error threshold. Constraints without a constant right-hand side hold
    /// on every leaf, so `q` is its own reference.
    pub fn is_satisfied(&self, ctx: EvaluationContext<'_>, q: &Configuration) -> DomainResult<bool> {
        q.ensure_dim(ctx.device.config_size())?;
        let resolved = self.resolve(StackSelection::Problem, ctx, Some(q))?;
        Ok(resolved.is_empty() || resolved.level_value_and_jacobian(0, q).0.norm() <= self.settings.error_threshold)
    }
}
