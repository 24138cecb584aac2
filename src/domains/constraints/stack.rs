use super::kind::EvaluationContext;
use super::registry::{Constraint, ConstraintRegistry};
use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::ports::ConstraintSystem;
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub constraint: String,
    pub priority: usize,
}

/// Ordered, prioritized selection of registry entries applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintStack {
    name: String,
    entries: Vec<StackEntry>,
}

impl ConstraintStack {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, constraint: &str) -> bool {
        self.entries.iter().any(|e| e.constraint == constraint)
    }

    /// Replaces the whole stack. Validates every argument before touching state.
    pub fn replace(
        &mut self,
        name: &str,
        constraint_names: &[&str],
        priorities: &[i64],
        registry: &ConstraintRegistry,
    ) -> DomainResult<()> {
        if constraint_names.len() != priorities.len() {
            return Err(DomainError::LengthMismatch {
                left: constraint_names.len(),
                right: priorities.len(),
            });
        }
        let mut entries = Vec::with_capacity(constraint_names.len());
        for (constraint, priority) in constraint_names.iter().zip(priorities.iter()) {
            registry.get(constraint)?;
            let priority = usize::try_from(*priority)
                .map_err(|_| DomainError::invalid_argument(format!("negative priority {} for {}", priority, constraint)))?;
            entries.push(StackEntry {
                constraint: constraint.to_string(),
                priority,
            });
        }
        self.name = name.to_string();
        self.entries = entries;
        Ok(())
    }

    pub fn push(&mut self, constraint: &str, priority: usize) {
        if !self.contains(constraint) {
            self.entries.push(StackEntry {
                constraint: constraint.to_string(),
                priority,
            });
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

struct ResolvedConstraint<'a> {
    constraint: &'a Constraint,
    offset: Option<DVector<f64>>,
}

/// Stacks resolved against the registry, grouped into priority levels.
///
/// Levels are ordered by ascending priority value; inside a level constraints
/// follow registration order, whatever their place in the stack. Constraints
/// without a constant right-hand side take the value they have at `reference`
/// as their target.
pub struct ResolvedStack<'a> {
    ctx: EvaluationContext<'a>,
    levels: Vec<Vec<ResolvedConstraint<'a>>>,
}

impl<'a> ResolvedStack<'a> {
    pub fn resolve(
        stacks: &[&'a ConstraintStack],
        registry: &'a ConstraintRegistry,
        ctx: EvaluationContext<'a>,
        reference: Option<&Configuration>,
    ) -> DomainResult<Self> {
        let mut ordered: Vec<(usize, &'a Constraint)> = Vec::new();
        for stack in stacks {
            for entry in stack.entries() {
                let constraint = registry.get(&entry.constraint)?;
                if !ordered.iter().any(|(_, c)| c.name == constraint.name) {
                    ordered.push((entry.priority, constraint));
                }
            }
        }
        ordered.sort_by_key(|(priority, constraint)| (*priority, constraint.registration_index));

        let mut levels: Vec<Vec<ResolvedConstraint<'a>>> = Vec::new();
        let mut current_priority = None;
        for (priority, constraint) in ordered {
            let offset = match (constraint.constant_rhs, reference) {
                (false, Some(q)) => Some(constraint.value(&ctx, q)),
                _ => None,
            };
            if current_priority != Some(priority) {
                levels.push(Vec::new());
                current_priority = Some(priority);
            }
            if let Some(level) = levels.last_mut() {
                level.push(ResolvedConstraint { constraint, offset });
            }
        }
        Ok(Self { ctx, levels })
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn constraint_names(&self) -> Vec<String> {
        self.levels
            .iter()
            .flatten()
            .map(|r| r.constraint.name.clone())
            .collect()
    }

    /// Value and Jacobian of every level stacked in precedence order.
    pub fn value_and_jacobian(&self, q: &Configuration) -> (DVector<f64>, DMatrix<f64>) {
        let blocks: Vec<(DVector<f64>, DMatrix<f64>)> = (0..self.levels.len())
            .map(|level| self.level_value_and_jacobian(level, q))
            .collect();
        stack_blocks(&blocks, q.dim())
    }

    pub fn residual_norm(&self, q: &Configuration) -> f64 {
        self.value_and_jacobian(q).0.norm()
    }
}

impl ConstraintSystem for ResolvedStack<'_> {
    fn config_size(&self) -> usize {
        self.ctx.device.config_size()
    }

    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_value_and_jacobian(&self, level: usize, q: &Configuration) -> (DVector<f64>, DMatrix<f64>) {
        let blocks: Vec<(DVector<f64>, DMatrix<f64>)> = self
            .levels
            .get(level)
            .map(|constraints| {
                constraints
                    .iter()
                    .map(|r| {
                        let mut value = r.constraint.value(&self.ctx, q);
                        if let Some(offset) = &r.offset {
                            value -= offset;
                        }
                        (value, r.constraint.jacobian(&self.ctx, q))
                    })
                    .collect()
            })
            .unwrap_or_default();
        stack_blocks(&blocks, q.dim())
    }
}

fn stack_blocks(blocks: &[(DVector<f64>, DMatrix<f64>)], cols: usize) -> (DVector<f64>, DMatrix<f64>) {
    let rows: usize = blocks.iter().map(|(v, _)| v.len()).sum();
    let mut value = DVector::zeros(rows);
    let mut jacobian = DMatrix::zeros(rows, cols);
    let mut row = 0;
    for (v, j) in blocks {
        value.rows_mut(row, v.len()).copy_from(v);
        jacobian.view_mut((row, 0), (j.nrows(), cols)).copy_from(j);
        row += v.len();
    }
    (value, jacobian)
}
