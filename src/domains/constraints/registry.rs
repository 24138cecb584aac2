use super::kind::{ConstraintKind, EvaluationContext};
use crate::common::{Configuration, DomainError, DomainResult};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;

const FINITE_DIFFERENCE_STEP: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub constant_rhs: bool,
    pub passive_dofs: Vec<usize>,
    pub registration_index: u64,
}

impl Constraint {
    pub fn value(&self, ctx: &EvaluationContext<'_>, q: &Configuration) -> DVector<f64> {
        self.kind.value(ctx, q)
    }

    /// Central finite differences; columns of passive dofs are zero.
    pub fn jacobian(&self, ctx: &EvaluationContext<'_>, q: &Configuration) -> DMatrix<f64> {
        let rows = self.value(ctx, q).len();
        let mut jacobian = DMatrix::zeros(rows, q.dim());
        let mut values = q.to_vec();
        for col in 0..q.dim() {
            if self.passive_dofs.contains(&col) {
                continue;
            }
            let original = values[col];
            values[col] = original + FINITE_DIFFERENCE_STEP;
            let forward = self.value(ctx, &Configuration::from(values.clone()));
            values[col] = original - FINITE_DIFFERENCE_STEP;
            let backward = self.value(ctx, &Configuration::from(values.clone()));
            values[col] = original;
            let derivative = (forward - backward) / (2.0 * FINITE_DIFFERENCE_STEP);
            jacobian.set_column(col, &derivative);
        }
        jacobian
    }
}

/// Named store of constraint definitions.
#[derive(Debug, Clone, Default)]
pub struct ConstraintRegistry {
    entries: HashMap<String, Constraint>,
    next_index: u64,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kind` under `name`. Nothing is stored unless validation passes.
    pub fn register(&mut self, name: &str, kind: ConstraintKind, ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        if self.contains(name) {
            return Err(DomainError::DuplicateName { name: name.to_string() });
        }
        kind.validate(ctx)?;
        let constraint = Constraint {
            name: name.to_string(),
            kind,
            constant_rhs: true,
            passive_dofs: Vec::new(),
            registration_index: self.next_index,
        };
        self.next_index += 1;
        self.entries.insert(name.to_string(), constraint);
        Ok(())
    }

    /// Registers a locked joint, or updates the value of an existing one for the same joint.
    pub fn upsert_locked_joint(&mut self, joint: &str, value: Vec<f64>, ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        let kind = ConstraintKind::LockedJoint {
            joint: joint.to_string(),
            value,
        };
        match self.entries.get_mut(joint) {
            Some(existing) => match &existing.kind {
                ConstraintKind::LockedJoint { joint: locked, .. } if locked == joint => {
                    kind.validate(ctx)?;
                    existing.kind = kind;
                    Ok(())
                }
                _ => Err(DomainError::DuplicateName { name: joint.to_string() }),
            },
            None => self.register(joint, kind, ctx),
        }
    }

    pub fn get(&self, name: &str) -> DomainResult<&Constraint> {
        self.entries
            .get(name)
            .ok_or_else(|| DomainError::UnknownConstraint { name: name.to_string() })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn set_constant_right_hand_side(&mut self, name: &str, constant: bool) -> DomainResult<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| DomainError::UnknownConstraint { name: name.to_string() })?;
        entry.constant_rhs = constant;
        Ok(())
    }

    pub fn constant_right_hand_side(&self, name: &str) -> DomainResult<bool> {
        Ok(self.get(name)?.constant_rhs)
    }

    pub fn add_passive_dofs(&mut self, name: &str, dof_names: &[&str], ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        if !self.contains(name) {
            return Err(DomainError::UnknownConstraint { name: name.to_string() });
        }
        let indices = dof_names
            .iter()
            .map(|dof| {
                ctx.device
                    .dof_index(dof)
                    .ok_or_else(|| DomainError::invalid_geometry(format!("unknown dof {}", dof)))
            })
            .collect::<DomainResult<Vec<usize>>>()?;
        if let Some(entry) = self.entries.get_mut(name) {
            for index in indices {
                if !entry.passive_dofs.contains(&index) {
                    entry.passive_dofs.push(index);
                }
            }
        }
        Ok(())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        let mut entries: Vec<&Constraint> = self.entries.values().collect();
        entries.sort_by_key(|c| c.registration_index);
        entries.into_iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
