use crate::common::{Configuration, DomainError, DomainResult};
use serde::{Deserialize, Serialize};

/// Initial configuration and the ordered goal candidates of a problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSet {
    dimension: usize,
    initial: Option<Configuration>,
    goals: Vec<Configuration>,
}

impl ConfigurationSet {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            initial: None,
            goals: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn set_initial(&mut self, config: Configuration) -> DomainResult<()> {
        config.ensure_dim(self.dimension)?;
        self.initial = Some(config);
        Ok(())
    }

    pub fn initial(&self) -> DomainResult<Configuration> {
        self.initial
            .clone()
            .ok_or_else(|| DomainError::not_configured("initial configuration is not set"))
    }

    pub fn has_initial(&self) -> bool {
        self.initial.is_some()
    }

    /// Duplicates are kept; goal order is insertion order.
    pub fn add_goal(&mut self, config: Configuration) -> DomainResult<()> {
        config.ensure_dim(self.dimension)?;
        self.goals.push(config);
        Ok(())
    }

    pub fn goals(&self) -> Vec<Configuration> {
        self.goals.clone()
    }

    pub fn reset_goals(&mut self) {
        self.goals.clear();
    }
}
