use super::path::Path;
use crate::common::{DomainError, DomainResult};

pub type PathId = usize;

/// Append-only store of finished paths. Ids are dense and start at 0.
#[derive(Debug, Clone, Default)]
pub struct PathBank {
    paths: Vec<Path>,
}

impl PathBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: Path) -> PathId {
        self.paths.push(path);
        self.paths.len() - 1
    }

    pub fn get(&self, id: PathId) -> DomainResult<&Path> {
        self.paths.get(id).ok_or(DomainError::UnknownPath { id })
    }

    /// In-place extension; the only mutation a stored path ever sees.
    pub fn extend(&mut self, id: PathId, segment: &Path) -> DomainResult<()> {
        let path = self.paths.get_mut(id).ok_or(DomainError::UnknownPath { id })?;
        path.concatenate(segment)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Configuration;

    #[test]
    fn test_ids_are_dense_and_lookups_checked() {
        let mut bank = PathBank::new();
        let a = Configuration::new(vec![0.0]);
        let b = Configuration::new(vec![1.0]);
        assert_eq!(bank.add(Path::straight(&a, &b).unwrap()), 0);
        assert_eq!(bank.add(Path::straight(&b, &a).unwrap()), 1);
        assert!(matches!(bank.get(2), Err(DomainError::UnknownPath { id: 2 })));

        let c = Configuration::new(vec![3.0]);
        bank.extend(0, &Path::straight(&b, &c).unwrap()).unwrap();
        assert!((bank.get(0).unwrap().length() - 3.0).abs() < 1e-12);
        assert_eq!(bank.len(), 2);
    }
}
