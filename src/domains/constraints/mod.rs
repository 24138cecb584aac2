pub mod kind;
pub mod registry;
pub mod set;
pub mod stack;

pub use kind::*;
pub use registry::*;
pub use set::*;
pub use stack::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Configuration, DomainError};
    use crate::domains::ports::{CollisionChecker, ConstraintSystem, Device};
    use nalgebra::{Isometry3, Point3, Vector3};
    use std::ops::Range;

    /// Point robot in the plane: joint "x" drives dof 0, joint "y" dof 1.
    struct PlanarPoint;

    impl Device for PlanarPoint {
        fn name(&self) -> &str {
            "planar"
        }

        fn config_size(&self) -> usize {
            2
        }

        fn bounds(&self) -> Vec<(f64, f64)> {
            vec![(-1.0, 1.0); 2]
        }

        fn joint_names(&self) -> Vec<String> {
            vec!["x".to_string(), "y".to_string()]
        }

        fn joint_dofs(&self, joint: &str) -> Option<Range<usize>> {
            match joint {
                "x" => Some(0..1),
                "y" => Some(1..2),
                _ => None,
            }
        }

        fn dof_index(&self, dof_name: &str) -> Option<usize> {
            self.joint_dofs(dof_name).map(|r| r.start)
        }

        fn joint_transform(&self, joint: &str, q: &Configuration) -> Option<Isometry3<f64>> {
            self.joint_dofs(joint)?;
            Some(Isometry3::translation(q[0], q[1], 0.0))
        }

        fn center_of_mass(&self, com: &str, q: &Configuration) -> Option<Vector3<f64>> {
            com.is_empty().then(|| Vector3::new(q[0], q[1], 0.0))
        }
    }

    struct EmptySpace;

    impl CollisionChecker for EmptySpace {
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

    fn ctx() -> EvaluationContext<'static> {
        EvaluationContext {
            device: &PlanarPoint,
            environment: &EmptySpace,
        }
    }

    fn locked(joint: &str, value: f64) -> ConstraintKind {
        ConstraintKind::LockedJoint {
            joint: joint.to_string(),
            value: vec![value],
        }
    }

    #[test]
    fn test_duplicate_name_is_rejected_without_side_effect() {
        let mut registry = ConstraintRegistry::new();
        registry.register("c", locked("x", 0.5), &ctx()).unwrap();

        let result = registry.register("c", locked("y", 0.1), &ctx());
        assert!(matches!(result, Err(DomainError::DuplicateName { .. })));
        assert_eq!(registry.len(), 1);
        assert!(matches!(registry.get("c").unwrap().kind, ConstraintKind::LockedJoint { ref joint, .. } if joint == "x"));
    }

    #[test]
    fn test_invalid_geometry_registers_nothing() {
        let mut registry = ConstraintRegistry::new();
        let result = registry.register("c", locked("elbow", 0.0), &ctx());
        assert!(matches!(result, Err(DomainError::InvalidGeometry { .. })));

        let bad_mask = ConstraintKind::Position {
            joint1: None,
            joint2: "x".to_string(),
            point1: [0.0; 3],
            point2: [0.0; 3],
            mask: vec![true, true],
        };
        assert!(matches!(
            registry.register("p", bad_mask, &ctx()),
            Err(DomainError::InvalidArgument { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stack_replace_is_atomic() {
        let mut registry = ConstraintRegistry::new();
        registry.register("a", locked("x", 0.0), &ctx()).unwrap();
        let mut stack = ConstraintStack::new("s");
        stack.replace("s", &["a"], &[0], &registry).unwrap();

        assert!(matches!(
            stack.replace("s", &["a", "missing"], &[0, 1], &registry),
            Err(DomainError::UnknownConstraint { .. })
        ));
        assert!(matches!(
            stack.replace("s", &["a"], &[0, 1], &registry),
            Err(DomainError::LengthMismatch { left: 1, right: 2 })
        ));
        assert!(matches!(
            stack.replace("s", &["a"], &[-1], &registry),
            Err(DomainError::InvalidArgument { .. })
        ));
        assert_eq!(stack.entries().len(), 1);
    }

    #[test]
    fn test_levels_follow_priority_then_registration_order() {
        let mut registry = ConstraintRegistry::new();
        registry.register("low", locked("y", 0.2), &ctx()).unwrap();
        registry.register("high", locked("x", 0.1), &ctx()).unwrap();
        let mut stack = ConstraintStack::new("s");
        stack.replace("s", &["low", "high"], &[1, 0], &registry).unwrap();

        let resolved = ResolvedStack::resolve(&[&stack], &registry, ctx(), None).unwrap();
        assert_eq!(resolved.level_count(), 2);
        assert_eq!(resolved.constraint_names(), vec!["high".to_string(), "low".to_string()]);

        let (value, jacobian) = resolved.value_and_jacobian(&Configuration::zeros(2));
        assert!((value[0] + 0.1).abs() < 1e-12);
        assert!((value[1] + 0.2).abs() < 1e-12);
        assert!((jacobian[(0, 0)] - 1.0).abs() < 1e-6);
        assert!(jacobian[(0, 1)].abs() < 1e-6);
    }

    #[test]
    fn test_passive_dofs_zero_jacobian_columns() {
        let mut registry = ConstraintRegistry::new();
        let kind = ConstraintKind::Configuration {
            goal: Configuration::new(vec![0.3, 0.4]),
        };
        registry.register("goal", kind, &ctx()).unwrap();
        registry.add_passive_dofs("goal", &["y"], &ctx()).unwrap();

        let constraint = registry.get("goal").unwrap();
        let jacobian = constraint.jacobian(&ctx(), &Configuration::zeros(2));
        assert!((jacobian[(0, 0)] - 1.0).abs() < 1e-6);
        assert!(jacobian.column(1).iter().all(|v| *v == 0.0));
        assert!(matches!(
            registry.add_passive_dofs("missing", &["y"], &ctx()),
            Err(DomainError::UnknownConstraint { .. })
        ));
    }

    #[test]
    fn test_non_constant_rhs_targets_reference_value() {
        let mut registry = ConstraintRegistry::new();
        registry.register("lx", locked("x", 0.0), &ctx()).unwrap();
        registry.set_constant_right_hand_side("lx", false).unwrap();
        assert!(!registry.constant_right_hand_side("lx").unwrap());

        let mut stack = ConstraintStack::new("s");
        stack.replace("s", &["lx"], &[0], &registry).unwrap();
        let reference = Configuration::new(vec![0.7, 0.0]);
        let resolved = ResolvedStack::resolve(&[&stack], &registry, ctx(), Some(&reference)).unwrap();
        assert!(resolved.residual_norm(&reference) < 1e-12);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut set = ConstraintSet::new(Default::default());
        set.lock_joint("x", &[0.5], &ctx()).unwrap();
        set.add_goal_lock_joint("y", &[0.1], &ctx()).unwrap();
        set.reset();
        set.reset();
        assert!(set.registry().is_empty());
        assert!(set.problem_stack().is_empty());
        assert!(set.goal_stack().is_empty());
    }

    #[test]
    fn test_lock_joint_updates_existing_value() {
        let mut set = ConstraintSet::new(Default::default());
        set.lock_joint("x", &[0.5], &ctx()).unwrap();
        set.lock_joint("x", &[0.25], &ctx()).unwrap();
        assert_eq!(set.problem_stack().entries().len(), 1);
        let result = set.compute_value_and_jacobian(ctx(), &Configuration::zeros(2)).unwrap();
        assert!((result.value[0] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_solver_budget_must_be_positive() {
        let mut set = ConstraintSet::new(Default::default());
        assert!(matches!(set.set_error_threshold(0.0), Err(DomainError::InvalidArgument { .. })));
        assert!(matches!(set.set_max_iterations(-3), Err(DomainError::InvalidArgument { .. })));
        set.set_error_threshold(1e-6).unwrap();
        set.set_max_iterations(10).unwrap();
        assert_eq!(set.settings().max_iterations, 10);
    }
}
