mod common;

use approx::assert_relative_eq;
use common::{q, service, session};
use planning_session::common::{Configuration, DomainError};

#[test]
fn test_locked_joint_is_enforced_by_projection() {
    let service = service();
    let arm = session(&service, "arm");
    let threshold = arm.solver_settings().error_threshold;

    arm.create_locked_joint("joint1", "joint1", &[0.5]).unwrap();
    arm.set_numerical_constraints("stack1", &["joint1"], &[0]).unwrap();

    for input in [vec![2.0, -1.0], vec![-3.0, 0.3], vec![0.5, 0.5]] {
        let outcome = arm.apply_constraints(&Configuration::new(input)).unwrap();
        assert!(outcome.success);
        assert!((outcome.output[0] - 0.5).abs() <= threshold);
        assert!(outcome.residual_error <= threshold);
    }
}

#[test]
fn test_priority_zero_dominates_lower_levels() {
    let service = service();
    let s = session(&service, "open");
    s.create_locked_joint("lock_x", "x", &[1.0]).unwrap();
    s.create_configuration_constraint("reach", q(3.0, 3.0)).unwrap();
    s.set_numerical_constraints("stack", &["reach", "lock_x"], &[1, 0]).unwrap();

    let evaluation = s.compute_value_and_jacobian(&q(0.0, 0.0)).unwrap();
    assert_eq!(evaluation.value.len(), 3);
    assert_relative_eq!(evaluation.value[0], -1.0);
    assert_relative_eq!(evaluation.jacobian[(0, 0)], 1.0, epsilon = 1e-6);
    assert_relative_eq!(evaluation.jacobian[(0, 1)], 0.0, epsilon = 1e-6);

    let outcome = s.apply_constraints(&q(0.0, 0.0)).unwrap();
    assert!(outcome.success);
    assert_relative_eq!(outcome.output[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(outcome.output[1], 3.0, epsilon = 1e-6);
}

#[test]
fn test_equal_priorities_follow_registration_order() {
    let service = service();
    let s = session(&service, "open");
    s.create_locked_joint("lock_x", "x", &[1.0]).unwrap();
    s.create_locked_joint("lock_y", "y", &[2.0]).unwrap();
    s.set_numerical_constraints("stack", &["lock_y", "lock_x"], &[0, 0]).unwrap();

    let evaluation = s.compute_value_and_jacobian(&q(0.0, 0.0)).unwrap();
    assert_eq!(evaluation.value.len(), 2);
    assert_relative_eq!(evaluation.value[0], -1.0);
    assert_relative_eq!(evaluation.value[1], -2.0);
    assert_relative_eq!(evaluation.jacobian[(0, 0)], 1.0, epsilon = 1e-6);
    assert_relative_eq!(evaluation.jacobian[(1, 1)], 1.0, epsilon = 1e-6);
    assert_relative_eq!(evaluation.jacobian[(0, 1)], 0.0, epsilon = 1e-6);
}

#[test]
fn test_registration_failures_leave_registry_unchanged() {
    let service = service();
    let s = session(&service, "open");
    s.create_locked_joint("lock_x", "x", &[1.0]).unwrap();

    let duplicate = s.create_configuration_constraint("lock_x", q(0.0, 0.0));
    assert!(matches!(duplicate, Err(DomainError::DuplicateName { .. })));
    let unknown_joint = s.create_locked_joint("lock_z", "z", &[0.0]);
    assert!(matches!(unknown_joint, Err(DomainError::InvalidGeometry { .. })));
    assert_eq!(
        s.get_available(planning_session::AvailableKind::NumericalConstraint).unwrap(),
        vec!["lock_x".to_string()]
    );

    let mismatch = s.set_numerical_constraints("stack", &["lock_x"], &[0, 1]);
    assert!(matches!(mismatch, Err(DomainError::LengthMismatch { left: 1, right: 2 })));
    let missing = s.set_numerical_constraints("stack", &["lock_x", "ghost"], &[0, 0]);
    assert!(matches!(missing, Err(DomainError::UnknownConstraint { .. })));
    let outcome = s.apply_constraints(&q(4.0, 4.0)).unwrap();
    assert_eq!(outcome.output, q(4.0, 4.0));
}

#[test]
fn test_reset_constraints_is_idempotent() {
    let service = service();
    let s = session(&service, "open");
    s.create_locked_joint("lock_x", "x", &[1.0]).unwrap();
    s.set_numerical_constraints("stack", &["lock_x"], &[0]).unwrap();

    s.reset_constraints();
    s.reset_constraints();
    assert!(s
        .get_available(planning_session::AvailableKind::NumericalConstraint)
        .unwrap()
        .is_empty());
    assert_eq!(s.compute_value_and_jacobian(&q(0.0, 0.0)).unwrap().value.len(), 0);
    s.create_locked_joint("lock_x", "x", &[2.0]).unwrap();
}

#[test]
fn test_non_constant_right_hand_side_keeps_reference_value() {
    let service = service();
    let s = session(&service, "open");
    s.create_locked_joint("lock_x", "x", &[1.0]).unwrap();
    assert!(s.get_constant_right_hand_side("lock_x").unwrap());
    s.set_constant_right_hand_side("lock_x", false).unwrap();
    s.set_numerical_constraints("stack", &["lock_x"], &[0]).unwrap();

    let outcome = s.apply_constraints(&q(2.5, -1.0)).unwrap();
    assert!(outcome.success);
    assert_relative_eq!(outcome.output[0], 2.5, epsilon = 1e-9);
    assert!(matches!(
        s.get_constant_right_hand_side("ghost"),
        Err(DomainError::UnknownConstraint { .. })
    ));
}

#[test]
fn test_solver_budget_validation() {
    let service = service();
    let s = session(&service, "open");
    assert!(matches!(s.set_error_threshold(0.0), Err(DomainError::InvalidArgument { .. })));
    assert!(matches!(s.set_max_iterations(-3), Err(DomainError::InvalidArgument { .. })));
    s.set_error_threshold(1e-6).unwrap();
    s.set_max_iterations(10).unwrap();
    assert_eq!(s.solver_settings().max_iterations, 10);
}

#[test]
fn test_generate_valid_config_respects_constraints_and_obstacles() {
    let service = service();
    let s = session(&service, "pillar");
    s.create_locked_joint("lock_y", "y", &[0.0]).unwrap();
    s.set_numerical_constraints("stack", &["lock_y"], &[0]).unwrap();

    let outcome = s.generate_valid_config(50).unwrap();
    assert!(outcome.success);
    assert!(outcome.output[1].abs() < 1e-4);
    assert!(outcome.output[0].abs() > 1.0);

    let none = s.generate_valid_config(0).unwrap();
    assert!(!none.success);
    assert!(none.residual_error.is_infinite());
}

#[test]
fn test_dimension_mismatch_is_invalid_argument() {
    let service = service();
    let s = session(&service, "open");
    let result = s.apply_constraints(&Configuration::new(vec![0.0, 0.0, 0.0]));
    assert!(matches!(result, Err(DomainError::InvalidArgument { .. })));
    assert!(matches!(
        s.set_initial_config(Configuration::new(vec![1.0])),
        Err(DomainError::InvalidArgument { .. })
    ));
}

#[test]
fn test_tool_pose_constraints_on_the_arm() {
    let service = service();
    let arm = session(&service, "arm");

    arm.create_position_constraint("reach", "", "tool", [1.2, 0.8, 0.0], [0.0; 3], &[true, true, false])
        .unwrap();
    arm.set_numerical_constraints("stack", &["reach"], &[0]).unwrap();
    let outcome = arm.apply_constraints(&Configuration::new(vec![0.3, 0.3])).unwrap();
    assert!(outcome.success);
    let (a, b) = (outcome.output[0], outcome.output[1]);
    assert_relative_eq!(a.cos() + (a + b).cos(), 1.2, epsilon = 1e-3);
    assert_relative_eq!(a.sin() + (a + b).sin(), 0.8, epsilon = 1e-3);

    let half = 0.45f64;
    arm.create_orientation_constraint("face", "", "tool", [0.0, 0.0, half.sin(), half.cos()], &[false, false, true])
        .unwrap();
    arm.set_numerical_constraints("stack", &["face"], &[0]).unwrap();
    let outcome = arm.apply_constraints(&Configuration::new(vec![0.1, 0.2])).unwrap();
    assert!(outcome.success);
    assert_relative_eq!(outcome.output[0] + outcome.output[1], 0.9, epsilon = 1e-3);

    let quarter = std::f64::consts::FRAC_PI_4;
    arm.create_transformation_constraint(
        "pose",
        "",
        "tool",
        [1.0, 1.0, 0.0, 0.0, 0.0, quarter.sin(), quarter.cos()],
        &[true, true, false, false, false, true],
    )
    .unwrap();
    arm.set_numerical_constraints("stack", &["pose"], &[0]).unwrap();
    let outcome = arm.apply_constraints(&Configuration::new(vec![0.2, 1.3])).unwrap();
    assert!(outcome.success);
    assert_relative_eq!(outcome.output[0], 0.0, epsilon = 1e-3);
    assert_relative_eq!(outcome.output[1], std::f64::consts::FRAC_PI_2, epsilon = 1e-3);

    assert!(matches!(
        arm.create_orientation_constraint("bad", "", "tool", [0.0, 0.0, 0.0, 1.0], &[true]),
        Err(DomainError::InvalidArgument { .. })
    ));
    assert!(matches!(
        arm.create_position_constraint("bad", "elbow", "tool", [0.0; 3], [0.0; 3], &[true; 3]),
        Err(DomainError::InvalidGeometry { .. })
    ));
}

#[test]
fn test_distance_and_com_constraints() {
    let service = service();
    let arm = session(&service, "arm");

    arm.create_distance_between_joint_constraint("span", "joint1", "tool", 1.5).unwrap();
    arm.set_numerical_constraints("stack", &["span"], &[0]).unwrap();
    let outcome = arm.apply_constraints(&Configuration::new(vec![0.0, 1.0])).unwrap();
    assert!(outcome.success);
    assert_relative_eq!((2.0 + 2.0 * outcome.output[1].cos()).sqrt(), 1.5, epsilon = 1e-3);

    // Body COM expressed in the frame of joint1; only its x coordinate is constrained.
    arm.create_relative_com_constraint("com", "", "joint1", [0.875, 0.0, 0.0], &[true, false, false])
        .unwrap();
    arm.set_numerical_constraints("stack", &["com"], &[0]).unwrap();
    let outcome = arm.apply_constraints(&Configuration::new(vec![0.4, 1.0])).unwrap();
    assert!(outcome.success);
    assert_relative_eq!((1.5 + 0.5 * outcome.output[1].cos()) / 2.0, 0.875, epsilon = 1e-3);
    assert!(matches!(
        arm.create_relative_com_constraint("bad", "elbow", "joint1", [0.0; 3], &[true; 3]),
        Err(DomainError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        arm.create_distance_between_joint_constraint("bad", "joint1", "tool", -1.0),
        Err(DomainError::InvalidArgument { .. })
    ));

    let pillar = session(&service, "pillar");
    pillar.create_distance_between_joint_and_objects("clear", "y", &["pillar"], 1.5).unwrap();
    pillar.set_numerical_constraints("stack", &["clear"], &[0]).unwrap();
    let outcome = pillar.apply_constraints(&q(2.0, 0.5)).unwrap();
    assert!(outcome.success);
    assert_relative_eq!(outcome.output[0].hypot(outcome.output[1]), 2.5, epsilon = 1e-3);
    assert!(matches!(
        pillar.create_distance_between_joint_and_objects("bad", "y", &["wall"], 1.0),
        Err(DomainError::InvalidGeometry { .. })
    ));
}

#[test]
fn test_contact_constraints_register() {
    let service = service();
    let arm = session(&service, "arm");
    let triangle = [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [0.0, 0.1, 0.0]];

    arm.create_com_between_feet("feet", "", "joint1", "tool", [0.0; 3], [0.0; 3], "joint1", &[true; 3])
        .unwrap();
    arm.create_static_stability_constraint("stable", &["tool"], &[[0.0; 3]], &[[0.0, 0.0, 1.0]], "")
        .unwrap();
    arm.create_convex_shape_contact_constraint("contact", &["joint1"], &["tool"], &triangle, &[vec![0, 1, 2]], &[vec![0, 1, 2]])
        .unwrap();
    #[allow(deprecated)]
    arm.create_static_stability_gravity_constraint("gravity", &["joint1"], &["tool"], &triangle, &[vec![0, 1, 2]], &[vec![0, 1, 2]])
        .unwrap();
    assert_eq!(
        arm.get_available(planning_session::AvailableKind::NumericalConstraint).unwrap(),
        vec!["feet", "stable", "contact", "gravity"]
    );

    assert!(matches!(
        arm.create_com_between_feet("bad", "", "joint1", "tool", [0.0; 3], [0.0; 3], "joint1", &[true; 2]),
        Err(DomainError::InvalidArgument { .. })
    ));
    assert!(matches!(
        arm.create_static_stability_constraint("bad", &["tool"], &[[0.0; 3]], &[[0.0; 3]], ""),
        Err(DomainError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        arm.create_static_stability_constraint("bad", &["tool", "joint1"], &[[0.0; 3]], &[[0.0, 0.0, 1.0]], ""),
        Err(DomainError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        arm.create_convex_shape_contact_constraint("bad", &["joint1"], &["tool"], &triangle, &[vec![0, 1, 5]], &[vec![0, 1, 2]]),
        Err(DomainError::InvalidGeometry { .. })
    ));
    assert!(!arm.get_available(planning_session::AvailableKind::NumericalConstraint).unwrap().contains(&"bad".to_string()));
}

#[test]
fn test_initial_and_goal_configurations() {
    let service = service();
    let s = session(&service, "open");
    assert!(matches!(s.get_initial_config(), Err(DomainError::NotConfigured { .. })));
    assert!(s.set_initial_config(Configuration::new(vec![0.0])).is_err());

    s.set_initial_config(q(-1.0, 0.0)).unwrap();
    s.add_goal_config(q(1.0, 0.0)).unwrap();
    s.add_goal_config(q(1.0, 1.0)).unwrap();
    assert_eq!(s.get_initial_config().unwrap(), q(-1.0, 0.0));
    assert_eq!(s.get_goal_configs(), vec![q(1.0, 0.0), q(1.0, 1.0)]);

    s.reset_goal_configs();
    assert!(s.get_goal_configs().is_empty());
    assert_eq!(s.get_initial_config().unwrap(), q(-1.0, 0.0));
}

#[test]
fn test_seeded_sampling_is_reproducible() {
    let service = service();
    let s = session(&service, "pillar");
    s.set_random_seed(11);
    let first = s.generate_valid_config(20).unwrap();
    s.set_random_seed(11);
    let second = s.generate_valid_config(20).unwrap();
    assert!(first.success);
    assert_eq!(first.output, second.output);
}
