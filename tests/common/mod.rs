#![allow(dead_code)]

use planning_session::adapters::outbound::{init_noop_logger, KinematicChain, ObstacleField, Shape};
use planning_session::application::SessionService;
use planning_session::common::Configuration;
use planning_session::config::{Config, StrategyChoice};
use planning_session::domains::logger::DynLogger;
use planning_session::domains::planning::{ProblemDefinition, ProblemSession};
use std::sync::Arc;

pub fn q(x: f64, y: f64) -> Configuration {
    Configuration::new(vec![x, y])
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.validation = Some(StrategyChoice {
        name: "Dichotomy".to_string(),
        tolerance: 0.01,
    });
    config.optimizers.chain = vec!["RandomShortcut".to_string()];
    config.planning.random_seed = 7;
    config.planning.max_iterations = 2000;
    config
}

/// Planar point robot in `[-5, 5]^2`; `pillar` adds a unit sphere at the origin.
pub fn planar_problem(name: &str, pillar: bool) -> ProblemDefinition {
    let device = Arc::new(KinematicChain::planar_point("planar-point", 5.0).unwrap());
    let mut field = ObstacleField::new(device.clone(), 0.05).monitoring(&["y"]).unwrap();
    if pillar {
        field = field
            .with_obstacle(
                "pillar",
                Shape::Sphere {
                    center: [0.0, 0.0, 0.0],
                    radius: 1.0,
                },
            )
            .unwrap();
    }
    ProblemDefinition {
        name: name.to_string(),
        device,
        environment: Arc::new(field),
    }
}

/// Two-link planar arm with joints `joint1` and `joint2`.
pub fn arm_problem(name: &str, links: &[f64]) -> ProblemDefinition {
    let device = Arc::new(KinematicChain::planar_arm("arm", links).unwrap());
    ProblemDefinition {
        name: name.to_string(),
        device: device.clone(),
        environment: Arc::new(ObstacleField::new(device, 0.0)),
    }
}

pub fn service_with_logger(config: Config, logger: DynLogger) -> SessionService {
    let service = SessionService::from_config(config, logger);
    service.register_problem(planar_problem("open", false)).unwrap();
    service.register_problem(planar_problem("pillar", true)).unwrap();
    service.register_problem(arm_problem("arm", &[1.0, 1.0])).unwrap();
    service
}

pub fn service() -> SessionService {
    service_with_logger(test_config(), init_noop_logger())
}

pub fn session(service: &SessionService, name: &str) -> Arc<ProblemSession> {
    service.select_problem(name).unwrap().0
}
