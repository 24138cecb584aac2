use planning_session::adapters::inbound::FileEventJournal;
use planning_session::adapters::outbound::{KinematicChain, ObstacleField, Shape};
use planning_session::application::{build_logger, SessionService};
use planning_session::common::Configuration;
use planning_session::domains::planning::ProblemDefinition;
use planning_session::Config;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(Some(Path::new(&config_path)))?;
    info!(config = %config_path, "configuration loaded");

    let logger = build_logger(&config.logging);
    let mut service = SessionService::from_config(config.clone(), logger);
    if config.journal.enabled {
        service = service.with_journal(Arc::new(FileEventJournal::new(config.journal.directory.clone())));
    }

    // A point robot in the plane that has to get around a pillar.
    let device = Arc::new(KinematicChain::planar_point("planar-point", 5.0)?);
    let environment = ObstacleField::new(device.clone(), 0.05)
        .with_obstacle(
            "pillar",
            Shape::Sphere {
                center: [0.0, 0.0, 0.0],
                radius: 1.0,
            },
        )?
        .monitoring(&["y"])?;
    service.register_problem(ProblemDefinition {
        name: "planar".to_string(),
        device,
        environment: Arc::new(environment),
    })?;

    let (session, _) = service.select_problem("planar")?;
    session.set_initial_config(Configuration::new(vec![-3.0, 0.0]))?;
    session.add_goal_config(Configuration::new(vec![3.0, 0.0]))?;

    let solver = session.clone();
    let solved = tokio::task::spawn_blocking(move || solver.solve()).await?;
    match solved {
        Ok(ids) if ids.is_empty() => error!("no path found"),
        Ok(ids) => {
            for id in &ids {
                info!(path = id, length = session.path_length(*id)?, "path stored");
            }
            info!(
                nodes = session.number_nodes(),
                edges = session.number_edges(),
                components = session.number_connected_components(),
                "roadmap"
            );
            let location = PathBuf::from("planar.rdmp");
            session.save_roadmap(&location)?;
            info!(location = %location.display(), "roadmap saved");
        }
        Err(e) => error!("planning failed: {}", e),
    }

    let written = service.flush_events(&session).await?;
    info!(events = written, "events journaled");
    service.close_session("planar").await?;
    Ok(())
}
