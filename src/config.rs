use crate::domains::ports::SolverSettings;
use crate::domains::planning::SessionSettings;
use crate::domains::strategies::StrategyParameters;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverConfig,
    pub planning: PlanningConfig,
    pub validation: Option<StrategyChoice>,
    pub projection: Option<StrategyChoice>,
    pub optimizers: OptimizerConfig,
    pub roadmap: RoadmapConfig,
    pub logging: LoggingConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub error_threshold: f64,
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let settings = SolverSettings::default();
        Self {
            error_threshold: settings.error_threshold,
            max_iterations: settings.max_iterations,
        }
    }
}

/// Planner defaults. A strategy left unset stays unselected in new sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub max_iterations: usize,
    pub planner: Option<String>,
    pub steering: Option<String>,
    pub shooter: Option<String>,
    pub random_seed: u64,
    pub extension_step: f64,
    pub connection_radius: f64,
    pub neighbours: usize,
    pub discretization_step: f64,
    pub shortcut_iterations: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        let params = StrategyParameters::default();
        Self {
            max_iterations: 10_000,
            planner: Some("DiffusingPlanner".to_string()),
            steering: Some("Straight".to_string()),
            shooter: Some("Uniform".to_string()),
            random_seed: 0,
            extension_step: params.extension_step,
            connection_radius: params.connection_radius,
            neighbours: params.neighbours,
            discretization_step: params.discretization_step,
            shortcut_iterations: params.shortcut_iterations,
        }
    }
}

/// A strategy name with the tolerance it is selected with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyChoice {
    pub name: String,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Applied in order after every successful solve.
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapConfig {
    /// Base directory for relative roadmap locations; `ROADMAP_DATA_DIR` or
    /// the working directory when unset.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `console`, `file`, `combined`, `tracing`, `noop`.
    pub backend: String,
    pub file: String,
    pub level: String,
    /// Channel size of the buffered logger; 0 logs synchronously.
    pub buffer: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            backend: "tracing".to_string(),
            file: "logs/planning-session.log".to_string(),
            level: "info".to_string(),
            buffer: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("journal"),
        }
    }
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Layers an optional TOML file under `PLANNING__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml).required(false));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("PLANNING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.solver.error_threshold > 0.0) {
            bail!("solver.error_threshold must be positive");
        }
        if self.solver.max_iterations == 0 {
            bail!("solver.max_iterations must be positive");
        }
        for (section, choice) in [("validation", &self.validation), ("projection", &self.projection)] {
            if let Some(choice) = choice {
                if !(choice.tolerance > 0.0) {
                    bail!("{}.tolerance must be positive", section);
                }
            }
        }
        if !(self.planning.extension_step > 0.0) || !(self.planning.discretization_step > 0.0) {
            bail!("planning step lengths must be positive");
        }
        Ok(())
    }

    pub fn strategy_parameters(&self) -> StrategyParameters {
        StrategyParameters {
            extension_step: self.planning.extension_step,
            connection_radius: self.planning.connection_radius,
            neighbours: self.planning.neighbours,
            discretization_step: self.planning.discretization_step,
            shortcut_iterations: self.planning.shortcut_iterations,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            solver: SolverSettings {
                error_threshold: self.solver.error_threshold,
                max_iterations: self.solver.max_iterations,
            },
            max_planning_iterations: self.planning.max_iterations,
            parameters: self.strategy_parameters(),
            random_seed: self.planning.random_seed,
        }
    }
}
