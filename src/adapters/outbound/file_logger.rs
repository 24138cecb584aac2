use crate::domains::logger::{DomainLogger, DynLogger};
use chrono::Utc;
use std::sync::Arc;

/// Forwards to the `log` facade, which fast_log drains into the file.
struct FileBridge;

impl DomainLogger for FileBridge {
    fn info(&self, msg: &str) {
        log::info!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn warn(&self, msg: &str) {
        log::warn!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn error(&self, msg: &str) {
        log::error!("{} - {}", Utc::now().to_rfc3339(), msg);
    }
}

pub fn parse_level(level: &str) -> Result<log::LevelFilter, String> {
    level
        .parse::<log::LevelFilter>()
        .map_err(|_| format!("unknown log level: {}", level))
}

/// Installs fast_log as the process-wide `log` backend writing to `path`.
/// fast_log can only be installed once per process; later calls fail.
pub fn init_file_logger(path: &str, level: &str) -> Result<DynLogger, String> {
    let level = parse_level(level)?;
    fast_log::init(fast_log::config::Config::new().file(path).level(level))
        .map_err(|e| format!("Failed to initialize fast_log: {}", e))?;
    Ok(Arc::new(FileBridge))
}
