use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

struct ConsoleBridge;

impl DomainLogger for ConsoleBridge {
    fn info(&self, msg: &str) {
        println!("INFO: {}", msg);
    }

    fn warn(&self, msg: &str) {
        println!("WARN: {}", msg);
    }

    fn error(&self, msg: &str) {
        eprintln!("ERROR: {}", msg);
    }
}

/// Console logger, the fallback when nothing else can be set up.
pub fn init_console_logger() -> DynLogger {
    Arc::new(ConsoleBridge)
}

/// Emits domain messages as `tracing` events under the `planning` target, so
/// they end up wherever the process subscriber sends them.
struct TracingBridge;

impl DomainLogger for TracingBridge {
    fn info(&self, msg: &str) {
        tracing::info!(target: "planning", "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "planning", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "planning", "{}", msg);
    }
}

pub fn init_tracing_logger() -> DynLogger {
    Arc::new(TracingBridge)
}
