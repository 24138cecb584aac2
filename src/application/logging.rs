use crate::adapters::outbound::{
    init_buffered_logger, init_combined_logger, init_console_logger, init_file_logger, init_noop_logger,
    init_tracing_logger,
};
use crate::config::LoggingConfig;
use crate::domains::logger::DynLogger;

/// Builds the process-wide domain logger the configuration asks for. A
/// non-zero `buffer` wraps it in the buffered logger, which needs a running
/// tokio runtime.
pub fn build_logger(config: &LoggingConfig) -> DynLogger {
    let logger = match config.backend.to_ascii_lowercase().as_str() {
        "file" => init_file_logger(&config.file, &config.level).unwrap_or_else(|e| {
            let console = init_console_logger();
            console.warn(&format!("file logging disabled: {}", e));
            console
        }),
        "combined" => init_combined_logger(&config.file, &config.level),
        "console" => init_console_logger(),
        "noop" => init_noop_logger(),
        "tracing" => init_tracing_logger(),
        other => {
            let console = init_console_logger();
            console.warn(&format!("unknown logging backend {}, using the console", other));
            console
        }
    };
    if config.buffer == 0 {
        return logger;
    }
    init_buffered_logger(logger, config.buffer)
}
