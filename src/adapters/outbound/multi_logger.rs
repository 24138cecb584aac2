use super::{init_console_logger, init_file_logger};
use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Forwards every message to each sink, in order.
pub struct MultiLogger {
    sinks: Vec<DynLogger>,
}

impl MultiLogger {
    pub fn new(sinks: Vec<DynLogger>) -> Self {
        Self { sinks }
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.error(msg));
    }
}

/// File plus console. Falls back to the console alone when the file logger
/// cannot be installed.
pub fn init_combined_logger(path: &str, level: &str) -> DynLogger {
    let console = init_console_logger();
    match init_file_logger(path, level) {
        Ok(file) => Arc::new(MultiLogger::new(vec![file, console])),
        Err(e) => {
            console.warn(&format!("file logging disabled: {}", e));
            console
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl DomainLogger for Capture {
        fn info(&self, msg: &str) {
            self.0.lock().unwrap().push(format!("I:{}", msg));
        }
        fn warn(&self, msg: &str) {
            self.0.lock().unwrap().push(format!("W:{}", msg));
        }
        fn error(&self, msg: &str) {
            self.0.lock().unwrap().push(format!("E:{}", msg));
        }
    }

    #[test]
    fn test_every_sink_receives_messages() {
        let a = Arc::new(Capture::default());
        let b = Arc::new(Capture::default());
        let multi = MultiLogger::new(vec![a.clone(), b.clone()]);
        multi.warn("step");
        multi.error("failed");
        assert_eq!(*a.0.lock().unwrap(), vec!["W:step".to_string(), "E:failed".to_string()]);
        assert_eq!(a.0.lock().unwrap().len(), b.0.lock().unwrap().len());
    }
}
