use std::sync::Arc;

/// Domain-level logging port.
/// Small and infallible: a failing backend must never fail a planning call.
pub trait DomainLogger: Send + Sync + 'static {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

pub type DynLogger = Arc<dyn DomainLogger>;

/// Prefixes every message with the problem and session it comes from, so
/// several sessions can share one backend.
pub struct ScopedLogger {
    inner: DynLogger,
    scope: String,
}

impl ScopedLogger {
    pub fn new(inner: DynLogger, problem: &str, session_id: &str) -> Self {
        Self {
            inner,
            scope: format!("[{}/{}]", problem, session_id),
        }
    }

    pub fn into_dyn(self) -> DynLogger {
        Arc::new(self)
    }
}

impl DomainLogger for ScopedLogger {
    fn info(&self, msg: &str) {
        self.inner.info(&format!("{} {}", self.scope, msg));
    }

    fn warn(&self, msg: &str) {
        self.inner.warn(&format!("{} {}", self.scope, msg));
    }

    fn error(&self, msg: &str) {
        self.inner.error(&format!("{} {}", self.scope, msg));
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
            self.0.lock().unwrap().push(msg.to_string());
        }
        fn warn(&self, msg: &str) {
            self.0.lock().unwrap().push(msg.to_string());
        }
        fn error(&self, msg: &str) {
            self.0.lock().unwrap().push(msg.to_string());
        }
    }

    #[test]
    fn test_scope_prefix() {
        let capture = Arc::new(Capture::default());
        let logger = ScopedLogger::new(capture.clone(), "arm", "s1");
        logger.warn("goal dropped");
        assert_eq!(capture.0.lock().unwrap()[0], "[arm/s1] goal dropped");
    }
}
