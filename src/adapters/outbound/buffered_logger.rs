use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

enum Level {
    Info,
    Warn,
    Error,
}

struct LogMessage {
    level: Level,
    msg: String,
}

/// Hands messages to a background task so planning threads never block on
/// the backend. Messages are dropped, and counted, when the buffer is full.
pub struct BufferedLogger {
    sender: mpsc::Sender<LogMessage>,
    dropped: AtomicU64,
}

impl BufferedLogger {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, level: Level, msg: &str) {
        let message = LogMessage {
            level,
            msg: msg.to_string(),
        };
        if self.sender.try_send(message).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl DomainLogger for BufferedLogger {
    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }
}

/// Must be called inside a tokio runtime; the forwarding task is spawned on it.
pub fn init_buffered_logger(bridge: DynLogger, capacity: usize) -> Arc<BufferedLogger> {
    let (sender, mut rx) = mpsc::channel::<LogMessage>(capacity.max(1));
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message.level {
                Level::Info => bridge.info(&message.msg),
                Level::Warn => bridge.warn(&message.msg),
                Level::Error => bridge.error(&message.msg),
            }
        }
    });
    Arc::new(BufferedLogger {
        sender,
        dropped: AtomicU64::new(0),
    })
}
