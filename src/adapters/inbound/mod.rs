pub mod file_event_journal;

pub use file_event_journal::*;
