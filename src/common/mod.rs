pub mod configuration;
pub mod error;
pub mod event;

pub use configuration::*;
pub use error::*;
pub use event::*;
