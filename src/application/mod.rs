pub mod logging;
pub mod session_service;

pub use logging::*;
pub use session_service::*;
