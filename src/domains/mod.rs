pub mod configurations;
pub mod constraints;
pub mod logger;
pub mod paths;
pub mod planning;
pub mod ports;
pub mod roadmap;
pub mod strategies;

pub use logger::*;
pub use planning::*;
pub use ports::*;
