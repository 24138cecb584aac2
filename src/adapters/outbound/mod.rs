pub mod buffered_logger;
pub mod console_logger;
pub mod file_logger;
pub mod gauss_newton;
pub mod kinematic_chain;
pub mod multi_logger;
pub mod noop_logger;
pub mod obstacle_field;
pub mod roadmap_file;

pub use buffered_logger::*;
pub use console_logger::*;
pub use file_logger::*;
pub use gauss_newton::*;
pub use kinematic_chain::*;
pub use multi_logger::*;
pub use noop_logger::*;
pub use obstacle_field::*;
pub use roadmap_file::*;
