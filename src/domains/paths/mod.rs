pub mod bank;
pub mod path;

pub use bank::*;
pub use path::*;
