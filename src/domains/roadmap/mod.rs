pub mod file_format;
pub mod graph;
pub mod search;

pub use file_format::{decode, encode, RoadmapHeader};
pub use graph::*;
