pub mod client;
pub mod dashboard;
pub mod execution;
pub mod graph;
pub mod manifest;
pub mod utils;
