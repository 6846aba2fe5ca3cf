pub mod catalog;
pub mod config;
pub mod ingest;
pub mod model;
pub mod processing;

pub use processing::startup_self_check;
