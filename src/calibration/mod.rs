pub mod config;
pub mod engine;
pub mod stats;
pub mod table;
pub mod types;

pub use config::CalibrationConfig;
pub use engine::CalibrationEngine;
pub use table::{AdaptiveThreshold, ThresholdTable};
