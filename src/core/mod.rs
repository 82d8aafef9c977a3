// Public modules
pub mod config;
pub mod error;
pub mod exec;
pub mod pipeline;
pub mod ssh;
pub mod step;
pub mod tasks;
pub mod transfer;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use pipeline::{Params, Pipeline, RunOptions};
pub use step::{PipelineResult, PlannedCommand, Step, StepResult};
