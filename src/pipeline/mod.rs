pub mod processor;
pub mod report;

pub use processor::{run, PipelineError};
