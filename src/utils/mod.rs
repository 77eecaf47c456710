pub mod parallel;

pub use parallel::{ParallelConfig, ParallelError, ParallelExecutor};
