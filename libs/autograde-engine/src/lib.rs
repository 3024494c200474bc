pub mod backend;
pub mod evaluator;
pub mod executor;
pub mod jobs;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendRouter, ExecutionBackend, TransportError};
pub use executor::GradingAggregator;
pub use jobs::{GradingOutcome, JobTracker};
pub use runner::TestRunner;
