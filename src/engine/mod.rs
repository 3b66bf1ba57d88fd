//! Fan-out engine: limiter, executor, aggregator, and the dispatch barrier
//! that ties them together.

pub mod aggregator;
pub mod deadline;
pub mod dispatch;
pub mod executor;
pub mod limiter;

pub use aggregator::ResultAggregator;
pub use deadline::Deadline;
pub use dispatch::{DispatchConfig, DispatchPhase, DispatchRun, Dispatcher};
pub use executor::{Operation, TaskExecutor};
pub use limiter::{ConcurrencyLimiter, Permit};
