//! Producer/consumer streaming with a sliding retention window.

pub mod consumer;
pub mod pipeline;
pub mod producer;
pub mod source;
pub mod window;

pub use consumer::{Consumer, StreamEnd, StreamReport};
pub use pipeline::{StreamConfig, StreamPipeline};
pub use producer::run_producer;
pub use source::{EventSource, RandomLogSource};
pub use window::{RunningCounters, SlidingWindow};
