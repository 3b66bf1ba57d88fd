//! # fanout-rs
//!
//! Bounded concurrent execution engine.
//!
//! Fans independent work items out to a capped number of tokio tasks under
//! a shared deadline and collects per-item results (`engine`), and runs
//! producer/consumer event streams with a sliding retention window
//! (`stream`). HTTP title-fetch and download operations (`ops`) plug into
//! the engine; `telemetry` wires tracing and OpenTelemetry.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod ops;
pub mod stream;
pub mod telemetry;
