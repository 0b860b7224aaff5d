//! # Utility Modules
//!
//! Supporting utilities for logging, timing and observability.
//!
//! ## Components
//! - **Logging**: Structured logging setup for hosts and demos
//! - **Timeout**: Async timeout wrappers and default durations
//! - **Metrics**: Thread-safe counters for connections, frames and door outcomes

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
