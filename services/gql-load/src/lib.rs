//! Load generation for GraphQL endpoints.
//!
//! This crate provides:
//! - A bounded-concurrency dispatcher with optional token-bucket rate limiting
//! - Cooperative cancellation that drains in-flight requests
//! - Streaming latency and outcome statistics over a bounded window
//! - A non-blocking CSV log of every request and response
//! - Scenario loading, console tables, saved results, and result comparison

pub mod compare;
pub mod config;
pub mod http;
pub mod metrics;
pub mod rate;
pub mod report;
pub mod request_log;
pub mod runner;
pub mod shutdown;

pub use config::{Overrides, ResolvedScenario, ScenarioFile};
pub use http::HttpTransport;
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use rate::RateLimiter;
pub use report::ResultsOutput;
pub use request_log::RequestLogSink;
pub use runner::{LoadRunner, RequestError, RequestOutcome, RunContext};
pub use shutdown::ShutdownSignal;
