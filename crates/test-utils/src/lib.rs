//! Shared test utilities for the gql-load workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Stub transports with scripted statuses, latency and instrumentation
//! - Load test spec fixtures
//! - Paths to the sample scenarios shipped in the workspace
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, StubTransport};
//! ```

pub mod fixtures;
pub mod paths;
pub mod transports;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;
pub use transports::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert two `Duration`s are within `tolerance` of each other.
///
/// ```ignore
/// use std::time::Duration;
/// use test_utils::assert_duration_near;
///
/// assert_duration_near!(Duration::from_millis(50), Duration::from_millis(51), Duration::from_millis(2));
/// ```
#[macro_export]
macro_rules! assert_duration_near {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: std::time::Duration = $left;
        let right: std::time::Duration = $right;
        let diff = if left > right { left - right } else { right - left };
        if diff > $tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > tolerance `{:?}`",
                left, right, diff, $tolerance
            );
        }
    }};
}
