//! Common types shared across the gql-load workspace.

pub mod error;
pub mod spec;
pub mod transport;

pub use error::{LoadError, LoadResult};
pub use spec::{AuthTemplate, LoadTestSpec, DEFAULT_CONCURRENCY, ESTIMATED_P95};
pub use transport::{OutboundRequest, Transport, TransportResponse};
