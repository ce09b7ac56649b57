//! Contract between the dispatcher and whatever actually sends requests.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// One fully rendered request, ready to send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// What the transport observed for one request.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// `None` when no HTTP response arrived (connect error, timeout, DNS).
    pub status: Option<u16>,
    pub body: String,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl TransportResponse {
    pub fn ok(status: u16, body: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
            elapsed,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: None,
            body: String::new(),
            elapsed,
            error: Some(error.into()),
        }
    }

    /// Status 200 and no application errors in the GraphQL body.
    ///
    /// A body that is not JSON does not count against a 200.
    pub fn is_graphql_success(&self) -> bool {
        if self.status != Some(200) || self.error.is_some() {
            return false;
        }
        match serde_json::from_str::<GraphQlEnvelope>(&self.body) {
            Ok(envelope) => envelope.errors.map_or(true, |e| e.is_empty()),
            Err(_) => true,
        }
    }
}

#[derive(Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

/// Sends one request. Implementations own pooling and their own timeout,
/// and report every failure in the response rather than as an error.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: OutboundRequest) -> TransportResponse;
}
