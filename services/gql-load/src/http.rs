//! HTTP transport backed by a pooled reqwest client.

use async_trait::async_trait;
use load_common::{LoadError, LoadResult, OutboundRequest, Transport, TransportResponse};
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};

/// Per-request timeout covering connect, send, and reading the body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends GraphQL requests as JSON POSTs.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Client sized for `concurrency` simultaneous requests.
    pub fn new(concurrency: u32, timeout: Duration) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(concurrency as usize * 2)
            .build()
            .map_err(|e| LoadError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> TransportResponse {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        match builder.body(request.body).send().await {
            Ok(response) => {
                // Latency is time to response headers; the body read is not timed.
                let elapsed = start.elapsed();
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(body) => TransportResponse::ok(status, body, elapsed),
                    Err(e) => TransportResponse {
                        status: Some(status),
                        body: String::new(),
                        elapsed,
                        error: Some(format!("failed to read response body: {}", e)),
                    },
                }
            }
            Err(e) => TransportResponse::failed(e.to_string(), start.elapsed()),
        }
    }
}
