//! Scripted transports for exercising the dispatcher without a network.

use async_trait::async_trait;
use load_common::{OutboundRequest, Transport, TransportResponse};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

type StartHook = Box<dyn Fn(u64) + Send + Sync>;

/// A transport that answers from a script and records what it saw.
///
/// Statuses are cycled by call order, so `[200, 500]` alternates. Latency is
/// simulated with `tokio::time::sleep` and reported verbatim as `elapsed`,
/// which keeps latency statistics exact under paused time.
pub struct StubTransport {
    latency: Duration,
    statuses: Vec<u16>,
    body: String,
    transport_error: Option<String>,
    on_start: Option<StartHook>,
    started: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl StubTransport {
    /// Always answers 200 with an empty GraphQL data object.
    pub fn ok(latency: Duration) -> Self {
        Self {
            latency,
            statuses: vec![200],
            body: r#"{"data":{}}"#.to_string(),
            transport_error: None,
            on_start: None,
            started: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Cycle through these statuses in call order.
    pub fn with_statuses(mut self, statuses: Vec<u16>) -> Self {
        assert!(!statuses.is_empty(), "need at least one status");
        self.statuses = statuses;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Fail every request at the transport level.
    pub fn failing(mut self, error: impl Into<String>) -> Self {
        self.transport_error = Some(error.into());
        self
    }

    /// Called with the 1-based start count as each request begins.
    pub fn on_start(mut self, hook: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Requests that reached the transport.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous in-flight requests observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Copies of every request received, in arrival order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: OutboundRequest) -> TransportResponse {
        let index = self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_start {
            hook(index + 1);
        }
        self.requests.lock().push(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = &self.transport_error {
            return TransportResponse::failed(error.clone(), self.latency);
        }
        let status = self.statuses[index as usize % self.statuses.len()];
        TransportResponse::ok(status, self.body.clone(), self.latency)
    }
}
