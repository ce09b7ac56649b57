//! Request dispatch and load test orchestration.
//!
//! One dispatcher loop originates requests in budget order. Each origination
//! passes the rate limiter (if any), then waits for a concurrency slot, then
//! hands a worker task the slot. Workers render a fresh payload, send it, and
//! fold the outcome into the shared aggregator.
//!
//! Cancellation stops new originations at once; requests already in flight
//! are allowed to finish and are counted.

use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::rate::RateLimiter;
use crate::request_log::{LogEntry, RequestLogSink, RequestLogger};
use load_common::{LoadResult, LoadTestSpec, OutboundRequest, Transport, TransportResponse};
use placeholder::{CompiledVars, Template, VarValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a request did not succeed, beyond its status code.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    /// The payload could not be built; nothing was sent.
    Payload(String),
    /// No HTTP response arrived.
    Transport(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Payload(e) => write!(f, "payload error: {}", e),
            RequestError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// Result of a single request, as recorded by the aggregator.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub latency: Duration,
    pub status: Option<u16>,
    pub success: bool,
    /// Kept only when request logging is enabled.
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error: Option<RequestError>,
}

impl RequestOutcome {
    pub fn from_response(
        response: TransportResponse,
        request_body: String,
        keep_bodies: bool,
    ) -> Self {
        let success = response.is_graphql_success();
        let TransportResponse {
            status,
            body,
            elapsed,
            error,
        } = response;
        Self {
            latency: elapsed,
            status,
            success,
            request_body: keep_bodies.then_some(request_body),
            response_body: keep_bodies.then_some(body),
            error: error.map(RequestError::Transport),
        }
    }

    /// A request that failed before anything was sent.
    pub fn payload_failure(error: String) -> Self {
        Self {
            latency: Duration::ZERO,
            status: None,
            success: false,
            request_body: None,
            response_body: None,
            error: Some(RequestError::Payload(error)),
        }
    }

    /// Whether the request reached the transport.
    pub fn was_sent(&self) -> bool {
        !matches!(self.error, Some(RequestError::Payload(_)))
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self.error, Some(RequestError::Transport(_)))
    }
}

/// Shared handles for one run: its cancellation signal and its metrics.
///
/// Cloned into the signal handler, the progress display, and every worker.
#[derive(Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    aggregator: Arc<MetricsAggregator>,
}

impl RunContext {
    pub fn new(aggregator: MetricsAggregator) -> Self {
        Self {
            cancel: CancellationToken::new(),
            aggregator: Arc::new(aggregator),
        }
    }

    /// Stop originating requests. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn aggregator(&self) -> &Arc<MetricsAggregator> {
        &self.aggregator
    }
}

#[derive(Serialize)]
struct GraphQlBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<VarValue>,
}

/// Per-run request shape with every template pre-parsed.
struct RequestTemplate {
    url: String,
    query: String,
    auth_header: String,
    auth_value: Template,
    headers: Vec<(String, Template)>,
    variables: Option<CompiledVars>,
    seed: Option<u64>,
}

impl RequestTemplate {
    fn compile(spec: &LoadTestSpec) -> Self {
        Self {
            url: spec.url.clone(),
            query: spec.query.clone(),
            auth_header: spec.auth.header.clone(),
            auth_value: Template::parse(&spec.auth.value),
            headers: spec
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), Template::parse(value)))
                .collect(),
            variables: spec.variables.as_ref().map(CompiledVars::compile),
            seed: spec.seed,
        }
    }

    /// Render the request for budget slot `index`.
    fn build(&self, index: u64) -> Result<OutboundRequest, String> {
        match self.seed {
            Some(seed) => self.render(&mut StdRng::seed_from_u64(seed ^ index)),
            None => self.render(&mut rand::thread_rng()),
        }
    }

    fn render<R: Rng>(&self, rng: &mut R) -> Result<OutboundRequest, String> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(&self.auth_header))
            .map(|(name, value)| (name.clone(), value.render_string(rng)))
            .collect();
        let auth = self.auth_value.render_string(rng);
        if !auth.is_empty() {
            headers.push((self.auth_header.clone(), auth));
        }

        let variables = self.variables.as_ref().map(|v| v.render(rng));
        if let Some(vars) = &variables {
            check_finite(vars)?;
        }
        let body = serde_json::to_string(&GraphQlBody {
            query: &self.query,
            variables,
        })
        .map_err(|e| e.to_string())?;

        Ok(OutboundRequest {
            url: self.url.clone(),
            headers,
            body,
        })
    }
}

/// JSON has no encoding for NaN or infinity.
fn check_finite(value: &VarValue) -> Result<(), String> {
    match value {
        VarValue::Float(f) if !f.is_finite() => {
            Err(format!("variable value {} cannot be encoded as JSON", f))
        }
        VarValue::List(items) => items.iter().try_for_each(check_finite),
        VarValue::Map(entries) => entries.values().try_for_each(check_finite),
        _ => Ok(()),
    }
}

/// Executes one load test run.
pub struct LoadRunner {
    spec: LoadTestSpec,
    transport: Arc<dyn Transport>,
    context: RunContext,
    concurrency: u32,
    budget: u64,
    log_sink: Option<RequestLogSink>,
}

impl LoadRunner {
    /// Validate `spec` and fix the run's concurrency and request budget.
    pub fn new(spec: LoadTestSpec, transport: Arc<dyn Transport>) -> LoadResult<Self> {
        spec.validate()?;
        let concurrency = spec.effective_concurrency();
        let budget = spec.request_budget();
        Ok(Self {
            context: RunContext::new(MetricsAggregator::for_budget(budget)),
            spec,
            transport,
            concurrency,
            budget,
            log_sink: None,
        })
    }

    /// Write every request and response to `sink`.
    pub fn with_log_sink(mut self, sink: RequestLogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn context(&self) -> RunContext {
        self.context.clone()
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// Most requests this run will originate.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Run until the budget is exhausted, the duration elapses, or the run is
    /// cancelled, then wait for in-flight requests and summarize.
    pub async fn run(self) -> MetricsSnapshot {
        let LoadRunner {
            spec,
            transport,
            context,
            concurrency,
            budget,
            mut log_sink,
        } = self;

        let template = Arc::new(RequestTemplate::compile(&spec));
        let limiter = spec.target_rps.map(RateLimiter::new);
        let semaphore = Arc::new(Semaphore::new(concurrency as usize));
        let cancel = context.cancellation_token();
        let logger = log_sink.as_mut().map(|sink| {
            sink.start();
            sink.logger()
        });

        info!(
            name = %spec.name,
            url = %spec.url,
            concurrency,
            budget,
            rps = ?spec.target_rps,
            duration = ?spec.duration,
            "Starting load test"
        );

        let start = Instant::now();
        let deadline = spec.duration.map(|d| start + d);
        let mut workers = JoinSet::new();
        let mut originated = 0u64;

        for index in 0..budget {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(limiter) = &limiter {
                if limiter.acquire(&cancel).await.is_err() {
                    break;
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(originated, "Run duration reached");
                break;
            }

            // A slot freed after the deadline must not start another request.
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = wait_for_deadline(deadline) => {
                    debug!(originated, "Run duration reached while waiting for a slot");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            while let Some(joined) = workers.try_join_next() {
                reap(joined, &context);
            }

            workers.spawn(execute_request(
                index,
                permit,
                template.clone(),
                transport.clone(),
                context.clone(),
                logger.clone(),
            ));
            originated += 1;
        }

        if cancel.is_cancelled() {
            info!(originated, in_flight = workers.len(), "Run cancelled, draining in-flight requests");
        }
        while let Some(joined) = workers.join_next().await {
            reap(joined, &context);
        }
        let elapsed = start.elapsed();

        drop(logger);
        if let Some(sink) = log_sink {
            if let Err(e) = sink.stop().await {
                warn!(error = %e, "Failed to close request log");
            }
        }

        let snapshot = context.aggregator().snapshot(elapsed);
        info!(
            total = snapshot.total,
            success = snapshot.success,
            failed = snapshot.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Load test complete"
        );
        snapshot
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A worker that panicked never recorded its outcome; count it as failed.
fn reap(joined: Result<(), JoinError>, context: &RunContext) {
    if let Err(e) = joined {
        warn!(error = %e, "Request task failed");
        if e.is_panic() {
            context
                .aggregator()
                .record(&RequestOutcome::payload_failure(format!("request task failed: {}", e)));
        }
    }
}

async fn execute_request(
    index: u64,
    permit: OwnedSemaphorePermit,
    template: Arc<RequestTemplate>,
    transport: Arc<dyn Transport>,
    context: RunContext,
    logger: Option<RequestLogger>,
) {
    // Cancelled between origination and start: never sent, never counted.
    if context.is_cancelled() {
        return;
    }

    let request = match template.build(index) {
        Ok(request) => request,
        Err(e) => {
            debug!(index, error = %e, "Failed to build request payload");
            drop(permit);
            context
                .aggregator()
                .record(&RequestOutcome::payload_failure(e));
            return;
        }
    };

    let request_body = request.body.clone();
    let response = transport.send(request).await;
    drop(permit);

    let outcome = RequestOutcome::from_response(response, request_body, logger.is_some());
    if let Some(error) = &outcome.error {
        debug!(index, error = %error, "Request failed");
    } else if !outcome.success {
        debug!(index, status = ?outcome.status, "Request unsuccessful");
    }
    context.aggregator().record(&outcome);

    if let Some(logger) = logger {
        let response = match (&outcome.error, outcome.response_body) {
            (Some(error), _) => error.to_string(),
            (None, body) => body.unwrap_or_default(),
        };
        logger.log(LogEntry::now(
            outcome.status,
            outcome.request_body.unwrap_or_default(),
            response,
        ));
    }
}
