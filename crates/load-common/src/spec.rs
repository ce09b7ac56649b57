//! The immutable description of one load test run.

use crate::error::{LoadError, LoadResult};
use placeholder::VarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Concurrency used when neither a limit nor a target rate is configured.
pub const DEFAULT_CONCURRENCY: u32 = 10;

/// Assumed p95 latency when deriving concurrency from a target rate.
///
/// Deliberately conservative; there is no warm-up probe, so the derived value
/// is a best-effort guess.
pub const ESTIMATED_P95: Duration = Duration::from_millis(300);

/// Header name and value template used to authenticate each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTemplate {
    pub header: String,
    pub value: String,
}

impl Default for AuthTemplate {
    fn default() -> Self {
        Self {
            header: "Authorization".to_string(),
            value: String::new(),
        }
    }
}

/// Everything the dispatcher needs for one run.
#[derive(Debug, Clone)]
pub struct LoadTestSpec {
    pub name: String,
    pub url: String,
    /// GraphQL document sent as `query`.
    pub query: String,
    pub auth: AuthTemplate,
    /// Extra header templates, rendered per request.
    pub headers: BTreeMap<String, String>,
    /// In-flight ceiling; 0 derives it from `target_rps`.
    pub concurrency: u32,
    pub total_requests: Option<u64>,
    pub target_rps: Option<u32>,
    /// Origination deadline; with `target_rps` also sizes the request budget.
    pub duration: Option<Duration>,
    pub variables: Option<VarValue>,
    /// Request/response CSV log destination; `None` disables logging.
    pub log_file: Option<PathBuf>,
    /// Makes per-request payloads reproducible.
    pub seed: Option<u64>,
}

impl LoadTestSpec {
    pub fn new(url: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: "load-test".to_string(),
            url: url.into(),
            query: query.into(),
            auth: AuthTemplate::default(),
            headers: BTreeMap::new(),
            concurrency: 0,
            total_requests: None,
            target_rps: None,
            duration: None,
            variables: None,
            log_file: None,
            seed: None,
        }
    }

    /// Check the run-bound invariant and required fields.
    pub fn validate(&self) -> LoadResult<()> {
        if self.url.trim().is_empty() {
            return Err(LoadError::InvalidSpec("url must not be empty".into()));
        }
        if self.query.trim().is_empty() {
            return Err(LoadError::InvalidSpec("query must not be empty".into()));
        }
        if self.auth.header.trim().is_empty() {
            return Err(LoadError::InvalidSpec("auth header name must not be empty".into()));
        }
        if self.total_requests == Some(0) {
            return Err(LoadError::InvalidSpec("total requests must be >= 1".into()));
        }
        if self.target_rps == Some(0) {
            return Err(LoadError::InvalidSpec("target rps must be > 0 when set".into()));
        }
        if self.duration.is_some_and(|d| d.is_zero()) {
            return Err(LoadError::InvalidSpec("duration must be > 0 when set".into()));
        }
        if self.total_requests.is_none() && (self.target_rps.is_none() || self.duration.is_none())
        {
            return Err(LoadError::InvalidSpec(
                "either total requests or both target rps and duration must be set".into(),
            ));
        }
        Ok(())
    }

    /// Number of request slots the dispatcher will originate at most.
    pub fn request_budget(&self) -> u64 {
        match (self.total_requests, self.target_rps, self.duration) {
            (Some(n), _, _) => n,
            (None, Some(rps), Some(d)) => ((rps as f64) * d.as_secs_f64()).ceil().max(1.0) as u64,
            _ => 0,
        }
    }

    /// Concurrency fixed for the whole run.
    ///
    /// With no explicit limit and a target rate `R`, this is
    /// `ceil(R * ESTIMATED_P95)` floored at 1.
    pub fn effective_concurrency(&self) -> u32 {
        if self.concurrency > 0 {
            return self.concurrency;
        }
        match self.target_rps {
            Some(rps) if rps > 0 => {
                let millis = rps as u64 * ESTIMATED_P95.as_millis() as u64;
                (millis.div_ceil(1000) as u32).max(1)
            }
            _ => DEFAULT_CONCURRENCY,
        }
    }
}
