//! Results reporting and persistence.

use crate::metrics::MetricsSnapshot;
use chrono::Local;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Table};
use load_common::{LoadResult, LoadTestSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shown in place of a harmonic mean that cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// The saved results artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsOutput {
    pub timestamp: String,
    pub test_config: TestConfigSummary,
    pub summary: ResultsSummary,
    pub latency: LatencyMetrics,
    pub percentiles: PercentileMetrics,
    pub status_codes: BTreeMap<u16, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfigSummary {
    pub url: String,
    pub concurrency: u32,
    pub total_requests: u64,
    pub target_rps: u32,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    #[serde(default)]
    pub transport_errors: u64,
    pub success_rate_percent: f64,
    pub requests_per_second: f64,
}

/// Latency figures as human-readable durations (`"12.5ms"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub average: String,
    pub harmonic_mean: String,
    pub minimum: String,
    pub maximum: String,
    pub range: String,
    pub standard_deviation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileMetrics {
    pub p50: String,
    pub p75: String,
    pub p95: String,
    pub p99: String,
    pub p999: String,
}

impl ResultsOutput {
    /// Build the artifact for a finished run.
    pub fn from_run(spec: &LoadTestSpec, snapshot: &MetricsSnapshot) -> Self {
        let latency = &snapshot.latency;
        let p = &snapshot.percentiles;
        Self {
            timestamp: Local::now().to_rfc3339(),
            test_config: TestConfigSummary {
                url: spec.url.clone(),
                concurrency: spec.effective_concurrency(),
                total_requests: spec.request_budget(),
                target_rps: spec.target_rps.unwrap_or(0),
                duration_seconds: spec.duration.map_or(0, |d| d.as_secs()),
            },
            summary: ResultsSummary {
                total_requests: snapshot.total,
                successful_requests: snapshot.success,
                failed_requests: snapshot.failed,
                transport_errors: snapshot.transport_errors,
                success_rate_percent: snapshot.success_rate(),
                requests_per_second: snapshot.requests_per_second,
            },
            latency: LatencyMetrics {
                average: humanize(latency.average),
                harmonic_mean: latency
                    .harmonic_mean
                    .map_or_else(|| NOT_AVAILABLE.to_string(), humanize),
                minimum: humanize(latency.min),
                maximum: humanize(latency.max),
                range: humanize(latency.range),
                standard_deviation: humanize(latency.std_dev),
            },
            percentiles: PercentileMetrics {
                p50: humanize(p.p50),
                p75: humanize(p.p75),
                p95: humanize(p.p95),
                p99: humanize(p.p99),
                p999: humanize(p.p999),
            },
            status_codes: snapshot.status_codes.clone(),
        }
    }

    pub fn format_json(&self) -> LoadResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write to `<dir>/loadtest_results_<timestamp>.json`, creating `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> LoadResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "loadtest_results_{}.json",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        std::fs::write(&path, self.format_json()?)?;
        Ok(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Duration as `"1.5s"`, `"12.25ms"`, `"800µs"`.
pub fn humanize(d: Duration) -> String {
    format!("{:?}", d)
}

/// Format a snapshot as a console table.
pub fn format_table(title: &str, snapshot: &MetricsSnapshot) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![format!("Load Test Results: {}", title)]);

    let latency = &snapshot.latency;
    let p = &snapshot.percentiles;

    table.add_row(vec!["Duration:", &format!("{:.1}s", snapshot.elapsed.as_secs_f64())]);
    table.add_row(vec!["Total Requests:", &snapshot.total.to_string()]);
    table.add_row(vec![
        "Successful:",
        &format!("{} ({:.1}%)", snapshot.success, snapshot.success_rate()),
    ]);
    table.add_row(vec!["Failed:", &snapshot.failed.to_string()]);
    if snapshot.transport_errors > 0 {
        table.add_row(vec![
            "Transport Errors:",
            &snapshot.transport_errors.to_string(),
        ]);
    }
    table.add_row(vec![
        "Requests/sec:",
        &format!("{:.1}", snapshot.requests_per_second),
    ]);

    table.add_row(vec!["", ""]);
    table.add_row(vec!["Latency", "avg / hmean / min / max / stddev"]);
    table.add_row(vec![
        "",
        &format!(
            "{} / {} / {} / {} / {}",
            humanize(latency.average),
            latency
                .harmonic_mean
                .map_or_else(|| NOT_AVAILABLE.to_string(), humanize),
            humanize(latency.min),
            humanize(latency.max),
            humanize(latency.std_dev)
        ),
    ]);
    table.add_row(vec!["Percentiles", "p50 / p75 / p95 / p99 / p99.9"]);
    table.add_row(vec![
        "",
        &format!(
            "{} / {} / {} / {} / {}",
            humanize(p.p50),
            humanize(p.p75),
            humanize(p.p95),
            humanize(p.p99),
            humanize(p.p999)
        ),
    ]);
    if snapshot.window_len < snapshot.total as usize {
        table.add_row(vec![
            "",
            &format!("(latest {} samples)", snapshot.window_len),
        ]);
    }

    if !snapshot.status_codes.is_empty() {
        table.add_row(vec!["", ""]);
        table.add_row(vec!["Status Codes", ""]);
        for (code, count) in &snapshot.status_codes {
            table.add_row(vec![Cell::new(code), Cell::new(count)]);
        }
    }

    table.to_string()
}
