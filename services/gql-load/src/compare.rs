//! Side-by-side comparison of saved results.
//!
//! Each side is either one results file or a directory whose `*.json` results
//! are averaged metric by metric.

use crate::report::ResultsOutput;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use load_common::{LoadError, LoadResult};
use std::path::Path;
use tracing::warn;

/// Headline metrics of one side, latencies in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonData {
    pub label: String,
    pub files: usize,
    pub requests_per_second: f64,
    pub average_ms: f64,
    pub p50_ms: f64,
    pub p75_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub success_rate: f64,
}

impl ComparisonData {
    pub fn from_output(label: impl Into<String>, output: &ResultsOutput) -> Self {
        let ms = |s: &str| parse_duration_ms(s).unwrap_or(0.0);
        Self {
            label: label.into(),
            files: 1,
            requests_per_second: output.summary.requests_per_second,
            average_ms: ms(&output.latency.average),
            p50_ms: ms(&output.percentiles.p50),
            p75_ms: ms(&output.percentiles.p75),
            p95_ms: ms(&output.percentiles.p95),
            p99_ms: ms(&output.percentiles.p99),
            p999_ms: ms(&output.percentiles.p999),
            success_rate: output.summary.success_rate_percent,
        }
    }

    /// Load a results file, or average every results file in a directory.
    pub fn load(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        if !path.is_dir() {
            let output = ResultsOutput::from_file(path)?;
            return Ok(Self::from_output(name, &output));
        }

        let mut files: Vec<_> = std::fs::read_dir(path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        files.sort();

        let mut loaded = Vec::new();
        for file in &files {
            match ResultsOutput::from_file(file) {
                Ok(output) => loaded.push(Self::from_output(name.clone(), &output)),
                Err(e) => warn!(path = %file.display(), error = %e, "Skipping unreadable results file"),
            }
        }
        if loaded.is_empty() {
            return Err(LoadError::Config(format!(
                "no results files found in {}",
                path.display()
            )));
        }

        let mut average = Self::average(&loaded);
        average.label = format!("{} (avg of {})", name, loaded.len());
        Ok(average)
    }

    fn average(items: &[Self]) -> Self {
        let n = items.len() as f64;
        let mean = |f: fn(&Self) -> f64| items.iter().map(f).sum::<f64>() / n;
        Self {
            label: String::new(),
            files: items.len(),
            requests_per_second: mean(|d| d.requests_per_second),
            average_ms: mean(|d| d.average_ms),
            p50_ms: mean(|d| d.p50_ms),
            p75_ms: mean(|d| d.p75_ms),
            p95_ms: mean(|d| d.p95_ms),
            p99_ms: mean(|d| d.p99_ms),
            p999_ms: mean(|d| d.p999_ms),
            success_rate: mean(|d| d.success_rate),
        }
    }

    fn metrics(&self) -> [(&'static str, f64, usize); 8] {
        [
            ("Requests/sec", self.requests_per_second, 2),
            ("Avg Latency (ms)", self.average_ms, 1),
            ("P50 Latency (ms)", self.p50_ms, 1),
            ("P75 Latency (ms)", self.p75_ms, 1),
            ("P95 Latency (ms)", self.p95_ms, 1),
            ("P99 Latency (ms)", self.p99_ms, 1),
            ("P99.9 Latency (ms)", self.p999_ms, 1),
            ("Success Rate (%)", self.success_rate, 2),
        ]
    }
}

/// Relative change from `baseline` to `candidate` in percent; zero when the
/// baseline is zero.
pub fn percent_change(baseline: f64, candidate: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        (candidate - baseline) / baseline * 100.0
    }
}

/// Format a comparison table, `baseline` first.
pub fn format_comparison(baseline: &ComparisonData, candidate: &ComparisonData) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "Metric",
            baseline.label.as_str(),
            candidate.label.as_str(),
            "Difference",
        ]);

    for ((name, a, precision), (_, b, _)) in baseline.metrics().into_iter().zip(candidate.metrics())
    {
        table.add_row(vec![
            name.to_string(),
            format!("{:.*}", precision, a),
            format!("{:.*}", precision, b),
            format!("{:+.1}%", percent_change(a, b)),
        ]);
    }

    table.to_string()
}

/// Parse a duration such as `"12.5ms"`, `"1m2.5s"`, or `"800µs"` into
/// milliseconds. `None` for anything unparseable, including `"N/A"`.
pub fn parse_duration_ms(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let mut rest = text;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if split == 0 {
            return None;
        }
        let value: f64 = rest[..split].parse().ok()?;
        rest = &rest[split..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        total += match &rest[..unit_len] {
            "ns" => value / 1e6,
            "µs" | "μs" | "us" => value / 1e3,
            "ms" => value,
            "s" => value * 1e3,
            "m" => value * 60e3,
            "h" => value * 3600e3,
            _ => return None,
        };
        rest = &rest[unit_len..];
    }
    Some(total)
}
