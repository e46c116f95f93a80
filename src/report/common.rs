use std::fmt::{Display, Formatter};

use crate::metrics::{AggregateResult, RunResult, SUCCESS_RATE_CUE};
use crate::threshold::ThresholdOutcome;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrEmpty<T>(pub Option<T>);

impl<T: Display> Display for OrEmpty<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str(""),
        }
    }
}

/// Latency distribution of every request, in milliseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct LatencyMetric {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Everything a human readable report shows, with absent metrics resolved to zero.
pub(crate) struct ReportData<'m> {
    pub started: String,
    pub duration: f64,
    pub aborted: bool,
    pub endpoints: &'m [String],
    pub virtual_workers: usize,
    pub max_concurrency: usize,
    pub total_requests: usize,
    pub latency: LatencyMetric,
    pub throughput: f64,
    pub success_rate: f64,
    /// Whether `success_rate` meets the fixed reporting cue.
    pub success_passed: bool,
    pub errors: usize,
    pub thresholds: &'m [ThresholdOutcome],
    pub passed: bool,
}

pub(crate) fn prepare_data(result: &RunResult) -> ReportData<'_> {
    let trend = result.latency();
    let percentile = |k: f64| trend.and_then(|t| t.percentile(k)).unwrap_or(0.0);
    let latency = match trend {
        Some(AggregateResult::Trend {
            count,
            min,
            max,
            mean,
            median,
            ..
        }) => LatencyMetric {
            count: *count,
            min: *min,
            max: *max,
            mean: *mean,
            median: *median,
            p90: percentile(90.0),
            p95: percentile(95.0),
            p99: percentile(99.0),
        },
        _ => LatencyMetric::default(),
    };
    let success_rate = result.success_rate().unwrap_or(0.0);

    ReportData {
        started: result
            .started
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string(),
        duration: result.duration.as_secs_f64(),
        aborted: result.aborted,
        endpoints: &result.endpoints,
        virtual_workers: result.virtual_workers,
        max_concurrency: result.max_concurrent_workers,
        total_requests: result.total_requests(),
        latency,
        throughput: result.throughput(),
        success_rate,
        success_passed: success_rate >= SUCCESS_RATE_CUE,
        errors: result.error_count(),
        thresholds: &result.thresholds,
        passed: result.passed,
    }
}

/// Escape text for inclusion in an HTML document.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
