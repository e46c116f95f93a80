//! Metrics collected and aggregated during a load run.
//!
//! Every request made by a virtual worker produces [`Observation`]s that are
//! appended to a named [`MetricSeries`] in the [`SampleStore`](../store/struct.SampleStore.html).
//! Once all workers have terminated, each series is reduced to an
//! [`AggregateResult`] by the [`MetricAggregator`], and the results are collected
//! into a [`RunResult`].
//!
//! Three kinds of series exist:
//!  - [`MetricKind::Trend`]: numeric samples, summarized as count, min, max, mean,
//!    median and an arbitrary set of percentiles.
//!  - [`MetricKind::Rate`]: boolean samples, summarized as the fraction of `true`.
//!  - [`MetricKind::Counter`]: numeric increments, summarized as their total.

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, time::Duration};

use crate::threshold::ThresholdOutcome;
use crate::util::{self, format_float, format_number, per_second_calculations};
use crate::worker::{WorkerState, WorkerSummary};
use crate::GanderError;

/// Duration of each request in milliseconds. Requests that got no response are
/// recorded as 0.0, so they lower the minimum and percentiles of a failing run.
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// Total number of requests made.
pub const HTTP_REQS: &str = "http_reqs";
/// Whether each request returned a 2xx in less than the success threshold.
pub const SUCCESS_RATE: &str = "success_rate";
/// Number of requests that were not a success.
pub const ERRORS: &str = "errors";
/// Number of completed worker iterations.
pub const ITERATIONS: &str = "iterations";

/// Percentiles computed for every trend unless configured otherwise.
pub const DEFAULT_PERCENTILES: [f64; 3] = [90.0, 95.0, 99.0];

/// Success rate under which the report flags a run.
pub const SUCCESS_RATE_CUE: f64 = 0.95;

/// The kind of data held by a [`MetricSeries`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Numeric samples, typically durations in milliseconds.
    Trend,
    /// Boolean samples.
    Rate,
    /// Monotonic sum of non-negative increments.
    Counter,
}

/// A single measurement recorded into a named series.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Observation {
    Trend(f64),
    Rate(bool),
    Counter(f64),
}
impl Observation {
    /// The kind of series this observation belongs in.
    pub fn kind(&self) -> MetricKind {
        match self {
            Observation::Trend(_) => MetricKind::Trend,
            Observation::Rate(_) => MetricKind::Rate,
            Observation::Counter(_) => MetricKind::Counter,
        }
    }
}

/// Samples of one kind, stored in insertion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Samples {
    Trend(Vec<f64>),
    Rate(Vec<bool>),
    Counter(Vec<f64>),
}

/// A named, ordered collection of observations of a single [`MetricKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub samples: Samples,
}
impl MetricSeries {
    /// Create an empty series of the given kind.
    pub fn new(name: &str, kind: MetricKind) -> Self {
        let samples = match kind {
            MetricKind::Trend => Samples::Trend(Vec::new()),
            MetricKind::Rate => Samples::Rate(Vec::new()),
            MetricKind::Counter => Samples::Counter(Vec::new()),
        };
        MetricSeries {
            name: name.to_string(),
            samples,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self.samples {
            Samples::Trend(_) => MetricKind::Trend,
            Samples::Rate(_) => MetricKind::Rate,
            Samples::Counter(_) => MetricKind::Counter,
        }
    }

    /// Number of observations recorded.
    pub fn len(&self) -> usize {
        match &self.samples {
            Samples::Trend(v) | Samples::Counter(v) => v.len(),
            Samples::Rate(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an observation, rejecting one of a different kind.
    ///
    /// Trend samples must be finite. Counter increments must be finite and non-negative,
    /// so a counter total never decreases.
    pub fn push(&mut self, observation: Observation) -> Result<(), GanderError> {
        let expected = self.kind();
        let invalid = |value: f64, detail: &str| GanderError::InvalidObservation {
            metric: self.name.clone(),
            value,
            detail: detail.to_string(),
        };
        match observation {
            Observation::Trend(value) if !value.is_finite() => {
                return Err(invalid(value, "trend samples must be finite"))
            }
            Observation::Counter(value) if !value.is_finite() || value < 0.0 => {
                return Err(invalid(
                    value,
                    "counter increments must be finite and non-negative",
                ))
            }
            _ => (),
        }
        match (&mut self.samples, observation) {
            (Samples::Trend(v), Observation::Trend(value))
            | (Samples::Counter(v), Observation::Counter(value)) => v.push(value),
            (Samples::Rate(v), Observation::Rate(value)) => v.push(value),
            (_, observation) => {
                return Err(GanderError::MetricKindMismatch {
                    metric: self.name.clone(),
                    expected,
                    received: observation.kind(),
                })
            }
        }
        Ok(())
    }
}

/// Summary statistics computed once from a [`MetricSeries`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AggregateResult {
    Trend {
        count: usize,
        min: f64,
        max: f64,
        mean: f64,
        median: f64,
        /// Keyed by label, for example `p(95)`.
        percentiles: BTreeMap<String, f64>,
    },
    Rate {
        /// Fraction of `true` observations, in `[0, 1]`.
        rate: f64,
        passes: usize,
        fails: usize,
    },
    Counter {
        total: f64,
        /// Number of increments recorded.
        count: usize,
    },
}
impl AggregateResult {
    pub fn kind(&self) -> MetricKind {
        match self {
            AggregateResult::Trend { .. } => MetricKind::Trend,
            AggregateResult::Rate { .. } => MetricKind::Rate,
            AggregateResult::Counter { .. } => MetricKind::Counter,
        }
    }

    /// Look up a computed percentile, `p(50)` resolving to the median.
    pub fn percentile(&self, k: f64) -> Option<f64> {
        match self {
            AggregateResult::Trend {
                median,
                percentiles,
                ..
            } => percentiles
                .get(&percentile_label(k))
                .copied()
                .or(if k == 50.0 { Some(*median) } else { None }),
            _ => None,
        }
    }
}

/// Label used to key percentiles: `p(90)`, `p(99.9)`.
pub fn percentile_label(k: f64) -> String {
    format!("p({})", k)
}

/// Nearest-rank percentile of an already sorted slice.
///
/// The index is `ceil(k / 100 * n) - 1`, clamped to the slice. A rank within
/// floating point error of a whole number is treated as that whole number, so
/// `p(90)` of ten values is the ninth value and not the tenth.
pub fn percentile(sorted: &[f64], k: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = k.clamp(0.0, 100.0) / 100.0 * n as f64;
    let rounded = rank.round();
    let rank = if (rank - rounded).abs() < 1e-9 {
        rounded
    } else {
        rank.ceil()
    };
    let index = (rank as usize).saturating_sub(1).min(n - 1);
    Some(sorted[index])
}

/// Reduces a [`MetricSeries`] to an [`AggregateResult`].
#[derive(Clone, Debug, PartialEq)]
pub struct MetricAggregator {
    /// Percentiles computed for every trend, in addition to the median.
    pub percentiles: Vec<f64>,
}
impl Default for MetricAggregator {
    fn default() -> Self {
        MetricAggregator {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}
impl MetricAggregator {
    /// Build an aggregator computing the default percentiles plus any extra.
    pub fn with_percentiles(extra: &[f64]) -> Self {
        let mut percentiles = DEFAULT_PERCENTILES.to_vec();
        for k in extra {
            if !percentiles.contains(k) {
                percentiles.push(*k);
            }
        }
        percentiles.sort_by(f64::total_cmp);
        MetricAggregator { percentiles }
    }

    /// Summarize one series.
    ///
    /// Results depend only on the multiset of observations, never on the order in
    /// which they were recorded. Empty trend and rate series can't be summarized and
    /// return [`GanderError::EmptySeries`]; an empty counter totals zero.
    pub fn aggregate(&self, series: &MetricSeries) -> Result<AggregateResult, GanderError> {
        match &series.samples {
            Samples::Trend(values) => {
                if values.is_empty() {
                    return Err(GanderError::EmptySeries {
                        metric: series.name.clone(),
                    });
                }
                let mut sorted = values.clone();
                sorted.sort_by(f64::total_cmp);
                let count = sorted.len();
                let min = sorted[0];
                let max = sorted[count - 1];
                // Summing in sorted order keeps the mean independent of arrival order.
                let sum: f64 = sorted.iter().sum();
                // Bounded with max/min rather than clamp, which panics on a NaN bound.
                let mean = (sum / count as f64).max(min).min(max);
                let median = percentile(&sorted, 50.0).unwrap_or(min);
                let percentiles = self
                    .percentiles
                    .iter()
                    .filter_map(|k| percentile(&sorted, *k).map(|v| (percentile_label(*k), v)))
                    .collect();
                Ok(AggregateResult::Trend {
                    count,
                    min,
                    max,
                    mean,
                    median,
                    percentiles,
                })
            }
            Samples::Rate(values) => {
                if values.is_empty() {
                    return Err(GanderError::EmptySeries {
                        metric: series.name.clone(),
                    });
                }
                let passes = values.iter().filter(|v| **v).count();
                let fails = values.len() - passes;
                Ok(AggregateResult::Rate {
                    rate: passes as f64 / values.len() as f64,
                    passes,
                    fails,
                })
            }
            Samples::Counter(values) => {
                let mut sorted = values.clone();
                sorted.sort_by(f64::total_cmp);
                Ok(AggregateResult::Counter {
                    total: sorted.iter().sum(),
                    count: sorted.len(),
                })
            }
        }
    }
}

/// Everything known about a completed load run.
///
/// Returned by [`GanderAttack::execute`](../struct.GanderAttack.html#method.execute)
/// and [`runner::run`](../runner/fn.run.html), serialized as the summary artifact, and
/// displayed as the console summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// When the workers were released.
    pub started: DateTime<Utc>,
    /// Wall clock time from release until the last worker terminated.
    pub duration: Duration,
    pub virtual_workers: usize,
    pub iterations_per_worker: usize,
    pub endpoints: Vec<String>,
    /// Seed endpoint selection was derived from, for replaying a run.
    pub seed: u64,
    /// Most workers observed running at the same time.
    pub max_concurrent_workers: usize,
    /// Whether `max_duration` elapsed before every worker completed.
    pub aborted: bool,
    pub workers: Vec<WorkerSummary>,
    pub metrics: BTreeMap<String, AggregateResult>,
    /// Metrics that couldn't be aggregated, with the reason.
    pub metric_errors: BTreeMap<String, String>,
    pub thresholds: Vec<ThresholdOutcome>,
    /// False if any threshold failed.
    pub passed: bool,
}
impl RunResult {
    /// Total requests made, zero if none were recorded.
    pub fn total_requests(&self) -> usize {
        match self.metrics.get(HTTP_REQS) {
            Some(AggregateResult::Counter { total, .. }) => *total as usize,
            _ => 0,
        }
    }

    /// Total failed requests, zero if none were recorded.
    pub fn error_count(&self) -> usize {
        match self.metrics.get(ERRORS) {
            Some(AggregateResult::Counter { total, .. }) => *total as usize,
            _ => 0,
        }
    }

    /// Fraction of successful requests, if any request was made.
    pub fn success_rate(&self) -> Option<f64> {
        match self.metrics.get(SUCCESS_RATE) {
            Some(AggregateResult::Rate { rate, .. }) => Some(*rate),
            _ => None,
        }
    }

    /// Requests per second over the run duration.
    pub fn throughput(&self) -> f64 {
        per_second_calculations(self.duration, self.total_requests(), self.error_count()).0
    }

    /// Latency summary of every request.
    pub fn latency(&self) -> Option<&AggregateResult> {
        self.metrics.get(HTTP_REQ_DURATION)
    }

    /// Iterations completed across every worker.
    pub fn completed_iterations(&self) -> usize {
        self.workers.iter().map(|w| w.completed_iterations).sum()
    }

    fn fmt_overview(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            fmt,
            "\n === OVERVIEW ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " Started:     {}",
            self.started.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(
            fmt,
            " Duration:    {:.3}s{}",
            self.duration.as_secs_f64(),
            if self.aborted {
                " (stopped by max duration)"
            } else {
                ""
            }
        )?;
        writeln!(
            fmt,
            " Workers:     {} configured, {} max concurrent",
            format_number(self.virtual_workers),
            format_number(self.max_concurrent_workers)
        )?;
        writeln!(
            fmt,
            " Iterations:  {} of {} completed",
            format_number(self.completed_iterations()),
            format_number(self.virtual_workers * self.iterations_per_worker)
        )?;
        let aborted = self
            .workers
            .iter()
            .filter(|w| w.state == WorkerState::Aborted)
            .count();
        if aborted > 0 {
            writeln!(fmt, " Aborted:     {} workers", format_number(aborted))?;
        }
        writeln!(fmt, " Seed:        {}", self.seed)
    }

    fn fmt_requests(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let total = self.total_requests();
        if total == 0 {
            return Ok(());
        }
        let fails = self.error_count();
        let (reqs, fails_per_second) = per_second_calculations(self.duration, total, fails);
        writeln!(
            fmt,
            "\n === PER REQUEST METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "Name", "# reqs", "# fails", "req/s", "fail/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let fail_percent = fails as f64 / total as f64 * 100.0;
        // Compress 100.0 and 0.0 to 100 and 0 respectively to save width.
        let fails_column = if fail_percent as usize == 100 || fail_percent as usize == 0 {
            format!("{} ({}%)", format_number(fails), fail_percent as usize)
        } else {
            format!("{} ({:.1}%)", format_number(fails), fail_percent)
        };
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "GET (all endpoints)",
            format_number(total),
            fails_column,
            format_float(reqs),
            format_float(fails_per_second),
        )?;
        if let Some(rate) = self.success_rate() {
            writeln!(
                fmt,
                " {:<24} | {:>13}",
                "Success rate",
                format!("{:.2}%", rate * 100.0)
            )?;
        }
        Ok(())
    }

    fn fmt_latency(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let (min, max, mean, median, percentiles) = match self.latency() {
            Some(AggregateResult::Trend {
                min,
                max,
                mean,
                median,
                percentiles,
                ..
            }) => (min, max, mean, median, percentiles),
            _ => return Ok(()),
        };
        writeln!(
            fmt,
            "\n === RESPONSE TIME METRICS (ms) ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:>11} | {:>11} | {:>11} | {:>11}",
            "Min", "Median", "Average", "Max"
        )?;
        writeln!(
            fmt,
            " {:>11} | {:>11} | {:>11} | {:>11}",
            format_float(*min),
            format_float(*median),
            format_float(*mean),
            format_float(*max),
        )?;
        if !percentiles.is_empty() {
            // Sort numerically so p(99.9) follows p(99).
            let ordered: Vec<(&String, &f64)> = percentiles
                .iter()
                .sorted_by(|a, b| percentile_key(a.0).total_cmp(&percentile_key(b.0)))
                .collect();
            writeln!(
                fmt,
                " {}",
                ordered
                    .iter()
                    .map(|(label, _)| format!("{:>11}", label))
                    .join(" | ")
            )?;
            writeln!(
                fmt,
                " {}",
                ordered
                    .iter()
                    .map(|(_, value)| format!("{:>11}", format_float(**value)))
                    .join(" | ")
            )?;
        }
        Ok(())
    }

    fn fmt_metrics(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            fmt,
            "\n === ALL METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        for (name, result) in &self.metrics {
            let summary = match result {
                AggregateResult::Trend {
                    count, mean, max, ..
                } => format!(
                    "count={} avg={} max={}",
                    format_number(*count),
                    format_float(*mean),
                    format_float(*max)
                ),
                AggregateResult::Rate {
                    rate,
                    passes,
                    fails,
                } => format!(
                    "{:.2}% ({} passes, {} fails)",
                    rate * 100.0,
                    format_number(*passes),
                    format_number(*fails)
                ),
                AggregateResult::Counter { total, .. } => format_float(*total),
            };
            writeln!(
                fmt,
                " {:<24} | {:<8} | {}",
                util::truncate_string(name, 24),
                result.kind(),
                summary
            )?;
        }
        for (name, error) in &self.metric_errors {
            writeln!(
                fmt,
                " {:<24} | {:<8} | {}",
                util::truncate_string(name, 24),
                "error",
                error
            )?;
        }
        Ok(())
    }

    fn fmt_thresholds(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.thresholds.is_empty() {
            return Ok(());
        }
        writeln!(
            fmt,
            "\n === THRESHOLDS ===\n ------------------------------------------------------------------------------"
        )?;
        for outcome in &self.thresholds {
            if outcome.passed {
                writeln!(fmt, " PASS | {}", outcome.source)?;
            } else {
                writeln!(fmt, " FAIL | {} ({})", outcome.source, outcome.reason)?;
            }
        }
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------\n {}",
            if self.passed {
                "All thresholds passed."
            } else {
                "One or more thresholds failed."
            }
        )
    }
}

/// Extract the numeric percentile from a `p(N)` label for ordering.
fn percentile_key(label: &str) -> f64 {
    label
        .trim_start_matches("p(")
        .trim_end_matches(')')
        .parse::<f64>()
        .unwrap_or(f64::MAX)
}

impl fmt::Display for RunResult {
    // Implement display of the run summary with `{}` marker.
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_overview(fmt)?;
        self.fmt_requests(fmt)?;
        self.fmt_latency(fmt)?;
        self.fmt_metrics(fmt)?;
        self.fmt_thresholds(fmt)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn trend(name: &str, values: &[f64]) -> MetricSeries {
        MetricSeries {
            name: name.to_string(),
            samples: Samples::Trend(values.to_vec()),
        }
    }

    fn trend_fields(result: AggregateResult) -> (usize, f64, f64, f64, f64, BTreeMap<String, f64>) {
        match result {
            AggregateResult::Trend {
                count,
                min,
                max,
                mean,
                median,
                percentiles,
            } => (count, min, max, mean, median, percentiles),
            other => panic!("expected trend, got {:?}", other),
        }
    }

    #[test]
    fn nearest_rank() {
        let sorted: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(percentile(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile(&sorted, 10.0), Some(1.0));
        assert_eq!(percentile(&sorted, 11.0), Some(2.0));
        assert_eq!(percentile(&sorted, 50.0), Some(5.0));
        assert_eq!(percentile(&sorted, 90.0), Some(9.0));
        assert_eq!(percentile(&sorted, 95.0), Some(10.0));
        assert_eq!(percentile(&sorted, 100.0), Some(10.0));
        assert_eq!(percentile(&[42.0], 99.0), Some(42.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn trend_summary() {
        let aggregator = MetricAggregator::default();
        let (count, min, max, mean, median, percentiles) = trend_fields(
            aggregator
                .aggregate(&trend("latency", &[30.0, 10.0, 20.0, 40.0]))
                .unwrap(),
        );
        assert_eq!(count, 4);
        assert_eq!(min, 10.0);
        assert_eq!(max, 40.0);
        assert_eq!(mean, 25.0);
        assert_eq!(median, 20.0);
        assert_eq!(percentiles.get("p(90)"), Some(&40.0));
        assert_eq!(percentiles.get("p(95)"), Some(&40.0));
        assert_eq!(percentiles.get("p(99)"), Some(&40.0));
    }

    #[test]
    fn trend_ordering_holds() {
        let aggregator = MetricAggregator::with_percentiles(&[50.0, 75.0, 99.9]);
        let mut rng = StdRng::seed_from_u64(7);
        for size in [1usize, 2, 3, 10, 101, 1000] {
            let values: Vec<f64> = (0..size)
                .map(|_| rand::Rng::random_range(&mut rng, 0.0..500.0))
                .collect();
            let result = aggregator.aggregate(&trend("latency", &values)).unwrap();
            let (_, min, max, mean, median, _) = trend_fields(result.clone());
            assert!(min <= median && median <= max);
            assert!(min <= mean && mean <= max);
            let mut previous = min;
            for k in &aggregator.percentiles {
                let value = result.percentile(*k).unwrap();
                assert!(previous <= value, "p({}) decreased", k);
                previous = value;
            }
            assert!(previous <= max);
        }
    }

    #[test]
    fn mean_of_identical_values() {
        let aggregator = MetricAggregator::default();
        let (_, min, max, mean, _, _) =
            trend_fields(aggregator.aggregate(&trend("t", &[0.1, 0.1, 0.1])).unwrap());
        assert_eq!(min, 0.1);
        assert_eq!(max, 0.1);
        assert_eq!(mean, 0.1);
    }

    #[test]
    fn shuffled_input_is_deterministic() {
        let aggregator = MetricAggregator::default();
        let values: Vec<f64> = (0..257).map(|v| (v as f64 * 1.37) % 97.1).collect();
        let expected = aggregator.aggregate(&trend("t", &values)).unwrap();
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..10 {
            let mut shuffled = values.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(aggregator.aggregate(&trend("t", &shuffled)).unwrap(), expected);
        }
    }

    #[test]
    fn rate_summary() {
        let aggregator = MetricAggregator::default();
        let series = MetricSeries {
            name: SUCCESS_RATE.to_string(),
            samples: Samples::Rate(vec![true, false, true, true]),
        };
        assert_eq!(
            aggregator.aggregate(&series).unwrap(),
            AggregateResult::Rate {
                rate: 0.75,
                passes: 3,
                fails: 1
            }
        );
        for samples in [vec![true; 5], vec![false; 5]] {
            let series = MetricSeries {
                name: SUCCESS_RATE.to_string(),
                samples: Samples::Rate(samples),
            };
            if let AggregateResult::Rate { rate, .. } = aggregator.aggregate(&series).unwrap() {
                assert!((0.0..=1.0).contains(&rate));
            }
        }
    }

    #[test]
    fn empty_series() {
        let aggregator = MetricAggregator::default();
        assert!(matches!(
            aggregator.aggregate(&MetricSeries::new("t", MetricKind::Trend)),
            Err(GanderError::EmptySeries { .. })
        ));
        assert!(matches!(
            aggregator.aggregate(&MetricSeries::new("r", MetricKind::Rate)),
            Err(GanderError::EmptySeries { .. })
        ));
        assert_eq!(
            aggregator
                .aggregate(&MetricSeries::new("c", MetricKind::Counter))
                .unwrap(),
            AggregateResult::Counter {
                total: 0.0,
                count: 0
            }
        );
    }

    #[test]
    fn counter_sums_increments() {
        let mut series = MetricSeries::new(HTTP_REQS, MetricKind::Counter);
        series.push(Observation::Counter(1.0)).unwrap();
        series.push(Observation::Counter(4.0)).unwrap();
        series.push(Observation::Counter(0.0)).unwrap();
        assert_eq!(
            MetricAggregator::default().aggregate(&series).unwrap(),
            AggregateResult::Counter {
                total: 5.0,
                count: 3
            }
        );
    }

    #[test]
    fn push_rejects_other_kinds() {
        let mut series = MetricSeries::new(HTTP_REQ_DURATION, MetricKind::Trend);
        series.push(Observation::Trend(1.0)).unwrap();
        assert!(matches!(
            series.push(Observation::Rate(true)),
            Err(GanderError::MetricKindMismatch {
                expected: MetricKind::Trend,
                received: MetricKind::Rate,
                ..
            })
        ));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn push_rejects_invalid_values() {
        let mut series = MetricSeries::new(HTTP_REQ_DURATION, MetricKind::Trend);
        series.push(Observation::Trend(1.0)).unwrap();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                series.push(Observation::Trend(value)),
                Err(GanderError::InvalidObservation { .. })
            ));
        }
        assert_eq!(series.len(), 1);

        let mut series = MetricSeries::new(HTTP_REQS, MetricKind::Counter);
        series.push(Observation::Counter(5.0)).unwrap();
        for value in [-7.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                series.push(Observation::Counter(value)),
                Err(GanderError::InvalidObservation { .. })
            ));
        }
        assert_eq!(
            MetricAggregator::default().aggregate(&series).unwrap(),
            AggregateResult::Counter {
                total: 5.0,
                count: 1
            }
        );
    }

    #[test]
    fn nan_in_trend_does_not_panic() {
        // Samples are public, so a series can hold values push would reject.
        let aggregator = MetricAggregator::default();
        for values in [[1.0, f64::NAN], [f64::NAN, 1.0], [-f64::NAN, 1.0]] {
            let (count, ..) = trend_fields(aggregator.aggregate(&trend("t", &values)).unwrap());
            assert_eq!(count, 2);
        }
    }

    #[test]
    fn percentile_lookup() {
        let aggregator = MetricAggregator::with_percentiles(&[99.9]);
        assert_eq!(aggregator.percentiles, vec![90.0, 95.0, 99.0, 99.9]);
        let result = aggregator
            .aggregate(&trend("t", &[1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(result.percentile(50.0), Some(2.0));
        assert_eq!(result.percentile(99.9), Some(3.0));
        assert_eq!(result.percentile(75.0), None);
        assert_eq!(percentile_label(99.9), "p(99.9)");
        assert_eq!(percentile_label(95.0), "p(95)");
    }
}
