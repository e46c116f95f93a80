//! Thread-safe collection of every observation made during a load run.
//!
//! A single [`SampleStore`] is created by the runner for each run and shared with
//! all virtual workers through an [`Arc`](std::sync::Arc). Series are created
//! lazily the first time a name is recorded, and are never evicted: memory is
//! bounded by workers x iterations x metrics.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::metrics::{MetricSeries, Observation};
use crate::GanderError;

/// Append-only store of named [`MetricSeries`].
#[derive(Debug, Default)]
pub struct SampleStore {
    series: Mutex<BTreeMap<String, MetricSeries>>,
}
impl SampleStore {
    pub fn new() -> Self {
        SampleStore::default()
    }

    // An append is never left half done, recover a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, MetricSeries>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one observation to the named series, creating it if needed.
    ///
    /// Fails if the series already exists with a different kind, or if the value is one
    /// the series can't hold (see [`MetricSeries::push`]).
    pub fn record(&self, metric_name: &str, value: Observation) -> Result<(), GanderError> {
        let mut series = self.lock();
        match series.get_mut(metric_name) {
            Some(existing) => existing.push(value),
            None => {
                let mut created = MetricSeries::new(metric_name, value.kind());
                created.push(value)?;
                series.insert(metric_name.to_string(), created);
                Ok(())
            }
        }
    }

    /// Record a numeric sample into a trend series.
    pub fn add_trend(&self, metric_name: &str, value: f64) -> Result<(), GanderError> {
        self.record(metric_name, Observation::Trend(value))
    }

    /// Record a boolean sample into a rate series.
    pub fn add_rate(&self, metric_name: &str, value: bool) -> Result<(), GanderError> {
        self.record(metric_name, Observation::Rate(value))
    }

    /// Increment a counter series.
    pub fn add_counter(&self, metric_name: &str, value: f64) -> Result<(), GanderError> {
        self.record(metric_name, Observation::Counter(value))
    }

    /// A complete copy of one series, or `None` if nothing was recorded under the name.
    pub fn snapshot(&self, metric_name: &str) -> Option<MetricSeries> {
        self.lock().get(metric_name).cloned()
    }

    /// Copies of every recorded series, ordered by name.
    pub fn snapshot_all(&self) -> Vec<MetricSeries> {
        self.lock().values().cloned().collect()
    }

    /// Names of every recorded series, ordered.
    pub fn metric_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}
