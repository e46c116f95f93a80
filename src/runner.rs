//! Launches the virtual workers of one run and collects what they measured.
//!
//! [`run`] validates the [`RunConfig`], spawns every worker, waits for them all to
//! finish or for `max_duration` to elapse, then aggregates every recorded series and
//! evaluates the thresholds into a [`RunResult`].

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Barrier;

use crate::client::Transport;
use crate::config::RunConfig;
use crate::logger::{start_request_logger, stop_request_logger};
use crate::metrics::{
    AggregateResult, MetricAggregator, MetricKind, MetricSeries, RunResult, ERRORS, HTTP_REQS,
    HTTP_REQ_DURATION, ITERATIONS, SUCCESS_RATE,
};
use crate::store::SampleStore;
use crate::threshold;
use crate::worker::{
    worker_seed, ConcurrencyGauge, VirtualWorker, WorkerCommand, WorkerContext, WorkerSummary,
};
use crate::GanderError;

/// Metrics every run reports, even if nothing was recorded.
const REQUIRED_METRICS: [(&str, MetricKind); 5] = [
    (HTTP_REQ_DURATION, MetricKind::Trend),
    (HTTP_REQS, MetricKind::Counter),
    (SUCCESS_RATE, MetricKind::Rate),
    (ERRORS, MetricKind::Counter),
    (ITERATIONS, MetricKind::Counter),
];

/// Execute one load run against `config.endpoints`.
///
/// Returns a [`GanderError`] only if the configuration is invalid or the run couldn't
/// be carried out. Failed requests, metrics that couldn't be aggregated and failed
/// thresholds are all reported in the [`RunResult`].
pub async fn run(config: &RunConfig, transport: Arc<dyn Transport>) -> Result<RunResult, GanderError> {
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let config = Arc::new(config.clone());
    let store = Arc::new(SampleStore::new());
    let gauge = Arc::new(ConcurrencyGauge::default());
    // Every worker plus the runner must arrive before any worker starts.
    let start = Arc::new(Barrier::new(config.virtual_workers + 1));
    let (logger_handle, logger_tx) =
        start_request_logger(&config.request_log, config.request_format).await?;

    let context = WorkerContext {
        config: Arc::clone(&config),
        transport,
        store: Arc::clone(&store),
        gauge: Arc::clone(&gauge),
        start: Arc::clone(&start),
        logger: logger_tx.clone(),
    };

    let mut senders = Vec::with_capacity(config.virtual_workers);
    let mut handles = Vec::with_capacity(config.virtual_workers);
    for index in 0..config.virtual_workers {
        let (tx, rx) = flume::unbounded();
        let worker = VirtualWorker::new(index, context.clone(), worker_seed(seed, index), rx);
        handles.push(tokio::spawn(worker.run()));
        senders.push(tx);
    }
    drop(context);
    info!(
        "launched {} workers, {} iterations each, seed {}",
        config.virtual_workers, config.iterations_per_worker, seed
    );

    start.wait().await;
    let started = Utc::now();
    let timer = Instant::now();

    let all_workers = futures::future::join_all(handles);
    tokio::pin!(all_workers);
    let mut aborted = false;
    let results = match config.max_duration {
        Some(max_duration) => {
            match tokio::time::timeout(max_duration, &mut all_workers).await {
                Ok(results) => results,
                Err(_) => {
                    info!("max_duration of {:?} elapsed, stopping workers...", max_duration);
                    aborted = true;
                    for sender in &senders {
                        // A worker that already finished has dropped its receiver.
                        let _ = sender.send(WorkerCommand::Exit);
                    }
                    all_workers.await
                }
            }
        }
        None => all_workers.await,
    };
    let duration = timer.elapsed();
    drop(senders);

    let mut workers: Vec<WorkerSummary> = Vec::with_capacity(results.len());
    for result in results {
        workers.push(result?);
    }
    stop_request_logger(logger_handle, logger_tx).await?;
    info!("all workers terminated after {:?}", duration);

    let aggregator = MetricAggregator {
        percentiles: config.required_percentiles(),
    };
    let (metrics, metric_errors) = aggregate_store(&store, &aggregator);
    let (thresholds, passed) =
        threshold::evaluate_all(&config.thresholds, &metrics, &metric_errors);

    Ok(RunResult {
        started,
        duration,
        virtual_workers: config.virtual_workers,
        iterations_per_worker: config.iterations_per_worker,
        endpoints: config.endpoints.clone(),
        seed,
        max_concurrent_workers: gauge.max(),
        aborted,
        workers,
        metrics,
        metric_errors,
        thresholds,
        passed,
    })
}

/// Aggregate the required metrics and every recorded series.
///
/// A series that can't be aggregated is reported in the second map, keyed by name,
/// without affecting the others.
pub fn aggregate_store(
    store: &SampleStore,
    aggregator: &MetricAggregator,
) -> (BTreeMap<String, AggregateResult>, BTreeMap<String, String>) {
    let mut series: BTreeMap<String, MetricSeries> = store
        .snapshot_all()
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    for (name, kind) in REQUIRED_METRICS {
        series
            .entry(name.to_string())
            .or_insert_with(|| MetricSeries::new(name, kind));
    }

    let mut metrics = BTreeMap::new();
    let mut metric_errors = BTreeMap::new();
    for (name, s) in series {
        match aggregator.aggregate(&s) {
            Ok(result) => {
                metrics.insert(name, result);
            }
            Err(e) => {
                warn!("unable to aggregate {}: {}", name, e);
                metric_errors.insert(name, e.to_string());
            }
        }
    }
    (metrics, metric_errors)
}
