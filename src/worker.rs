//! Virtual workers: the simulated users that generate load.
//!
//! Each worker runs as its own tokio task and performs at most
//! `iterations_per_worker` iterations, strictly one after another. An iteration
//! picks an endpoint, issues one GET through the [`Transport`], records what
//! happened in the [`SampleStore`], then sleeps for the configured delay.
//!
//! The runner can stop a worker early by sending [`WorkerCommand::Exit`]. A
//! request already in flight is allowed to finish and is recorded, but no further
//! iteration starts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;

use crate::client::Transport;
use crate::config::RunConfig;
use crate::logger::{GanderLog, GanderLoggerTx, RequestLog};
use crate::metrics::{ERRORS, HTTP_REQS, HTTP_REQ_DURATION, ITERATIONS, SUCCESS_RATE};
use crate::store::SampleStore;
use crate::GanderError;

/// Commands the runner sends to its workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Finish the current request, then stop.
    Exit,
}

/// Lifecycle of a virtual worker: `Idle -> Running -> Completed | Aborted`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkerState {
    /// Spawned, waiting for every other worker to be spawned.
    Idle,
    Running,
    /// Performed every configured iteration.
    Completed,
    /// Told to exit before performing every configured iteration.
    Aborted,
}

/// How far a worker got, reported to the runner when it terminates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub index: usize,
    pub completed_iterations: usize,
    pub state: WorkerState,
}

/// Tracks how many workers are running at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    active: AtomicUsize,
    max: AtomicUsize,
}
impl ConcurrencyGauge {
    fn enter(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(active, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Most workers observed running at the same time.
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// The outcome of one request, success or not.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOutcome {
    pub url: String,
    /// Status code, 0 if no response was received.
    pub status: u16,
    /// Duration in milliseconds, 0.0 if no response was received.
    pub duration: f64,
    /// Transport failure, if any.
    pub error: Option<String>,
}

/// Shared resources every worker of a run is handed.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<RunConfig>,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<SampleStore>,
    pub gauge: Arc<ConcurrencyGauge>,
    /// Released once every worker has been spawned.
    pub start: Arc<Barrier>,
    pub logger: GanderLoggerTx,
}

/// One simulated user.
pub struct VirtualWorker {
    index: usize,
    context: WorkerContext,
    rng: StdRng,
    receiver: flume::Receiver<WorkerCommand>,
    state: WorkerState,
    completed_iterations: usize,
    exit_requested: bool,
    started: Instant,
}
impl VirtualWorker {
    /// Create an idle worker whose endpoint selection is driven by `seed`.
    pub fn new(
        index: usize,
        context: WorkerContext,
        seed: u64,
        receiver: flume::Receiver<WorkerCommand>,
    ) -> Self {
        VirtualWorker {
            index,
            context,
            rng: StdRng::seed_from_u64(seed),
            receiver,
            state: WorkerState::Idle,
            completed_iterations: 0,
            exit_requested: false,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Pick the endpoint for the next request, uniformly at random.
    pub fn select_endpoint(&mut self) -> String {
        let endpoints = &self.context.config.endpoints;
        if endpoints.len() == 1 {
            return endpoints[0].clone();
        }
        let selected = self.rng.random_range(0..endpoints.len());
        endpoints[selected].clone()
    }

    /// Issue one GET. A transport failure is an outcome, not an error.
    pub async fn request(&self, url: &str) -> RequestOutcome {
        match self.context.transport.get(url).await {
            Ok(response) => RequestOutcome {
                url: url.to_string(),
                status: response.status,
                duration: as_millis_f64(response.duration),
                error: None,
            },
            Err(e) => RequestOutcome {
                url: url.to_string(),
                status: 0,
                duration: 0.0,
                error: Some(e.to_string()),
            },
        }
    }

    /// Whether an outcome counts as a success: a 2xx faster than the success threshold.
    pub fn is_success(&self, outcome: &RequestOutcome) -> bool {
        let success_threshold = as_millis_f64(self.context.config.success_threshold);
        let status_ok = http::StatusCode::from_u16(outcome.status)
            .map(|status| status.is_success())
            .unwrap_or(false);
        outcome.error.is_none() && status_ok && outcome.duration < success_threshold
    }

    /// Record one request in the store, returning whether it was a success.
    pub fn record_metrics(&self, outcome: &RequestOutcome) -> Result<bool, GanderError> {
        let store = &self.context.store;
        let success = self.is_success(outcome);
        store.add_trend(HTTP_REQ_DURATION, outcome.duration)?;
        store.add_counter(HTTP_REQS, 1.0)?;
        store.add_rate(SUCCESS_RATE, success)?;
        if !success {
            store.add_counter(ERRORS, 1.0)?;
            match &outcome.error {
                Some(error) => warn!(
                    "[worker {}]: GET {} failed (status {}, {:.3}ms): {}",
                    self.index, outcome.url, outcome.status, outcome.duration, error
                ),
                None => warn!(
                    "[worker {}]: GET {} failed (status {}, {:.3}ms)",
                    self.index, outcome.url, outcome.status, outcome.duration
                ),
            }
        }
        Ok(success)
    }

    fn log_request(&self, iteration: usize, outcome: &RequestOutcome, success: bool) {
        if let Some(logger) = self.context.logger.as_ref() {
            let entry = RequestLog {
                elapsed: self.started.elapsed().as_millis() as u64,
                worker: self.index,
                iteration,
                url: outcome.url.clone(),
                status: outcome.status,
                duration: outcome.duration,
                success,
                error: outcome.error.clone(),
            };
            if let Err(e) = logger.send(Some(GanderLog::Request(entry))) {
                debug!("[worker {}]: request log closed: {}", self.index, e);
            }
        }
    }

    // Determine if the runner has sent a WorkerCommand::Exit message.
    fn received_exit(&mut self) -> bool {
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                WorkerCommand::Exit => self.exit_requested = true,
            }
        }
        self.exit_requested
    }

    /// Sleep the inter-request delay, waking early if told to exit.
    ///
    /// Returns `true` if an exit was requested.
    pub async fn sleep(&mut self) -> bool {
        let delay = self.context.config.inter_request_delay;
        if self.received_exit() {
            return true;
        }
        if delay.is_zero() {
            return false;
        }
        trace!("[worker {}]: sleeping {:?}", self.index, delay);
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        // A disconnected channel disables the command branch, finishing the sleep.
        let exit = tokio::select! {
            _ = &mut sleep => false,
            Ok(WorkerCommand::Exit) = self.receiver.recv_async() => true,
        };
        if exit {
            self.exit_requested = true;
        }
        self.exit_requested
    }

    /// Run every iteration, or until told to exit.
    pub async fn run(mut self) -> WorkerSummary {
        self.context.start.wait().await;
        self.state = WorkerState::Running;
        self.started = Instant::now();
        self.context.gauge.enter();
        debug!("[worker {}]: running", self.index);

        let iterations = self.context.config.iterations_per_worker;
        for iteration in 0..iterations {
            if self.received_exit() {
                break;
            }
            let url = self.select_endpoint();
            let outcome = self.request(&url).await;
            match self.record_metrics(&outcome) {
                Ok(success) => self.log_request(iteration, &outcome, success),
                Err(e) => error!("[worker {}]: failed to record metrics: {}", self.index, e),
            }
            if let Err(e) = self.context.store.add_counter(ITERATIONS, 1.0) {
                error!("[worker {}]: failed to record iteration: {}", self.index, e);
            }
            self.completed_iterations += 1;

            if iteration + 1 < iterations && self.sleep().await {
                break;
            }
        }

        self.context.gauge.exit();
        self.state = if self.completed_iterations == iterations {
            WorkerState::Completed
        } else {
            WorkerState::Aborted
        };
        debug!(
            "[worker {}]: {} after {} iterations",
            self.index, self.state, self.completed_iterations
        );
        WorkerSummary {
            index: self.index,
            completed_iterations: self.completed_iterations,
            state: self.state,
        }
    }
}

/// Seed for one worker's endpoint selection, derived from the run seed.
pub fn worker_seed(run_seed: u64, index: usize) -> u64 {
    run_seed.wrapping_add(index as u64)
}

/// Convert a duration to fractional milliseconds.
pub(crate) fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
