//! # Gander
//!
//! Gander sends a fixed amount of concurrent HTTP load at one or more endpoints, then
//! reports what it saw: latency percentiles, throughput, success rate and error count,
//! optionally gated by pass/fail thresholds.
//!
//! Gander uses [`reqwest`](https://docs.rs/reqwest/) to make requests, and
//! [`tokio`](https://docs.rs/tokio/) to run one task per virtual worker.
//!
//! ## Running a load test
//!
//! The `gander` binary exposes every option of
//! [`GanderConfiguration`](./config/struct.GanderConfiguration.html):
//!
//! ```bash
//! $ gander --endpoint http://localhost:8080/health -w 100 -i 100 \
//!     --threshold "http_req_duration:p(95)<200" --report-file report.html
//! ```
//!
//! The same run can be driven from Rust, setting defaults programmatically that
//! run-time options still override:
//!
//! ```rust,no_run
//! use gander::prelude::*;
//!
//! fn main() -> Result<(), GanderError> {
//!     let result = GanderAttack::initialize()?
//!         .set_default(GanderDefault::Endpoint, "http://localhost:8080/health")?
//!         .set_default(GanderDefault::Workers, 100)?
//!         .set_default(GanderDefault::Iterations, 100)?
//!         .execute()?;
//!
//!     if !result.passed {
//!         std::process::exit(1);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! A [`RunConfig`](./config/struct.RunConfig.html) can also be handed straight to
//! [`runner::run`](./runner/fn.run.html) from inside an existing runtime, with any
//! [`Transport`](./client/trait.Transport.html).
//!
//! ## Metrics
//!
//! Every run records at least the following series:
//!  - `http_req_duration`: trend of request durations in milliseconds
//!  - `http_reqs`: counter of requests made
//!  - `success_rate`: rate of requests that returned a 2xx under `--success-threshold`
//!  - `errors`: counter of failed requests
//!  - `iterations`: counter of completed iterations
//!
//! Each is reduced once, after every worker has stopped, into an
//! [`AggregateResult`](./metrics/enum.AggregateResult.html).
//!
//! ## License
//!
//! Licensed under Apache License, Version 2.0.

#[macro_use]
extern crate log;

pub mod client;
pub mod config;
pub mod logger;
pub mod metrics;
pub mod prelude;
pub mod report;
pub mod runner;
pub mod store;
pub mod threshold;
pub mod util;
pub mod worker;

use gumdrop::Options;
use std::sync::Arc;
use std::{fmt, io};
use tokio::runtime::Runtime;

use crate::client::{ReqwestTransport, Transport};
use crate::config::{GanderConfiguration, GanderDefaults, RunConfig};
use crate::metrics::{MetricKind, RunResult};

/// An enumeration of all errors Gander can return.
#[derive(Debug)]
pub enum GanderError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://tokio-rs.github.io/tokio/doc/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    Serialize(serde_json::Error),
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Failed to parse an endpoint.
    InvalidEndpoint {
        /// The invalid endpoint that caused this error.
        endpoint: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html), if
        /// the endpoint didn't parse at all.
        parse_error: Option<url::ParseError>,
    },
    /// Failed to parse a threshold expression.
    InvalidThreshold {
        /// The expression that caused this error.
        threshold: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// A trend or rate series has no observations to aggregate.
    EmptySeries {
        /// The name of the empty series.
        metric: String,
    },
    /// An observation value the series can't hold: a non-finite trend sample, or a
    /// negative or non-finite counter increment.
    InvalidObservation {
        /// The name of the series.
        metric: String,
        /// The rejected value.
        value: f64,
        /// An optional explanation of the error.
        detail: String,
    },
    /// An observation was recorded against a series of another kind.
    MetricKindMismatch {
        /// The name of the series.
        metric: String,
        /// The kind of the existing series.
        expected: MetricKind,
        /// The kind of the rejected observation.
        received: MetricKind,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl GanderError {
    fn describe(&self) -> &str {
        match *self {
            GanderError::Io(_) => "io::Error",
            GanderError::Reqwest(_) => "reqwest::Error",
            GanderError::TokioJoin(_) => "tokio::task::JoinError",
            GanderError::Serialize(_) => "serde_json::Error",
            GanderError::InvalidOption { .. } => "invalid option or value specified",
            GanderError::InvalidEndpoint { .. } => "failed to parse endpoint",
            GanderError::InvalidThreshold { .. } => "failed to parse threshold",
            GanderError::EmptySeries { .. } => "no samples recorded",
            GanderError::InvalidObservation { .. } => "invalid observation",
            GanderError::MetricKindMismatch { .. } => "metric kind mismatch",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for GanderError {
    // Implement display of error with `{}` marker.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GanderError::Io(ref source) => write!(f, "GanderError: {} ({})", self.describe(), source),
            GanderError::Reqwest(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::TokioJoin(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::Serialize(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::InvalidOption { ref detail, .. }
            | GanderError::InvalidThreshold { ref detail, .. } => {
                write!(f, "GanderError: {} ({})", self.describe(), detail)
            }
            GanderError::InvalidEndpoint {
                ref endpoint,
                ref detail,
                ref parse_error,
            } => match parse_error {
                Some(parse_error) => write!(
                    f,
                    "GanderError: {} {} ({}: {})",
                    self.describe(),
                    endpoint,
                    detail,
                    parse_error
                ),
                None => write!(
                    f,
                    "GanderError: {} {} ({})",
                    self.describe(),
                    endpoint,
                    detail
                ),
            },
            GanderError::EmptySeries { ref metric } => {
                write!(f, "GanderError: {} for {}", self.describe(), metric)
            }
            GanderError::InvalidObservation {
                ref metric,
                value,
                ref detail,
            } => write!(
                f,
                "GanderError: {} {} for {} ({})",
                self.describe(),
                value,
                metric,
                detail
            ),
            GanderError::MetricKindMismatch {
                ref metric,
                expected,
                received,
            } => write!(
                f,
                "GanderError: {} for {} (expected {}, received {})",
                self.describe(),
                metric,
                expected,
                received
            ),
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for GanderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            GanderError::Io(ref source) => Some(source),
            GanderError::Reqwest(ref source) => Some(source),
            GanderError::TokioJoin(ref source) => Some(source),
            GanderError::Serialize(ref source) => Some(source),
            GanderError::InvalidEndpoint {
                parse_error: Some(ref parse_error),
                ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for GanderError {
    fn from(err: reqwest::Error) -> GanderError {
        GanderError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for GanderError {
    fn from(err: io::Error) -> GanderError {
        GanderError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for GanderError {
    fn from(err: tokio::task::JoinError) -> GanderError {
        GanderError::TokioJoin(err)
    }
}

/// Auto-convert serde_json errors.
impl From<serde_json::Error> for GanderError {
    fn from(err: serde_json::Error) -> GanderError {
        GanderError::Serialize(err)
    }
}

/// Global state of a load run launched from the command line or from Rust.
pub struct GanderAttack {
    /// Optional default values for Gander run-time options.
    pub(crate) defaults: GanderDefaults,
    /// Configuration object holding options set when launching the load run.
    configuration: GanderConfiguration,
    /// Transport used instead of the default reqwest client, if set.
    transport: Option<Arc<dyn Transport>>,
}
impl GanderAttack {
    /// Load configuration from the command line and initialize a [`GanderAttack`].
    ///
    /// # Example
    /// ```rust,no_run
    /// use gander::prelude::*;
    ///
    /// let mut gander_attack = GanderAttack::initialize();
    /// ```
    pub fn initialize() -> Result<GanderAttack, GanderError> {
        Ok(GanderAttack {
            defaults: GanderDefaults::default(),
            configuration: GanderConfiguration::parse_args_default_or_exit(),
            transport: None,
        })
    }

    /// Initialize a [`GanderAttack`] with an already loaded configuration.
    ///
    /// # Example
    /// ```rust
    /// use gander::GanderAttack;
    /// use gander::config::GanderConfiguration;
    /// use gumdrop::Options;
    ///
    /// let configuration = GanderConfiguration::parse_args_default(&["-w", "10"]).unwrap();
    /// let mut gander_attack = GanderAttack::initialize_with_config(configuration);
    /// ```
    pub fn initialize_with_config(
        configuration: GanderConfiguration,
    ) -> Result<GanderAttack, GanderError> {
        Ok(GanderAttack {
            defaults: GanderDefaults::default(),
            configuration,
            transport: None,
        })
    }

    /// Send requests through `transport` instead of a reqwest client built from
    /// `--timeout`.
    pub fn set_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Resolve and validate the configuration, run the load test, then print and write
    /// the configured summaries.
    ///
    /// Failed thresholds don't return an error: check
    /// [`RunResult::passed`](./metrics/struct.RunResult.html#structfield.passed).
    pub fn execute(mut self) -> Result<RunResult, GanderError> {
        // If version flag is set, display package name and version and exit.
        if self.configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }

        // Configure GanderConfiguration.
        self.configuration.configure(&self.defaults);

        self.configuration.initialize_logger()?;

        // Validate GanderConfiguration into a RunConfig.
        let run_config = self.configuration.validate()?;

        let rt = Runtime::new()?;
        let result = rt.block_on(self.start_attack(&run_config))?;

        if !self.configuration.no_print_metrics {
            println!("{}", result);
        }
        self.write_summaries(&result)?;

        Ok(result)
    }

    async fn start_attack(&mut self, run_config: &RunConfig) -> Result<RunResult, GanderError> {
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(run_config.request_timeout)?),
        };
        info!(
            "starting run: {} workers x {} iterations against {} endpoint(s)",
            run_config.virtual_workers,
            run_config.iterations_per_worker,
            run_config.endpoints.len()
        );
        let result = runner::run(run_config, transport).await?;
        if result.passed {
            info!("all thresholds passed");
        } else {
            warn!("one or more thresholds failed");
        }
        Ok(result)
    }

    // Write the summary and report files, if configured.
    fn write_summaries(&self, result: &RunResult) -> Result<(), GanderError> {
        if !self.configuration.summary_file.is_empty() {
            let rendered = report::render(result)?;
            std::fs::write(&self.configuration.summary_file, rendered.structured)?;
            info!("wrote summary file: {}", self.configuration.summary_file);
        }
        if !self.configuration.report_file.is_empty() {
            report::write_report_file(&self.configuration.report_file, result)?;
            info!("wrote report file: {}", self.configuration.report_file);
        }
        Ok(())
    }
}
