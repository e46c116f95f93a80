//! Functions and structures related to configuring a Gander load run.
//!
//! Gander can be configured at run time by passing in the options and flags defined by
//! the [`GanderConfiguration`] structure.
//!
//! Gander can be configured programmatically with [`GanderDefaultType::set_default`].
//!
//! Either way, the configuration is resolved and validated into a [`RunConfig`], which
//! is what the runner actually consumes. A `RunConfig` can also be built directly.

use gumdrop::Options;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::fmt::Display;
use std::time::Duration;

use crate::logger::GanderLogFormat;
use crate::metrics::DEFAULT_PERCENTILES;
use crate::report::ReportFormat;
use crate::threshold::Threshold;
use crate::util;
use crate::{GanderAttack, GanderError};

/// Runtime options available when launching a Gander load run.
///
/// Custom defaults can be programmatically set for most of these options using
/// [`GanderDefaultType::set_default`].
///
/// Gander leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive the help from the
/// below structure.
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(
    help = r#"Gander sends a fixed amount of concurrent HTTP load at one or more endpoints,
then reports latency percentiles, throughput and success rate.

The following runtime options are available:"#
)]
pub struct GanderConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V", help = "Prints version information\n")]
    pub version: bool,

    /// Adds an endpoint to load test (ie http://10.21.32.33/health)
    #[options(short = "e", meta = "URL")]
    pub endpoint: Vec<String>,
    /// Sets concurrent virtual workers (default: number of CPUs)
    #[options(short = "w")]
    pub workers: Option<usize>,
    /// Sets iterations per worker (default: 1)
    #[options(short = "i")]
    pub iterations: Option<usize>,
    /// Stops the run after (30s, 20m, 3h, 1h30m, etc)
    #[options(short = "t", meta = "TIME")]
    pub max_duration: String,
    /// Sets milliseconds each worker sleeps between requests (default: 0)
    #[options(short = "d", meta = "MS")]
    pub delay: Option<usize>,
    /// Sets milliseconds under which a 2xx counts as a success (default: 500)
    #[options(no_short, meta = "MS")]
    pub success_threshold: Option<usize>,
    /// Sets per-request timeout in seconds (default: 60)
    #[options(no_short, meta = "SECONDS")]
    pub timeout: Option<usize>,
    /// Seeds endpoint selection for a reproducible run
    #[options(no_short, meta = "SEED")]
    pub seed: Option<u64>,
    /// Enables Gander log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases Gander log level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases Gander verbosity (-q, -qq, etc)
    #[options(count, short = "q", help = "Decreases Gander verbosity (-q, -qq, etc)")]
    pub quiet: u8,
    /// Increases Gander verbosity (-v, -vv, etc)
    #[options(
        count,
        short = "v",
        // Add a blank line and then a 'Metrics:' header after this option
        help = "Increases Gander verbosity (-v, -vv, etc)\n\nMetrics:"
    )]
    pub verbose: u8,

    /// Adds a pass/fail threshold (ie "http_req_duration:p(95)<500")
    #[options(no_short, meta = "EXPR")]
    pub threshold: Vec<String>,
    /// Adds a percentile to compute for every trend (default: 90, 95, 99)
    #[options(no_short, meta = "K")]
    pub percentile: Vec<f64>,
    /// Doesn't display metrics at end of the run
    #[options(no_short)]
    pub no_print_metrics: bool,
    /// Creates a report file, html or markdown by extension
    #[options(no_short, meta = "NAME")]
    pub report_file: String,
    /// Creates a json summary file
    #[options(no_short, meta = "NAME")]
    pub summary_file: String,
    /// Sets request log file name
    #[options(short = "R", meta = "NAME")]
    pub request_log: String,
    /// Sets request log format (csv, json, raw)
    #[options(no_short, meta = "FORMAT")]
    pub request_format: Option<GanderLogFormat>,
}

/// Optional default values for Gander run-time options.
#[derive(Clone, Debug, Default)]
pub(crate) struct GanderDefaults {
    /// Optional default endpoints to load test.
    pub endpoint: Vec<String>,
    /// An optional default number of workers to launch.
    pub workers: Option<usize>,
    /// An optional default number of iterations per worker.
    pub iterations: Option<usize>,
    /// An optional default number of seconds the run may last.
    pub max_duration: Option<usize>,
    /// An optional default number of milliseconds to sleep between requests.
    pub delay: Option<usize>,
    /// An optional default success threshold in milliseconds.
    pub success_threshold: Option<usize>,
    /// An optional default request timeout in seconds.
    pub timeout: Option<usize>,
    /// An optional default seed.
    pub seed: Option<u64>,
    /// Optional default thresholds.
    pub threshold: Vec<String>,
    /// An optional default for the log file name.
    pub log_file: Option<String>,
    /// An optional default log level.
    pub log_level: Option<u8>,
    /// An optional default value for quiet level.
    pub quiet: Option<u8>,
    /// An optional default value for verbosity level.
    pub verbose: Option<u8>,
    /// An optional default for not printing metrics.
    pub no_print_metrics: Option<bool>,
    /// An optional default for the report file name.
    pub report_file: Option<String>,
    /// An optional default for the summary file name.
    pub summary_file: Option<String>,
    /// An optional default for the request log file name.
    pub request_log: Option<String>,
    /// An optional default for the request log format.
    pub request_format: Option<GanderLogFormat>,
}

/// Allows the optional configuration of Gander's defaults.
#[derive(Debug)]
pub enum GanderDefault {
    /// Adds a default endpoint, may be set more than once.
    Endpoint,
    /// An optional default number of workers to launch.
    Workers,
    /// An optional default number of iterations per worker.
    Iterations,
    /// An optional default number of seconds the run may last.
    MaxDuration,
    /// An optional default number of milliseconds to sleep between requests.
    Delay,
    /// An optional default success threshold in milliseconds.
    SuccessThreshold,
    /// An optional default request timeout in seconds.
    Timeout,
    /// An optional default seed for endpoint selection.
    Seed,
    /// Adds a default threshold, may be set more than once.
    Threshold,
    /// An optional default for the log file name.
    LogFile,
    /// An optional default log level.
    LogLevel,
    /// An optional default value for quiet level.
    Quiet,
    /// An optional default value for verbosity level.
    Verbose,
    /// An optional default for not printing metrics.
    NoPrintMetrics,
    /// An optional default for the report file name.
    ReportFile,
    /// An optional default for the summary file name.
    SummaryFile,
    /// An optional default for the request log file name.
    RequestLog,
    /// An optional default for the request log format.
    RequestFormat,
}

/// Most run-time options can be programmatically configured with custom defaults.
///
/// For example, you can optionally configure a default endpoint for your load run.
/// This is used if no `--endpoint` is passed in at run time.
///
/// The following defaults can be configured with a `&str`:
///  - [`GanderDefault::Endpoint`]
///  - [`GanderDefault::Threshold`]
///  - [`GanderDefault::LogFile`]
///  - [`GanderDefault::ReportFile`]
///  - [`GanderDefault::SummaryFile`]
///  - [`GanderDefault::RequestLog`]
///
/// The following defaults can be configured with a `usize` integer:
///  - [`GanderDefault::Workers`]
///  - [`GanderDefault::Iterations`]
///  - [`GanderDefault::MaxDuration`]
///  - [`GanderDefault::Delay`]
///  - [`GanderDefault::SuccessThreshold`]
///  - [`GanderDefault::Timeout`]
///  - [`GanderDefault::Seed`]
///  - [`GanderDefault::LogLevel`]
///  - [`GanderDefault::Quiet`]
///  - [`GanderDefault::Verbose`]
///
/// The following defaults can be configured with a `bool`:
///  - [`GanderDefault::NoPrintMetrics`]
///
/// The following defaults can be configured with a [`GanderLogFormat`]:
///  - [`GanderDefault::RequestFormat`]
pub trait GanderDefaultType<T> {
    /// Sets a [`GanderDefault`] to the provided value.
    ///
    /// # Example
    /// ```rust
    /// use gander::prelude::*;
    ///
    /// fn main() -> Result<(), GanderError> {
    ///     GanderAttack::initialize_with_config(GanderConfiguration::default())?
    ///         .set_default(GanderDefault::Endpoint, "http://localhost:8080/")?
    ///         .set_default(GanderDefault::Workers, 10)?
    ///         .set_default(GanderDefault::Quiet, 1)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    fn set_default(self, key: GanderDefault, value: T) -> Result<Box<Self>, GanderError>;
}

// Helper for a helpful and explicit error when a default is set with the wrong type.
fn wrong_type(key: &GanderDefault, value: &dyn Display, expected: &str, received: &str) -> GanderError {
    GanderError::InvalidOption {
        option: format!("GanderDefault::{:?}", key),
        value: value.to_string(),
        detail: format!(
            "set_default(GanderDefault::{:?}, {}) expected {} value, received {}",
            key, value, expected, received
        ),
    }
}

impl GanderDefaultType<&str> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`&str`] value.
    fn set_default(mut self, key: GanderDefault, value: &str) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::Endpoint => {
                util::is_valid_endpoint(value)?;
                self.defaults.endpoint.push(value.to_string());
            }
            GanderDefault::Threshold => {
                value.parse::<Threshold>()?;
                self.defaults.threshold.push(value.to_string());
            }
            GanderDefault::LogFile => self.defaults.log_file = Some(value.to_string()),
            GanderDefault::ReportFile => self.defaults.report_file = Some(value.to_string()),
            GanderDefault::SummaryFile => self.defaults.summary_file = Some(value.to_string()),
            GanderDefault::RequestLog => self.defaults.request_log = Some(value.to_string()),
            GanderDefault::Workers
            | GanderDefault::Iterations
            | GanderDefault::MaxDuration
            | GanderDefault::Delay
            | GanderDefault::SuccessThreshold
            | GanderDefault::Timeout
            | GanderDefault::Seed
            | GanderDefault::LogLevel
            | GanderDefault::Quiet
            | GanderDefault::Verbose => return Err(wrong_type(&key, &value, "usize", "&str")),
            GanderDefault::NoPrintMetrics => return Err(wrong_type(&key, &value, "bool", "&str")),
            GanderDefault::RequestFormat => {
                return Err(wrong_type(&key, &value, "GanderLogFormat", "&str"))
            }
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<usize> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`usize`] value.
    fn set_default(mut self, key: GanderDefault, value: usize) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::Workers => self.defaults.workers = Some(value),
            GanderDefault::Iterations => self.defaults.iterations = Some(value),
            GanderDefault::MaxDuration => self.defaults.max_duration = Some(value),
            GanderDefault::Delay => self.defaults.delay = Some(value),
            GanderDefault::SuccessThreshold => self.defaults.success_threshold = Some(value),
            GanderDefault::Timeout => self.defaults.timeout = Some(value),
            GanderDefault::Seed => self.defaults.seed = Some(value as u64),
            GanderDefault::LogLevel => self.defaults.log_level = Some(value as u8),
            GanderDefault::Quiet => self.defaults.quiet = Some(value as u8),
            GanderDefault::Verbose => self.defaults.verbose = Some(value as u8),
            GanderDefault::Endpoint
            | GanderDefault::Threshold
            | GanderDefault::LogFile
            | GanderDefault::ReportFile
            | GanderDefault::SummaryFile
            | GanderDefault::RequestLog => return Err(wrong_type(&key, &value, "&str", "usize")),
            GanderDefault::NoPrintMetrics => return Err(wrong_type(&key, &value, "bool", "usize")),
            GanderDefault::RequestFormat => {
                return Err(wrong_type(&key, &value, "GanderLogFormat", "usize"))
            }
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<bool> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`bool`] value.
    fn set_default(mut self, key: GanderDefault, value: bool) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::NoPrintMetrics => self.defaults.no_print_metrics = Some(value),
            GanderDefault::Endpoint
            | GanderDefault::Threshold
            | GanderDefault::LogFile
            | GanderDefault::ReportFile
            | GanderDefault::SummaryFile
            | GanderDefault::RequestLog => return Err(wrong_type(&key, &value, "&str", "bool")),
            GanderDefault::Workers
            | GanderDefault::Iterations
            | GanderDefault::MaxDuration
            | GanderDefault::Delay
            | GanderDefault::SuccessThreshold
            | GanderDefault::Timeout
            | GanderDefault::Seed
            | GanderDefault::LogLevel
            | GanderDefault::Quiet
            | GanderDefault::Verbose => return Err(wrong_type(&key, &value, "usize", "bool")),
            GanderDefault::RequestFormat => {
                return Err(wrong_type(&key, &value, "GanderLogFormat", "bool"))
            }
        }
        Ok(Box::new(self))
    }
}
impl GanderDefaultType<GanderLogFormat> for GanderAttack {
    /// Sets [`GanderDefault`] to a [`GanderLogFormat`] value.
    fn set_default(
        mut self,
        key: GanderDefault,
        value: GanderLogFormat,
    ) -> Result<Box<Self>, GanderError> {
        match key {
            GanderDefault::RequestFormat => self.defaults.request_format = Some(value),
            _ => return Err(wrong_type(&key, &value, "other", "GanderLogFormat")),
        }
        Ok(Box::new(self))
    }
}

/// Used internally to configure [`GanderConfiguration`] values based on precedence rules.
#[derive(Debug, Clone)]
pub(crate) struct GanderValue<'a, T> {
    /// The optional value to set.
    pub(crate) value: Option<T>,
    /// Filter using this value if true.
    pub(crate) filter: bool,
    /// An optional INFO level Gander log message.
    pub(crate) message: &'a str,
}

pub(crate) trait GanderConfigure<T> {
    /// Return the first unfiltered [`GanderValue`].
    fn get_value(&self, values: Vec<GanderValue<T>>) -> Option<T>;
}
impl<T: Display> GanderConfigure<T> for GanderConfiguration {
    fn get_value(&self, values: Vec<GanderValue<T>>) -> Option<T> {
        for value in values {
            if let Some(v) = value.value {
                if value.filter {
                    continue;
                }
                if !value.message.is_empty() {
                    info!("{} = {}", value.message, v)
                }
                return Some(v);
            }
        }
        None
    }
}

// Empty, or only zeroes with units: no global timeout.
fn is_zero_timespan(timespan: &str) -> bool {
    timespan
        .chars()
        .all(|c| matches!(c, '0' | 'h' | 'm' | 's'))
        && (timespan.is_empty() || timespan.contains('0'))
}

/// Fully resolved, validated parameters of one run.
///
/// Immutable once the run starts: the runner shares it read-only with every worker.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub virtual_workers: usize,
    pub iterations_per_worker: usize,
    /// Global timeout, `None` to wait for every iteration.
    pub max_duration: Option<Duration>,
    /// Endpoints requested, selected uniformly at random.
    pub endpoints: Vec<String>,
    pub inter_request_delay: Duration,
    /// A 2xx response must be faster than this to count as a success.
    pub success_threshold: Duration,
    pub request_timeout: Duration,
    pub thresholds: Vec<Threshold>,
    /// Percentiles computed for every trend, extended by the thresholds' needs.
    pub percentiles: Vec<f64>,
    /// Seed for endpoint selection, drawn at random when `None`.
    pub seed: Option<u64>,
    /// Request log path, disabled if empty.
    pub request_log: String,
    pub request_format: GanderLogFormat,
}
impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            virtual_workers: 1,
            iterations_per_worker: 1,
            max_duration: None,
            endpoints: Vec::new(),
            inter_request_delay: Duration::ZERO,
            success_threshold: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
            thresholds: Vec::new(),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            seed: None,
            request_log: String::new(),
            request_format: GanderLogFormat::Json,
        }
    }
}
impl RunConfig {
    /// Confirm the run can start. Nothing is spawned or requested before this passes.
    pub fn validate(&self) -> Result<(), GanderError> {
        if self.virtual_workers == 0 {
            return Err(GanderError::InvalidOption {
                option: "`virtual_workers`".to_string(),
                value: self.virtual_workers.to_string(),
                detail: "`virtual_workers` must be set to at least 1.".to_string(),
            });
        }
        if self.iterations_per_worker == 0 {
            return Err(GanderError::InvalidOption {
                option: "`iterations_per_worker`".to_string(),
                value: self.iterations_per_worker.to_string(),
                detail: "`iterations_per_worker` must be set to at least 1.".to_string(),
            });
        }
        if self.endpoints.is_empty() {
            return Err(GanderError::InvalidOption {
                option: "`endpoints`".to_string(),
                value: "[]".to_string(),
                detail: "At least one endpoint is required.".to_string(),
            });
        }
        for endpoint in &self.endpoints {
            util::is_valid_endpoint(endpoint)?;
        }
        if self.request_timeout.is_zero() {
            return Err(GanderError::InvalidOption {
                option: "`request_timeout`".to_string(),
                value: "0".to_string(),
                detail: "`request_timeout` must be greater than 0.".to_string(),
            });
        }
        if let Some(k) = self
            .percentiles
            .iter()
            .find(|k| !(0.0..=100.0).contains(*k))
        {
            return Err(GanderError::InvalidOption {
                option: "`percentiles`".to_string(),
                value: k.to_string(),
                detail: "Percentiles must be between 0 and 100.".to_string(),
            });
        }
        Ok(())
    }

    /// Percentiles to compute, including any a threshold refers to.
    pub fn required_percentiles(&self) -> Vec<f64> {
        let mut percentiles = self.percentiles.clone();
        for k in self.thresholds.iter().filter_map(Threshold::required_percentile) {
            if !percentiles.contains(&k) {
                percentiles.push(k);
            }
        }
        percentiles.sort_by(f64::total_cmp);
        percentiles
    }
}

impl GanderConfiguration {
    /// Implement precedence rules for all [`GanderConfiguration`] values: a run-time
    /// option wins over a [`GanderDefault`], which wins over the built-in default.
    pub(crate) fn configure(&mut self, defaults: &GanderDefaults) {
        // Configure `quiet`.
        self.quiet = self
            .get_value(vec![
                // Use --quiet if set.
                GanderValue {
                    value: Some(self.quiet),
                    filter: self.quiet == 0,
                    message: "",
                },
                // Otherwise use GanderDefault if set.
                GanderValue {
                    value: defaults.quiet,
                    filter: defaults.quiet.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `verbose`.
        self.verbose = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.verbose),
                    filter: self.verbose == 0,
                    message: "",
                },
                GanderValue {
                    value: defaults.verbose,
                    filter: defaults.verbose.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `log_level`.
        self.log_level = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.log_level),
                    filter: self.log_level == 0,
                    message: "",
                },
                GanderValue {
                    value: defaults.log_level,
                    filter: defaults.log_level.is_none(),
                    message: "",
                },
            ])
            .unwrap_or(0);

        // Configure `log_file`.
        self.log_file = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.log_file.to_string()),
                    filter: self.log_file.is_empty(),
                    message: "",
                },
                GanderValue {
                    value: defaults.log_file.clone(),
                    filter: defaults.log_file.is_none(),
                    message: "",
                },
            ])
            .unwrap_or_default();

        // Configure `endpoint`.
        if self.endpoint.is_empty() {
            self.endpoint = defaults.endpoint.clone();
        }
        info!("endpoints = {:?}", self.endpoint);

        // Configure `workers`.
        self.workers = self.get_value(vec![
            // Use --workers if set.
            GanderValue {
                value: self.workers,
                filter: self.workers.is_none(),
                message: "workers",
            },
            // Otherwise use GanderDefault if set.
            GanderValue {
                value: defaults.workers,
                filter: defaults.workers.is_none(),
                message: "workers",
            },
            // Otherwise default to the number of CPUs.
            GanderValue {
                value: std::thread::available_parallelism()
                    .map(|n| n.get())
                    .ok(),
                filter: false,
                message: "workers defaulted to number of CPUs",
            },
        ]);

        // Configure `iterations`.
        self.iterations = self.get_value(vec![
            GanderValue {
                value: self.iterations,
                filter: self.iterations.is_none(),
                message: "iterations",
            },
            GanderValue {
                value: defaults.iterations,
                filter: defaults.iterations.is_none(),
                message: "iterations",
            },
            GanderValue {
                value: Some(1),
                filter: false,
                message: "",
            },
        ]);

        // Configure `max_duration`.
        self.max_duration = self
            .get_value(vec![
                // Use --max-duration if set.
                GanderValue {
                    value: Some(self.max_duration.to_string()),
                    filter: self.max_duration.is_empty(),
                    message: "max_duration",
                },
                // Otherwise use GanderDefault if set.
                GanderValue {
                    value: defaults.max_duration.map(|d| d.to_string()),
                    filter: defaults.max_duration.is_none(),
                    message: "max_duration",
                },
            ])
            .unwrap_or_default();

        // Configure `delay`.
        self.delay = self.get_value(vec![
            GanderValue {
                value: self.delay,
                filter: self.delay.is_none(),
                message: "delay",
            },
            GanderValue {
                value: defaults.delay,
                filter: defaults.delay.is_none(),
                message: "delay",
            },
        ]);

        // Configure `success_threshold`.
        self.success_threshold = self.get_value(vec![
            GanderValue {
                value: self.success_threshold,
                filter: self.success_threshold.is_none(),
                message: "success_threshold",
            },
            GanderValue {
                value: defaults.success_threshold,
                filter: defaults.success_threshold.is_none(),
                message: "success_threshold",
            },
        ]);

        // Configure `timeout`.
        self.timeout = self.get_value(vec![
            GanderValue {
                value: self.timeout,
                filter: self.timeout.is_none(),
                message: "timeout",
            },
            GanderValue {
                value: defaults.timeout,
                filter: defaults.timeout.is_none(),
                message: "timeout",
            },
        ]);

        // Configure `seed`.
        self.seed = self.get_value(vec![
            GanderValue {
                value: self.seed,
                filter: self.seed.is_none(),
                message: "seed",
            },
            GanderValue {
                value: defaults.seed,
                filter: defaults.seed.is_none(),
                message: "seed",
            },
        ]);

        // Configure `threshold`.
        if self.threshold.is_empty() {
            self.threshold = defaults.threshold.clone();
        }

        // Configure `no_print_metrics`.
        self.no_print_metrics = self
            .get_value(vec![
                GanderValue {
                    value: Some(true),
                    filter: !self.no_print_metrics,
                    message: "no_print_metrics",
                },
                GanderValue {
                    value: defaults.no_print_metrics,
                    filter: defaults.no_print_metrics.is_none(),
                    message: "no_print_metrics",
                },
            ])
            .unwrap_or(false);

        // Configure `report_file`.
        self.report_file = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.report_file.to_string()),
                    filter: self.report_file.is_empty(),
                    message: "report_file",
                },
                GanderValue {
                    value: defaults.report_file.clone(),
                    filter: defaults.report_file.is_none(),
                    message: "report_file",
                },
            ])
            .unwrap_or_default();

        // Configure `summary_file`.
        self.summary_file = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.summary_file.to_string()),
                    filter: self.summary_file.is_empty(),
                    message: "summary_file",
                },
                GanderValue {
                    value: defaults.summary_file.clone(),
                    filter: defaults.summary_file.is_none(),
                    message: "summary_file",
                },
            ])
            .unwrap_or_default();

        // Configure `request_log`.
        self.request_log = self
            .get_value(vec![
                GanderValue {
                    value: Some(self.request_log.to_string()),
                    filter: self.request_log.is_empty(),
                    message: "request_log",
                },
                GanderValue {
                    value: defaults.request_log.clone(),
                    filter: defaults.request_log.is_none(),
                    message: "request_log",
                },
            ])
            .unwrap_or_default();

        // Configure `request_format`.
        self.request_format = self.get_value(vec![
            GanderValue {
                value: self.request_format,
                filter: self.request_format.is_none(),
                message: "request_format",
            },
            GanderValue {
                value: defaults.request_format,
                filter: defaults.request_format.is_none(),
                message: "request_format",
            },
            GanderValue {
                value: Some(GanderLogFormat::Json),
                filter: false,
                message: "",
            },
        ]);
    }

    /// Validate the configured options, converting them into a [`RunConfig`].
    pub(crate) fn validate(&self) -> Result<RunConfig, GanderError> {
        // Can't set both --verbose and --quiet.
        if self.verbose > 0 && self.quiet > 0 {
            return Err(GanderError::InvalidOption {
                option: "`configuration.verbose`".to_string(),
                value: self.verbose.to_string(),
                detail: "`configuration.verbose` can not be set with `configuration.quiet`."
                    .to_string(),
            });
        }

        // A max duration that doesn't parse would silently run forever.
        let max_duration = match util::parse_timespan(&self.max_duration) {
            0 if is_zero_timespan(&self.max_duration) => None,
            0 => {
                return Err(GanderError::InvalidOption {
                    option: "`configuration.max_duration`".to_string(),
                    value: self.max_duration.clone(),
                    detail: "`configuration.max_duration` must be a representable timespan such as 30s, 2m or 1h30m."
                        .to_string(),
                })
            }
            seconds => Some(Duration::from_secs(seconds as u64)),
        };

        if self.success_threshold == Some(0) {
            return Err(GanderError::InvalidOption {
                option: "`configuration.success_threshold`".to_string(),
                value: "0".to_string(),
                detail: "`configuration.success_threshold` must be greater than 0.".to_string(),
            });
        }

        // Catch an unsupported report format before the run, not after it.
        if !self.report_file.is_empty() {
            ReportFormat::from_path(&self.report_file)?;
        }

        let thresholds = self
            .threshold
            .iter()
            .map(|t| t.parse::<Threshold>())
            .collect::<Result<Vec<Threshold>, GanderError>>()?;

        let defaults = RunConfig::default();
        let mut percentiles = defaults.percentiles.clone();
        for k in &self.percentile {
            if !percentiles.contains(k) {
                percentiles.push(*k);
            }
        }

        let run_config = RunConfig {
            virtual_workers: self.workers.unwrap_or(defaults.virtual_workers),
            iterations_per_worker: self.iterations.unwrap_or(defaults.iterations_per_worker),
            max_duration,
            endpoints: self.endpoint.clone(),
            inter_request_delay: self
                .delay
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(defaults.inter_request_delay),
            success_threshold: self
                .success_threshold
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(defaults.success_threshold),
            request_timeout: self
                .timeout
                .map(|s| Duration::from_secs(s as u64))
                .unwrap_or(defaults.request_timeout),
            thresholds,
            percentiles,
            seed: self.seed,
            request_log: self.request_log.clone(),
            request_format: self.request_format.unwrap_or_default(),
        };
        run_config.validate()?;
        Ok(run_config)
    }

    /// Initialize the console logger, and the log file if configured.
    pub(crate) fn initialize_logger(&self) -> Result<(), GanderError> {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure Gander log level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
        loggers.push(SimpleLogger::new(debug_level, Config::default()));
        if !self.log_file.is_empty() {
            loggers.push(WriteLogger::new(
                log_level,
                Config::default(),
                std::fs::File::create(&self.log_file)?,
            ));
        }

        // Only the first initialization in a process takes effect.
        if let Err(e) = CombinedLogger::init(loggers) {
            debug!("failed to initialize CombinedLogger: {}", e);
        }
        if !self.log_file.is_empty() {
            info!("Writing to log file: {}", self.log_file);
        }
        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
        Ok(())
    }
}
