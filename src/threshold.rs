//! Pass/fail predicates evaluated against aggregated metrics.
//!
//! Thresholds are written as `metric:aggregation comparator value`, for example:
//!  - `http_req_duration:p(95)<500`
//!  - `http_req_duration:avg<=200`
//!  - `success_rate:rate>0.99`
//!  - `errors:count<10`
//!
//! A threshold whose metric was never recorded, or couldn't be aggregated, fails.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::metrics::{percentile_label, AggregateResult};
use crate::GanderError;

/// Which value of an [`AggregateResult`] a threshold inspects.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    /// Counter total, or number of samples for trends and rates.
    Count,
}
impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Percentile(k) => write!(f, "{}", percentile_label(*k)),
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Count => write!(f, "count"),
        }
    }
}
impl Aggregation {
    /// Extract the inspected value, if this aggregation applies to the result.
    pub fn observe(&self, result: &AggregateResult) -> Option<f64> {
        match (self, result) {
            (Aggregation::Avg, AggregateResult::Trend { mean, .. }) => Some(*mean),
            (Aggregation::Min, AggregateResult::Trend { min, .. }) => Some(*min),
            (Aggregation::Max, AggregateResult::Trend { max, .. }) => Some(*max),
            (Aggregation::Med, AggregateResult::Trend { median, .. }) => Some(*median),
            (Aggregation::Percentile(k), AggregateResult::Trend { .. }) => result.percentile(*k),
            (Aggregation::Count, AggregateResult::Trend { count, .. }) => Some(*count as f64),
            (Aggregation::Rate, AggregateResult::Rate { rate, .. }) => Some(*rate),
            (Aggregation::Count, AggregateResult::Rate { passes, fails, .. }) => {
                Some((passes + fails) as f64)
            }
            (Aggregation::Count, AggregateResult::Counter { total, .. }) => Some(*total),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}
impl Comparator {
    pub fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Comparator::Lt => observed < limit,
            Comparator::Le => observed <= limit,
            Comparator::Gt => observed > limit,
            Comparator::Ge => observed >= limit,
            Comparator::Eq => observed == limit,
            Comparator::Ne => observed != limit,
        }
    }
}
impl FromStr for Comparator {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Comparator::Lt),
            "<=" => Ok(Comparator::Le),
            ">" => Ok(Comparator::Gt),
            ">=" => Ok(Comparator::Ge),
            "==" => Ok(Comparator::Eq),
            "!=" => Ok(Comparator::Ne),
            _ => Err(GanderError::InvalidThreshold {
                threshold: s.to_string(),
                detail: "Comparator must be one of <, <=, >, >=, ==, !=.".to_string(),
            }),
        }
    }
}
impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        };
        write!(f, "{}", symbol)
    }
}

/// A pass/fail predicate over one aggregated metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// The expression as written, without surrounding whitespace.
    pub source: String,
    pub metric: String,
    pub aggregation: Aggregation,
    pub comparator: Comparator,
    pub value: f64,
}
impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}{}{}",
            self.metric, self.aggregation, self.comparator, self.value
        )
    }
}
impl FromStr for Threshold {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: &str| GanderError::InvalidThreshold {
            threshold: s.to_string(),
            detail: detail.to_string(),
        };
        let re = Regex::new(
            r"^\s*(?P<metric>[A-Za-z_][A-Za-z0-9_.]*)\s*:\s*(?P<aggregation>avg|min|max|med|rate|count|p\(\s*(?P<percentile>\d+(\.\d+)?)\s*\))\s*(?P<comparator><=|>=|==|!=|<|>)\s*(?P<value>-?\d+(\.\d+)?)\s*$",
        )
        .map_err(|e| invalid(&e.to_string()))?;
        let captures = re
            .captures(s)
            .ok_or_else(|| invalid("Expected `metric:aggregation<value`, e.g. `http_req_duration:p(95)<500`."))?;

        let aggregation = match &captures["aggregation"] {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "rate" => Aggregation::Rate,
            "count" => Aggregation::Count,
            _ => {
                let k = captures
                    .name("percentile")
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .ok_or_else(|| invalid("Unable to parse percentile."))?;
                if !(0.0..=100.0).contains(&k) {
                    return Err(invalid("Percentile must be between 0 and 100."));
                }
                Aggregation::Percentile(k)
            }
        };
        let value = captures["value"]
            .parse::<f64>()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Threshold {
            source: s.trim().to_string(),
            metric: captures["metric"].to_string(),
            aggregation,
            comparator: captures["comparator"].parse()?,
            value,
        })
    }
}

/// The result of evaluating one [`Threshold`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    /// The threshold as written.
    pub source: String,
    pub metric: String,
    pub passed: bool,
    /// The value compared, if one could be determined.
    pub observed: Option<f64>,
    /// Why the threshold failed; empty when it passed.
    pub reason: String,
}

impl Threshold {
    /// Percentile this threshold needs computed, if any.
    pub fn required_percentile(&self) -> Option<f64> {
        match self.aggregation {
            Aggregation::Percentile(k) => Some(k),
            _ => None,
        }
    }

    /// Evaluate against the aggregated metrics of a run.
    ///
    /// `metric_errors` explains metrics that were recorded but couldn't be aggregated.
    pub fn evaluate(
        &self,
        metrics: &BTreeMap<String, AggregateResult>,
        metric_errors: &BTreeMap<String, String>,
    ) -> ThresholdOutcome {
        let fail = |observed: Option<f64>, reason: String| ThresholdOutcome {
            source: self.source.clone(),
            metric: self.metric.clone(),
            passed: false,
            observed,
            reason,
        };

        let result = match metrics.get(&self.metric) {
            Some(result) => result,
            None => {
                let reason = match metric_errors.get(&self.metric) {
                    Some(error) => format!("metric {} has no data: {}", self.metric, error),
                    None => format!("metric {} was not recorded", self.metric),
                };
                return fail(None, reason);
            }
        };
        let observed = match self.aggregation.observe(result) {
            Some(observed) => observed,
            None => {
                return fail(
                    None,
                    format!(
                        "{} doesn't apply to {} metric {}",
                        self.aggregation,
                        result.kind(),
                        self.metric
                    ),
                )
            }
        };

        if self.comparator.holds(observed, self.value) {
            ThresholdOutcome {
                source: self.source.clone(),
                metric: self.metric.clone(),
                passed: true,
                observed: Some(observed),
                reason: String::new(),
            }
        } else {
            fail(
                Some(observed),
                format!(
                    "{} {} is {}, expected {} {}",
                    self.metric, self.aggregation, observed, self.comparator, self.value
                ),
            )
        }
    }
}

/// Evaluate every threshold, returning the outcomes and whether all passed.
pub fn evaluate_all(
    thresholds: &[Threshold],
    metrics: &BTreeMap<String, AggregateResult>,
    metric_errors: &BTreeMap<String, String>,
) -> (Vec<ThresholdOutcome>, bool) {
    let outcomes: Vec<ThresholdOutcome> = thresholds
        .iter()
        .map(|threshold| threshold.evaluate(metrics, metric_errors))
        .collect();
    for outcome in outcomes.iter().filter(|o| !o.passed) {
        warn!("threshold failed: {}", outcome.reason);
    }
    let passed = outcomes.iter().all(|o| o.passed);
    (outcomes, passed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::{ERRORS, HTTP_REQ_DURATION, SUCCESS_RATE};

    fn metrics() -> BTreeMap<String, AggregateResult> {
        let mut metrics = BTreeMap::new();
        let mut percentiles = BTreeMap::new();
        percentiles.insert("p(90)".to_string(), 40.0);
        percentiles.insert("p(95)".to_string(), 45.0);
        percentiles.insert("p(99)".to_string(), 49.0);
        metrics.insert(
            HTTP_REQ_DURATION.to_string(),
            AggregateResult::Trend {
                count: 100,
                min: 1.0,
                max: 50.0,
                mean: 25.0,
                median: 24.0,
                percentiles,
            },
        );
        metrics.insert(
            SUCCESS_RATE.to_string(),
            AggregateResult::Rate {
                rate: 0.98,
                passes: 98,
                fails: 2,
            },
        );
        metrics.insert(
            ERRORS.to_string(),
            AggregateResult::Counter {
                total: 2.0,
                count: 2,
            },
        );
        metrics
    }

    #[test]
    fn parse() {
        let threshold: Threshold = "http_req_duration:p(95)<500".parse().unwrap();
        assert_eq!(threshold.metric, HTTP_REQ_DURATION);
        assert_eq!(threshold.aggregation, Aggregation::Percentile(95.0));
        assert_eq!(threshold.comparator, Comparator::Lt);
        assert_eq!(threshold.value, 500.0);
        assert_eq!(threshold.to_string(), "http_req_duration:p(95)<500");

        let threshold: Threshold = " success_rate : rate >= 0.99 ".parse().unwrap();
        assert_eq!(threshold.aggregation, Aggregation::Rate);
        assert_eq!(threshold.comparator, Comparator::Ge);
        assert_eq!(threshold.value, 0.99);

        let threshold: Threshold = "http_req_duration:p(99.9)!=0".parse().unwrap();
        assert_eq!(threshold.required_percentile(), Some(99.9));

        for invalid in [
            "",
            "http_req_duration",
            "http_req_duration:p95<500",
            "http_req_duration:p(95)=500",
            "http_req_duration:p(101)<500",
            "http_req_duration:stddev<5",
            ":avg<5",
        ] {
            assert!(
                matches!(
                    invalid.parse::<Threshold>(),
                    Err(GanderError::InvalidThreshold { .. })
                ),
                "{} should not parse",
                invalid
            );
        }
    }

    #[test]
    fn evaluate() {
        let metrics = metrics();
        let errors = BTreeMap::new();
        for (threshold, passed) in [
            ("http_req_duration:p(95)<50", true),
            ("http_req_duration:p(95)<45", false),
            ("http_req_duration:p(95)<=45", true),
            ("http_req_duration:avg<=25", true),
            ("http_req_duration:med>30", false),
            ("http_req_duration:max<100", true),
            ("http_req_duration:min>=1", true),
            ("http_req_duration:count==100", true),
            ("success_rate:rate>0.99", false),
            ("success_rate:rate>0.95", true),
            ("errors:count<1", false),
            ("errors:count!=0", true),
        ] {
            let outcome = threshold
                .parse::<Threshold>()
                .unwrap()
                .evaluate(&metrics, &errors);
            assert_eq!(outcome.passed, passed, "{}", threshold);
            assert_eq!(outcome.reason.is_empty(), passed);
        }
    }

    #[test]
    fn outcome_keeps_expression_as_written() {
        let threshold: Threshold = " success_rate:rate>0.990 ".parse().unwrap();
        assert_eq!(threshold.to_string(), "success_rate:rate>0.99");
        let outcome = threshold.evaluate(&metrics(), &BTreeMap::new());
        assert_eq!(outcome.source, "success_rate:rate>0.990");
        assert!(!outcome.passed);
    }

    #[test]
    fn missing_metrics_fail_closed() {
        let metrics = BTreeMap::new();
        let mut errors = BTreeMap::new();
        errors.insert(
            SUCCESS_RATE.to_string(),
            "no samples recorded for success_rate".to_string(),
        );

        let outcome = "success_rate:rate>0"
            .parse::<Threshold>()
            .unwrap()
            .evaluate(&metrics, &errors);
        assert!(!outcome.passed);
        assert!(outcome.observed.is_none());
        assert!(outcome.reason.contains("has no data"));

        let outcome = "checks:rate>0"
            .parse::<Threshold>()
            .unwrap()
            .evaluate(&metrics, &errors);
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("was not recorded"));
    }

    #[test]
    fn mismatched_aggregation_fails() {
        let outcome = "success_rate:p(95)<1"
            .parse::<Threshold>()
            .unwrap()
            .evaluate(&metrics(), &BTreeMap::new());
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("doesn't apply"));
    }

    #[test]
    fn all_must_pass() {
        let thresholds: Vec<Threshold> = ["http_req_duration:p(95)<50", "errors:count<1"]
            .iter()
            .map(|t| t.parse().unwrap())
            .collect();
        let (outcomes, passed) = evaluate_all(&thresholds, &metrics(), &BTreeMap::new());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(!passed);

        let (outcomes, passed) = evaluate_all(&[], &metrics(), &BTreeMap::new());
        assert!(outcomes.is_empty());
        assert!(passed);
    }
}
