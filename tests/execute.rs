use httpmock::{Method::GET, Mock, MockServer};
use serial_test::serial;
use std::time::Duration;

mod common;

use gander::metrics::{AggregateResult, HTTP_REQ_DURATION};
use gander::prelude::*;

// Paths used in load tests performed during these tests.
const INDEX_PATH: &str = "/";
const SLOW_PATH: &str = "/slow";
const ERROR_PATH: &str = "/error";

// Indexes to the above paths.
const INDEX_KEY: usize = 0;
const SLOW_KEY: usize = 1;
const ERROR_KEY: usize = 2;

// Load test configuration.
const WORKERS: &str = "4";
const ITERATIONS: &str = "5";
const EXPECT_REQUESTS: usize = 20;

// All tests in this file run against common endpoints.
fn setup_mock_server_endpoints(server: &MockServer) -> Vec<Mock> {
    vec![
        // First, set up INDEX_PATH, store in vector at INDEX_KEY.
        server.mock(|when, then| {
            when.method(GET).path(INDEX_PATH);
            then.status(200).body("ok");
        }),
        // Next, set up SLOW_PATH, store in vector at SLOW_KEY.
        server.mock(|when, then| {
            when.method(GET).path(SLOW_PATH);
            then.status(200).delay(Duration::from_millis(100));
        }),
        // Last, set up ERROR_PATH, store in vector at ERROR_KEY.
        server.mock(|when, then| {
            when.method(GET).path(ERROR_PATH);
            then.status(503);
        }),
    ]
}

#[test]
// Write a json summary and an html report, and confirm the summary round-trips.
#[serial]
fn test_summary_and_report_files() {
    let summary_file = "execute-summary.json";
    let report_file = "execute-report.html";
    common::cleanup_files(vec![summary_file, report_file]);

    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let configuration = common::build_configuration(
        &server,
        vec![
            "--workers",
            WORKERS,
            "--iterations",
            ITERATIONS,
            "--summary-file",
            summary_file,
            "--report-file",
            report_file,
            "--threshold",
            "http_req_duration:p(95)<5000",
        ],
    );
    let result = common::run_load_test(configuration);

    mock_endpoints[INDEX_KEY].assert_hits(EXPECT_REQUESTS);
    assert_eq!(result.total_requests(), EXPECT_REQUESTS);
    assert_eq!(result.success_rate(), Some(1.0));
    assert!(result.passed);

    let summary = std::fs::read_to_string(summary_file).unwrap();
    let parsed: RunResult = serde_json::from_str(&summary).unwrap();
    assert_eq!(parsed.total_requests(), result.total_requests());
    assert_eq!(parsed.seed, result.seed);
    match (parsed.latency(), result.latency()) {
        (
            Some(AggregateResult::Trend { mean: a, .. }),
            Some(AggregateResult::Trend { mean: b, .. }),
        ) => assert!((a - b).abs() < 1e-9),
        other => panic!("unexpected latency: {:?}", other),
    }
    assert_eq!(parsed, result);

    let report = std::fs::read_to_string(report_file).unwrap();
    assert!(report.starts_with("<!DOCTYPE html>"));
    assert!(report.contains("http_req_duration:p(95)&lt;5000"));
    assert!(report.contains("All thresholds passed."));

    common::cleanup_files(vec![summary_file, report_file]);
}

#[test]
// A markdown report is chosen by extension.
#[serial]
fn test_markdown_report() {
    let report_file = "execute-report.md";
    common::cleanup_files(vec![report_file]);

    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let configuration =
        common::build_configuration(&server, vec!["--report-file", report_file]);
    let result = common::run_load_test(configuration);

    mock_endpoints[INDEX_KEY].assert_hits(1);
    assert_eq!(result.total_requests(), 1);

    let report = std::fs::read_to_string(report_file).unwrap();
    assert!(report.contains("# Gander Run Report"));
    assert!(report.contains("## Response Time Metrics"));

    common::cleanup_files(vec![report_file]);
}

#[test]
// Non-2xx responses and slow responses are failures, and fail the thresholds.
fn test_failures_and_thresholds() {
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let error_url = server.url(ERROR_PATH);
    let slow_url = server.url(SLOW_PATH);
    let configuration = common::build_configuration(
        &server,
        vec![
            "--endpoint",
            &error_url,
            "--endpoint",
            &slow_url,
            "--workers",
            "2",
            "--iterations",
            "4",
            "--success-threshold",
            "50",
            "--seed",
            "99",
            "--threshold",
            "success_rate:rate>0.5",
            "--threshold",
            "http_reqs:count==8",
        ],
    );
    let result = common::run_load_test(configuration);

    let error_hits = mock_endpoints[ERROR_KEY].hits();
    let slow_hits = mock_endpoints[SLOW_KEY].hits();
    assert_eq!(error_hits + slow_hits, 8);
    mock_endpoints[INDEX_KEY].assert_hits(0);

    assert_eq!(result.total_requests(), 8);
    assert_eq!(result.error_count(), 8);
    assert_eq!(result.success_rate(), Some(0.0));
    assert_eq!(result.seed, 99);
    assert!(!result.passed);
    assert!(!result.thresholds[0].passed);
    assert!(result.thresholds[1].passed);
}

#[test]
// The same seed selects the same endpoints.
fn test_seed_is_reproducible() {
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let index_url = server.url(INDEX_PATH);
    let error_url = server.url(ERROR_PATH);
    let mut hits = Vec::new();
    for _ in 0..2 {
        let before = mock_endpoints[INDEX_KEY].hits();
        let configuration = common::build_configuration(
            &server,
            vec![
                "--endpoint",
                &index_url,
                "--endpoint",
                &error_url,
                "--workers",
                "3",
                "--iterations",
                "10",
                "--seed",
                "2024",
            ],
        );
        let result = common::run_load_test(configuration);
        assert_eq!(result.total_requests(), 30);
        hits.push(mock_endpoints[INDEX_KEY].hits() - before);
    }
    assert_eq!(hits[0], hits[1]);
}

#[test]
// Defaults set programmatically are used, and run-time options override them.
fn test_defaults() {
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let configuration = common::build_configuration(&server, vec!["--iterations", "3"]);
    let result = GanderAttack::initialize_with_config(configuration)
        .unwrap()
        .set_default(GanderDefault::Workers, 5)
        .unwrap()
        .set_default(GanderDefault::Iterations, 10)
        .unwrap()
        .set_default(GanderDefault::NoPrintMetrics, true)
        .unwrap()
        .set_default(GanderDefault::Threshold, "http_reqs:count==3")
        .unwrap()
        .execute()
        .unwrap();

    // --workers is set by build_configuration, --iterations overrides the default.
    assert_eq!(result.virtual_workers, 1);
    assert_eq!(result.iterations_per_worker, 3);
    mock_endpoints[INDEX_KEY].assert_hits(3);
    assert_eq!(result.thresholds.len(), 1);
    assert!(result.passed);
}

#[test]
// Every request is written to the request log.
#[serial]
fn test_request_log() {
    let request_log = "execute-requests.csv";
    common::cleanup_files(vec![request_log]);

    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let configuration = common::build_configuration(
        &server,
        vec![
            "--workers",
            WORKERS,
            "--iterations",
            ITERATIONS,
            "--request-log",
            request_log,
            "--request-format",
            "csv",
        ],
    );
    let result = common::run_load_test(configuration);

    mock_endpoints[INDEX_KEY].assert_hits(EXPECT_REQUESTS);
    assert_eq!(result.total_requests(), EXPECT_REQUESTS);
    // Header plus one row per request.
    assert_eq!(common::file_length(request_log), EXPECT_REQUESTS + 1);

    common::cleanup_files(vec![request_log]);
}

#[test]
// Requests that outlive --timeout fail without stopping the run.
fn test_request_timeout() {
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let slow_url = server.url(SLOW_PATH);
    let configuration = common::build_configuration(
        &server,
        vec!["--endpoint", &slow_url, "--iterations", "2"],
    );
    // --timeout is in whole seconds, so bring a client with a shorter one.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(20))
        .build()
        .unwrap();
    let result = GanderAttack::initialize_with_config(configuration)
        .unwrap()
        .set_transport(std::sync::Arc::new(ReqwestTransport::with_client(client)))
        .execute()
        .unwrap();

    assert!(mock_endpoints[SLOW_KEY].hits() <= 2);
    assert_eq!(result.total_requests(), 2);
    assert_eq!(result.error_count(), 2);
    match result.metrics.get(HTTP_REQ_DURATION) {
        Some(AggregateResult::Trend { max, .. }) => assert_eq!(*max, 0.0),
        other => panic!("unexpected {}: {:?}", HTTP_REQ_DURATION, other),
    }
}

#[test]
// An invalid configuration fails before any request is made.
fn test_invalid_configuration() {
    let server = MockServer::start();
    let mock_endpoints = setup_mock_server_endpoints(&server);

    let configuration = common::build_configuration(&server, vec!["--workers", "0"]);
    let result = GanderAttack::initialize_with_config(configuration)
        .unwrap()
        .execute();
    assert!(matches!(result, Err(GanderError::InvalidOption { .. })));
    mock_endpoints[INDEX_KEY].assert_hits(0);
}
