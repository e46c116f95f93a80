use gumdrop::Options;
use httpmock::MockServer;
use std::io::{self, BufRead};

use gander::config::GanderConfiguration;
use gander::metrics::RunResult;
use gander::GanderAttack;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --endpoint <mock-server>/
///  --workers 1
///  --iterations 1
///  --no-print-metrics
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> GanderConfiguration {
    // Start with an empty configuration.
    let mut configuration: Vec<&str> = vec![];
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.url("/");

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    // Default to using mock server if not otherwise configured.
    if !configuration.contains(&"--endpoint") {
        configuration.extend_from_slice(&["--endpoint", &server_url]);
    }

    // Default to testing with 1 worker if not otherwise configured.
    if !configuration.contains(&"--workers") {
        configuration.extend_from_slice(&["--workers", "1"]);
    }

    // Default to 1 iteration per worker if not otherwise configured.
    if !configuration.contains(&"--iterations") {
        configuration.extend_from_slice(&["--iterations", "1"]);
    }

    // Tests inspect the RunResult instead.
    if !configuration.contains(&"--no-print-metrics") {
        configuration.push("--no-print-metrics");
    }

    // Parse these options to generate a GanderConfiguration.
    GanderConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Run the actual load test, returning the RunResult.
#[allow(dead_code)]
pub fn run_load_test(configuration: GanderConfiguration) -> RunResult {
    GanderAttack::initialize_with_config(configuration)
        .unwrap()
        .execute()
        .unwrap()
}

/// Helper to count the number of lines in a test artifact.
#[allow(dead_code)]
pub fn file_length(file_name: &str) -> usize {
    if let Ok(file) = std::fs::File::open(std::path::Path::new(file_name)) {
        io::BufReader::new(file).lines().count()
    } else {
        0
    }
}

/// Helper to delete test artifacts, if existing.
#[allow(dead_code)]
pub fn cleanup_files(files: Vec<&str>) {
    for file in files {
        if std::path::Path::new(file).exists() {
            std::fs::remove_file(file).expect("failed to remove file");
        }
    }
}
