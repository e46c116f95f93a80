//! Renders a [`RunResult`] as a structured document and as a human readable report.
//!
//! The structured form is pretty printed JSON of the whole result, and deserializes
//! back into an equal [`RunResult`]. The human form is an HTML page filled in from
//! [`TEMPLATE`], or the same content as Markdown.

mod common;
mod markdown;

use std::path::Path;

use crate::metrics::{RunResult, SUCCESS_RATE_CUE};
use crate::util::{format_float, format_number};
use crate::GanderError;
use common::{escape_html, prepare_data, OrEmpty, ReportData};

/// Both renderings of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReport {
    /// Pretty printed JSON of the full [`RunResult`].
    pub structured: String,
    /// HTML report.
    pub human: String,
}

/// Report formats, chosen by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Markdown,
    Json,
}
impl ReportFormat {
    /// Determine the format from the extension of `path`.
    pub fn from_path(path: &str) -> Result<ReportFormat, GanderError> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("html") | Some("htm") => Ok(ReportFormat::Html),
            Some("md") => Ok(ReportFormat::Markdown),
            Some("json") => Ok(ReportFormat::Json),
            _ => Err(GanderError::InvalidOption {
                option: "`configuration.report_file`".to_string(),
                value: path.to_string(),
                detail: "`configuration.report_file` must end in .html, .htm, .md or .json."
                    .to_string(),
            }),
        }
    }
}

/// Render `result` both as JSON and as HTML.
pub fn render(result: &RunResult) -> Result<RenderedReport, GanderError> {
    Ok(RenderedReport {
        structured: serde_json::to_string_pretty(result)?,
        human: render_html(prepare_data(result)),
    })
}

/// Render `result` as a Markdown report.
pub fn render_markdown(result: &RunResult) -> Result<String, GanderError> {
    let mut buffer = Vec::new();
    markdown::write_markdown_report(&mut buffer, prepare_data(result))?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write a report for `result` to `path`, formatted by its extension.
pub fn write_report_file(path: &str, result: &RunResult) -> Result<(), GanderError> {
    let contents = match ReportFormat::from_path(path)? {
        ReportFormat::Html => render_html(prepare_data(result)),
        ReportFormat::Markdown => render_markdown(result)?,
        ReportFormat::Json => serde_json::to_string_pretty(result)?,
    };
    std::fs::write(path, contents)?;
    Ok(())
}

fn render_html(data: ReportData) -> String {
    let mut endpoints = String::new();
    for endpoint in data.endpoints {
        endpoints.push_str(&format!("<li>{}</li>", escape_html(endpoint)));
    }

    let mut thresholds = String::new();
    if !data.thresholds.is_empty() {
        thresholds.push_str(THRESHOLDS_HEADER);
        for outcome in data.thresholds {
            thresholds.push_str(&format!(
                r#"
                    <tr>
                        <td>{}</td>
                        <td>{:.2}</td>
                        <td class="{}">{}</td>
                        <td>{}</td>
                    </tr>"#,
                escape_html(&outcome.source),
                OrEmpty(outcome.observed),
                if outcome.passed { "pass" } else { "fail" },
                if outcome.passed { "PASS" } else { "FAIL" },
                escape_html(&outcome.reason),
            ));
        }
        thresholds.push_str(&format!(
            r#"
                </tbody>
            </table>
            <p class="{}">{}</p>
        </div>"#,
            if data.passed { "pass" } else { "fail" },
            if data.passed {
                "All thresholds passed."
            } else {
                "One or more thresholds failed."
            }
        ));
    }

    let latency = &data.latency;
    fill_template(
        TEMPLATE,
        &[
            ("started", escape_html(&data.started)),
            (
                "duration",
                format!(
                    "{:.3}s{}",
                    data.duration,
                    if data.aborted {
                        " (stopped by max duration)"
                    } else {
                        ""
                    }
                ),
            ),
            ("endpoints", endpoints),
            ("workers", format_number(data.virtual_workers)),
            ("max_concurrency", format_number(data.max_concurrency)),
            ("total_requests", format_number(data.total_requests)),
            ("count", format_number(latency.count)),
            ("min", format_float(latency.min)),
            ("max", format_float(latency.max)),
            ("mean", format_float(latency.mean)),
            ("median", format_float(latency.median)),
            ("p90", format_float(latency.p90)),
            ("p95", format_float(latency.p95)),
            ("p99", format_float(latency.p99)),
            ("throughput", format!("{:.2}", data.throughput)),
            ("success_rate", format!("{:.2}%", data.success_rate * 100.0)),
            (
                "success_class",
                if data.success_passed { "pass" } else { "fail" }.to_string(),
            ),
            (
                "success_cue",
                format!(
                    "{} (target {:.0}%)",
                    if data.success_passed { "PASS" } else { "FAIL" },
                    SUCCESS_RATE_CUE * 100.0
                ),
            ),
            ("errors", format_number(data.errors)),
            ("thresholds", thresholds),
        ],
    )
}

// Replace each `{{ key }}` in the template.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut html = template.to_string();
    for (key, value) in values {
        html = html.replace(&format!("{{{{ {} }}}}", key), value);
    }
    html
}

const THRESHOLDS_HEADER: &str = r#"
        <div class="thresholds">
            <h2>Thresholds</h2>
            <table>
                <thead>
                    <tr>
                        <th>Threshold</th>
                        <th>Observed</th>
                        <th>Result</th>
                        <th>Reason</th>
                    </tr>
                </thead>
                <tbody>"#;

/// Default template used to generate an HTML report.
pub const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Gander Run Report</title>
    <style>
        .container {
            width: 1000px;
            margin: 0 auto;
            padding: 10px;
            background: #173529;
            font-family: Arial, Helvetica, sans-serif;
            font-size: 14px;
            color: #fff;
        }

        .info span{
            color: #b3c3bc;
        }

        table {
            border-collapse: collapse;
            text-align: center;
            width: 100%;
        }

        td, th {
            border: 1px solid #cad9ea;
            color: #666;
            height: 30px;
        }

        thead th {
            background-color: #cce8eb;
            width: 100px;
        }

        tr:nth-child(odd) {
            background: #fff;
        }

        tr:nth-child(even) {
            background: #f5fafa;
        }

        .pass {
            color: #00ca5a;
            font-weight: bold;
        }

        .fail {
            color: #e0464e;
            font-weight: bold;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Gander Run Report</h1>

        <div class="info">
            <p>Started: <span>{{ started }}</span></p>
            <p>Duration: <span>{{ duration }}</span></p>
            <p>Endpoints:</p>
            <ul>{{ endpoints }}</ul>
        </div>

        <div class="overview">
            <h2>Overview</h2>
            <table>
                <thead>
                    <tr>
                        <th>Workers</th>
                        <th>Max Concurrency</th>
                        <th># Requests</th>
                        <th>RPS</th>
                        <th>Success Rate</th>
                        <th># Errors</th>
                    </tr>
                </thead>
                <tbody>
                    <tr>
                        <td>{{ workers }}</td>
                        <td>{{ max_concurrency }}</td>
                        <td>{{ total_requests }}</td>
                        <td>{{ throughput }}</td>
                        <td class="{{ success_class }}">{{ success_rate }} {{ success_cue }}</td>
                        <td>{{ errors }}</td>
                    </tr>
                </tbody>
            </table>
        </div>

        <div class="latency">
            <h2>Response Time Metrics</h2>
            <table>
                <thead>
                    <tr>
                        <th>Count</th>
                        <th>Min (ms)</th>
                        <th>Max (ms)</th>
                        <th>Average (ms)</th>
                        <th>Median (ms)</th>
                        <th>p(90) (ms)</th>
                        <th>p(95) (ms)</th>
                        <th>p(99) (ms)</th>
                    </tr>
                </thead>
                <tbody>
                    <tr>
                        <td>{{ count }}</td>
                        <td>{{ min }}</td>
                        <td>{{ max }}</td>
                        <td>{{ mean }}</td>
                        <td>{{ median }}</td>
                        <td>{{ p90 }}</td>
                        <td>{{ p95 }}</td>
                        <td>{{ p99 }}</td>
                    </tr>
                </tbody>
            </table>
            <p>Requests that failed without a response are included as 0 ms.</p>
        </div>
{{ thresholds }}
    </div>
</body>
</html>"#;
