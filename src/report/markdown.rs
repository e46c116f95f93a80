use crate::{
    report::common::{OrEmpty, ReportData},
    util::format_number,
    GanderError,
};
use std::io::Write;

struct Markdown<'m, 'w, W: Write> {
    w: &'w mut W,
    data: ReportData<'m>,
}

pub(crate) fn write_markdown_report<W: Write>(
    w: &mut W,
    data: ReportData,
) -> Result<(), GanderError> {
    Markdown { w, data }.write()
}

impl<W: Write> Markdown<'_, '_, W> {
    pub fn write(mut self) -> Result<(), GanderError> {
        self.write_header()?;
        self.write_overview()?;
        self.write_latency()?;
        self.write_requests()?;
        self.write_thresholds()?;

        Ok(())
    }

    fn write_header(&mut self) -> Result<(), GanderError> {
        writeln!(
            self.w,
            r#"
# Gander Run Report
"#
        )?;

        Ok(())
    }

    fn write_overview(&mut self) -> Result<(), GanderError> {
        write!(
            self.w,
            r#"
## Overview

| Started | Duration (s) | Workers | Max Concurrency | # Requests |
| ------- | -----------: | ------: | --------------: | ---------: |
"#
        )?;

        writeln!(
            self.w,
            r#"| {started} | {duration:.3}{aborted} | {workers} | {max_concurrency} | {total_requests} |"#,
            started = self.data.started,
            duration = self.data.duration,
            aborted = if self.data.aborted { " (stopped)" } else { "" },
            workers = format_number(self.data.virtual_workers),
            max_concurrency = format_number(self.data.max_concurrency),
            total_requests = format_number(self.data.total_requests),
        )?;

        writeln!(self.w)?;
        for endpoint in self.data.endpoints {
            writeln!(self.w, "- `{endpoint}`")?;
        }

        Ok(())
    }

    fn write_latency(&mut self) -> Result<(), GanderError> {
        write!(
            self.w,
            r#"
## Response Time Metrics

| Min (ms) | Max (ms) | Average (ms) | Median (ms) | p(90) (ms) | p(95) (ms) | p(99) (ms) |
| -------: | -------: | -----------: | ----------: | ---------: | ---------: | ---------: |
"#
        )?;

        let latency = &self.data.latency;
        writeln!(
            self.w,
            r#"| {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |"#,
            latency.min,
            latency.max,
            latency.mean,
            latency.median,
            latency.p90,
            latency.p95,
            latency.p99,
        )?;
        writeln!(
            self.w,
            "\n_Requests that failed without a response are included as 0 ms._"
        )?;

        Ok(())
    }

    fn write_requests(&mut self) -> Result<(), GanderError> {
        write!(
            self.w,
            r#"
## Request Metrics

| RPS | Success Rate | Status | # Errors |
| --: | -----------: | ------ | -------: |
"#
        )?;

        writeln!(
            self.w,
            r#"| {throughput:.2} | {success_rate:.2}% | {status} | {errors} |"#,
            throughput = self.data.throughput,
            success_rate = self.data.success_rate * 100.0,
            status = if self.data.success_passed { "PASS" } else { "FAIL" },
            errors = format_number(self.data.errors),
        )?;

        Ok(())
    }

    fn write_thresholds(&mut self) -> Result<(), GanderError> {
        if self.data.thresholds.is_empty() {
            return Ok(());
        }

        write!(
            self.w,
            r#"
## Thresholds

| Threshold | Observed | Result | Reason |
| --------- | -------: | ------ | ------ |
"#
        )?;

        for outcome in self.data.thresholds {
            writeln!(
                self.w,
                r#"| `{source}` | {observed:.2} | {result} | {reason} |"#,
                source = outcome.source,
                observed = OrEmpty(outcome.observed),
                result = if outcome.passed { "PASS" } else { "FAIL" },
                reason = outcome.reason,
            )?;
        }

        writeln!(
            self.w,
            "\n**{}**",
            if self.data.passed {
                "All thresholds passed."
            } else {
                "One or more thresholds failed."
            }
        )?;

        Ok(())
    }
}
