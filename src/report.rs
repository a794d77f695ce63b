//! Human-readable run reports
//!
//! `Display` impls for [`MetricsReport`] and [`VerificationReport`], plus
//! [`append_report`] which appends a titled, timestamped section to a report
//! file so repeated runs accumulate in one place.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;

use crate::metrics::MetricsReport;
use crate::verifier::VerificationReport;

const RULE_WIDTH: usize = 66;

fn ms(duration: Duration) -> String {
    format!("{:.3}ms", duration.as_secs_f64() * 1_000.0)
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "QUEUING SYSTEM ANALYSIS")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;

        writeln!(f, "\nSYSTEM OVERVIEW:")?;
        writeln!(f, "   Observation window:    {}", ms(self.window + self.wait))?;
        writeln!(f, "   Requests submitted:    {}", self.requests)?;
        writeln!(f, "   Requests succeeded:    {}", self.successes)?;
        writeln!(f, "   Requests failed:       {}", self.failures)?;
        writeln!(f, "   System status:         {}", self.load())?;

        writeln!(f, "\nPERFORMANCE METRICS:")?;
        writeln!(f, "   Min response time:     {}", ms(self.latencies.min))?;
        writeln!(f, "   Mean response time:    {}", ms(self.latencies.mean))?;
        writeln!(f, "   50th percentile:       {}", ms(self.latencies.p50))?;
        writeln!(f, "   95th percentile:       {}", ms(self.latencies.p95))?;
        writeln!(f, "   99th percentile:       {}", ms(self.latencies.p99))?;
        writeln!(f, "   Max response time:     {}", ms(self.latencies.max))?;
        writeln!(f, "   Success rate:          {:.2}%", self.success_ratio * 100.0)?;

        if !self.status_codes.is_empty() {
            let codes = self
                .status_codes
                .iter()
                .map(|(code, count)| format!("{code}:{count}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "   Status codes:          {codes}")?;
        }

        writeln!(f, "\nQUEUING ANALYSIS:")?;
        writeln!(f, "   Arrival rate (λ):      {:.2} requests/sec", self.arrival_rate)?;
        writeln!(f, "   Service rate (μ):      {:.2} requests/sec", self.throughput)?;
        writeln!(f, "   Traffic intensity (ρ): {:.3}", self.traffic_intensity)?;

        writeln!(f, "\nASSESSMENT:")?;
        writeln!(f, "   Response time:         {}", self.response_time())?;
        writeln!(f, "   System health:         {}", self.load().health())?;

        if !self.errors.is_empty() {
            writeln!(f, "\nERRORS:")?;
            for (error, count) in &self.errors {
                writeln!(f, "   {count:>6}  {error}")?;
            }
        }

        if self.success_ratio < 1.0 {
            writeln!(
                f,
                "\nWARNING: success rate is {:.2}%, some requests failed",
                self.success_ratio * 100.0
            )?;
        }
        if self.is_overloaded() {
            writeln!(f, "\nWARNING: system overloaded")?;
        }

        write!(f, "{}", "=".repeat(RULE_WIDTH))
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CONSISTENCY VERIFICATION")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;

        for check in &self.actors {
            match (check.actual, &check.error) {
                (Some(actual), _) if check.ok => {
                    writeln!(f, "   [ok]       {}: {}", check.name, actual)?;
                }
                (Some(actual), _) => {
                    writeln!(
                        f,
                        "   [mismatch] {}: expected {}, got {}",
                        check.name, check.expected, actual
                    )?;
                }
                (None, error) => {
                    writeln!(
                        f,
                        "   [error]    {}: expected {}, query failed: {}",
                        check.name,
                        check.expected,
                        error.as_deref().unwrap_or("unknown error")
                    )?;
                }
            }
        }

        writeln!(f, "\n   Total before:          {}", self.total_before)?;
        match self.total_after {
            Some(after) => writeln!(f, "   Total after:           {after}")?,
            None => writeln!(f, "   Total after:           unknown")?,
        }

        if self.conserved {
            writeln!(f, "   Money conserved")?;
        } else {
            match self.discrepancy() {
                Some(discrepancy) => {
                    writeln!(f, "   Money NOT conserved, discrepancy {discrepancy}")?
                }
                None => writeln!(f, "   Money conservation could not be checked")?,
            }
        }

        let verdict = if self.passed { "PASSED" } else { "FAILED" };
        writeln!(f, "   Verification {verdict}")?;
        write!(f, "{}", "=".repeat(RULE_WIDTH))
    }
}

/// Append `body` under a `==== <title> at <timestamp> ===` header
pub fn append_report(path: impl AsRef<Path>, title: &str, body: &str) -> Result<()> {
    let path = path.as_ref();

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open report file {}", path.display()))?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "==== {title} at {timestamp} ===")?;
    writeln!(file, "{body}")?;
    writeln!(file)?;

    Ok(())
}
