// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-case results and run summaries.
//!
//! A case passes when none of its outputs differ from the golden
//! reference. Reports serialize to JSON for CI consumption.

use crate::{ExecMode, Target};
use std::time::Duration;

/// Mismatch count of one case run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CaseOutcome {
    /// Output elements that differ from the golden reference.
    pub errors: usize,
    /// Output elements compared.
    pub total: usize,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.errors == 0
    }

    /// Accumulates the counts of another comparison of the same case.
    pub fn merge(self, other: CaseOutcome) -> CaseOutcome {
        CaseOutcome {
            errors: self.errors + other.errors,
            total: self.total + other.total,
        }
    }
}

/// Result of running one case on one cluster configuration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CaseReport {
    pub case: String,
    pub target: Target,
    pub num_threads: usize,
    pub mode: ExecMode,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
    /// Wall-clock time of the cluster run, when timing is enabled.
    pub duration: Option<Duration>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }

    /// One line in the `Errors: x out of y` format of the target harnesses.
    pub fn summary(&self) -> String {
        let timing = self
            .duration
            .map(|d| format!(" in {:.3}ms", d.as_secs_f64() * 1000.0))
            .unwrap_or_default();
        format!(
            "[{}] {} ({} x{}, {}): Errors: {} out of {}{}",
            if self.passed() { "PASS" } else { "FAIL" },
            self.case,
            self.target,
            self.num_threads,
            self.mode,
            self.outcome.errors,
            self.outcome.total,
            timing,
        )
    }
}

/// Aggregate over every case of a run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunSummary {
    pub reports: Vec<CaseReport>,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn record(&mut self, report: CaseReport) {
        self.reports.push(report);
    }

    pub fn failed(&self) -> impl Iterator<Item = &CaseReport> {
        self.reports.iter().filter(|r| !r.passed())
    }

    pub fn all_passed(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn total_errors(&self) -> usize {
        self.reports.iter().map(|r| r.outcome.errors).sum()
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let failed = self.failed().count();
        format!(
            "{} cases, {} passed, {} failed, {} mismatching elements, {:.2}ms total",
            self.reports.len(),
            self.reports.len() - failed,
            failed,
            self.total_errors(),
            self.total_duration.as_secs_f64() * 1000.0,
        )
    }

    /// Serialises the summary as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(case: &str, errors: usize) -> CaseReport {
        CaseReport {
            case: case.into(),
            target: Target::Pulp,
            num_threads: 8,
            mode: ExecMode::Sequential,
            outcome: CaseOutcome { errors, total: 64 },
            duration: Some(Duration::from_millis(2)),
        }
    }

    #[test]
    fn test_outcome_merge() {
        let a = CaseOutcome { errors: 1, total: 10 };
        let b = CaseOutcome { errors: 0, total: 5 };
        assert_eq!(a.merge(b), CaseOutcome { errors: 1, total: 15 });
        assert!(!a.merge(b).passed());
    }

    #[test]
    fn test_summary_counts() {
        let mut s = RunSummary::default();
        s.record(report("matmul_s8", 0));
        s.record(report("ita_max", 3));
        s.total_duration = Duration::from_millis(5);

        assert!(!s.all_passed());
        assert_eq!(s.total_errors(), 3);
        assert_eq!(s.failed().count(), 1);
        assert!(s.summary().contains("2 cases, 1 passed, 1 failed"));
    }

    #[test]
    fn test_report_line() {
        let line = report("matmul_s8", 0).summary();
        assert!(line.starts_with("[PASS] matmul_s8 (pulp x8, sequential)"));
        assert!(line.contains("Errors: 0 out of 64"));
    }

    #[test]
    fn test_json_fields() {
        let mut s = RunSummary::default();
        s.record(report("gelu_s8", 2));
        let v: serde_json::Value = serde_json::from_str(&s.to_json().unwrap()).unwrap();
        let r = &v["reports"][0];
        assert_eq!(r["case"], "gelu_s8");
        assert_eq!(r["target"], "pulp");
        assert_eq!(r["mode"], "sequential");
        assert_eq!(r["errors"], 2);
        assert_eq!(r["total"], 64);
    }
}
