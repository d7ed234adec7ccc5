// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Drives the selected cases on a configured cluster.

use crate::{
    builtin_cases, find_case, CaseReport, Cluster, HarnessConfig, HarnessError, KernelCase,
    RunSummary, Target,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;

/// A resolved harness run: target, cluster, seed and case list.
pub struct Harness {
    target: Target,
    cluster: Cluster,
    seed: u64,
    enable_timing: bool,
    cases: Vec<Arc<dyn KernelCase>>,
}

impl Harness {
    /// Resolves every name in `config`.
    ///
    /// # Errors
    /// Returns the first unknown target, mode or case, or an invalid thread count.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let target = config.resolve_target()?;
        let cluster = config.cluster()?;
        let cases = if config.cases.is_empty() {
            builtin_cases()
        } else {
            config
                .cases
                .iter()
                .map(|name| find_case(name))
                .collect::<Result<Vec<_>, _>>()?
        };
        tracing::info!(
            "harness: target '{}', {} workers ({}), {} cases",
            target,
            cluster.num_threads(),
            cluster.mode(),
            cases.len()
        );
        Ok(Self {
            target,
            cluster,
            seed: config.seed,
            enable_timing: config.enable_timing,
            cases,
        })
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn cases(&self) -> &[Arc<dyn KernelCase>] {
        &self.cases
    }

    /// Runs every selected case in order.
    pub fn run(&self) -> Result<RunSummary, HarnessError> {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        for case in &self.cases {
            let report = run_case(
                case.as_ref(),
                self.target,
                &self.cluster,
                self.seed,
                self.enable_timing,
            )?;
            summary.record(report);
        }
        summary.total_duration = start.elapsed();
        tracing::info!("{}", summary.summary());
        Ok(summary)
    }
}

/// Runs one case with inputs drawn from `seed`.
///
/// The same seed reproduces the same inputs for any cluster, so reports for
/// different worker counts are directly comparable.
pub fn run_case(
    case: &dyn KernelCase,
    target: Target,
    cluster: &Cluster,
    seed: u64,
    enable_timing: bool,
) -> Result<CaseReport, HarnessError> {
    tracing::debug!(case = case.name(), workers = cluster.num_threads(), "case start");
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Instant::now();
    let outcome = case.run(cluster, &mut rng)?;
    let elapsed = start.elapsed();

    let report = CaseReport {
        case: case.name().to_string(),
        target,
        num_threads: cluster.num_threads(),
        mode: cluster.mode(),
        outcome,
        duration: enable_timing.then_some(elapsed),
    };
    if report.passed() {
        tracing::info!("{}", report.summary());
    } else {
        tracing::warn!("{}", report.summary());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_case_rejected() {
        let config = HarnessConfig {
            cases: vec!["matmul_s8".into(), "conv3d".into()],
            ..Default::default()
        };
        assert!(matches!(
            Harness::from_config(&config),
            Err(HarnessError::UnknownCase(n)) if n == "conv3d"
        ));
    }

    #[test]
    fn test_selected_cases_only() {
        let config = HarnessConfig {
            target: "gap9".into(),
            cases: vec!["ita_max".into(), "gelu_s8".into()],
            enable_timing: false,
            ..Default::default()
        };
        let harness = Harness::from_config(&config).unwrap();
        assert_eq!(harness.cluster().num_threads(), 8);
        let summary = harness.run().unwrap();
        assert_eq!(summary.reports.len(), 2);
        assert!(summary.all_passed());
        assert!(summary.reports.iter().all(|r| r.duration.is_none()));
    }
}
