// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kernels run` command: run the selected cases on one cluster configuration.

use harness::{Harness, HarnessConfig};

pub async fn execute(config: HarnessConfig, json: bool) -> anyhow::Result<()> {
    let harness = Harness::from_config(&config)?;
    let cluster = *harness.cluster();

    // Cases are CPU-bound; keep them off the async workers.
    let summary = tokio::task::spawn_blocking(move || harness.run()).await??;

    if json {
        println!("{}", summary.to_json()?);
    } else {
        println!("╔══════════════════════════════════════════════════════╗");
        println!("║            kernels · Harness Run                    ║");
        println!("╚══════════════════════════════════════════════════════╝");
        println!();
        println!("  Target:  {}", config.target);
        println!("  Workers: {} ({})", cluster.num_threads(), cluster.mode());
        println!("  Seed:    {}", config.seed);
        println!();
        for report in &summary.reports {
            println!("  {}", report.summary());
        }
        println!();
        println!("  {}", summary.summary());
        println!();
    }

    if !summary.all_passed() {
        anyhow::bail!(
            "{} case(s) failed with {} mismatching elements",
            summary.failed().count(),
            summary.total_errors()
        );
    }
    Ok(())
}
