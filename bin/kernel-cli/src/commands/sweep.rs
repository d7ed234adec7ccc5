// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kernels sweep` command: every case for every worker count.
//!
//! One seed drives all runs, so every team size sees the same inputs and any
//! mismatch points at a partitioning bug rather than at the data.

use harness::{builtin_cases, find_case, run_case, CaseReport, Cluster, ExecMode, Target};

pub async fn execute(
    threads: Vec<usize>,
    mode: String,
    seed: u64,
    cases: Vec<String>,
) -> anyhow::Result<()> {
    if threads.is_empty() {
        anyhow::bail!("--threads needs at least one worker count");
    }
    let mode: ExecMode = mode.parse()?;
    let clusters = threads
        .iter()
        .map(|&n| Cluster::new(n, mode))
        .collect::<Result<Vec<_>, _>>()?;
    let cases = if cases.is_empty() {
        builtin_cases()
    } else {
        cases.iter().map(|n| find_case(n)).collect::<Result<Vec<_>, _>>()?
    };

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            kernels · Thread Sweep                   ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Workers: {threads:?} ({mode})");
    println!("  Cases:   {}", cases.len());
    println!();

    let mut tasks = Vec::with_capacity(cases.len() * clusters.len());
    for case in &cases {
        for &cluster in &clusters {
            let case = case.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                run_case(case.as_ref(), Target::Generic, &cluster, seed, true)
            }));
        }
    }

    tracing::info!(runs = tasks.len(), "sweep started");
    let mut reports: Vec<CaseReport> = Vec::with_capacity(tasks.len());
    for task in tasks {
        reports.push(task.await??);
    }

    // ── Results Table ──────────────────────────────────────────
    print!("  {:<22}", "Case");
    for n in &threads {
        print!(" {:>8}", format!("x{n}"));
    }
    println!();
    println!("  {}", "-".repeat(22 + 9 * threads.len()));

    for row in reports.chunks(clusters.len()) {
        print!("  {:<22}", row[0].case);
        for report in row {
            let cell = if report.passed() {
                "ok".to_string()
            } else {
                format!("{} err", report.outcome.errors)
            };
            print!(" {cell:>8}");
        }
        println!();
    }
    println!();

    let failed: Vec<&CaseReport> = reports.iter().filter(|r| !r.passed()).collect();
    if !failed.is_empty() {
        for report in &failed {
            println!("  {}", report.summary());
        }
        anyhow::bail!("{} of {} runs mismatched", failed.len(), reports.len());
    }
    println!("  All {} runs match their golden outputs.", reports.len());
    Ok(())
}
