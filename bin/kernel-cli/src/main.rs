// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernels
//!
//! Command-line runner for the kernel-core test harness.
//!
//! ## Usage
//! ```bash
//! # Run every case on an emulated PULP cluster
//! kernels run --target pulp --mode threaded
//!
//! # Run selected cases from a config file, JSON report on stdout
//! kernels --config harness.toml run --json
//!
//! # Check multi-core equivalence across team sizes
//! kernels sweep --threads 1,2,3,4,7,8
//!
//! # List registered cases and target profiles
//! kernels list
//! kernels targets
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kernels",
    about = "Multi-worker test harness for quantized neural-network kernels",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (overrides CLI arguments).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run kernel cases on an emulated cluster and compare against golden outputs.
    Run {
        /// Target profile: generic, pulp, snitch, mempool, gap9, qemu-arm.
        #[arg(short, long, default_value = "generic")]
        target: String,

        /// Worker count (defaults to the target's core count).
        #[arg(short = 'n', long)]
        threads: Option<usize>,

        /// Execution mode: sequential or threaded.
        #[arg(short, long, default_value = "sequential")]
        mode: String,

        /// Seed for the random test inputs.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// Comma-separated case names (default: all cases).
        #[arg(long, value_delimiter = ',')]
        cases: Vec<String>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run every case for several worker counts and fail on any mismatch.
    Sweep {
        /// Comma-separated worker counts.
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,7,8")]
        threads: Vec<usize>,

        /// Execution mode: sequential or threaded.
        #[arg(short, long, default_value = "threaded")]
        mode: String,

        /// Seed for the random test inputs.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// Comma-separated case names (default: all cases).
        #[arg(long, value_delimiter = ',')]
        cases: Vec<String>,
    },

    /// List the registered kernel cases.
    List,

    /// List the target profiles and their default core counts.
    Targets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            target,
            threads,
            mode,
            seed,
            cases,
            json,
        } => {
            let config = match cli.config {
                Some(path) => harness::HarnessConfig::from_file(&path)?,
                None => harness::HarnessConfig {
                    target,
                    num_threads: threads,
                    mode,
                    seed,
                    cases,
                    enable_timing: true,
                },
            };
            commands::run::execute(config, json).await
        }
        Commands::Sweep {
            threads,
            mode,
            seed,
            cases,
        } => commands::sweep::execute(threads, mode, seed, cases).await,
        Commands::List => commands::list::cases(),
        Commands::Targets => commands::list::targets(),
    }
}
