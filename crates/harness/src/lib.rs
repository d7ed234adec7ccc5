// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # harness
//!
//! Host-side test harness for the `kernel-core` kernels.
//!
//! The kernels leave worker management to the platform runtime. The harness
//! stands in for it:
//! - [`Target`] profiles give the worker count of each platform.
//! - [`Cluster`] runs one kernel call per worker, sequentially or on scoped
//!   threads.
//! - [`KernelCase`]s generate seeded inputs, compute golden results and
//!   count mismatching outputs.
//! - [`Harness`] resolves a [`HarnessConfig`] and produces a [`RunSummary`].

mod cases;
mod cluster;
mod config;
mod error;
mod metrics;
mod runner;
mod target;

pub use cases::{builtin_cases, find_case, KernelCase};
pub use cluster::{Cluster, ExecMode};
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use metrics::{CaseOutcome, CaseReport, RunSummary};
pub use runner::{run_case, Harness};
pub use target::Target;
