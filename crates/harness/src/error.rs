// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the kernel test harness.

/// Errors that can occur while configuring or running harness cases.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The configured target profile does not exist.
    #[error("unknown target '{0}'; expected generic, pulp, snitch, mempool, gap9 or qemu-arm")]
    UnknownTarget(String),

    /// The configured execution mode does not exist.
    #[error("unknown mode '{0}'; expected 'sequential' or 'threaded'")]
    UnknownMode(String),

    /// A requested case is not registered.
    #[error("unknown case '{0}'")]
    UnknownCase(String),

    /// A worker thread panicked while running its share of a kernel.
    #[error("worker {core_id} of {num_threads} panicked")]
    WorkerPanicked { core_id: usize, num_threads: usize },

    /// Kernel parameters were rejected at construction.
    #[error("kernel parameter error: {0}")]
    Kernel(#[from] kernel_core::KernelError),
}
