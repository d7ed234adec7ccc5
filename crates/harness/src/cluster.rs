// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A simulated worker cluster.
//!
//! The kernels expect an external runtime to have started `num_threads`
//! workers and to call each kernel once per worker. [`Cluster`] plays that
//! role on the host:
//!
//! - [`ExecMode::Sequential`] runs the workers one after another, in
//!   `core_id` order, on the shared output buffer.
//! - [`ExecMode::Threaded`] runs every worker on its own scoped thread
//!   against a private copy of the output and merges back each element the
//!   worker changed. Disjoint partitions make the merge order irrelevant.

use crate::HarnessError;
use kernel_core::{KernelError, WorkPartition};
use std::fmt;
use std::str::FromStr;

/// How a [`Cluster`] executes its workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    Sequential,
    Threaded,
}

impl ExecMode {
    pub fn name(self) -> &'static str {
        match self {
            ExecMode::Sequential => "sequential",
            ExecMode::Threaded => "threaded",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Ok(ExecMode::Sequential),
            "threaded" | "threads" => Ok(ExecMode::Threaded),
            _ => Err(HarnessError::UnknownMode(s.to_string())),
        }
    }
}

/// `true` when `a` and `b` hold different values; two NaNs count as equal.
#[inline]
fn differs<T: PartialEq>(a: &T, b: &T) -> bool {
    #[allow(clippy::eq_op)]
    let both_unordered = a != a && b != b;
    a != b && !both_unordered
}

/// A team of `num_threads` workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    num_threads: usize,
    mode: ExecMode,
}

impl Cluster {
    /// Creates a cluster.
    ///
    /// # Errors
    /// Returns [`HarnessError::Kernel`] if `num_threads` is zero.
    pub fn new(num_threads: usize, mode: ExecMode) -> Result<Self, HarnessError> {
        if num_threads == 0 {
            return Err(KernelError::InvalidPartition {
                core_id: 0,
                num_threads,
            }
            .into());
        }
        Ok(Self { num_threads, mode })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Runs `kernel` once per worker against `output`.
    ///
    /// `kernel` receives the worker's partition and the buffer to write. It
    /// must write only the elements its partition owns; anything it writes
    /// outside them is lost in threaded mode and visible in sequential mode.
    /// Per-worker scratch memory is allocated inside `kernel`.
    ///
    /// # Errors
    /// Returns [`HarnessError::WorkerPanicked`] if a threaded worker panics.
    pub fn run<T, F>(&self, output: &mut [T], kernel: F) -> Result<(), HarnessError>
    where
        T: Copy + PartialEq + Send + Sync,
        F: Fn(WorkPartition, &mut [T]) + Sync,
    {
        match self.mode {
            ExecMode::Sequential => {
                for part in WorkPartition::team(self.num_threads) {
                    tracing::trace!(core_id = part.core_id(), "running worker");
                    kernel(part, output);
                }
                Ok(())
            }
            ExecMode::Threaded => self.run_threaded(output, &kernel),
        }
    }

    fn run_threaded<T, F>(&self, output: &mut [T], kernel: &F) -> Result<(), HarnessError>
    where
        T: Copy + PartialEq + Send + Sync,
        F: Fn(WorkPartition, &mut [T]) + Sync,
    {
        let baseline: &[T] = output;
        let results: Vec<Result<Vec<T>, usize>> = std::thread::scope(|s| {
            let handles: Vec<_> = WorkPartition::team(self.num_threads)
                .map(|part| {
                    let handle = s.spawn(move || {
                        let mut local = baseline.to_vec();
                        kernel(part, &mut local);
                        local
                    });
                    (part.core_id(), handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(core_id, h)| h.join().map_err(|_| core_id))
                .collect()
        });

        let mut merged = baseline.to_vec();
        for result in results {
            let local = result.map_err(|core_id| HarnessError::WorkerPanicked {
                core_id,
                num_threads: self.num_threads,
            })?;
            let mut written = 0usize;
            for ((dst, new), old) in merged.iter_mut().zip(&local).zip(baseline) {
                if differs(new, old) {
                    *dst = *new;
                    written += 1;
                }
            }
            tracing::trace!(written, "merged worker output");
        }
        output.copy_from_slice(&merged);
        Ok(())
    }
}
