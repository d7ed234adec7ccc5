// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Static work partitioning across cooperating workers.
//!
//! Every multi-worker kernel receives a [`WorkPartition`] and derives its
//! slice of the outer loop from it and the shape parameters alone. Nothing
//! is shared between workers: the caller guarantees that all workers see the
//! same shapes and that the `core_id`s form `{0, ..., num_threads - 1}`.
//!
//! Two schedules exist:
//!
//! | Schedule | Worker `c` of `n` visits |
//! |---|---|
//! | [`Schedule::Strided`] | `c, c + n, c + 2n, ...` |
//! | [`Schedule::Block`] | `[min(c * chunk, len), min(c * chunk + chunk, len))`, `chunk = ceil(len / n)` |

use crate::KernelError;
use std::iter::StepBy;
use std::ops::Range;

/// Identifies one worker's share of a kernel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct WorkPartition {
    core_id: usize,
    num_threads: usize,
}

impl WorkPartition {
    /// Creates a partition for worker `core_id` out of `num_threads`.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidPartition`] if `num_threads == 0` or
    /// `core_id >= num_threads`.
    pub fn new(core_id: usize, num_threads: usize) -> Result<Self, KernelError> {
        if num_threads == 0 || core_id >= num_threads {
            return Err(KernelError::InvalidPartition {
                core_id,
                num_threads,
            });
        }
        Ok(Self {
            core_id,
            num_threads,
        })
    }

    /// The whole range handled by a single worker.
    pub const fn single() -> Self {
        Self {
            core_id: 0,
            num_threads: 1,
        }
    }

    /// Iterates over every worker of an `num_threads`-wide team.
    pub fn team(num_threads: usize) -> impl Iterator<Item = WorkPartition> {
        (0..num_threads).map(move |core_id| WorkPartition {
            core_id,
            num_threads,
        })
    }

    pub fn core_id(&self) -> usize {
        self.core_id
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// `true` for the worker that runs single-core sections.
    pub fn is_leader(&self) -> bool {
        self.core_id == 0
    }

    /// Indices `core_id, core_id + num_threads, ...` below `len`.
    pub fn strided(&self, len: usize) -> StepBy<Range<usize>> {
        (self.core_id.min(len)..len).step_by(self.num_threads)
    }

    /// The contiguous block of `[0, len)` owned by this worker.
    pub fn block(&self, len: usize) -> Range<usize> {
        let chunk = len.div_ceil(self.num_threads);
        let start = (chunk * self.core_id).min(len);
        let end = (start + chunk).min(len);
        start..end
    }

    /// Indices owned under the given schedule.
    pub fn owned(&self, schedule: Schedule, len: usize) -> OwnedIndices {
        match schedule {
            Schedule::Strided => OwnedIndices::Strided(self.strided(len)),
            Schedule::Block => OwnedIndices::Block(self.block(len)),
        }
    }
}

impl Default for WorkPartition {
    fn default() -> Self {
        Self::single()
    }
}

/// How an outer loop is divided between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Round-robin over single indices.
    Strided,
    /// One contiguous chunk per worker.
    Block,
}

/// Iterator over the indices a worker owns.
#[derive(Debug, Clone)]
pub enum OwnedIndices {
    Strided(StepBy<Range<usize>>),
    Block(Range<usize>),
}

impl Iterator for OwnedIndices {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            OwnedIndices::Strided(it) => it.next(),
            OwnedIndices::Block(it) => it.next(),
        }
    }
}
