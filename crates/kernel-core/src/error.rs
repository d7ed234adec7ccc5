// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel parameter construction.
//!
//! Kernels themselves are infallible. Errors can only arise while building
//! the descriptors that are handed to them (partitions, shapes, quantization
//! parameter sets).

/// Errors that can occur while constructing kernel parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// The worker index is outside `[0, num_threads)` or `num_threads` is zero.
    #[error("invalid work partition: core {core_id} of {num_threads} workers")]
    InvalidPartition { core_id: usize, num_threads: usize },

    /// A shape descriptor does not describe a valid geometry.
    #[error("invalid shape for {op}: {detail}")]
    InvalidShape { op: &'static str, detail: String },

    /// Per-channel quantization vectors have inconsistent lengths.
    #[error("quantization parameter mismatch: mul has {mul} entries, add has {add}")]
    QuantParamMismatch { mul: usize, add: usize },

    /// The requested output clamp range is empty.
    #[error("empty output range [{min}, {max}]")]
    EmptyOutputRange { min: i32, max: i32 },
}
