// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernel-core
//!
//! Fixed-point and floating-point neural-network kernels for multi-core
//! microcontroller clusters.
//!
//! This crate provides:
//! - [`WorkPartition`]: the `(core_id, num_threads)` pair every kernel is
//!   parameterized over, with the strided and block index schedules.
//! - [`Requant`] and [`QuantScale`]: the shared requantization step
//!   (`((x + in_off) * mul + add + bias) >> log2d + out_off`, saturated).
//! - [`GemmShape`], [`ConvShape`]: explicit shape descriptors for flat buffers.
//! - Kernels: RequantShift, MatMul/GEMM, convolution, pooling, Layernorm,
//!   RMSNorm, GELU, Hardswish, softmax (float, polynomial and ITA), Pow,
//!   Sqrt and Div.
//!
//! # Design Goals
//! - Kernels are pure functions over slices: no allocation, no locking, no
//!   logging. Scratch memory is supplied by the caller.
//! - Running one call per worker for every `core_id` in `0..num_threads`
//!   writes each output element exactly once, and the merged result is
//!   identical for every `num_threads`.
//! - Integer arithmetic wraps like the 32-bit target cores; the final
//!   narrowing saturates.

pub mod arith;
mod dtype;
mod error;
mod ops;
mod partition;
mod quant;
mod shape;

pub use dtype::DType;
pub use error::KernelError;
pub use ops::*;
pub use partition::{OwnedIndices, Schedule, WorkPartition};
pub use quant::{QuantScale, Requant};
pub use shape::{ConvShape, GemmShape, Padding};
