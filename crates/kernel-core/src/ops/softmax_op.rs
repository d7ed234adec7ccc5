// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Row-wise softmax.
//!
//! The input is a sequence of independent rows of `last_dim` elements; rows
//! are split between workers in contiguous blocks.

use crate::arith::Saturate;
use crate::WorkPartition;

/// Numerically stable floating-point softmax:
/// `out[j] = exp(x[j] - max) / sum(exp(x - max))`.
pub fn softmax_f32(input: &[f32], output: &mut [f32], last_dim: usize, part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    if last_dim == 0 {
        return;
    }

    for row in part.block(input.len() / last_dim) {
        let offset = row * last_dim;
        let row_src = &input[offset..offset + last_dim];
        let row_dst = &mut output[offset..offset + last_dim];

        let max_val = row_src.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for (d, &s) in row_dst.iter_mut().zip(row_src) {
            let e = (s - max_val).exp();
            *d = e;
            sum += e;
        }

        if sum > 0.0 {
            let inv_sum = 1.0 / sum;
            for d in row_dst.iter_mut() {
                *d *= inv_sum;
            }
        }
    }
}

/// Coefficients of the second-order polynomial `exp` approximation used by
/// [`softmax_s8_s8`].
///
/// `exp(p) ~ a * (p + b)^2 + c` on the reduced range, with `log2` the
/// quantized value of `ln 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftmaxCoeffs {
    pub a: i32,
    pub b: i32,
    pub c: i64,
    /// Quantized `ln 2`; must be non-zero.
    pub log2: i32,
    pub n_levels: u32,
}

/// Integer softmax with a polynomial exponential.
///
/// For each row: `x~ = x - max`, `z = clamp(-(x~ / log2), 0, 31)`,
/// `p = x~ + z * log2`, `y = (a * (p + b)^2 + c) >> z`, and finally
/// `out = y * (n_levels - 1) / sum(y) - n_levels / 2`.
///
/// `scratch` holds the unnormalized `y` of one row and must be at least
/// `last_dim` long. Each worker needs its own.
pub fn softmax_s8_s8(
    input: &[i8],
    output: &mut [i8],
    last_dim: usize,
    coeffs: &SoftmaxCoeffs,
    scratch: &mut [u32],
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert!(scratch.len() >= last_dim);
    debug_assert_ne!(coeffs.log2, 0);
    if last_dim == 0 {
        return;
    }

    let y = &mut scratch[..last_dim];
    let n_levels = u64::from(coeffs.n_levels);
    let half = (coeffs.n_levels / 2) as i64;

    for row in part.block(input.len() / last_dim) {
        let offset = row * last_dim;
        let row_src = &input[offset..offset + last_dim];

        let x_max = row_src.iter().copied().max().map_or(i32::from(i8::MIN), i32::from);

        let mut y_sum = 0u64;
        for (dst, &x) in y.iter_mut().zip(row_src) {
            let x_tilde = i32::from(x) - x_max;
            let z = (-(x_tilde / coeffs.log2)).clamp(0, 31);
            let p = i64::from(x_tilde + z * coeffs.log2);
            let pb = p + i64::from(coeffs.b);
            let poly = i64::from(coeffs.a) * pb * pb + coeffs.c;
            *dst = ((poly as u64) >> z) as u32;
            y_sum += u64::from(*dst);
        }
        let y_sum = y_sum.max(1);

        for (dst, &v) in output[offset..offset + last_dim].iter_mut().zip(y.iter()) {
            let scaled = (u64::from(v) * (n_levels - 1) / y_sum) as i64 - half;
            *dst = i8::saturate_full(scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
        }
    }
}
