// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Root-mean-square normalization: layer normalization without centering.

use crate::arith::{self, Saturate};
use crate::WorkPartition;

/// `out[j] = x[j] / sqrt(mean(x^2) + eps) * weight[j]`, groups split between workers.
pub fn rmsnorm_f32(
    input: &[f32],
    output: &mut [f32],
    weight: &[f32],
    epsilon: f32,
    last_dim: usize,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert_eq!(weight.len(), last_dim);
    if last_dim == 0 {
        return;
    }

    for g in part.block(input.len() / last_dim) {
        let src = &input[g * last_dim..(g + 1) * last_dim];
        let dst = &mut output[g * last_dim..(g + 1) * last_dim];
        let ms = src.iter().map(|&x| x * x).sum::<f32>() / last_dim as f32;
        let inv_rms = 1.0 / (ms + epsilon).sqrt();
        for ((d, &x), &w) in dst.iter_mut().zip(src).zip(weight) {
            *d = x * inv_rms * w;
        }
    }
}

/// Integer RMSNorm of 8-bit data.
///
/// With `x' = x + input_offset`: `std = isqrt(sum(x'^2) / L + 1)` and
/// `out[j] = clamp((x' * weight[j] / std) >> log2d, -128, 127)`.
pub fn irmsnorm_s8_s8<W>(
    input: &[i8],
    output: &mut [i8],
    weight: &[W],
    input_offset: i32,
    last_dim: usize,
    log2d: u32,
    part: WorkPartition,
) where
    W: Copy + Into<i32>,
{
    debug_assert_eq!(input.len(), output.len());
    debug_assert_eq!(weight.len(), last_dim);
    if last_dim == 0 {
        return;
    }

    for g in part.block(input.len() / last_dim) {
        let src = &input[g * last_dim..(g + 1) * last_dim];
        let dst = &mut output[g * last_dim..(g + 1) * last_dim];

        let sum: i64 = src
            .iter()
            .map(|&x| {
                let v = i64::from(i32::from(x) + input_offset);
                v * v
            })
            .sum();
        let std = arith::sqrt_q32(arith::mean_square_arg(sum, last_dim), 0);

        for ((d, &x), &w) in dst.iter_mut().zip(src).zip(weight) {
            let v = (i32::from(x) + input_offset).wrapping_mul(w.into()) / std;
            *d = i8::saturate_full(v >> log2d.min(31));
        }
    }
}
