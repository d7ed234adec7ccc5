// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer normalization over groups of `last_dim` consecutive elements.
//!
//! `out[j] = (x[j] - mean) / sqrt(var + eps) * scale[j] + bias[j]`, with
//! `scale` and `bias` indexed by the position inside the group and shared by
//! every group.

use crate::arith::{self, Saturate};
use crate::WorkPartition;

#[inline(always)]
fn mean_std(group: &[f32], epsilon: f32) -> (f32, f32) {
    let n = group.len() as f32;
    let mean = group.iter().sum::<f32>() / n;
    let var = group.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n;
    (mean, (var + epsilon).sqrt())
}

/// Floating-point layer normalization, groups split between workers.
///
/// # Arguments
/// * `scale`, `bias` - affine parameters, `last_dim` elements each.
/// * `epsilon` - added to the variance before the square root.
pub fn layernorm_f32(
    input: &[f32],
    output: &mut [f32],
    scale: &[f32],
    bias: &[f32],
    epsilon: f32,
    last_dim: usize,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert_eq!(scale.len(), last_dim);
    debug_assert_eq!(bias.len(), last_dim);
    if last_dim == 0 {
        return;
    }

    for g in part.block(input.len() / last_dim) {
        let src = &input[g * last_dim..(g + 1) * last_dim];
        let dst = &mut output[g * last_dim..(g + 1) * last_dim];
        let (mean, std) = mean_std(src, epsilon);
        let inv_std = 1.0 / std;

        for (j, (d, &x)) in dst.iter_mut().zip(src).enumerate() {
            *d = (x - mean) * inv_std * scale[j] + bias[j];
        }
    }
}

/// Floating-point layer normalization with the affine step split inside each group.
///
/// Every worker performs the full mean/variance reduction of each group
/// sequentially, then writes only its block of intra-group positions. Useful
/// when there are fewer groups than workers.
pub fn layernorm_f32_split_affine(
    input: &[f32],
    output: &mut [f32],
    scale: &[f32],
    bias: &[f32],
    epsilon: f32,
    last_dim: usize,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    if last_dim == 0 {
        return;
    }

    let cols = part.block(last_dim);
    for g in 0..input.len() / last_dim {
        let src = &input[g * last_dim..(g + 1) * last_dim];
        let (mean, std) = mean_std(src, epsilon);
        let inv_std = 1.0 / std;

        for j in cols.clone() {
            output[g * last_dim + j] = (src[j] - mean) * inv_std * scale[j] + bias[j];
        }
    }
}

/// Integer layer normalization of 8-bit data.
///
/// With `x' = x + input_offset`: `mean = sum(x') / L`,
/// `var = sum((x' - mean)^2) / L + 1`, `std = isqrt(var)` and
/// `out[j] = clamp(((x' - mean) * weight[j] / std + bias[j]) >> log2d, -128, 127)`.
/// Divisions truncate toward zero.
#[allow(clippy::too_many_arguments)]
pub fn layernorm_s8_s8(
    input: &[i8],
    output: &mut [i8],
    weight: &[i32],
    bias: &[i32],
    input_offset: i32,
    last_dim: usize,
    log2d: u32,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert_eq!(weight.len(), last_dim);
    debug_assert_eq!(bias.len(), last_dim);
    if last_dim == 0 {
        return;
    }
    let len = last_dim as i64;

    for g in part.block(input.len() / last_dim) {
        let src = &input[g * last_dim..(g + 1) * last_dim];
        let dst = &mut output[g * last_dim..(g + 1) * last_dim];

        let sum: i64 = src.iter().map(|&x| i64::from(i32::from(x) + input_offset)).sum();
        let mean = (sum / len) as i32;

        let sq: i64 = src
            .iter()
            .map(|&x| {
                let d = i64::from(i32::from(x) + input_offset - mean);
                d * d
            })
            .sum();
        let std = arith::sqrt_q32(arith::mean_square_arg(sq, last_dim), 0);

        for (j, (d, &x)) in dst.iter_mut().zip(src).enumerate() {
            let centered = i32::from(x) + input_offset - mean;
            let scaled = centered.wrapping_mul(weight[j]) / std;
            *d = i8::saturate_full(scaled.wrapping_add(bias[j]) >> log2d.min(31));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &[f32], b: &[f32], tol: f32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn test_layernorm_identity_params() {
        // mean = 2.5, var = 1.25.
        let mut out = [0.0f32; 4];
        let input = [1.0, 2.0, 3.0, 4.0];
        layernorm_f32(&input, &mut out, &[1.0; 4], &[0.0; 4], 1e-5, 4, WorkPartition::single());

        let mean: f32 = out.iter().sum::<f32>() / 4.0;
        let var: f32 = out.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_layernorm_affine() {
        let mut out = [0.0f32; 2];
        let (scale, bias) = ([2.0, 3.0], [10.0, 20.0]);
        layernorm_f32(&[0.0, 2.0], &mut out, &scale, &bias, 0.0, 2, WorkPartition::single());
        assert!(approx_eq(&out, &[8.0, 23.0], 1e-5));
    }

    #[test]
    fn test_split_affine_matches_grouped() {
        let input: Vec<f32> = (0..30).map(|i| (i * 7 % 11) as f32 - 5.0).collect();
        let scale: Vec<f32> = (0..10).map(|j| 0.5 + j as f32 * 0.1).collect();
        let bias: Vec<f32> = (0..10).map(|j| j as f32 - 4.0).collect();

        let mut grouped = vec![0.0f32; 30];
        for part in WorkPartition::team(2) {
            layernorm_f32(&input, &mut grouped, &scale, &bias, 1e-5, 10, part);
        }
        let mut split = vec![0.0f32; 30];
        for part in WorkPartition::team(4) {
            layernorm_f32_split_affine(&input, &mut split, &scale, &bias, 1e-5, 10, part);
        }
        assert_eq!(grouped, split);
    }

    #[test]
    fn test_layernorm_s8_known_values() {
        // mean = 0, var = (4 + 4) / 2 + 1 = 5, std = 2.
        // out = (+-2 * 64 / 2 + 0) >> 1 = +-32.
        let mut out = [0i8; 2];
        layernorm_s8_s8(&[2, -2], &mut out, &[64, 64], &[0, 0], 0, 2, 1, WorkPartition::single());
        assert_eq!(out, [32, -32]);

        // Offsets shift the input but the result is centered anyway.
        let mut shifted = [0i8; 2];
        let part = WorkPartition::single();
        layernorm_s8_s8(&[12, 8], &mut shifted, &[64, 64], &[0, 0], -10, 2, 1, part);
        assert_eq!(shifted, out);
    }

    #[test]
    fn test_layernorm_s8_saturates_and_biases() {
        let mut out = [0i8; 2];
        let (weight, bias) = ([1000, 1000], [0, 300]);
        layernorm_s8_s8(&[2, -2], &mut out, &weight, &bias, 0, 2, 0, WorkPartition::single());
        // 1000, -1000 + 300 clamp to the 8-bit range.
        assert_eq!(out, [127, -128]);
    }

    #[test]
    fn test_layernorm_s8_wide_row() {
        // Alternating 127, -128: mean 0, sum of squares 70 000 * 32 513 exceeds i32.
        // Mean square 16256 + 1 gives std 127, so weight 127 reproduces the input.
        let len = 140_000;
        let input: Vec<i8> = (0..len).map(|i| if i % 2 == 0 { 127 } else { -128 }).collect();
        let mut out = vec![0i8; len];
        let (weight, bias) = (vec![127; len], vec![0; len]);
        layernorm_s8_s8(&input, &mut out, &weight, &bias, 0, len, 0, WorkPartition::single());
        assert_eq!(out, input);
    }

    #[test]
    fn test_layernorm_s8_workers_match() {
        let input: Vec<i8> = (0..48).map(|i| (i * 41 % 256 - 128) as i8).collect();
        let weight: Vec<i32> = (0..8).map(|j| 16 + j * 4).collect();
        let bias: Vec<i32> = (0..8).map(|j| j * 3 - 12).collect();
        let mut single = vec![0i8; 48];
        layernorm_s8_s8(&input, &mut single, &weight, &bias, 3, 8, 2, WorkPartition::single());
        for n in [2, 3, 5] {
            let mut split = vec![0i8; 48];
            for part in WorkPartition::team(n) {
                layernorm_s8_s8(&input, &mut split, &weight, &bias, 3, 8, 2, part);
            }
            assert_eq!(single, split);
        }
    }
}
