// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shift-based integer softmax of the ITA attention accelerator.
//!
//! Exponentials are replaced by a power-of-two approximation: an element
//! `d` below the row maximum contributes `256 >> ((d + 16) >> 5)` to the
//! denominator, and the normalized output is a right shift of one
//! reciprocal. The arithmetic reproduces the accelerator bit for bit and is
//! intentionally coarse.

use crate::arith::Saturate;
use crate::WorkPartition;

/// `(max - x + 16) >> 5`, the base-2 exponent of one element.
#[inline(always)]
fn ita_shift(max: i32, x: i32) -> u32 {
    ((max - x + 16) >> 5) as u32
}

#[inline(always)]
fn ita_output(sum_inv: u32, shift: u32, n_levels: u32) -> i8 {
    let v = sum_inv.checked_shr(shift).unwrap_or(0) as i32 - (n_levels / 2) as i32;
    i8::saturate_full(v)
}

#[inline(always)]
fn ita_reciprocal(sum: u32, n_levels: u32) -> u32 {
    (n_levels - 1) * 256 / sum.max(1)
}

/// ITAMax over rows of `last_dim` elements.
///
/// `scratch` receives the per-element shifts of the current row and must
/// hold at least `last_dim` bytes; each worker needs its own.
pub fn ita_max(
    input: &[i8],
    output: &mut [i8],
    last_dim: usize,
    n_levels: u32,
    scratch: &mut [u8],
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert!(scratch.len() >= last_dim);
    if last_dim == 0 {
        return;
    }

    let shifts = &mut scratch[..last_dim];
    for row in part.block(input.len() / last_dim) {
        let offset = row * last_dim;
        let row_src = &input[offset..offset + last_dim];
        let max = row_src.iter().copied().max().map_or(i32::from(i8::MIN), i32::from);

        let mut sum = 0u32;
        for (s, &x) in shifts.iter_mut().zip(row_src) {
            let shift = ita_shift(max, i32::from(x));
            *s = shift as u8;
            sum += 256 >> shift;
        }

        let sum_inv = ita_reciprocal(sum, n_levels);
        for (dst, &s) in output[offset..offset + last_dim].iter_mut().zip(shifts.iter()) {
            *dst = ita_output(sum_inv, u32::from(s), n_levels);
        }
    }
}

/// ITAMax computed in groups of `group_width` with an online running max.
///
/// Whenever a group raises the running max, the partial denominator is
/// shifted right by the exponent of the increase instead of being rescaled
/// exactly. A trailing group shorter than `group_width` is processed like
/// the others.
pub fn ita_partial_max(
    input: &[i8],
    output: &mut [i8],
    last_dim: usize,
    group_width: usize,
    n_levels: u32,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert!(group_width > 0);
    if last_dim == 0 {
        return;
    }

    for row in part.block(input.len() / last_dim) {
        let offset = row * last_dim;
        let row_src = &input[offset..offset + last_dim];

        let mut global_max = i32::from(i8::MIN);
        let mut partial_sum = 0u32;
        for group in row_src.chunks(group_width) {
            let current_max = group.iter().copied().max().map_or(i32::from(i8::MIN), i32::from);
            let shift_sum = if current_max > global_max {
                let s = ita_shift(current_max, global_max);
                global_max = current_max;
                s
            } else {
                0
            };

            let exp_sum: u32 = group
                .iter()
                .map(|&x| 256u32 >> ita_shift(global_max, i32::from(x)))
                .sum();
            partial_sum = partial_sum.checked_shr(shift_sum).unwrap_or(0) + exp_sum;
        }

        let sum_inv = ita_reciprocal(partial_sum, n_levels);
        for (dst, &x) in output[offset..offset + last_dim].iter_mut().zip(row_src) {
            *dst = ita_output(sum_inv, ita_shift(global_max, i32::from(x)), n_levels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itamax_known_row() {
        // Shifts 0, 4, 8; sum = 256 + 16 + 1 = 273; sum_inv = 65280 / 273 = 239.
        let mut out = [0i8; 3];
        let mut scratch = [0u8; 3];
        ita_max(&[127, 0, -128], &mut out, 3, 256, &mut scratch, WorkPartition::single());
        assert_eq!(scratch, [0, 4, 8]);
        assert_eq!(out, [111, -114, -128]);

        // Implied probabilities follow the input order.
        let probs: Vec<f32> = out.iter().map(|&v| (v as f32 + 128.0) / 255.0).collect();
        assert!(probs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_itamax_workers_match() {
        let input: Vec<i8> = (0..64).map(|i| (i * 53 % 256 - 128) as i8).collect();
        let mut single = vec![0i8; 64];
        let mut scratch = vec![0u8; 16];
        ita_max(&input, &mut single, 16, 256, &mut scratch, WorkPartition::single());

        for n in [2, 3, 4] {
            let mut split = vec![0i8; 64];
            for part in WorkPartition::team(n) {
                let mut own = vec![0u8; 16];
                ita_max(&input, &mut split, 16, 256, &mut own, part);
            }
            assert_eq!(single, split, "n = {n}");
        }
    }

    #[test]
    fn test_partial_single_group_equals_full() {
        let input: Vec<i8> = (0..32).map(|i| (i * 29 % 256 - 128) as i8).collect();
        let mut full = vec![0i8; 32];
        let mut scratch = vec![0u8; 8];
        ita_max(&input, &mut full, 8, 256, &mut scratch, WorkPartition::single());

        let mut partial = vec![0i8; 32];
        ita_partial_max(&input, &mut partial, 8, 8, 256, WorkPartition::single());
        assert_eq!(full, partial);
    }

    #[test]
    fn test_partial_max_rising_groups() {
        // Group [0, 0]: max 0, sum 512. Group [64, 64]: shift (64 + 16) >> 5 = 2,
        // sum = (512 >> 2) + 512 = 640, sum_inv = 65280 / 640 = 102.
        let mut out = [0i8; 4];
        ita_partial_max(&[0, 0, 64, 64], &mut out, 4, 2, 256, WorkPartition::single());
        assert_eq!(out, [-103, -103, -26, -26]);
    }

    #[test]
    fn test_partial_trailing_group() {
        let mut out = [0i8; 3];
        ita_partial_max(&[10, 10, 10], &mut out, 3, 2, 256, WorkPartition::single());
        // Three equal elements, sum 768, sum_inv = 85.
        assert_eq!(out, [-43; 3]);
    }
}
