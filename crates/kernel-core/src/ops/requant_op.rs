// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RequantShift: narrowing of wide accumulators with per-group scales.
//!
//! The layouts differ only in how the group of flat index `i` is found:
//! `i % channels` for channel-last data, `i / (H * W)` for channel-first data.
//! Input and output must not alias.

use crate::arith::Saturate;
use crate::{Requant, WorkPartition};

/// Requantizes a channel-last (`NHWC`) tensor, one scale pair per channel.
///
/// Worker `c` of `n` handles flat indices `c, c + n, ...`.
pub fn requant_shift_nhwc<I, O>(
    input: &[I],
    output: &mut [O],
    channels: usize,
    rq: &Requant<'_>,
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    O: Saturate,
{
    debug_assert_eq!(input.len(), output.len());
    for i in part.strided(input.len()) {
        output[i] = rq.apply_to(input[i].into(), i % channels);
    }
}

/// Requantizes a channel-first (`NCHW`) tensor, one scale pair per `hw`-long plane.
///
/// Worker `c` of `n` handles flat indices `c, c + n, ...`.
pub fn requant_shift_nchw<I, O>(
    input: &[I],
    output: &mut [O],
    hw: usize,
    rq: &Requant<'_>,
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    O: Saturate,
{
    debug_assert_eq!(input.len(), output.len());
    for i in part.strided(input.len()) {
        output[i] = rq.apply_to(input[i].into(), i / hw);
    }
}

/// Channel-first requantization with whole planes assigned to each worker.
///
/// Planes are split into contiguous blocks, so every worker touches one
/// contiguous region of `output`.
pub fn requant_shift_nchw_planes<I, O>(
    input: &[I],
    output: &mut [O],
    hw: usize,
    rq: &Requant<'_>,
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    O: Saturate,
{
    debug_assert_eq!(input.len(), output.len());
    if hw == 0 {
        return;
    }
    let planes = input.len() / hw;
    for g in part.block(planes) {
        let src = &input[g * hw..(g + 1) * hw];
        let dst = &mut output[g * hw..(g + 1) * hw];
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = rq.apply_to(s.into(), g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuantScale;

    fn nhwc_all<I: Copy + Into<i32>, O: Saturate>(
        input: &[I],
        channels: usize,
        rq: &Requant<'_>,
        n: usize,
    ) -> Vec<O> {
        let mut out = vec![O::default(); input.len()];
        for part in WorkPartition::team(n) {
            requant_shift_nhwc(input, &mut out, channels, rq, part);
        }
        out
    }

    #[test]
    fn test_nhwc_known_values() {
        let mul = [2, 2, 2];
        let add = [1, 1, 1];
        let rq = Requant::new(QuantScale::per_channel(&mul, &add).unwrap(), 1)
            .with_rounding(true)
            .with_range(-128, 127)
            .unwrap();
        let out: Vec<i8> = nhwc_all(&[10i8, -5, 3], 3, &rq, 1);
        assert_eq!(out, vec![11, -4, 4]);
    }

    #[test]
    fn test_zero_shift_is_plain_affine() {
        let rq = Requant::new(QuantScale::uniform(3, -7), 0)
            .with_rounding(true)
            .with_offsets(2, 5)
            .for_output::<i8>();
        let input = [0i32, 10, -10, 100];
        let out: Vec<i8> = nhwc_all(&input, 1, &rq, 1);
        let expected: Vec<i8> = input
            .iter()
            .map(|&x| ((x + 2) * 3 - 7 + 5).clamp(-128, 127) as i8)
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_nchw_groups_by_plane() {
        let mul = [1, 10];
        let add = [0, 0];
        let rq = Requant::new(QuantScale::per_channel(&mul, &add).unwrap(), 0).for_output::<i8>();
        let input = [1i16, 2, 3, 1, 2, 3];
        let mut out = [0i8; 6];
        requant_shift_nchw(&input, &mut out, 3, &rq, WorkPartition::single());
        assert_eq!(out, [1, 2, 3, 10, 20, 30]);

        let mut planes = [0i8; 6];
        for part in WorkPartition::team(2) {
            requant_shift_nchw_planes(&input, &mut planes, 3, &rq, part);
        }
        assert_eq!(planes, out);
    }

    #[test]
    fn test_uniform_matches_constant_per_channel() {
        let mul = [7; 4];
        let add = [-3; 4];
        let per_channel = Requant::new(QuantScale::per_channel(&mul, &add).unwrap(), 3)
            .with_rounding(true)
            .for_output::<i8>();
        let uniform = Requant {
            scale: QuantScale::uniform(7, -3),
            ..per_channel
        };
        let input: Vec<i32> = (-200..200).collect();
        let a: Vec<i8> = nhwc_all(&input, 4, &per_channel, 3);
        let b: Vec<i8> = nhwc_all(&input, 4, &uniform, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsigned_output() {
        let rq = Requant::new(QuantScale::uniform(1, 0), 0)
            .with_offsets(0, 128)
            .for_output::<u8>();
        let out: Vec<u8> = nhwc_all(&[-128i8, 0, 127], 1, &rq, 1);
        assert_eq!(out, vec![0, 128, 255]);
    }

    #[test]
    fn test_multi_worker_equivalence() {
        let mul: Vec<i32> = (1..=5).collect();
        let add: Vec<i32> = (0..5).map(|a| a * 3 - 6).collect();
        let rq = Requant::new(QuantScale::per_channel(&mul, &add).unwrap(), 2)
            .with_rounding(true)
            .with_offsets(-3, 4)
            .for_output::<i8>();
        let input: Vec<i16> = (0..95).map(|i| (i * 37 % 511 - 255) as i16).collect();
        let reference: Vec<i8> = nhwc_all(&input, 5, &rq, 1);
        for n in [2, 3, 4, 7] {
            assert_eq!(nhwc_all::<i16, i8>(&input, 5, &rq, n), reference, "n = {n}");
        }
    }

    #[test]
    fn test_each_worker_writes_only_its_share() {
        let rq = Requant::new(QuantScale::uniform(1, 0), 0).with_range(-100, 100).unwrap();
        let input = vec![0i8; 23];
        let mut hits = vec![0u32; 23];
        for part in WorkPartition::team(4) {
            // 127 is unreachable under the [-100, 100] clamp.
            let mut out = vec![127i8; 23];
            requant_shift_nhwc(&input, &mut out, 1, &rq, part);
            for (h, &o) in hits.iter_mut().zip(&out) {
                if o != 127 {
                    *h += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
    }
}
