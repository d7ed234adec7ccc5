// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D max pooling over channel-first data, channels split between workers.
//!
//! Window geometry comes from a [`ConvShape`] whose `f` equals `c`; output
//! extents follow the convolution formula.

use crate::arith::Saturate;
use crate::{ConvShape, WorkPartition};

/// 8-bit max pooling over a pre-padded input.
///
/// The window maximum of `x + input_offset` is shifted by `output_offset`
/// and clamped to `[-128, 127]`.
pub fn maxpool2d_s8_nchw(
    input: &[i8],
    output: &mut [i8],
    shape: &ConvShape,
    input_offset: i32,
    output_offset: i32,
    part: WorkPartition,
) {
    debug_assert!(shape.padding.is_zero());
    debug_assert_eq!(input.len(), shape.input_len());
    debug_assert_eq!(output.len(), shape.c * shape.out_h() * shape.out_w());

    let ConvShape { h, w, p, q, sp, sq, .. } = *shape;
    let (h_out, w_out) = (shape.out_h(), shape.out_w());

    for ch in part.block(shape.c) {
        let plane = &input[ch * h * w..(ch + 1) * h * w];
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut max = i32::MIN;
                for kp in 0..p {
                    let row = &plane[(oh * sp + kp) * w + ow * sq..][..q];
                    for &x in row {
                        max = max.max(i32::from(x) + input_offset);
                    }
                }
                output[(ch * h_out + oh) * w_out + ow] = i8::saturate_full(max + output_offset);
            }
        }
    }
}

/// Floating-point max pooling; padded positions never win the window.
pub fn maxpool2d_f32_nchw(
    input: &[f32],
    output: &mut [f32],
    shape: &ConvShape,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), shape.input_len());
    debug_assert_eq!(output.len(), shape.c * shape.out_h() * shape.out_w());

    let ConvShape { h, w, p, q, sp, sq, padding, .. } = *shape;
    let (h_out, w_out) = (shape.out_h(), shape.out_w());

    for ch in part.block(shape.c) {
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut max = f32::NEG_INFINITY;
                for kp in 0..p {
                    let Some(ih) = (oh * sp + kp).checked_sub(padding.top).filter(|&i| i < h) else {
                        continue;
                    };
                    for kq in 0..q {
                        let Some(iw) = (ow * sq + kq).checked_sub(padding.left).filter(|&i| i < w)
                        else {
                            continue;
                        };
                        max = max.max(input[(ch * h + ih) * w + iw]);
                    }
                }
                output[(ch * h_out + oh) * w_out + ow] = max;
            }
        }
    }
}
