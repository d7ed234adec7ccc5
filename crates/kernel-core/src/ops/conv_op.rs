// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution, dense and depthwise.
//!
//! ```text
//! out[f, h, w] = sum_{c, p, q} in[c, h * SP + p, w * SQ + q] * weight[f, c, p, q]
//! ```
//!
//! Integer kernels expect an already padded input (`shape.padding` must be
//! zero), add `input_offset` to every input sample and `output_offset` to
//! every accumulated sum. Floating-point kernels honour `shape.padding`,
//! reading zeros outside the input, and add an optional per-filter bias.
//!
//! Each output element is written by exactly one worker. Channel-first
//! kernels split filters (or channels), channel-last kernels split output
//! rows and the im2col kernels split output pixels.

use crate::{ConvShape, GemmParams, GemmShape, MatMulOffsets, WorkPartition};

/// Input coordinate for output position `o`, window tap `k`, or `None` in the padding.
#[inline(always)]
fn tap(o: usize, stride: usize, k: usize, pad: usize, extent: usize) -> Option<usize> {
    (o * stride + k).checked_sub(pad).filter(|&i| i < extent)
}

/// Dense integer convolution over channel-first data, filters split between workers.
pub fn conv2d_int_nchw<I, W>(
    input: &[I],
    weight: &[W],
    output: &mut [i32],
    shape: &ConvShape,
    input_offset: i32,
    output_offset: i32,
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    W: Copy + Into<i32>,
{
    debug_assert!(shape.padding.is_zero(), "integer convolution expects a pre-padded input");
    debug_assert_eq!(input.len(), shape.input_len());
    debug_assert_eq!(weight.len(), shape.weight_len());
    debug_assert_eq!(output.len(), shape.output_len());

    let ConvShape { c, h, w, p, q, sp, sq, .. } = *shape;
    let (h_out, w_out) = (shape.out_h(), shape.out_w());

    for f in part.block(shape.f) {
        let filter = &weight[f * c * p * q..(f + 1) * c * p * q];
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut sum = 0i32;
                for ch in 0..c {
                    for kp in 0..p {
                        let row = ch * h * w + (oh * sp + kp) * w + ow * sq;
                        let taps = &filter[ch * p * q + kp * q..ch * p * q + kp * q + q];
                        for (kq, &wt) in taps.iter().enumerate() {
                            let x = input[row + kq].into().wrapping_add(input_offset);
                            sum = sum.wrapping_add(x.wrapping_mul(wt.into()));
                        }
                    }
                }
                output[f * h_out * w_out + oh * w_out + ow] = sum.wrapping_add(output_offset);
            }
        }
    }
}

/// Depthwise integer convolution over channel-first data (`F == C`), channels
/// split between workers. `weight` holds one `P x Q` filter per channel.
pub fn dw_conv2d_int_nchw<I, W>(
    input: &[I],
    weight: &[W],
    output: &mut [i32],
    shape: &ConvShape,
    input_offset: i32,
    output_offset: i32,
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    W: Copy + Into<i32>,
{
    debug_assert!(shape.padding.is_zero(), "integer convolution expects a pre-padded input");
    debug_assert_eq!(shape.f, shape.c);
    debug_assert_eq!(weight.len(), shape.c * shape.p * shape.q);

    let ConvShape { h, w, p, q, sp, sq, .. } = *shape;
    let (h_out, w_out) = (shape.out_h(), shape.out_w());

    for ch in part.block(shape.c) {
        let plane = &input[ch * h * w..(ch + 1) * h * w];
        let filter = &weight[ch * p * q..(ch + 1) * p * q];
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut sum = 0i32;
                for kp in 0..p {
                    for kq in 0..q {
                        let x = plane[(oh * sp + kp) * w + ow * sq + kq]
                            .into()
                            .wrapping_add(input_offset);
                        sum = sum.wrapping_add(x.wrapping_mul(filter[kp * q + kq].into()));
                    }
                }
                output[ch * h_out * w_out + oh * w_out + ow] = sum.wrapping_add(output_offset);
            }
        }
    }
}

/// Dense integer convolution over channel-last (`HWC`) data.
///
/// `weight` is laid out `[F][P][Q][C]` and `output` `[H_out][W_out][F]`.
/// Output rows are split between workers.
pub fn conv2d_int_hwc<I, W>(
    input: &[I],
    weight: &[W],
    output: &mut [i32],
    shape: &ConvShape,
    input_offset: i32,
    output_offset: i32,
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    W: Copy + Into<i32>,
{
    debug_assert!(shape.padding.is_zero(), "integer convolution expects a pre-padded input");
    debug_assert_eq!(output.len(), shape.output_len());

    let ConvShape { c, w, f, p, q, sp, sq, .. } = *shape;
    let w_out = shape.out_w();

    for oh in part.block(shape.out_h()) {
        for ow in 0..w_out {
            for filt in 0..f {
                let mut sum = 0i32;
                for kp in 0..p {
                    for kq in 0..q {
                        let pix = ((oh * sp + kp) * w + ow * sq + kq) * c;
                        let wbase = ((filt * p + kp) * q + kq) * c;
                        for ch in 0..c {
                            let x = input[pix + ch].into().wrapping_add(input_offset);
                            sum = sum.wrapping_add(x.wrapping_mul(weight[wbase + ch].into()));
                        }
                    }
                }
                output[(oh * w_out + ow) * f + filt] = sum.wrapping_add(output_offset);
            }
        }
    }
}

/// Dense floating-point convolution over channel-first data with zero padding.
pub fn conv2d_f32_nchw(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    output: &mut [f32],
    shape: &ConvShape,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), shape.input_len());
    debug_assert_eq!(weight.len(), shape.weight_len());
    debug_assert_eq!(output.len(), shape.output_len());

    let ConvShape { c, h, w, p, q, sp, sq, padding, .. } = *shape;
    let (h_out, w_out) = (shape.out_h(), shape.out_w());

    for f in part.block(shape.f) {
        let b = bias.map_or(0.0, |b| b[f]);
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut sum = 0.0f32;
                for ch in 0..c {
                    for kp in 0..p {
                        let Some(ih) = tap(oh, sp, kp, padding.top, h) else {
                            continue;
                        };
                        for kq in 0..q {
                            let Some(iw) = tap(ow, sq, kq, padding.left, w) else {
                                continue;
                            };
                            sum += input[(ch * h + ih) * w + iw]
                                * weight[((f * c + ch) * p + kp) * q + kq];
                        }
                    }
                }
                output[(f * h_out + oh) * w_out + ow] = sum + b;
            }
        }
    }
}

/// Depthwise floating-point convolution over channel-first data with zero padding.
pub fn dw_conv2d_f32_nchw(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    output: &mut [f32],
    shape: &ConvShape,
    part: WorkPartition,
) {
    debug_assert_eq!(shape.f, shape.c);
    let ConvShape { h, w, p, q, sp, sq, padding, .. } = *shape;
    let (h_out, w_out) = (shape.out_h(), shape.out_w());

    for ch in part.block(shape.c) {
        let b = bias.map_or(0.0, |b| b[ch]);
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut sum = 0.0f32;
                for kp in 0..p {
                    let Some(ih) = tap(oh, sp, kp, padding.top, h) else {
                        continue;
                    };
                    for kq in 0..q {
                        let Some(iw) = tap(ow, sq, kq, padding.left, w) else {
                            continue;
                        };
                        sum += input[(ch * h + ih) * w + iw] * weight[(ch * p + kp) * q + kq];
                    }
                }
                output[(ch * h_out + oh) * w_out + ow] = sum + b;
            }
        }
    }
}

/// Dense floating-point convolution over channel-last data with zero padding.
///
/// `weight` is `[F][P][Q][C]`, `output` is `[H_out][W_out][F]`. Output rows
/// are split between workers.
pub fn conv2d_f32_hwc(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    output: &mut [f32],
    shape: &ConvShape,
    part: WorkPartition,
) {
    let ConvShape { c, h, w, f, p, q, sp, sq, padding } = *shape;
    let w_out = shape.out_w();

    for oh in part.block(shape.out_h()) {
        for ow in 0..w_out {
            for filt in 0..f {
                let mut sum = 0.0f32;
                for kp in 0..p {
                    let Some(ih) = tap(oh, sp, kp, padding.top, h) else {
                        continue;
                    };
                    for kq in 0..q {
                        let Some(iw) = tap(ow, sq, kq, padding.left, w) else {
                            continue;
                        };
                        let pix = (ih * w + iw) * c;
                        let wbase = ((filt * p + kp) * q + kq) * c;
                        for ch in 0..c {
                            sum += input[pix + ch] * weight[wbase + ch];
                        }
                    }
                }
                output[(oh * w_out + ow) * f + filt] = sum + bias.map_or(0.0, |b| b[filt]);
            }
        }
    }
}

/// Scratch elements one worker needs for [`conv2d_f32_im2col_hwc`] and
/// [`conv2d_int_im2col_hwc`].
pub fn im2col_scratch_len(shape: &ConvShape) -> usize {
    shape.patch_len()
}

/// Channel-last floating-point convolution through an im2col buffer.
///
/// For every output pixel the receptive field is staged into `scratch`
/// (`P * Q * C` elements, zeros in the padding) and multiplied against the
/// `[F][P*Q*C]` weight matrix in one GEMM call. Output pixels are split
/// between workers; each worker needs its own `scratch`.
pub fn conv2d_f32_im2col_hwc(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    output: &mut [f32],
    shape: &ConvShape,
    scratch: &mut [f32],
    part: WorkPartition,
) {
    let ConvShape { c, h, w, f, p, q, sp, sq, padding } = *shape;
    let w_out = shape.out_w();
    let patch_len = shape.patch_len();
    debug_assert!(scratch.len() >= patch_len);

    let patch = &mut scratch[..patch_len];
    // Y[1, F] = patch[1, PQC] * weight^T
    let gemm = GemmShape::new(1, patch_len, f);
    let params = GemmParams::<f32>::default().transposed(false, true);

    for pix in part.block(shape.out_h() * w_out) {
        let (oh, ow) = (pix / w_out, pix % w_out);
        for kp in 0..p {
            for kq in 0..q {
                let dst = &mut patch[(kp * q + kq) * c..(kp * q + kq + 1) * c];
                match (
                    tap(oh, sp, kp, padding.top, h),
                    tap(ow, sq, kq, padding.left, w),
                ) {
                    (Some(ih), Some(iw)) => {
                        dst.copy_from_slice(&input[(ih * w + iw) * c..(ih * w + iw + 1) * c])
                    }
                    _ => dst.fill(0.0),
                }
            }
        }
        crate::gemm_f32(
            patch,
            weight,
            bias,
            &mut output[pix * f..(pix + 1) * f],
            gemm,
            params,
            WorkPartition::single(),
        );
    }
}

/// Channel-last integer convolution through an im2col buffer.
///
/// The receptive field of every output pixel is copied into `scratch` as
/// `P * Q * C` raw samples and reduced as
/// `Y[F, 1] = weight[F, PQC] * patch[PQC, 1]` with [`crate::matmul_int`],
/// which adds `input_offset` to the staged samples. The input must be
/// pre-padded. Output pixels are split between workers; each worker needs
/// its own `scratch`.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_int_im2col_hwc<I, W>(
    input: &[I],
    weight: &[W],
    output: &mut [i32],
    shape: &ConvShape,
    input_offset: i32,
    output_offset: i32,
    scratch: &mut [I],
    part: WorkPartition,
) where
    I: Copy + Into<i32>,
    W: Copy + Into<i32>,
{
    debug_assert!(shape.padding.is_zero(), "integer convolution expects a pre-padded input");
    debug_assert_eq!(weight.len(), shape.weight_len());
    debug_assert_eq!(output.len(), shape.output_len());
    let ConvShape { c, w, f, p, q, sp, sq, .. } = *shape;
    let w_out = shape.out_w();
    let patch_len = shape.patch_len();
    debug_assert!(scratch.len() >= patch_len);

    let patch = &mut scratch[..patch_len];
    let gemm = GemmShape::new(f, patch_len, 1);
    let off = MatMulOffsets { a: 0, b: input_offset, y: output_offset };
    // One window row is Q * C contiguous samples.
    let row_len = q * c;

    for pix in part.block(shape.out_h() * w_out) {
        let (oh, ow) = (pix / w_out, pix % w_out);
        for kp in 0..p {
            let src = ((oh * sp + kp) * w + ow * sq) * c;
            patch[kp * row_len..(kp + 1) * row_len].copy_from_slice(&input[src..src + row_len]);
        }
        crate::matmul_int(
            weight,
            &patch[..],
            &mut output[pix * f..(pix + 1) * f],
            gemm,
            off,
            WorkPartition::single(),
        );
    }
}
