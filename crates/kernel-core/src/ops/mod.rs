// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel functions.
//!
//! Every kernel writes into a caller-allocated output slice and takes the
//! [`crate::WorkPartition`] of the calling worker. Kernels never allocate,
//! lock or log; a worker writes only the output elements its partition owns.

mod conv_op;
mod elementwise_op;
mod gelu_op;
mod gemm_op;
mod hardswish_op;
mod itamax_op;
mod layer_norm_op;
mod matmul_op;
mod pool_op;
mod requant_op;
mod rms_norm_op;
mod softmax_op;

pub use conv_op::{
    conv2d_f32_hwc, conv2d_f32_im2col_hwc, conv2d_f32_nchw, conv2d_int_hwc, conv2d_int_im2col_hwc,
    conv2d_int_nchw, dw_conv2d_f32_nchw, dw_conv2d_int_nchw, im2col_scratch_len,
};
pub use elementwise_op::{div_f32, div_s32, pow_f32, rq_div, sqrt_f32, DivParams};
pub use gelu_op::{gelu_f32, gelu_s8_s32, gelu_sigmoid_f32, IGeluParams};
pub use gemm_op::{gemm_f32, gemm_int, rq_gemm, GemmOffsets, GemmParams};
pub use hardswish_op::{hardswish_f32, ihardswish_s8_s32, rq_ihardswish, IHardswishParams};
pub use itamax_op::{ita_max, ita_partial_max};
pub use layer_norm_op::{layernorm_f32, layernorm_f32_split_affine, layernorm_s8_s8};
pub use matmul_op::{
    matmul_f32, matmul_int, matmul_int_cols, matmul_int_unrolled, rq_matmul, MatMulOffsets,
};
pub use pool_op::{maxpool2d_f32_nchw, maxpool2d_s8_nchw};
pub use requant_op::{requant_shift_nchw, requant_shift_nchw_planes, requant_shift_nhwc};
pub use rms_norm_op::{irmsnorm_s8_s8, rmsnorm_f32};
pub use softmax_op::{softmax_f32, softmax_s8_s8, SoftmaxCoeffs};
