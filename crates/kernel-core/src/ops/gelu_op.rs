// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Gaussian Error Linear Unit (GELU) activation.

use crate::arith;
use crate::WorkPartition;

/// Coefficient `sqrt(2/π)`.
const SQRT_2_OVER_PI: f32 = 0.7978845608;

/// Cubic coefficient in the tanh approximation.
const GELU_COEFF: f32 = 0.044715;

/// Slope of the sigmoid approximation.
const SIGMOID_SLOPE: f32 = 1.702;

/// Applies GELU element-wise using the tanh approximation:
///
/// `GELU(x) ≈ 0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))`
///
/// Elements are split between workers in contiguous blocks.
pub fn gelu_f32(input: &[f32], output: &mut [f32], part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    for i in part.block(input.len()) {
        output[i] = gelu_scalar(input[i]);
    }
}

/// Applies GELU element-wise using the sigmoid approximation `x * sigmoid(1.702 * x)`.
pub fn gelu_sigmoid_f32(input: &[f32], output: &mut [f32], part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    for i in part.block(input.len()) {
        let x = input[i];
        output[i] = x / (1.0 + (-SIGMOID_SLOPE * x).exp());
    }
}

/// Computes GELU for a single f32 value.
#[inline(always)]
fn gelu_scalar(x: f32) -> f32 {
    let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}

/// Quantized constants of the integer GELU.
///
/// `b` is the (negative) clipping point of the erf polynomial and `one` the
/// quantized value of 1, both in the input scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IGeluParams {
    pub b: i32,
    pub one: i32,
    pub input_offset: i32,
}

/// Integer-only GELU of 8-bit inputs into 32-bit outputs.
///
/// With `x' = x + input_offset`, `q = min(|x'|, -b)` and
/// `L = sgn(x') * (one - (q + b)^2)`, the result is `x' * ((one + L) >> 1)`.
/// This is the second-order erf polynomial of the hardware unit and is not
/// a faithful GELU outside its calibrated range.
pub fn gelu_s8_s32(input: &[i8], output: &mut [i32], params: &IGeluParams, part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    let IGeluParams { b, one, input_offset } = *params;

    for i in part.block(input.len()) {
        let x = i32::from(input[i]) + input_offset;
        let sign = arith::sgn(x);
        let abs = sign * x;
        let q = if abs > -b { -b } else { abs };
        let d = q + b;
        let l = sign.wrapping_mul(one.wrapping_sub(d.wrapping_mul(d)));
        output[i] = x.wrapping_mul(one.wrapping_add(l) >> 1);
    }
}
