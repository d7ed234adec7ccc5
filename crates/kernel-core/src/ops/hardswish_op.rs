// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Hardswish: `x * clamp(x + 3, 0, 6) / 6`.

use crate::arith::{self, Saturate};
use crate::{Requant, WorkPartition};

pub fn hardswish_f32(input: &[f32], output: &mut [f32], part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    for i in part.block(input.len()) {
        let x = input[i];
        output[i] = x * (x + 3.0).clamp(0.0, 6.0) / 6.0;
    }
}

/// Quantized constants of the integer Hardswish, in the input scale.
///
/// `one_over_six` is the fixed-point reciprocal of 6; the scale it carries
/// is removed by a following requantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IHardswishParams {
    pub one_over_six: i32,
    pub three: i32,
    pub six: i32,
    pub input_offset: i32,
}

#[inline(always)]
fn ihardswish(x: i32, p: &IHardswishParams) -> i32 {
    let x = x + p.input_offset;
    let t = arith::clamp(x.wrapping_add(p.three), 0, p.six);
    x.wrapping_mul(t).wrapping_mul(p.one_over_six)
}

/// Integer Hardswish of 8-bit inputs into 32-bit outputs.
pub fn ihardswish_s8_s32(
    input: &[i8],
    output: &mut [i32],
    params: &IHardswishParams,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    for i in part.block(input.len()) {
        output[i] = ihardswish(i32::from(input[i]), params);
    }
}

/// Integer Hardswish fused with requantization back to a narrow type
/// (RQHardswish). The scale group is the flat element index modulo the
/// number of scale pairs, so a uniform scale is the usual choice.
pub fn rq_ihardswish<O: Saturate>(
    input: &[i8],
    output: &mut [O],
    params: &IHardswishParams,
    rq: &Requant<'_>,
    part: WorkPartition,
) {
    debug_assert_eq!(input.len(), output.len());
    let groups = rq.scale.groups().unwrap_or(1).max(1);
    for i in part.block(input.len()) {
        output[i] = rq.apply_to(ihardswish(i32::from(input[i]), params), i % groups);
    }
}
