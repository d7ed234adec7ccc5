// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise Pow, Sqrt and Div kernels.
//!
//! Binary kernels broadcast the denominator: element `i` of a numerator of
//! length `N` is divided by element `i / (N / D)` of a denominator of length
//! `D`, where `D` divides `N`. Denominators are never checked for zero.

use crate::arith::{self, Saturate};
use crate::{Requant, WorkPartition};

#[inline(always)]
fn broadcast_step(nom_len: usize, denom_len: usize) -> usize {
    debug_assert!(denom_len > 0 && nom_len % denom_len == 0);
    (nom_len / denom_len.max(1)).max(1)
}

pub fn pow_f32(input: &[f32], exponent: f32, output: &mut [f32], part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    for i in part.block(input.len()) {
        output[i] = input[i].powf(exponent);
    }
}

pub fn sqrt_f32(input: &[f32], output: &mut [f32], part: WorkPartition) {
    debug_assert_eq!(input.len(), output.len());
    for i in part.block(input.len()) {
        output[i] = input[i].sqrt();
    }
}

pub fn div_f32(nom: &[f32], denom: &[f32], output: &mut [f32], part: WorkPartition) {
    debug_assert_eq!(nom.len(), output.len());
    let step = broadcast_step(nom.len(), denom.len());
    for i in part.block(nom.len()) {
        output[i] = nom[i] / denom[i / step];
    }
}

/// Fixed-point parameters of the integer division.
///
/// `nom' = delta * eta * (nom + nom_offset)` and
/// `denom' = eta * (denom + denom_offset) + eps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivParams {
    pub delta: i32,
    pub eps: i32,
    pub eta: i32,
    pub nom_offset: i32,
    pub denom_offset: i32,
}

impl Default for DivParams {
    fn default() -> Self {
        Self {
            delta: 1,
            eps: 0,
            eta: 1,
            nom_offset: 0,
            denom_offset: 0,
        }
    }
}

impl DivParams {
    #[inline(always)]
    fn quotient(&self, nom: i32, denom: i32) -> i32 {
        let n = self
            .delta
            .wrapping_mul(self.eta)
            .wrapping_mul(nom.wrapping_add(self.nom_offset));
        let d = self
            .eta
            .wrapping_mul(denom.wrapping_add(self.denom_offset))
            .wrapping_add(self.eps);
        arith::div_round(n, d)
    }
}

/// Integer division rounding half away from zero.
pub fn div_s32(
    nom: &[i32],
    denom: &[i32],
    output: &mut [i32],
    params: &DivParams,
    part: WorkPartition,
) {
    debug_assert_eq!(nom.len(), output.len());
    let step = broadcast_step(nom.len(), denom.len());
    for i in part.block(nom.len()) {
        output[i] = params.quotient(nom[i], denom[i / step]);
    }
}

/// Integer division fused with requantization (RQDiv).
///
/// The rounded quotient is requantized with scale group 0; the division
/// rounding and the requantization shift rounding are independent.
pub fn rq_div<O: Saturate>(
    nom: &[i32],
    denom: &[i32],
    output: &mut [O],
    params: &DivParams,
    rq: &Requant<'_>,
    part: WorkPartition,
) {
    debug_assert_eq!(nom.len(), output.len());
    let step = broadcast_step(nom.len(), denom.len());
    for i in part.block(nom.len()) {
        output[i] = rq.apply_to(params.quotient(nom[i], denom[i / step]), 0);
    }
}
