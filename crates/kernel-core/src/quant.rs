// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Requantization parameters.
//!
//! A requantization step maps a wide accumulator `x` in group `g` to
//!
//! ```text
//! clamp(((x + input_offset) * mul[g] + add[g] + bias) >> log2d + output_offset, min, max)
//! ```
//!
//! where `bias = 1 << (log2d - 1)` when rounding is enabled and `log2d > 0`.

use crate::arith::{clamp, round_bias, Saturate};
use crate::KernelError;

/// Multiplier/adder pairs, shared or one per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantScale<'a> {
    /// One pair for the whole tensor.
    Uniform { mul: i32, add: i32 },
    /// One pair per channel or row.
    PerChannel { mul: &'a [i32], add: &'a [i32] },
}

impl<'a> QuantScale<'a> {
    pub fn uniform(mul: i32, add: i32) -> Self {
        QuantScale::Uniform { mul, add }
    }

    /// Builds a per-channel scale.
    ///
    /// # Errors
    /// Returns [`KernelError::QuantParamMismatch`] if the vectors differ in length.
    pub fn per_channel(mul: &'a [i32], add: &'a [i32]) -> Result<Self, KernelError> {
        if mul.len() != add.len() {
            return Err(KernelError::QuantParamMismatch {
                mul: mul.len(),
                add: add.len(),
            });
        }
        Ok(QuantScale::PerChannel { mul, add })
    }

    /// Picks per-row parameters when `per_row` is set, otherwise the first pair
    /// of `mul`/`add` for every row.
    pub fn select(mul: &'a [i32], add: &'a [i32], per_row: bool) -> Result<Self, KernelError> {
        if per_row {
            return Self::per_channel(mul, add);
        }
        match (mul.first(), add.first()) {
            (Some(&m), Some(&a)) => Ok(Self::uniform(m, a)),
            _ => Err(KernelError::QuantParamMismatch {
                mul: mul.len(),
                add: add.len(),
            }),
        }
    }

    /// The `(mul, add)` pair for group `g`.
    #[inline(always)]
    pub fn get(&self, g: usize) -> (i32, i32) {
        match *self {
            QuantScale::Uniform { mul, add } => (mul, add),
            QuantScale::PerChannel { mul, add } => (mul[g], add[g]),
        }
    }

    /// Number of groups the scale can address, `None` for uniform scales.
    pub fn groups(&self) -> Option<usize> {
        match self {
            QuantScale::Uniform { .. } => None,
            QuantScale::PerChannel { mul, .. } => Some(mul.len()),
        }
    }
}

/// A complete requantization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requant<'a> {
    pub scale: QuantScale<'a>,
    pub log2d: u32,
    pub rounding: bool,
    pub input_offset: i32,
    pub output_offset: i32,
    pub output_min: i32,
    pub output_max: i32,
}

impl<'a> Requant<'a> {
    /// Creates a requantization step clamping to the full `i32` range.
    /// Narrow the bounds with [`Requant::with_range`] or [`Requant::for_output`].
    pub fn new(scale: QuantScale<'a>, log2d: u32) -> Self {
        Self {
            scale,
            log2d,
            rounding: false,
            input_offset: 0,
            output_offset: 0,
            output_min: i32::MIN,
            output_max: i32::MAX,
        }
    }

    pub fn with_rounding(mut self, rounding: bool) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_offsets(mut self, input_offset: i32, output_offset: i32) -> Self {
        self.input_offset = input_offset;
        self.output_offset = output_offset;
        self
    }

    /// Sets explicit output clamp bounds.
    ///
    /// # Errors
    /// Returns [`KernelError::EmptyOutputRange`] if `min > max`.
    pub fn with_range(mut self, min: i32, max: i32) -> Result<Self, KernelError> {
        if min > max {
            return Err(KernelError::EmptyOutputRange { min, max });
        }
        self.output_min = min;
        self.output_max = max;
        Ok(self)
    }

    /// Clamps to the full range of output type `O`.
    pub fn for_output<O: Saturate>(mut self) -> Self {
        self.output_min = O::MIN;
        self.output_max = O::MAX;
        self
    }

    /// Requantizes `x` with the parameters of group `g`, before narrowing.
    #[inline(always)]
    pub fn apply(&self, x: i32, g: usize) -> i32 {
        let (mul, add) = self.scale.get(g);
        let acc = x
            .wrapping_add(self.input_offset)
            .wrapping_mul(mul)
            .wrapping_add(add)
            .wrapping_add(round_bias(self.log2d, self.rounding));
        let shifted = (acc >> self.log2d.min(31)).wrapping_add(self.output_offset);
        clamp(shifted, self.output_min, self.output_max)
    }

    /// Requantizes and narrows into `O`.
    #[inline(always)]
    pub fn apply_to<O: Saturate>(&self, x: i32, g: usize) -> O {
        O::saturate(self.apply(x, g), self.output_min, self.output_max)
    }
}
