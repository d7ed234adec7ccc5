// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape descriptors passed alongside flat buffers.
//!
//! Buffers carry no shape metadata. These small `Copy` descriptors hold the
//! explicit dimension parameters and the derived output extents.

use crate::KernelError;
use std::fmt;

/// Dimensions of `Y[M, P] = A[M, N] * B[N, P]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GemmShape {
    pub m: usize,
    pub n: usize,
    pub p: usize,
}

impl GemmShape {
    pub const fn new(m: usize, n: usize, p: usize) -> Self {
        Self { m, n, p }
    }

    pub fn a_len(&self) -> usize {
        self.m * self.n
    }

    pub fn b_len(&self) -> usize {
        self.n * self.p
    }

    pub fn y_len(&self) -> usize {
        self.m * self.p
    }

    /// Flat index of logical `A[row, k]`, stored transposed when `trans` is set.
    #[inline(always)]
    pub fn a_index(&self, row: usize, k: usize, trans: bool) -> usize {
        if trans {
            k * self.m + row
        } else {
            row * self.n + k
        }
    }

    /// Flat index of logical `B[k, col]`, stored transposed when `trans` is set.
    #[inline(always)]
    pub fn b_index(&self, k: usize, col: usize, trans: bool) -> usize {
        if trans {
            col * self.n + k
        } else {
            k * self.p + col
        }
    }
}

impl fmt::Display for GemmShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}x{}] * [{}x{}]", self.m, self.n, self.n, self.p)
    }
}

/// Explicit zero-padding amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding {
    pub const fn uniform(pad: usize) -> Self {
        Self {
            top: pad,
            bottom: pad,
            left: pad,
            right: pad,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Geometry of a 2-D convolution or pooling window.
///
/// `c`, `h`, `w` describe the input, `f` the number of filters (output
/// channels), `p`, `q` the window and `sp`, `sq` the strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConvShape {
    pub c: usize,
    pub h: usize,
    pub w: usize,
    pub f: usize,
    pub p: usize,
    pub q: usize,
    pub sp: usize,
    pub sq: usize,
    pub padding: Padding,
}

impl ConvShape {
    /// Unit-stride, unpadded geometry.
    pub const fn new(c: usize, h: usize, w: usize, f: usize, p: usize, q: usize) -> Self {
        Self {
            c,
            h,
            w,
            f,
            p,
            q,
            sp: 1,
            sq: 1,
            padding: Padding {
                top: 0,
                bottom: 0,
                left: 0,
                right: 0,
            },
        }
    }

    pub fn with_stride(mut self, sp: usize, sq: usize) -> Self {
        self.sp = sp;
        self.sq = sq;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Checks that strides are non-zero and the window fits the padded input.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidShape`] describing the first violated rule.
    pub fn validate(self) -> Result<Self, KernelError> {
        if self.sp == 0 || self.sq == 0 {
            return Err(KernelError::InvalidShape {
                op: "conv2d",
                detail: format!("zero stride ({}, {})", self.sp, self.sq),
            });
        }
        if self.p == 0 || self.q == 0 {
            return Err(KernelError::InvalidShape {
                op: "conv2d",
                detail: format!("empty window {}x{}", self.p, self.q),
            });
        }
        if self.p > self.padded_h() || self.q > self.padded_w() {
            return Err(KernelError::InvalidShape {
                op: "conv2d",
                detail: format!(
                    "window {}x{} larger than padded input {}x{}",
                    self.p,
                    self.q,
                    self.padded_h(),
                    self.padded_w()
                ),
            });
        }
        Ok(self)
    }

    pub fn padded_h(&self) -> usize {
        self.h + self.padding.top + self.padding.bottom
    }

    pub fn padded_w(&self) -> usize {
        self.w + self.padding.left + self.padding.right
    }

    /// `H_out = (H_padded - P) / SP + 1`.
    pub fn out_h(&self) -> usize {
        (self.padded_h() - self.p) / self.sp + 1
    }

    /// `W_out = (W_padded - Q) / SQ + 1`.
    pub fn out_w(&self) -> usize {
        (self.padded_w() - self.q) / self.sq + 1
    }

    pub fn input_len(&self) -> usize {
        self.c * self.h * self.w
    }

    /// Weight elements of a dense convolution (`F * C * P * Q`).
    pub fn weight_len(&self) -> usize {
        self.f * self.c * self.p * self.q
    }

    /// Length of one receptive field (`C * P * Q`), the im2col row length.
    pub fn patch_len(&self) -> usize {
        self.c * self.p * self.q
    }

    pub fn output_len(&self) -> usize {
        self.f * self.out_h() * self.out_w()
    }
}

impl fmt::Display for ConvShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}x{}x{}] * [{}x{}x{}x{}] /({},{}) -> [{}x{}x{}]",
            self.c,
            self.h,
            self.w,
            self.f,
            self.c,
            self.p,
            self.q,
            self.sp,
            self.sq,
            self.f,
            self.out_h(),
            self.out_w()
        )
    }
}
