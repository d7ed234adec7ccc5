// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! General matrix multiply: `Y = alpha * op(A) * op(B) + beta * C`.
//!
//! `op(X)` is `X` or `X^T` depending on the transpose flags; `op(A)` is
//! always `M x N` and `op(B)` always `N x P`. Rows of `Y` are split between
//! workers.

use crate::arith::Saturate;
use crate::{GemmShape, Requant, WorkPartition};

/// Scalars and transpose flags of a GEMM call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmParams<T> {
    pub alpha: T,
    pub beta: T,
    pub trans_a: bool,
    pub trans_b: bool,
}

impl<T> GemmParams<T> {
    pub fn transposed(mut self, trans_a: bool, trans_b: bool) -> Self {
        self.trans_a = trans_a;
        self.trans_b = trans_b;
        self
    }
}

impl Default for GemmParams<i32> {
    fn default() -> Self {
        Self {
            alpha: 1,
            beta: 1,
            trans_a: false,
            trans_b: false,
        }
    }
}

impl Default for GemmParams<f32> {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
            trans_a: false,
            trans_b: false,
        }
    }
}

/// Zero-point offsets of a quantized GEMM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GemmOffsets {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub y: i32,
}

#[inline(always)]
fn gemm_acc<A, B>(
    a: &[A],
    b: &[B],
    shape: &GemmShape,
    row: usize,
    col: usize,
    params: &GemmParams<i32>,
    off: &GemmOffsets,
) -> i32
where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
{
    let mut sum = 0i32;
    for k in 0..shape.n {
        let lhs = a[shape.a_index(row, k, params.trans_a)].into().wrapping_add(off.a);
        let rhs = b[shape.b_index(k, col, params.trans_b)].into().wrapping_add(off.b);
        sum = sum.wrapping_add(lhs.wrapping_mul(rhs));
    }
    sum
}

#[inline(always)]
fn affine(sum: i32, c: i32, params: &GemmParams<i32>, off: &GemmOffsets) -> i32 {
    params
        .alpha
        .wrapping_mul(sum)
        .wrapping_add(params.beta.wrapping_mul(c.wrapping_add(off.c)))
}

/// Integer GEMM into a wide `i32` result. `c` is an `M x P` matrix.
#[allow(clippy::too_many_arguments)]
pub fn gemm_int<A, B>(
    a: &[A],
    b: &[B],
    c: &[i32],
    y: &mut [i32],
    shape: GemmShape,
    params: GemmParams<i32>,
    off: GemmOffsets,
    part: WorkPartition,
) where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
{
    debug_assert_eq!(a.len(), shape.a_len());
    debug_assert_eq!(b.len(), shape.b_len());
    debug_assert_eq!(c.len(), shape.y_len());
    debug_assert_eq!(y.len(), shape.y_len());

    let p = shape.p;
    for row in part.block(shape.m) {
        for col in 0..p {
            let sum = gemm_acc(a, b, &shape, row, col, &params, &off);
            y[row * p + col] = affine(sum, c[row * p + col], &params, &off).wrapping_add(off.y);
        }
    }
}

/// Integer GEMM fused with requantization (RQGemm).
///
/// The affine result `alpha * sum + beta * (C + c_offset)` is requantized
/// with the scale of its output row; `off.y` is ignored in favour of the
/// requantizer's output offset.
#[allow(clippy::too_many_arguments)]
pub fn rq_gemm<A, B, O>(
    a: &[A],
    b: &[B],
    c: &[i32],
    y: &mut [O],
    shape: GemmShape,
    params: GemmParams<i32>,
    off: GemmOffsets,
    rq: &Requant<'_>,
    part: WorkPartition,
) where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
    O: Saturate,
{
    debug_assert_eq!(c.len(), shape.y_len());
    debug_assert_eq!(y.len(), shape.y_len());

    let p = shape.p;
    for row in part.block(shape.m) {
        for col in 0..p {
            let sum = gemm_acc(a, b, &shape, row, col, &params, &off);
            let acc = affine(sum, c[row * p + col], &params, &off);
            y[row * p + col] = rq.apply_to(acc, row);
        }
    }
}

/// Floating-point GEMM; without `c` the result is `alpha * op(A) * op(B)`.
pub fn gemm_f32(
    a: &[f32],
    b: &[f32],
    c: Option<&[f32]>,
    y: &mut [f32],
    shape: GemmShape,
    params: GemmParams<f32>,
    part: WorkPartition,
) {
    debug_assert_eq!(a.len(), shape.a_len());
    debug_assert_eq!(b.len(), shape.b_len());
    debug_assert_eq!(y.len(), shape.y_len());

    let p = shape.p;
    for row in part.block(shape.m) {
        for col in 0..p {
            let mut sum = 0.0f32;
            for k in 0..shape.n {
                sum += a[shape.a_index(row, k, params.trans_a)]
                    * b[shape.b_index(k, col, params.trans_b)];
            }
            let mut out = params.alpha * sum;
            if let Some(c) = c {
                out += params.beta * c[row * p + col];
            }
            y[row * p + col] = out;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuantScale;

    fn transpose<T: Copy>(x: &[T], rows: usize, cols: usize) -> Vec<T> {
        let mut t = Vec::with_capacity(x.len());
        for j in 0..cols {
            for i in 0..rows {
                t.push(x[i * cols + j]);
            }
        }
        t
    }

    const A: [i8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, -1, -2, -3, -4, 0, 1, 0, 1];
    const B: [i8; 16] = [2, 0, 0, 1, 0, 2, 1, 0, 1, 1, 1, 1, -1, 0, 2, 3];

    fn expected_ab() -> Vec<i32> {
        let mut y = vec![0i32; 16];
        for i in 0..4 {
            for j in 0..4 {
                y[i * 4 + j] = (0..4).map(|k| A[i * 4 + k] as i32 * B[k * 4 + j] as i32).sum();
            }
        }
        y
    }

    #[test]
    fn test_transpose_combinations_agree() {
        let shape = GemmShape::new(4, 4, 4);
        let zero_c = [0i32; 16];
        let a_t = transpose(&A, 4, 4);
        let b_t = transpose(&B, 4, 4);
        let expected = expected_ab();

        for (ta, tb) in [(false, false), (true, false), (false, true), (true, true)] {
            let a = if ta { &a_t[..] } else { &A[..] };
            let b = if tb { &b_t[..] } else { &B[..] };
            let mut y = [0i32; 16];
            for part in WorkPartition::team(3) {
                gemm_int(
                    a,
                    b,
                    &zero_c,
                    &mut y,
                    shape,
                    GemmParams::default().transposed(ta, tb),
                    GemmOffsets::default(),
                    part,
                );
            }
            assert_eq!(y.to_vec(), expected, "transA={ta} transB={tb}");
        }
    }

    #[test]
    fn test_non_square_transpose() {
        // A is 2x3, B is 3x1.
        let a = [1i8, 2, 3, 4, 5, 6];
        let b = [1i8, 0, -1];
        let shape = GemmShape::new(2, 3, 1);
        let mut y = [0i32; 2];
        let (params, off) = (GemmParams::default(), GemmOffsets::default());
        gemm_int(&a, &b, &[0, 0], &mut y, shape, params, off, WorkPartition::single());
        assert_eq!(y, [-2, -2]);

        let a_t = transpose(&a, 2, 3);
        let mut y_t = [0i32; 2];
        gemm_int(
            &a_t,
            &b,
            &[0, 0],
            &mut y_t,
            shape,
            GemmParams::default().transposed(true, false),
            GemmOffsets::default(),
            WorkPartition::single(),
        );
        assert_eq!(y_t, y);
    }

    #[test]
    fn test_alpha_beta_offsets() {
        let params = GemmParams { alpha: 2, beta: 3, trans_a: false, trans_b: false };
        let off = GemmOffsets { a: 1, b: 0, c: -1, y: 5 };
        let mut y = [0i32; 1];
        // 2 * ((1 + 1) * 3) + 3 * (4 - 1) + 5 = 12 + 9 + 5
        let shape = GemmShape::new(1, 1, 1);
        gemm_int(&[1i8], &[3i8], &[4], &mut y, shape, params, off, WorkPartition::single());
        assert_eq!(y, [26]);
    }

    #[test]
    fn test_rq_gemm_per_row_vs_uniform() {
        let shape = GemmShape::new(4, 4, 4);
        let c: Vec<i32> = (0..16).collect();
        let mul = [3, 3, 3, 3];
        let add = [-4, -4, -4, -4];
        let base = Requant::new(QuantScale::per_channel(&mul, &add).unwrap(), 2)
            .with_rounding(true)
            .with_offsets(0, 1)
            .for_output::<i8>();
        let uniform = Requant { scale: QuantScale::uniform(3, -4), ..base };

        let mut y_rows = [0i8; 16];
        let mut y_uni = [0i8; 16];
        let (params, off) = (GemmParams::default(), GemmOffsets::default());
        for part in WorkPartition::team(2) {
            rq_gemm(&A, &B, &c, &mut y_rows, shape, params, off, &base, part);
            rq_gemm(&A, &B, &c, &mut y_uni, shape, params, off, &uniform, part);
        }
        assert_eq!(y_rows, y_uni);

        let expected: Vec<i8> = expected_ab()
            .iter()
            .zip(&c)
            .map(|(&s, &cv)| ((((s + cv) * 3 - 4 + 2) >> 2) + 1).clamp(-128, 127) as i8)
            .collect();
        assert_eq!(y_rows.to_vec(), expected);
    }

    #[test]
    fn test_gemm_f32_optional_bias() {
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [1.0f32, 0.0, 0.0, 1.0];
        let c = [10.0f32, 20.0, 30.0, 40.0];
        let shape = GemmShape::new(2, 2, 2);

        let mut y = [0.0f32; 4];
        gemm_f32(&a, &b, None, &mut y, shape, GemmParams::default(), WorkPartition::single());
        assert_eq!(y, [1.0, 2.0, 3.0, 4.0]);

        let params = GemmParams { alpha: 2.0, beta: 0.5, trans_a: true, trans_b: false };
        gemm_f32(&a, &b, Some(&c), &mut y, shape, params, WorkPartition::single());
        // A^T = [[1, 3], [2, 4]]
        assert_eq!(y, [7.0, 16.0, 19.0, 28.0]);
    }
}
