// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication: `Y[M, P] = A[M, N] * B[N, P]`.
//!
//! Integer products accumulate in wrapping `i32` after adding the zero-point
//! offsets to every operand. Work is split over the rows of `Y` unless the
//! kernel name says otherwise; every worker computes the full width of its
//! rows.

use crate::arith::Saturate;
use crate::{GemmShape, Requant, WorkPartition};

/// Zero-point offsets of a quantized matrix product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatMulOffsets {
    /// Added to every element of `A`.
    pub a: i32,
    /// Added to every element of `B`.
    pub b: i32,
    /// Added to every result.
    pub y: i32,
}

#[inline(always)]
fn dot_column<A, B>(a_row: &[A], b: &[B], col: usize, p: usize, off: &MatMulOffsets) -> i32
where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
{
    let mut sum = 0i32;
    for (k, &a) in a_row.iter().enumerate() {
        let lhs = a.into().wrapping_add(off.a);
        let rhs = b[k * p + col].into().wrapping_add(off.b);
        sum = sum.wrapping_add(lhs.wrapping_mul(rhs));
    }
    sum
}

/// Naive integer matrix product, rows split between workers.
pub fn matmul_int<A, B>(
    a: &[A],
    b: &[B],
    y: &mut [i32],
    shape: GemmShape,
    off: MatMulOffsets,
    part: WorkPartition,
) where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
{
    let GemmShape { n, p, .. } = shape;
    debug_assert_eq!(a.len(), shape.a_len());
    debug_assert_eq!(b.len(), shape.b_len());
    debug_assert_eq!(y.len(), shape.y_len());

    for row in part.block(shape.m) {
        let a_row = &a[row * n..(row + 1) * n];
        for col in 0..p {
            y[row * p + col] = dot_column(a_row, b, col, p, &off).wrapping_add(off.y);
        }
    }
}

/// Integer matrix product with the columns of `Y` split between workers.
pub fn matmul_int_cols<A, B>(
    a: &[A],
    b: &[B],
    y: &mut [i32],
    shape: GemmShape,
    off: MatMulOffsets,
    part: WorkPartition,
) where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
{
    let GemmShape { m, n, p } = shape;
    debug_assert_eq!(y.len(), shape.y_len());

    let cols = part.block(p);
    for row in 0..m {
        let a_row = &a[row * n..(row + 1) * n];
        for col in cols.clone() {
            y[row * p + col] = dot_column(a_row, b, col, p, &off).wrapping_add(off.y);
        }
    }
}

/// Integer matrix product computing 2x2 output tiles per inner loop.
///
/// Odd trailing rows and columns fall back to single-element cleanup loops,
/// so any `M`, `P` is supported. Results are bit-identical to [`matmul_int`].
pub fn matmul_int_unrolled<A, B>(
    a: &[A],
    b: &[B],
    y: &mut [i32],
    shape: GemmShape,
    off: MatMulOffsets,
    part: WorkPartition,
) where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
{
    let GemmShape { n, p, .. } = shape;
    let rows = part.block(shape.m);
    let even_rows_end = rows.start + (rows.len() & !1);
    let even_cols_end = p & !1;

    let mut row = rows.start;
    while row < even_rows_end {
        let a0 = &a[row * n..(row + 1) * n];
        let a1 = &a[(row + 1) * n..(row + 2) * n];
        let mut col = 0;
        while col < even_cols_end {
            let (mut s00, mut s01, mut s10, mut s11) = (0i32, 0i32, 0i32, 0i32);
            for k in 0..n {
                let x0 = a0[k].into().wrapping_add(off.a);
                let x1 = a1[k].into().wrapping_add(off.a);
                let w0 = b[k * p + col].into().wrapping_add(off.b);
                let w1 = b[k * p + col + 1].into().wrapping_add(off.b);
                s00 = s00.wrapping_add(x0.wrapping_mul(w0));
                s01 = s01.wrapping_add(x0.wrapping_mul(w1));
                s10 = s10.wrapping_add(x1.wrapping_mul(w0));
                s11 = s11.wrapping_add(x1.wrapping_mul(w1));
            }
            y[row * p + col] = s00.wrapping_add(off.y);
            y[row * p + col + 1] = s01.wrapping_add(off.y);
            y[(row + 1) * p + col] = s10.wrapping_add(off.y);
            y[(row + 1) * p + col + 1] = s11.wrapping_add(off.y);
            col += 2;
        }
        // Cleanup: last column.
        for col in even_cols_end..p {
            y[row * p + col] = dot_column(a0, b, col, p, &off).wrapping_add(off.y);
            y[(row + 1) * p + col] = dot_column(a1, b, col, p, &off).wrapping_add(off.y);
        }
        row += 2;
    }
    // Cleanup: last row.
    for row in even_rows_end..rows.end {
        let a_row = &a[row * n..(row + 1) * n];
        for col in 0..p {
            y[row * p + col] = dot_column(a_row, b, col, p, &off).wrapping_add(off.y);
        }
    }
}

/// Integer matrix product fused with requantization into a narrow output.
///
/// The scale group is the output row, so a per-channel [`crate::QuantScale`]
/// must hold `M` pairs.
pub fn rq_matmul<A, B, O>(
    a: &[A],
    b: &[B],
    y: &mut [O],
    shape: GemmShape,
    off: MatMulOffsets,
    rq: &Requant<'_>,
    part: WorkPartition,
) where
    A: Copy + Into<i32>,
    B: Copy + Into<i32>,
    O: Saturate,
{
    let GemmShape { n, p, .. } = shape;
    debug_assert_eq!(y.len(), shape.y_len());

    for row in part.block(shape.m) {
        let a_row = &a[row * n..(row + 1) * n];
        for col in 0..p {
            let acc = dot_column(a_row, b, col, p, &off);
            y[row * p + col] = rq.apply_to(acc, row);
        }
    }
}

/// Floating-point matrix product, rows split between workers.
///
/// Uses an i-k-j loop order so the inner loop streams a row of `B`.
pub fn matmul_f32(a: &[f32], b: &[f32], y: &mut [f32], shape: GemmShape, part: WorkPartition) {
    let GemmShape { n, p, .. } = shape;
    debug_assert_eq!(a.len(), shape.a_len());
    debug_assert_eq!(b.len(), shape.b_len());
    debug_assert_eq!(y.len(), shape.y_len());

    for row in part.block(shape.m) {
        let y_row = &mut y[row * p..(row + 1) * p];
        y_row.iter_mut().for_each(|v| *v = 0.0);
        for k in 0..n {
            let a_ik = a[row * n + k];
            let b_row = &b[k * p..(k + 1) * p];
            for (dst, &w) in y_row.iter_mut().zip(b_row) {
                *dst += a_ik * w;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuantScale;
    use proptest::prelude::*;

    fn run_int(
        kernel: fn(&[i8], &[i8], &mut [i32], GemmShape, MatMulOffsets, WorkPartition),
        a: &[i8],
        b: &[i8],
        shape: GemmShape,
        off: MatMulOffsets,
        n: usize,
    ) -> Vec<i32> {
        let mut y = vec![0i32; shape.y_len()];
        for part in WorkPartition::team(n) {
            kernel(a, b, &mut y, shape, off, part);
        }
        y
    }

    fn naive(a: &[i8], b: &[i8], shape: GemmShape, off: MatMulOffsets) -> Vec<i32> {
        let mut y = vec![0i32; shape.y_len()];
        for i in 0..shape.m {
            for j in 0..shape.p {
                let mut s = 0i32;
                for k in 0..shape.n {
                    s += (a[i * shape.n + k] as i32 + off.a) * (b[k * shape.p + j] as i32 + off.b);
                }
                y[i * shape.p + j] = s + off.y;
            }
        }
        y
    }

    #[test]
    fn test_matmul_2x2() {
        let a = [1i8, 2, 3, 4];
        let b = [5i8, 6, 7, 8];
        let shape = GemmShape::new(2, 2, 2);
        for n in [1, 2] {
            let y = run_int(matmul_int, &a, &b, shape, MatMulOffsets::default(), n);
            assert_eq!(y, vec![19, 22, 43, 50]);
        }
    }

    #[test]
    fn test_matmul_offsets() {
        // (A + 1) * (B - 1) + 10 with A = [[0]], B = [[3]] -> 1 * 2 + 10
        let off = MatMulOffsets { a: 1, b: -1, y: 10 };
        let y = run_int(matmul_int, &[0], &[3], GemmShape::new(1, 1, 1), off, 1);
        assert_eq!(y, vec![12]);
    }

    #[test]
    fn test_unrolled_odd_dimensions() {
        let shape = GemmShape::new(5, 3, 7);
        let a: Vec<i8> = (0..15).map(|v| (v * 11 % 255 - 127) as i8).collect();
        let b: Vec<i8> = (0..21).map(|v| (v * 29 % 255 - 127) as i8).collect();
        let off = MatMulOffsets { a: 3, b: -2, y: 1 };
        let expected = naive(&a, &b, shape, off);
        for n in [1, 2, 3] {
            assert_eq!(run_int(matmul_int_unrolled, &a, &b, shape, off, n), expected);
            assert_eq!(run_int(matmul_int_cols, &a, &b, shape, off, n), expected);
        }
    }

    #[test]
    fn test_rq_matmul_per_row() {
        let a = [1i8, 2, 3, 4];
        let b = [5i8, 6, 7, 8];
        let mul = [1, 2];
        let add = [0, 0];
        let rq = Requant::new(QuantScale::per_channel(&mul, &add).unwrap(), 1)
            .with_rounding(true)
            .for_output::<i8>();
        let mut y = [0i8; 4];
        let (shape, off) = (GemmShape::new(2, 2, 2), MatMulOffsets::default());
        rq_matmul(&a, &b, &mut y, shape, off, &rq, WorkPartition::single());
        // Row 0: (19 + 1) >> 1 = 10, (22 + 1) >> 1 = 11.
        // Row 1: (86 + 1) >> 1 = 43, (100 + 1) >> 1 = 50.
        assert_eq!(y, [10, 11, 43, 50]);
    }

    #[test]
    fn test_matmul_f32() {
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0f32, 8.0, 9.0, 10.0, 11.0, 12.0];
        let mut y = [f32::NAN; 4];
        for part in WorkPartition::team(2) {
            matmul_f32(&a, &b, &mut y, GemmShape::new(2, 3, 2), part);
        }
        assert_eq!(y, [58.0, 64.0, 139.0, 154.0]);
    }

    proptest! {
        #[test]
        fn prop_workers_match_single(
            m in 1usize..9,
            n in 1usize..9,
            p in 1usize..9,
            workers in 1usize..8,
            seed in any::<u64>(),
        ) {
            let shape = GemmShape::new(m, n, p);
            let a: Vec<i8> = (0..shape.a_len()).map(|i| seed.rotate_left(i as u32) as i8).collect();
            let b: Vec<i8> =
                (0..shape.b_len()).map(|i| seed.rotate_right(i as u32) as i8).collect();
            let off = MatMulOffsets { a: 5, b: -3, y: 0 };
            let single = run_int(matmul_int, &a, &b, shape, off, 1);
            prop_assert_eq!(&single, &naive(&a, &b, shape, off));
            prop_assert_eq!(&run_int(matmul_int, &a, &b, shape, off, workers), &single);
            prop_assert_eq!(&run_int(matmul_int_unrolled, &a, &b, shape, off, workers), &single);
        }
    }
}
