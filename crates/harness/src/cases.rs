// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`KernelCase`] trait and the built-in kernel cases.
//!
//! Every case draws seeded random inputs, computes a golden result and
//! compares it against the same kernel run on a [`Cluster`]. Integer cases
//! compare against naive scalar references written out from the kernel
//! formulas. A few floating-point cases use a single-worker run of a
//! related kernel as the golden, which checks that splitting the work does
//! not change a single bit.

use crate::{CaseOutcome, Cluster, HarnessError};
use kernel_core::{
    self as kc, ConvShape, DType, GemmShape, Padding, QuantScale, Requant, WorkPartition,
};
use rand::rngs::StdRng;
use rand::Rng;
use std::fmt::Debug;
use std::sync::Arc;

/// A runnable kernel test.
///
/// Cases are purely computational, so the same case can run on any number
/// of clusters concurrently.
pub trait KernelCase: Send + Sync {
    /// Stable identifier used in configs and on the command line.
    fn name(&self) -> &'static str;

    /// One-line description for listings.
    fn description(&self) -> &'static str;

    /// Element type of the output buffer the case checks.
    fn output_dtype(&self) -> DType;

    /// Generates inputs from `rng`, runs the kernel on `cluster` and counts mismatches.
    fn run(&self, cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError>;
}

type CaseFn = fn(&Cluster, &mut StdRng) -> Result<CaseOutcome, HarnessError>;

struct FnCase {
    name: &'static str,
    output: DType,
    description: &'static str,
    run: CaseFn,
}

impl KernelCase for FnCase {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn output_dtype(&self) -> DType {
        self.output
    }

    fn run(&self, cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
        (self.run)(cluster, rng)
    }
}

const CASES: &[(&str, DType, &str, CaseFn)] = &[
    ("requant_nhwc_s8", DType::I8, "RequantShift s32 -> s8, channel-last", requant_nhwc),
    ("requant_nchw_s8", DType::I8, "RequantShift s16 -> s8, channel-first", requant_nchw),
    ("matmul_s8", DType::I32, "MatMul s8 x s8 -> s32 with offsets", matmul_s8),
    ("matmul_unrolled_s8", DType::I32, "2x2-tiled MatMul, odd shapes", matmul_unrolled_s8),
    ("rq_matmul_s8", DType::I8, "MatMul fused with per-row requantization", rq_matmul_s8),
    ("gemm_s8", DType::I32, "GEMM with random transpose flags, alpha, beta, offsets", gemm_s8),
    ("rq_gemm_s8", DType::I8, "GEMM fused with requantization", rq_gemm_s8),
    ("gemm_f32", DType::F32, "Floating-point GEMM with bias", gemm_f32),
    ("conv2d_s8_nchw", DType::I32, "Dense convolution s8 -> s32, channel-first", conv2d_s8_nchw),
    ("dw_conv2d_s8_nchw", DType::I32, "Depthwise convolution s8 -> s32", dw_conv2d_s8_nchw),
    ("conv2d_s8_hwc", DType::I32, "Dense convolution s8 -> s32, channel-last", conv2d_s8_hwc),
    ("conv2d_s8_im2col", DType::I32, "im2col convolution s8 -> s32", conv2d_s8_im2col),
    ("conv2d_f32_im2col", DType::F32, "im2col convolution f32 with padding", conv2d_f32_im2col),
    ("maxpool_s8", DType::I8, "Max pooling s8, channel-first", maxpool_s8),
    ("layernorm_s8", DType::I8, "Integer Layernorm, integer sqrt", layernorm_s8),
    ("layernorm_f32_split", DType::F32, "Layernorm, split affine step", layernorm_f32_split),
    ("irmsnorm_s8", DType::I8, "Integer RMSNorm", irmsnorm_s8),
    ("softmax_f32", DType::F32, "Floating-point softmax", softmax_f32),
    ("softmax_s8", DType::I8, "Polynomial integer softmax, per-worker scratch", softmax_s8),
    ("ita_max", DType::I8, "ITA shift-based softmax", ita_max),
    ("ita_partial_max", DType::I8, "ITA softmax with grouped online max", ita_partial_max),
    ("gelu_s8", DType::I32, "Integer GELU s8 -> s32", gelu_s8),
    ("rq_hardswish_s8", DType::I8, "Integer Hardswish fused with requantization", rq_hardswish_s8),
    ("rq_div_s8", DType::I8, "Integer division fused with requantization", rq_div_s8),
];

/// All registered cases, in listing order.
pub fn builtin_cases() -> Vec<Arc<dyn KernelCase>> {
    CASES
        .iter()
        .map(|&(name, output, description, run)| {
            Arc::new(FnCase { name, output, description, run }) as Arc<dyn KernelCase>
        })
        .collect()
}

/// Looks up a registered case by name.
pub fn find_case(name: &str) -> Result<Arc<dyn KernelCase>, HarnessError> {
    builtin_cases()
        .into_iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| HarnessError::UnknownCase(name.to_string()))
}

// ── Comparison ─────────────────────────────────────────────────

const MAX_REPORTED_MISMATCHES: usize = 5;

fn compare_exact<T: PartialEq + Debug>(case: &str, golden: &[T], actual: &[T]) -> CaseOutcome {
    let mut errors = 0;
    for (i, (g, a)) in golden.iter().zip(actual).enumerate() {
        if g != a {
            if errors < MAX_REPORTED_MISMATCHES {
                tracing::warn!(case, index = i, expected = ?g, actual = ?a, "mismatch");
            }
            errors += 1;
        }
    }
    CaseOutcome { errors, total: golden.len() }
}

fn compare_f32(case: &str, golden: &[f32], actual: &[f32], tol: f32) -> CaseOutcome {
    let mut errors = 0;
    for (i, (g, a)) in golden.iter().zip(actual).enumerate() {
        if (g - a).abs() <= tol {
            continue;
        }
        if errors < MAX_REPORTED_MISMATCHES {
            tracing::warn!(case, index = i, expected = g, actual = a, "mismatch beyond tolerance");
        }
        errors += 1;
    }
    CaseOutcome { errors, total: golden.len() }
}

/// Runs `kernel` as a lone worker on a fresh buffer.
fn single<T: Clone>(len: usize, init: T, kernel: impl Fn(WorkPartition, &mut [T])) -> Vec<T> {
    let mut out = vec![init; len];
    kernel(WorkPartition::single(), &mut out);
    out
}

/// Runs `kernel` on the cluster on a fresh buffer.
fn clustered<T, F>(
    cluster: &Cluster,
    len: usize,
    init: T,
    kernel: F,
) -> Result<Vec<T>, HarnessError>
where
    T: Copy + PartialEq + Send + Sync,
    F: Fn(WorkPartition, &mut [T]) + Sync,
{
    let mut out = vec![init; len];
    cluster.run(&mut out, kernel)?;
    Ok(out)
}

// ── Input generation ───────────────────────────────────────────

fn random_i8(rng: &mut StdRng, len: usize) -> Vec<i8> {
    (0..len).map(|_| rng.gen()).collect()
}

fn random_i32(rng: &mut StdRng, len: usize, lo: i32, hi: i32) -> Vec<i32> {
    (0..len).map(|_| rng.gen_range(lo..=hi)).collect()
}

fn random_f32(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-2.0f32..2.0)).collect()
}

/// Reference requantization in 64-bit arithmetic.
fn golden_requant(x: i32, mul: i32, add: i32, log2d: u32, in_off: i32, out_off: i32) -> i8 {
    let bias = if log2d > 0 { 1i64 << (log2d - 1) } else { 0 };
    let v = ((i64::from(x) + i64::from(in_off)) * i64::from(mul) + i64::from(add) + bias) >> log2d;
    (v + i64::from(out_off)).clamp(-128, 127) as i8
}

fn golden_matmul(a: &[i8], b: &[i8], shape: GemmShape, off_a: i32, off_b: i32) -> Vec<i32> {
    let GemmShape { m, n, p } = shape;
    let mut y = vec![0i32; m * p];
    for i in 0..m {
        for j in 0..p {
            y[i * p + j] = (0..n)
                .map(|k| (i32::from(a[i * n + k]) + off_a) * (i32::from(b[k * p + j]) + off_b))
                .sum();
        }
    }
    y
}

fn transpose<T: Copy>(x: &[T], rows: usize, cols: usize) -> Vec<T> {
    (0..cols)
        .flat_map(|j| (0..rows).map(move |i| x[i * cols + j]))
        .collect()
}

// ── RequantShift ───────────────────────────────────────────────

fn requant_nhwc(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let channels = 8;
    let input = random_i32(rng, channels * 37, -(1 << 15), 1 << 15);
    let mul = random_i32(rng, channels, 1, 64);
    let add = random_i32(rng, channels, -256, 256);
    let (log2d, in_off, out_off) = (10, rng.gen_range(-8..=8), rng.gen_range(-8..=8));
    let rq = Requant::new(QuantScale::per_channel(&mul, &add)?, log2d)
        .with_rounding(true)
        .with_offsets(in_off, out_off)
        .for_output::<i8>();

    let golden: Vec<i8> = input
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let g = i % channels;
            golden_requant(x, mul[g], add[g], log2d, in_off, out_off)
        })
        .collect();
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::requant_shift_nhwc(&input, out, channels, &rq, part)
    })?;
    Ok(compare_exact("requant_nhwc_s8", &golden, &actual))
}

fn requant_nchw(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (channels, hw) = (6, 25);
    let input: Vec<i16> = (0..channels * hw).map(|_| rng.gen()).collect();
    let mul = random_i32(rng, channels, 1, 32);
    let add = random_i32(rng, channels, -64, 64);
    let log2d = 8;
    let rq = Requant::new(QuantScale::per_channel(&mul, &add)?, log2d)
        .with_rounding(true)
        .for_output::<i8>();

    let golden: Vec<i8> = input
        .iter()
        .enumerate()
        .map(|(i, &x)| golden_requant(i32::from(x), mul[i / hw], add[i / hw], log2d, 0, 0))
        .collect();
    let strided = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::requant_shift_nchw(&input, out, hw, &rq, part)
    })?;
    let planes = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::requant_shift_nchw_planes(&input, out, hw, &rq, part)
    })?;
    Ok(compare_exact("requant_nchw_s8", &golden, &strided)
        .merge(compare_exact("requant_nchw_s8", &golden, &planes)))
}

// ── MatMul / GEMM ──────────────────────────────────────────────

fn matmul_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = GemmShape::new(16, 24, 12);
    let a = random_i8(rng, shape.a_len());
    let b = random_i8(rng, shape.b_len());
    let off = kc::MatMulOffsets { a: rng.gen_range(-4..=4), b: rng.gen_range(-4..=4), y: 0 };

    let golden = golden_matmul(&a, &b, shape, off.a, off.b);
    let rows = clustered(cluster, shape.y_len(), 0i32, |part, y| {
        kc::matmul_int(&a, &b, y, shape, off, part)
    })?;
    let cols = clustered(cluster, shape.y_len(), 0i32, |part, y| {
        kc::matmul_int_cols(&a, &b, y, shape, off, part)
    })?;
    Ok(compare_exact("matmul_s8", &golden, &rows).merge(compare_exact("matmul_s8", &golden, &cols)))
}

fn matmul_unrolled_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = GemmShape::new(rng.gen_range(1..=17), rng.gen_range(1..=9), rng.gen_range(1..=13));
    let a = random_i8(rng, shape.a_len());
    let b = random_i8(rng, shape.b_len());
    let off = kc::MatMulOffsets::default();

    let golden = golden_matmul(&a, &b, shape, 0, 0);
    let actual = clustered(cluster, shape.y_len(), 0i32, |part, y| {
        kc::matmul_int_unrolled(&a, &b, y, shape, off, part)
    })?;
    Ok(compare_exact("matmul_unrolled_s8", &golden, &actual))
}

fn rq_matmul_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = GemmShape::new(8, 16, 8);
    let a = random_i8(rng, shape.a_len());
    let b = random_i8(rng, shape.b_len());
    let mul = random_i32(rng, shape.m, 1, 16);
    let add = random_i32(rng, shape.m, -128, 128);
    let rq = Requant::new(QuantScale::per_channel(&mul, &add)?, 9)
        .with_rounding(true)
        .for_output::<i8>();

    let golden: Vec<i8> = golden_matmul(&a, &b, shape, 0, 0)
        .iter()
        .enumerate()
        .map(|(i, &acc)| golden_requant(acc, mul[i / shape.p], add[i / shape.p], 9, 0, 0))
        .collect();
    let actual = clustered(cluster, shape.y_len(), 0i8, |part, y| {
        kc::rq_matmul(&a, &b, y, shape, kc::MatMulOffsets::default(), &rq, part)
    })?;
    Ok(compare_exact("rq_matmul_s8", &golden, &actual))
}

/// Random GEMM operands with both the logical and the stored layouts.
struct GemmOperands {
    shape: GemmShape,
    a_logical: Vec<i8>,
    b_logical: Vec<i8>,
    a_stored: Vec<i8>,
    b_stored: Vec<i8>,
    c: Vec<i32>,
    params: kc::GemmParams<i32>,
}

fn gemm_operands(rng: &mut StdRng) -> GemmOperands {
    let shape = GemmShape::new(rng.gen_range(1..=12), rng.gen_range(1..=12), rng.gen_range(1..=12));
    let (trans_a, trans_b) = (rng.gen_bool(0.5), rng.gen_bool(0.5));
    let a_logical = random_i8(rng, shape.a_len());
    let b_logical = random_i8(rng, shape.b_len());
    let a_stored = if trans_a {
        transpose(&a_logical, shape.m, shape.n)
    } else {
        a_logical.clone()
    };
    let b_stored = if trans_b {
        transpose(&b_logical, shape.n, shape.p)
    } else {
        b_logical.clone()
    };
    let c = random_i32(rng, shape.y_len(), -1000, 1000);
    let params = kc::GemmParams {
        alpha: rng.gen_range(1..=3),
        beta: rng.gen_range(0..=2),
        trans_a,
        trans_b,
    };
    GemmOperands { shape, a_logical, b_logical, a_stored, b_stored, c, params }
}

fn gemm_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let ops = gemm_operands(rng);
    let off = kc::GemmOffsets { a: 1, b: -1, c: 3, y: -7 };
    tracing::debug!(
        shape = %ops.shape,
        trans_a = ops.params.trans_a,
        trans_b = ops.params.trans_b,
        "gemm operands"
    );

    let golden: Vec<i32> = golden_matmul(&ops.a_logical, &ops.b_logical, ops.shape, off.a, off.b)
        .iter()
        .zip(&ops.c)
        .map(|(&s, &c)| ops.params.alpha * s + ops.params.beta * (c + off.c) + off.y)
        .collect();
    let actual = clustered(cluster, ops.shape.y_len(), 0i32, |part, y| {
        kc::gemm_int(&ops.a_stored, &ops.b_stored, &ops.c, y, ops.shape, ops.params, off, part)
    })?;
    Ok(compare_exact("gemm_s8", &golden, &actual))
}

fn rq_gemm_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let ops = gemm_operands(rng);
    let mul = random_i32(rng, ops.shape.m, 1, 8);
    let add = random_i32(rng, ops.shape.m, -32, 32);
    let per_row = rng.gen_bool(0.5);
    let rq = Requant::new(QuantScale::select(&mul, &add, per_row)?, 8)
        .with_rounding(true)
        .with_offsets(0, 2)
        .for_output::<i8>();

    let golden: Vec<i8> = golden_matmul(&ops.a_logical, &ops.b_logical, ops.shape, 0, 0)
        .iter()
        .zip(&ops.c)
        .enumerate()
        .map(|(i, (&s, &c))| {
            let g = if per_row { i / ops.shape.p } else { 0 };
            let acc = ops.params.alpha * s + ops.params.beta * c;
            golden_requant(acc, mul[g], add[g], 8, 0, 2)
        })
        .collect();
    let actual = clustered(cluster, ops.shape.y_len(), 0i8, |part, y| {
        kc::rq_gemm(
            &ops.a_stored,
            &ops.b_stored,
            &ops.c,
            y,
            ops.shape,
            ops.params,
            kc::GemmOffsets::default(),
            &rq,
            part,
        )
    })?;
    Ok(compare_exact("rq_gemm_s8", &golden, &actual))
}

fn gemm_f32(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = GemmShape::new(9, 14, 7);
    let a = random_f32(rng, shape.a_len());
    let b = random_f32(rng, shape.b_len());
    let c = random_f32(rng, shape.y_len());
    let params = kc::GemmParams { alpha: 0.5, beta: 2.0, trans_a: false, trans_b: false };

    let golden = single(shape.y_len(), 0.0f32, |part, y| {
        kc::matmul_f32(&a, &b, y, shape, part);
    })
    .iter()
    .zip(&c)
    .map(|(&ab, &cv)| params.alpha * ab + params.beta * cv)
    .collect::<Vec<f32>>();
    let actual = clustered(cluster, shape.y_len(), 0.0f32, |part, y| {
        kc::gemm_f32(&a, &b, Some(c.as_slice()), y, shape, params, part)
    })?;
    Ok(compare_f32("gemm_f32", &golden, &actual, 1e-3))
}

// ── Convolution / pooling ──────────────────────────────────────

fn golden_conv_nchw(
    input: &[i8],
    weight: &[i8],
    s: &ConvShape,
    in_off: i32,
    out_off: i32,
    depthwise: bool,
) -> Vec<i32> {
    let (h_out, w_out) = (s.out_h(), s.out_w());
    let mut out = vec![0i32; s.f * h_out * w_out];
    for f in 0..s.f {
        for oh in 0..h_out {
            for ow in 0..w_out {
                let channels = if depthwise { f..f + 1 } else { 0..s.c };
                let mut acc = 0i32;
                for c in channels {
                    for p in 0..s.p {
                        for q in 0..s.q {
                            let (ih, iw) = (oh * s.sp + p, ow * s.sq + q);
                            let x = i32::from(input[(c * s.h + ih) * s.w + iw]) + in_off;
                            let w = if depthwise {
                                weight[(f * s.p + p) * s.q + q]
                            } else {
                                weight[((f * s.c + c) * s.p + p) * s.q + q]
                            };
                            acc += x * i32::from(w);
                        }
                    }
                }
                out[(f * h_out + oh) * w_out + ow] = acc + out_off;
            }
        }
    }
    out
}

fn random_conv_shape(rng: &mut StdRng, depthwise: bool) -> Result<ConvShape, HarnessError> {
    let c = rng.gen_range(1..=4);
    let f = if depthwise { c } else { rng.gen_range(1..=5) };
    let (h, w) = (rng.gen_range(4..=9), rng.gen_range(4..=9));
    let (p, q) = (rng.gen_range(1..=3), rng.gen_range(1..=3));
    let shape = ConvShape::new(c, h, w, f, p, q)
        .with_stride(rng.gen_range(1..=2), rng.gen_range(1..=2))
        .validate()?;
    tracing::debug!(%shape, "convolution geometry");
    Ok(shape)
}

fn conv2d_s8_nchw(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = random_conv_shape(rng, false)?;
    let input = random_i8(rng, shape.input_len());
    let weight = random_i8(rng, shape.weight_len());

    let golden = golden_conv_nchw(&input, &weight, &shape, 2, -5, false);
    let actual = clustered(cluster, shape.output_len(), 0i32, |part, out| {
        kc::conv2d_int_nchw(&input, &weight, out, &shape, 2, -5, part)
    })?;
    Ok(compare_exact("conv2d_s8_nchw", &golden, &actual))
}

fn dw_conv2d_s8_nchw(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = random_conv_shape(rng, true)?;
    let input = random_i8(rng, shape.input_len());
    let weight = random_i8(rng, shape.c * shape.p * shape.q);

    let golden = golden_conv_nchw(&input, &weight, &shape, -3, 1, true);
    let actual = clustered(cluster, shape.output_len(), 0i32, |part, out| {
        kc::dw_conv2d_int_nchw(&input, &weight, out, &shape, -3, 1, part)
    })?;
    Ok(compare_exact("dw_conv2d_s8_nchw", &golden, &actual))
}

fn conv2d_s8_hwc(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = random_conv_shape(rng, false)?;
    let ConvShape { c, h, w, f, p, q, .. } = shape;
    let input = random_i8(rng, shape.input_len());
    let weight = random_i8(rng, shape.weight_len());

    // [C][H*W] -> [H*W][C] and [F][C][P*Q] -> [F][P*Q][C]
    let input_hwc = transpose(&input, c, h * w);
    let weight_hwc: Vec<i8> = weight
        .chunks(c * p * q)
        .flat_map(|filt| transpose(filt, c, p * q))
        .collect();
    let golden_nchw = golden_conv_nchw(&input, &weight, &shape, 0, 0, false);
    let golden = transpose(&golden_nchw, f, shape.out_h() * shape.out_w());

    let actual = clustered(cluster, shape.output_len(), 0i32, |part, out| {
        kc::conv2d_int_hwc(&input_hwc, &weight_hwc, out, &shape, 0, 0, part)
    })?;
    Ok(compare_exact("conv2d_s8_hwc", &golden, &actual))
}

fn conv2d_s8_im2col(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = random_conv_shape(rng, false)?;
    let ConvShape { c, h, w, f, p, q, .. } = shape;
    let input = random_i8(rng, shape.input_len());
    let weight = random_i8(rng, shape.weight_len());
    let (in_off, out_off) = (rng.gen_range(-8..=8), rng.gen_range(-64..=64));

    let input_hwc = transpose(&input, c, h * w);
    let weight_hwc: Vec<i8> = weight
        .chunks(c * p * q)
        .flat_map(|filt| transpose(filt, c, p * q))
        .collect();
    let golden_nchw = golden_conv_nchw(&input, &weight, &shape, in_off, out_off, false);
    let golden = transpose(&golden_nchw, f, shape.out_h() * shape.out_w());

    let actual = clustered(cluster, shape.output_len(), 0i32, |part, out| {
        let mut scratch = vec![0i8; kc::im2col_scratch_len(&shape)];
        kc::conv2d_int_im2col_hwc(
            &input_hwc,
            &weight_hwc,
            out,
            &shape,
            in_off,
            out_off,
            &mut scratch,
            part,
        )
    })?;
    Ok(compare_exact("conv2d_s8_im2col", &golden, &actual))
}

fn conv2d_f32_im2col(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let pad = rng.gen_range(0..=1);
    let shape = ConvShape::new(3, 8, 8, 4, 3, 3)
        .with_stride(rng.gen_range(1..=2), 1)
        .with_padding(Padding::uniform(pad))
        .validate()?;
    let input = random_f32(rng, shape.input_len());
    let weight = random_f32(rng, shape.weight_len());
    let bias_values = random_f32(rng, shape.f);
    let bias = Some(bias_values.as_slice());

    // Both kernels accumulate taps in (P, Q, C) order, so the results agree exactly.
    let golden = single(shape.output_len(), 0.0f32, |part, out| {
        kc::conv2d_f32_hwc(&input, &weight, bias, out, &shape, part)
    });
    let actual = clustered(cluster, shape.output_len(), 0.0f32, |part, out| {
        let mut scratch = vec![0.0f32; kc::im2col_scratch_len(&shape)];
        kc::conv2d_f32_im2col_hwc(&input, &weight, bias, out, &shape, &mut scratch, part)
    })?;
    Ok(compare_f32("conv2d_f32_im2col", &golden, &actual, 0.0))
}

fn golden_maxpool(input: &[i8], s: &ConvShape, in_off: i32, out_off: i32) -> Vec<i8> {
    let (h_out, w_out) = (s.out_h(), s.out_w());
    let mut out = Vec::with_capacity(s.c * h_out * w_out);
    for c in 0..s.c {
        for oh in 0..h_out {
            for ow in 0..w_out {
                let mut max = i32::MIN;
                for p in 0..s.p {
                    for q in 0..s.q {
                        let (ih, iw) = (oh * s.sp + p, ow * s.sq + q);
                        max = max.max(i32::from(input[(c * s.h + ih) * s.w + iw]) + in_off);
                    }
                }
                out.push((max + out_off).clamp(-128, 127) as i8);
            }
        }
    }
    out
}

fn maxpool_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let shape = random_conv_shape(rng, true)?;
    let input = random_i8(rng, shape.input_len());
    let len = shape.c * shape.out_h() * shape.out_w();

    let golden = golden_maxpool(&input, &shape, 4, -4);
    let actual = clustered(cluster, len, 0i8, |part, out| {
        kc::maxpool2d_s8_nchw(&input, out, &shape, 4, -4, part)
    })?;
    Ok(compare_exact("maxpool_s8", &golden, &actual))
}

/// `floor(sqrt(n))` for non-negative `n`.
fn golden_isqrt(n: i64) -> i64 {
    let mut r = (n as f64).sqrt() as i64;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

// ── Normalization ──────────────────────────────────────────────

fn golden_layernorm_s8(
    input: &[i8],
    weight: &[i32],
    bias: &[i32],
    in_off: i32,
    last_dim: usize,
    log2d: u32,
) -> Vec<i8> {
    let len = last_dim as i64;
    input
        .chunks(last_dim)
        .flat_map(|row| {
            let x: Vec<i64> = row.iter().map(|&v| i64::from(v) + i64::from(in_off)).collect();
            let mean = x.iter().sum::<i64>() / len;
            let var = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<i64>() / len + 1;
            let std = golden_isqrt(var);
            x.iter()
                .zip(weight)
                .zip(bias)
                .map(|((&v, &w), &b)| {
                    let y = ((v - mean) * i64::from(w) / std + i64::from(b)) >> log2d;
                    y.clamp(-128, 127) as i8
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn layernorm_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim) = (12, 32);
    let input = random_i8(rng, rows * last_dim);
    let weight = random_i32(rng, last_dim, 1, 128);
    let bias = random_i32(rng, last_dim, -256, 256);

    let golden = golden_layernorm_s8(&input, &weight, &bias, 3, last_dim, 3);
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::layernorm_s8_s8(&input, out, &weight, &bias, 3, last_dim, 3, part)
    })?;
    Ok(compare_exact("layernorm_s8", &golden, &actual))
}

fn layernorm_f32_split(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim) = (3, 48);
    let input = random_f32(rng, rows * last_dim);
    let scale = random_f32(rng, last_dim);
    let bias = random_f32(rng, last_dim);

    let golden = single(input.len(), 0.0f32, |part, out| {
        kc::layernorm_f32(&input, out, &scale, &bias, 1e-5, last_dim, part)
    });
    let grouped = clustered(cluster, input.len(), 0.0f32, |part, out| {
        kc::layernorm_f32(&input, out, &scale, &bias, 1e-5, last_dim, part)
    })?;
    let split = clustered(cluster, input.len(), 0.0f32, |part, out| {
        kc::layernorm_f32_split_affine(&input, out, &scale, &bias, 1e-5, last_dim, part)
    })?;
    Ok(compare_f32("layernorm_f32_split", &golden, &grouped, 0.0)
        .merge(compare_f32("layernorm_f32_split", &golden, &split, 0.0)))
}

fn golden_irmsnorm(
    input: &[i8],
    weight: &[i8],
    in_off: i32,
    last_dim: usize,
    log2d: u32,
) -> Vec<i8> {
    let len = last_dim as i64;
    input
        .chunks(last_dim)
        .flat_map(|row| {
            let x: Vec<i64> = row.iter().map(|&v| i64::from(v) + i64::from(in_off)).collect();
            let std = golden_isqrt(x.iter().map(|&v| v * v).sum::<i64>() / len + 1);
            x.iter()
                .zip(weight)
                .map(|(&v, &w)| ((v * i64::from(w) / std) >> log2d).clamp(-128, 127) as i8)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn irmsnorm_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim) = (10, 24);
    let input = random_i8(rng, rows * last_dim);
    let weight = random_i8(rng, last_dim);

    let golden = golden_irmsnorm(&input, &weight, -1, last_dim, 2);
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::irmsnorm_s8_s8(&input, out, &weight, -1, last_dim, 2, part)
    })?;
    Ok(compare_exact("irmsnorm_s8", &golden, &actual))
}

// ── Softmax family ─────────────────────────────────────────────

fn softmax_f32(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim) = (16, 20);
    let input = random_f32(rng, rows * last_dim);

    let golden = single(input.len(), 0.0f32, |part, out| {
        kc::softmax_f32(&input, out, last_dim, part)
    });
    let actual = clustered(cluster, input.len(), 0.0f32, |part, out| {
        kc::softmax_f32(&input, out, last_dim, part)
    })?;
    let row_sums: Vec<f32> = actual.chunks(last_dim).map(|r| r.iter().sum()).collect();
    Ok(compare_f32("softmax_f32", &golden, &actual, 0.0)
        .merge(compare_f32("softmax_f32", &vec![1.0; rows], &row_sums, 1e-4)))
}

fn golden_softmax_s8(input: &[i8], last_dim: usize, k: &kc::SoftmaxCoeffs) -> Vec<i8> {
    let (a, b, log2) = (i64::from(k.a), i64::from(k.b), i64::from(k.log2));
    let levels = i64::from(k.n_levels);
    input
        .chunks(last_dim)
        .flat_map(|row| {
            let max = row.iter().map(|&v| i64::from(v)).max().unwrap_or(-128);
            let y: Vec<i64> = row
                .iter()
                .map(|&v| {
                    let x = i64::from(v) - max;
                    let z = (-(x / log2)).clamp(0, 31);
                    let p = x + z * log2;
                    (a * (p + b) * (p + b) + k.c) >> z
                })
                .collect();
            let sum = y.iter().sum::<i64>().max(1);
            y.iter()
                .map(|&v| (v * (levels - 1) / sum - levels / 2).clamp(-128, 127) as i8)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn softmax_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim) = (9, 16);
    let input = random_i8(rng, rows * last_dim);
    let coeffs = kc::SoftmaxCoeffs { a: 22, b: 22, c: 4400, log2: 11, n_levels: 256 };

    let golden = golden_softmax_s8(&input, last_dim, &coeffs);
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        let mut scratch = vec![0u32; last_dim];
        kc::softmax_s8_s8(&input, out, last_dim, &coeffs, &mut scratch, part)
    })?;
    Ok(compare_exact("softmax_s8", &golden, &actual))
}

/// Base-2 exponent ITAMax assigns to `x` below the row maximum.
fn golden_ita_shift(max: i64, x: i64) -> i64 {
    (max - x + 16) / 32
}

fn golden_ita_max(input: &[i8], last_dim: usize, n_levels: u32) -> Vec<i8> {
    let levels = i64::from(n_levels);
    input
        .chunks(last_dim)
        .flat_map(|row| {
            let max = row.iter().map(|&v| i64::from(v)).max().unwrap_or(-128);
            let shifts: Vec<i64> =
                row.iter().map(|&v| golden_ita_shift(max, i64::from(v))).collect();
            let sum: i64 = shifts.iter().map(|&s| 256 >> s).sum();
            let inv = (levels - 1) * 256 / sum.max(1);
            shifts
                .iter()
                .map(|&s| ((inv >> s) - levels / 2).clamp(-128, 127) as i8)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// ITAPartialMax with the running maximum updated once per group of `width`.
fn golden_ita_partial_max(input: &[i8], last_dim: usize, width: usize, n_levels: u32) -> Vec<i8> {
    let levels = i64::from(n_levels);
    input
        .chunks(last_dim)
        .flat_map(|row| {
            let x: Vec<i64> = row.iter().map(|&v| i64::from(v)).collect();
            let (mut max, mut sum) = (-128i64, 0i64);
            let mut start = 0;
            while start < x.len() {
                let group = &x[start..(start + width).min(x.len())];
                let group_max = group.iter().copied().max().unwrap_or(-128);
                if group_max > max {
                    sum >>= golden_ita_shift(group_max, max);
                    max = group_max;
                }
                sum += group.iter().map(|&v| 256 >> golden_ita_shift(max, v)).sum::<i64>();
                start += width;
            }
            let inv = (levels - 1) * 256 / sum.max(1);
            x.iter()
                .map(|&v| ((inv >> golden_ita_shift(max, v)) - levels / 2).clamp(-128, 127) as i8)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn ita_max(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim) = (16, 64);
    let input = random_i8(rng, rows * last_dim);

    let golden = golden_ita_max(&input, last_dim, 256);
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        let mut scratch = vec![0u8; last_dim];
        kc::ita_max(&input, out, last_dim, 256, &mut scratch, part)
    })?;
    Ok(compare_exact("ita_max", &golden, &actual))
}

fn ita_partial_max(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (rows, last_dim, group_width) = (8, 64, 16);
    let input = random_i8(rng, rows * last_dim);

    let golden = golden_ita_partial_max(&input, last_dim, group_width, 256);
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::ita_partial_max(&input, out, last_dim, group_width, 256, part)
    })?;
    Ok(compare_exact("ita_partial_max", &golden, &actual))
}

// ── Element-wise ───────────────────────────────────────────────

fn gelu_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let input = random_i8(rng, 512);
    let params = kc::IGeluParams { b: -28, one: 256, input_offset: rng.gen_range(-4..=4) };

    let golden: Vec<i32> = input
        .iter()
        .map(|&v| {
            let x = i32::from(v) + params.input_offset;
            let q = x.abs().min(-params.b);
            let l = x.signum() * (params.one - (q + params.b) * (q + params.b));
            x * ((params.one + l) >> 1)
        })
        .collect();
    let actual = clustered(cluster, input.len(), 0i32, |part, out| {
        kc::gelu_s8_s32(&input, out, &params, part)
    })?;
    Ok(compare_exact("gelu_s8", &golden, &actual))
}

fn rq_hardswish_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let input = random_i8(rng, 384);
    let params = kc::IHardswishParams { one_over_six: 43, three: 48, six: 96, input_offset: 0 };
    let rq = Requant::new(QuantScale::uniform(1, 0), 12)
        .with_rounding(true)
        .for_output::<i8>();

    let golden: Vec<i8> = input
        .iter()
        .map(|&v| {
            let x = i32::from(v);
            let t = (x + params.three).clamp(0, params.six);
            golden_requant(x * t * params.one_over_six, 1, 0, 12, 0, 0)
        })
        .collect();
    let actual = clustered(cluster, input.len(), 0i8, |part, out| {
        kc::rq_ihardswish(&input, out, &params, &rq, part)
    })?;
    Ok(compare_exact("rq_hardswish_s8", &golden, &actual))
}

fn rq_div_s8(cluster: &Cluster, rng: &mut StdRng) -> Result<CaseOutcome, HarnessError> {
    let (groups, per_group) = (4, 32);
    let nom = random_i32(rng, groups * per_group, -4096, 4096);
    let denom = random_i32(rng, groups, 1, 64);
    let params = kc::DivParams { delta: 4, ..Default::default() };
    let rq = Requant::new(QuantScale::uniform(3, 0), 4)
        .with_rounding(true)
        .for_output::<i8>();

    let golden: Vec<i8> = nom
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let (num, den) = (4 * n, denom[i / per_group]);
            // Half away from zero.
            let q = (num + num.signum() * (den / 2)) / den;
            golden_requant(q, 3, 0, 4, 0, 0)
        })
        .collect();
    let actual = clustered(cluster, nom.len(), 0i8, |part, out| {
        kc::rq_div(&nom, &denom, out, &params, &rq, part)
    })?;
    Ok(compare_exact("rq_div_s8", &golden, &actual))
}
