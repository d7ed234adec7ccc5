// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Saturating and rounding integer helpers shared by every fixed-point kernel.
//!
//! Integer arithmetic inside the kernels is performed as wrapping 32-bit
//! arithmetic, matching the two's-complement behaviour of the target cores.
//! Accumulators are assumed not to overflow for the reduction lengths used
//! in practice; nothing checks this.

/// Returns `x` if it lies in `[low, high]`, otherwise the nearer bound.
#[inline(always)]
pub fn clamp(x: i32, low: i32, high: i32) -> i32 {
    if x < low {
        low
    } else if x > high {
        high
    } else {
        x
    }
}

/// Sign of `x` as `-1`, `0` or `1`.
#[inline(always)]
pub fn sgn(x: i32) -> i32 {
    (x > 0) as i32 - (x < 0) as i32
}

/// Rounding bias added before a right shift by `log2d`.
///
/// `1 << (log2d - 1)` when `rounding` is set, otherwise 0. A zero shift has
/// no bias.
#[inline(always)]
pub fn round_bias(log2d: u32, rounding: bool) -> i32 {
    if rounding && log2d > 0 {
        1i32.wrapping_shl(log2d - 1)
    } else {
        0
    }
}

/// Arithmetic right shift with optional round-half-up bias.
///
/// Without rounding the result truncates toward negative infinity.
#[inline(always)]
pub fn shift_round(x: i32, log2d: u32, rounding: bool) -> i32 {
    x.wrapping_add(round_bias(log2d, rounding)) >> log2d.min(31)
}

/// Integer division rounding half away from zero:
/// `(nom + sgn(nom) * (denom >> 1)) / denom`.
///
/// This is the convention of the requantized division kernels and is kept
/// distinct from [`shift_round`]. `denom` must be non-zero.
#[inline(always)]
pub fn div_round(nom: i32, denom: i32) -> i32 {
    nom.wrapping_add(sgn(nom).wrapping_mul(denom >> 1)) / denom
}

/// Integer types a fixed-point kernel can saturate its result into.
pub trait Saturate: Copy + Default + Send + Sync + 'static {
    /// Smallest representable value, widened.
    const MIN: i32;
    /// Largest representable value, widened.
    const MAX: i32;

    /// Clamps `x` into `[low, high]` and narrows. The bounds must lie inside
    /// the type's own range.
    fn saturate(x: i32, low: i32, high: i32) -> Self;

    /// Clamps `x` into the full range of the type.
    #[inline(always)]
    fn saturate_full(x: i32) -> Self {
        Self::saturate(x, Self::MIN, Self::MAX)
    }
}

macro_rules! impl_saturate {
    ($($t:ty),*) => {$(
        impl Saturate for $t {
            const MIN: i32 = <$t>::MIN as i32;
            const MAX: i32 = <$t>::MAX as i32;

            #[inline(always)]
            fn saturate(x: i32, low: i32, high: i32) -> Self {
                let low = low.max(<Self as Saturate>::MIN);
                let high = high.min(<Self as Saturate>::MAX);
                clamp(x, low, high) as $t
            }
        }
    )*};
}

impl_saturate!(i8, u8, i16, u16);

impl Saturate for i32 {
    const MIN: i32 = i32::MIN;
    const MAX: i32 = i32::MAX;

    #[inline(always)]
    fn saturate(x: i32, low: i32, high: i32) -> Self {
        clamp(x, low, high)
    }
}

/// Integer square root by bisection over a 32-bit fixed-point value.
///
/// Searches `[0, 46342]` for `root` with `(root * root) >> frac_bits == number`,
/// falling back to the last candidate whose square was below `number`. With
/// `frac_bits == 0` this is `floor(sqrt(number))`. Non-positive inputs return 0.
/// Squares are formed in 64 bits so that the upper bisection bound cannot wrap.
pub fn sqrt_q32(number: i32, frac_bits: u32) -> i32 {
    if number <= 0 {
        return 0;
    }
    let target = number as i64;
    let mut start: i64 = 0;
    // Smallest integer whose square exceeds i32::MAX.
    let mut end: i64 = 46342;
    let mut root: i64 = 0;

    while start <= end {
        let mid = (start + end) >> 1;
        let sq = (mid * mid) >> frac_bits;
        if sq == target {
            root = mid;
            break;
        }
        if sq < target {
            start = mid + 1;
            root = mid;
        } else {
            end = mid - 1;
        }
    }
    root as i32
}

/// `sum / len + 1` as a [`sqrt_q32`] argument, clamped to `[1, i32::MAX]`.
///
/// The integer norms reduce their squares in 64 bits, so wide rows cannot
/// wrap into a zero standard deviation.
#[inline]
pub fn mean_square_arg(sum: i64, len: usize) -> i32 {
    (sum / len.max(1) as i64 + 1).clamp(1, i64::from(i32::MAX)) as i32
}

/// 16-bit counterpart of [`sqrt_q32`], bisecting over `[0, 255]`.
pub fn sqrt_q16(number: i16, frac_bits: u32) -> i16 {
    if number <= 0 {
        return 0;
    }
    let target = number as i32;
    let mut start: i32 = 0;
    let mut end: i32 = 255;
    let mut root: i32 = 0;

    while start <= end {
        let mid = (start + end) >> 1;
        let sq = (mid * mid) >> frac_bits;
        if sq == target {
            root = mid;
            break;
        }
        if sq < target {
            start = mid + 1;
            root = mid;
        } else {
            end = mid - 1;
        }
    }
    root as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5, -128, 127), 5);
        assert_eq!(clamp(300, -128, 127), 127);
        assert_eq!(clamp(-300, -128, 127), -128);
    }

    #[test]
    fn test_round_bias_zero_shift() {
        assert_eq!(round_bias(0, true), 0);
        assert_eq!(round_bias(0, false), 0);
        assert_eq!(round_bias(1, true), 1);
        assert_eq!(round_bias(4, true), 8);
        assert_eq!(round_bias(4, false), 0);
    }

    #[test]
    fn test_shift_round_modes() {
        // 5 / 2 = 2.5: round-half-up gives 3, truncation gives 2.
        assert_eq!(shift_round(5, 1, true), 3);
        assert_eq!(shift_round(5, 1, false), 2);
        // -5 / 2 = -2.5: round-half-up gives -2, floor gives -3.
        assert_eq!(shift_round(-5, 1, true), -2);
        assert_eq!(shift_round(-5, 1, false), -3);
        assert_eq!(shift_round(-7, 0, true), -7);
    }

    #[test]
    fn test_div_round_half_away_from_zero() {
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(-5, 2), -3);
        assert_eq!(div_round(7, 4), 2);
        assert_eq!(div_round(-7, 4), -2);
        assert_eq!(div_round(4, 4), 1);
        assert_eq!(div_round(0, 3), 0);
        // Differs from shift rounding on negative ties.
        assert_ne!(div_round(-5, 2), shift_round(-5, 1, true));
    }

    #[test]
    fn test_saturate() {
        assert_eq!(i8::saturate_full(200), 127);
        assert_eq!(i8::saturate_full(-200), -128);
        assert_eq!(u8::saturate_full(-3), 0);
        assert_eq!(i8::saturate(50, -10, 10), 10);
        // Bounds outside the type range are tightened to the type range.
        assert_eq!(i8::saturate(1000, -1000, 1000), 127);
    }

    #[test]
    fn test_saturate_bounds_are_widened() {
        assert_eq!(<i8 as Saturate>::MIN, -128);
        assert_eq!(<u8 as Saturate>::MAX, 255);
        assert_eq!(<i16 as Saturate>::MIN, -32768);
        assert_eq!(<u16 as Saturate>::MAX, 65535);

        assert_eq!(u16::saturate(70_000, i32::MIN, i32::MAX), u16::MAX);
        assert_eq!(u16::saturate(-1, i32::MIN, i32::MAX), 0);
        assert_eq!(i16::saturate(-40_000, -40_000, 0), i16::MIN);
        assert_eq!(i16::saturate_full(12_345), 12_345);
    }

    #[test]
    fn test_mean_square_arg_range() {
        assert_eq!(mean_square_arg(0, 4), 1);
        assert_eq!(mean_square_arg(50, 4), 13);
        assert_eq!(mean_square_arg(i64::MAX, 1), i32::MAX);
        assert!(sqrt_q32(mean_square_arg(3_000_000_000, 1), 0) > 0);
    }

    #[test]
    fn test_sqrt_q32_boundaries() {
        assert_eq!(sqrt_q32(0, 0), 0);
        assert_eq!(sqrt_q32(-5, 0), 0);
        assert_eq!(sqrt_q32(1, 0), 1);
        assert_eq!(sqrt_q32(15, 0), 3);
        assert_eq!(sqrt_q32(16, 0), 4);
        assert_eq!(sqrt_q32(i32::MAX, 0), 46340);
        assert_eq!(sqrt_q32(46340 * 46340, 0), 46340);
        assert_eq!(sqrt_q32(46340 * 46340 - 1, 0), 46339);
    }

    #[test]
    fn test_sqrt_q32_fractional() {
        // 2.0 in Q8 is 512; sqrt(2.0) = 1.414 -> 362 in Q8 (362^2 >> 8 = 511).
        assert_eq!(sqrt_q32(512, 8), 362);
    }

    #[test]
    fn test_sqrt_q16() {
        assert_eq!(sqrt_q16(0, 0), 0);
        assert_eq!(sqrt_q16(100, 0), 10);
        assert_eq!(sqrt_q16(99, 0), 9);
        assert_eq!(sqrt_q16(i16::MAX, 0), 181);
    }

    #[test]
    fn test_sqrt_q32_sampled_range() {
        let mut n: i64 = 0;
        while n <= i32::MAX as i64 {
            let r = sqrt_q32(n as i32, 0) as i64;
            assert!(r * r <= n, "n={n} r={r}");
            assert!((r + 1) * (r + 1) > n, "n={n} r={r}");
            n += 65_521;
        }
    }

    proptest! {
        #[test]
        fn prop_sqrt_q32_bracket(n in 0i32..=i32::MAX) {
            let r = sqrt_q32(n, 0) as i64;
            let n = n as i64;
            prop_assert!(r * r <= n);
            prop_assert!((r + 1) * (r + 1) > n);
        }

        #[test]
        fn prop_shift_round_matches_floor_division(x in -1_000_000i32..1_000_000, s in 1u32..16) {
            let truncated = shift_round(x, s, false) as i64;
            prop_assert_eq!(truncated, (x as i64).div_euclid(1i64 << s));
        }
    }
}
