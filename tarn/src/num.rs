//! Numeric primitives with exact wasm semantics: wrapping integer
//! arithmetic, trapping division and truncation, IEEE-754 float operations
//! with canonical NaN results.

use crate::{Trap, TrapKind};

pub type Result<T> = core::result::Result<T, Trap>;

const CANON_NAN32: u32 = 0x7fc0_0000;
const CANON_NAN64: u64 = 0x7ff8_0000_0000_0000;

#[inline]
fn trap(kind: TrapKind) -> Trap {
    Trap::new(kind)
}


pub fn i32_div_s(a: i32, b: i32) -> Result<i32> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    if a == i32::MIN && b == -1 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(a.wrapping_div(b))
}

pub fn i32_div_u(a: u32, b: u32) -> Result<u32> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    Ok(a / b)
}

/// `INT_MIN rem -1` is 0, not a trap; only the divisor may not be zero.
pub fn i32_rem_s(a: i32, b: i32) -> Result<i32> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    Ok(a.wrapping_rem(b))
}

pub fn i32_rem_u(a: u32, b: u32) -> Result<u32> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    Ok(a % b)
}

pub fn i64_div_s(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    if a == i64::MIN && b == -1 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(a.wrapping_div(b))
}

pub fn i64_div_u(a: u64, b: u64) -> Result<u64> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    Ok(a / b)
}

pub fn i64_rem_s(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    Ok(a.wrapping_rem(b))
}

pub fn i64_rem_u(a: u64, b: u64) -> Result<u64> {
    if b == 0 {
        return Err(trap(TrapKind::IntegerDivideByZero));
    }
    Ok(a % b)
}


#[inline]
pub fn canon_f32(x: f32) -> f32 {
    if x.is_nan() { f32::from_bits(CANON_NAN32) } else { x }
}

#[inline]
pub fn canon_f64(x: f64) -> f64 {
    if x.is_nan() { f64::from_bits(CANON_NAN64) } else { x }
}

/// IEEE minimum: NaN if either operand is NaN, and -0 is less than +0.
pub fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::from_bits(CANON_NAN32)
    }
    else if a == b {
        if a.is_sign_negative() { a } else { b }
    }
    else if a < b { a } else { b }
}

pub fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::from_bits(CANON_NAN32)
    }
    else if a == b {
        if a.is_sign_positive() { a } else { b }
    }
    else if a > b { a } else { b }
}

pub fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::from_bits(CANON_NAN64)
    }
    else if a == b {
        if a.is_sign_negative() { a } else { b }
    }
    else if a < b { a } else { b }
}

pub fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::from_bits(CANON_NAN64)
    }
    else if a == b {
        if a.is_sign_positive() { a } else { b }
    }
    else if a > b { a } else { b }
}

/// Round to nearest, ties to even.
#[inline]
pub fn f32_nearest(x: f32) -> f32 {
    canon_f32(x.round_ties_even())
}

#[inline]
pub fn f64_nearest(x: f64) -> f64 {
    canon_f64(x.round_ties_even())
}


// Truncating float-to-int conversions trap on NaN and on values whose
// truncation falls outside the target range. The bounds are exact in the
// source float type, so plain comparisons suffice.

pub fn i32_trunc_f32_s(x: f32) -> Result<i32> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 2147483648.0 || t < -2147483648.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as i32)
}

pub fn i32_trunc_f32_u(x: f32) -> Result<u32> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 4294967296.0 || t < 0.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as u32)
}

pub fn i32_trunc_f64_s(x: f64) -> Result<i32> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 2147483648.0 || t < -2147483648.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as i32)
}

pub fn i32_trunc_f64_u(x: f64) -> Result<u32> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 4294967296.0 || t < 0.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as u32)
}

pub fn i64_trunc_f32_s(x: f32) -> Result<i64> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 9223372036854775808.0 || t < -9223372036854775808.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as i64)
}

pub fn i64_trunc_f32_u(x: f32) -> Result<u64> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 18446744073709551616.0 || t < 0.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as u64)
}

pub fn i64_trunc_f64_s(x: f64) -> Result<i64> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 9223372036854775808.0 || t < -9223372036854775808.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as i64)
}

pub fn i64_trunc_f64_u(x: f64) -> Result<u64> {
    if x.is_nan() {
        return Err(trap(TrapKind::InvalidConversionToInteger));
    }
    let t = x.trunc();
    if t >= 18446744073709551616.0 || t < 0.0 {
        return Err(trap(TrapKind::IntegerOverflow));
    }
    Ok(t as u64)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrapKind;

    #[test]
    fn div_rem_traps() {
        assert_eq!(i32_div_s(10, 0).unwrap_err().kind(), TrapKind::IntegerDivideByZero);
        assert_eq!(i32_div_s(i32::MIN, -1).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i32_rem_s(i32::MIN, -1), Ok(0));
        assert_eq!(i32_div_s(-7, 2), Ok(-3));
        assert_eq!(i32_rem_s(-7, 2), Ok(-1));
        assert_eq!(i32_div_u(u32::MAX, 2), Ok(0x7fff_ffff));

        assert_eq!(i64_div_s(i64::MIN, -1).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i64_rem_s(i64::MIN, -1), Ok(0));
        assert_eq!(i64_rem_u(7, 0).unwrap_err().kind(), TrapKind::IntegerDivideByZero);
    }

    #[test]
    fn min_max_zero_and_nan() {
        assert_eq!(f32_min(-0.0, 0.0).to_bits(), (-0.0f32).to_bits());
        assert_eq!(f32_max(-0.0, 0.0).to_bits(), 0.0f32.to_bits());
        assert_eq!(f64_min(0.0, -0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(f64_max(-0.0, -0.0).to_bits(), (-0.0f64).to_bits());

        assert_eq!(f32_min(f32::NAN, 1.0).to_bits(), 0x7fc0_0000);
        assert_eq!(f32_max(1.0, f32::NAN).to_bits(), 0x7fc0_0000);
        assert_eq!(f64_min(f64::NAN, f64::NEG_INFINITY).to_bits(), 0x7ff8_0000_0000_0000);

        assert_eq!(f32_min(1.0, 2.0), 1.0);
        assert_eq!(f32_max(1.0, 2.0), 2.0);
        assert_eq!(f64_min(f64::NEG_INFINITY, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn nearest_ties_to_even() {
        assert_eq!(f32_nearest(0.5), 0.0);
        assert_eq!(f32_nearest(1.5), 2.0);
        assert_eq!(f32_nearest(2.5), 2.0);
        assert_eq!(f32_nearest(-0.5).to_bits(), (-0.0f32).to_bits());
        assert_eq!(f64_nearest(-3.5), -4.0);
        assert_eq!(f64_nearest(-4.5), -4.0);
        assert_eq!(f64_nearest(4.7), 5.0);
    }

    #[test]
    fn trunc_edges() {
        assert_eq!(i32_trunc_f32_s(f32::NAN).unwrap_err().kind(), TrapKind::InvalidConversionToInteger);
        assert_eq!(i32_trunc_f32_s(f32::INFINITY).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i32_trunc_f32_s(2147483648.0).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i32_trunc_f32_s(-2147483648.0), Ok(i32::MIN));
        assert_eq!(i32_trunc_f32_s(-1.9), Ok(-1));

        assert_eq!(i32_trunc_f64_s(2147483647.9), Ok(i32::MAX));
        assert_eq!(i32_trunc_f64_s(2147483648.0).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i32_trunc_f64_s(-2147483648.9), Ok(i32::MIN));
        assert_eq!(i32_trunc_f64_s(-2147483649.0).unwrap_err().kind(), TrapKind::IntegerOverflow);

        // -0.9 truncates to -0, which is in range for the unsigned forms.
        assert_eq!(i32_trunc_f32_u(-0.9), Ok(0));
        assert_eq!(i32_trunc_f32_u(-1.0).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i32_trunc_f64_u(4294967295.9), Ok(u32::MAX));
        assert_eq!(i32_trunc_f64_u(4294967296.0).unwrap_err().kind(), TrapKind::IntegerOverflow);

        assert_eq!(i64_trunc_f64_s(-9223372036854775808.0), Ok(i64::MIN));
        assert_eq!(i64_trunc_f64_s(9223372036854775808.0).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i64_trunc_f64_u(18446744073709551616.0).unwrap_err().kind(), TrapKind::IntegerOverflow);
        assert_eq!(i64_trunc_f32_u(f32::NEG_INFINITY).unwrap_err().kind(), TrapKind::IntegerOverflow);
    }

    #[test]
    fn canon() {
        assert_eq!(canon_f32(0.0f32 / 0.0).to_bits(), 0x7fc0_0000);
        assert_eq!(canon_f64(f64::INFINITY - f64::INFINITY).to_bits(), 0x7ff8_0000_0000_0000);
        assert_eq!(canon_f32(1.5), 1.5);
    }
}
