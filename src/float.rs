//! Shortest decimal form of stored single-precision numbers.
//!
//! Widening the single-precision encoding of `0.1` gives
//! `0.10000000149011612`.  [`single_as_double`] walks back from a
//! 10-significant-digit rendering (`{:.9e}`: one leading digit and nine
//! after the point), dropping one fractional digit at a time
//! (rounding the last kept digit up when plain truncation stops working),
//! and keeps the shortest string that still narrows to the original bits.
//! The search is local: when several strings of equal length qualify, the
//! truncate-then-round-up order decides, so the result is round-trip exact
//! but not claimed to be canonical.

use crate::error::{Result, Zs2Error};

/// Map a widened single-precision value to the `f64` with the shortest
/// decimal representation that narrows to the same `f32` bits.
///
/// NaN, infinities and zeros are returned unchanged.
pub fn single_as_double(presumed_single: f64) -> Result<f64> {
    if presumed_single.is_nan() || presumed_single.is_infinite() || presumed_single == 0.0 {
        return Ok(presumed_single);
    }

    let negative = presumed_single < 0.0;
    let value = presumed_single.abs();
    let narrowed = value as f32;
    if narrowed.is_infinite() {
        return Err(Zs2Error::PrecisionReconstructionFailed { value: presumed_single });
    }
    let required = narrowed.to_bits();

    let (digits, exponent) = scientific_digits(value)
        .ok_or(Zs2Error::PrecisionReconstructionFailed { value: presumed_single })?;
    let mut integer = integer_digits(&digits, exponent);
    let mut fraction = fraction_digits(&digits, exponent);
    trim_zeros(&mut fraction);
    let mut good = (integer.clone(), fraction.clone());

    while !fraction.is_empty() {
        fraction.pop();
        if !narrows_to(&integer, &fraction, required) {
            add_one_in_last(&mut integer, &mut fraction);
            if !narrows_to(&integer, &fraction, required) {
                break;
            }
        }
        let mut trimmed = fraction.clone();
        trim_zeros(&mut trimmed);
        good = (integer.clone(), trimmed);
    }

    let magnitude = to_f64(&good.0, &good.1)
        .ok_or(Zs2Error::PrecisionReconstructionFailed { value: presumed_single })?;
    let result = if negative { -magnitude } else { magnitude };

    if (result as f32).to_bits() != (presumed_single as f32).to_bits() {
        return Err(Zs2Error::PrecisionReconstructionFailed { value: presumed_single });
    }
    Ok(result)
}

const F64_EXPONENT: u64 = 0x7FF0_0000_0000_0000;
const F32_EXPONENT: u32 = 0x7F80_0000;
const F32_MANTISSA: u32 = 0x007F_FFFF;
/// Mantissa bits an `f64` has beyond an `f32`.
const EXTRA_MANTISSA_BITS: u32 = 29;

/// Widen stored single-precision bits to `f64`.
///
/// NaN payloads move into the top of the wider mantissa unchanged, so a
/// signalling NaN stays signalling; an `as` cast would set the quiet bit.
pub fn widen_single(bits: u32) -> f64 {
    let single = f32::from_bits(bits);
    if !single.is_nan() {
        return single as f64;
    }
    let sign = ((bits >> 31) as u64) << 63;
    let payload = ((bits & F32_MANTISSA) as u64) << EXTRA_MANTISSA_BITS;
    f64::from_bits(sign | F64_EXPONENT | payload)
}

/// Inverse of [`widen_single`].  `None` for a NaN whose payload does not fit
/// in single precision.
pub fn narrow_to_single(value: f64) -> Option<u32> {
    if !value.is_nan() {
        return Some((value as f32).to_bits());
    }
    let bits = value.to_bits();
    if bits & ((1 << EXTRA_MANTISSA_BITS) - 1) != 0 {
        return None;
    }
    let sign = ((bits >> 63) as u32) << 31;
    let payload = (bits >> EXTRA_MANTISSA_BITS) as u32 & F32_MANTISSA;
    Some(sign | F32_EXPONENT | payload)
}

/// Ten significant digits and the power of ten of the last one.
fn scientific_digits(value: f64) -> Option<(Vec<u8>, i32)> {
    let text = format!("{:.9e}", value);
    let (mantissa, exp) = text.split_once('e')?;
    let exp: i32 = exp.parse().ok()?;
    let digits = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect::<Vec<_>>();
    let exponent = exp - (digits.len() as i32 - 1);
    Some((digits, exponent))
}

fn integer_digits(digits: &[u8], exponent: i32) -> Vec<u8> {
    let mut out = if exponent <= 0 {
        let keep = (digits.len() as i32 + exponent).max(0) as usize;
        digits[..keep].to_vec()
    } else {
        let mut v = digits.to_vec();
        v.extend(std::iter::repeat(0).take(exponent as usize));
        v
    };
    if out.is_empty() {
        out.push(0);
    }
    out
}

fn fraction_digits(digits: &[u8], exponent: i32) -> Vec<u8> {
    let split = (digits.len() as i32 + exponent).max(0) as usize;
    let zeros = (-(digits.len() as i32) - exponent).max(0) as usize;
    let mut out = vec![0; zeros];
    out.extend_from_slice(&digits[split.min(digits.len())..]);
    out
}

fn trim_zeros(fraction: &mut Vec<u8>) {
    while fraction.last() == Some(&0) {
        fraction.pop();
    }
}

/// Add one unit in the last place, carrying into the integer part.
fn add_one_in_last(integer: &mut Vec<u8>, fraction: &mut [u8]) {
    let mut carry = true;
    for d in fraction.iter_mut().rev() {
        if !carry {
            break;
        }
        if *d == 9 {
            *d = 0;
        } else {
            *d += 1;
            carry = false;
        }
    }
    for d in integer.iter_mut().rev() {
        if !carry {
            break;
        }
        if *d == 9 {
            *d = 0;
        } else {
            *d += 1;
            carry = false;
        }
    }
    if carry {
        integer.insert(0, 1);
    }
}

fn render(integer: &[u8], fraction: &[u8]) -> String {
    let mut s: String = integer.iter().map(|d| (b'0' + d) as char).collect();
    if !fraction.is_empty() {
        s.push('.');
        s.extend(fraction.iter().map(|d| (b'0' + d) as char));
    }
    s
}

fn to_f64(integer: &[u8], fraction: &[u8]) -> Option<f64> {
    render(integer, fraction).parse().ok()
}

fn narrows_to(integer: &[u8], fraction: &[u8], required: u32) -> bool {
    to_f64(integer, fraction).map_or(false, |v| (v as f32).to_bits() == required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn widen(v: f32) -> f64 {
        v as f64
    }

    #[test]
    fn shortest_forms() {
        assert_eq!(single_as_double(widen(0.1)).unwrap(), 0.1);
        assert_eq!(single_as_double(widen(3.1)).unwrap(), 3.1);
        assert_eq!(single_as_double(widen(-9.9)).unwrap(), -9.9);
        assert_eq!(single_as_double(widen(1.000_000_1)).unwrap(), 1.000_000_1);
        assert_eq!(single_as_double(widen(-192.99939)).unwrap(), -192.99939);
        assert_eq!(single_as_double(9.0).unwrap(), 9.0);
    }

    #[test]
    fn known_values_round_trip() {
        for &test in &[
            0.0f32, 9.0, 0.9, -0.1, 1.000_000_1, 3.1, -9.9, 5.551_115e-17,
            0.104_521_97, 0.104_521_975, 0.104_521_98, 0.094_062_887,
            f32::MIN_POSITIVE, f32::MAX, 1.0e-45,
        ] {
            let out = single_as_double(widen(test)).unwrap();
            assert_eq!((out as f32).to_bits(), test.to_bits(), "{test:e}");
        }
    }

    #[test]
    fn special_values_pass_through() {
        assert!(single_as_double(f64::NAN).unwrap().is_nan());
        assert_eq!(single_as_double(f64::INFINITY).unwrap(), f64::INFINITY);
        let nz = single_as_double(-0.0).unwrap();
        assert!(nz == 0.0 && nz.is_sign_negative());
    }

    #[test]
    fn nan_payloads_survive_widening() {
        for bits in [0x7F80_0001u32, 0x7FC0_0000, 0xFFC0_0000, 0x7FFF_FFFF, 0xFF80_1234] {
            let wide = widen_single(bits);
            assert!(wide.is_nan());
            assert_eq!(single_as_double(wide).unwrap().to_bits(), wide.to_bits());
            assert_eq!(narrow_to_single(wide), Some(bits), "{bits:08x}");
        }
        assert_eq!(widen_single(0x7FC0_0000).to_bits(), f64::NAN.to_bits());
        assert_eq!(narrow_to_single(f64::from_bits(0x7FF0_0000_0000_0001)), None);
        assert_eq!(narrow_to_single(3.1), Some(3.1f32.to_bits()));
        assert_eq!(widen_single(1.5f32.to_bits()), 1.5);
    }

    #[test]
    fn out_of_single_range_fails() {
        assert!(matches!(
            single_as_double(1.0e300),
            Err(Zs2Error::PrecisionReconstructionFailed { .. })
        ));
    }

    #[test]
    fn carry_propagates_into_integer() {
        let mut integer = vec![9, 9];
        let mut fraction = vec![9, 9];
        add_one_in_last(&mut integer, &mut fraction);
        assert_eq!(integer, vec![1, 0, 0]);
        assert_eq!(fraction, vec![0, 0]);
    }

    proptest! {
        #[test]
        fn every_finite_single_round_trips(bits in any::<u32>()) {
            let original = f32::from_bits(bits);
            prop_assume!(original.is_finite());
            let out = single_as_double(original as f64).unwrap();
            prop_assert_eq!((out as f32).to_bits(), bits);
        }

        #[test]
        fn every_single_survives_widening(bits in any::<u32>()) {
            prop_assert_eq!(narrow_to_single(widen_single(bits)), Some(bits));
        }
    }
}
