// IEEE 754 half precision conversion.
// The base station transmits its factory calibration as 16-bit floats; the MCU works in f32.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

const SIGN_MASK: u16 = 0x8000;
const EXP_MASK: u16 = 0x7c00;

/// 2^112, rebiases a half exponent (bias 15) to a single exponent (bias 127).
const EXP_REBIAS: f32 = 5_192_296_858_534_827_628_530_496_329_220_096.0;

/// Widens a half precision float to `f32`.
///
/// Magnitude bits are shifted into place and rescaled by 2^112, which also
/// normalizes subnormal inputs. An all-ones exponent (infinity, NaN) is passed
/// through unchanged.
pub fn f16_to_f32(half: u16) -> f32 {
    let magnitude = ((half & !SIGN_MASK) as u32) << 13;
    let sign = ((half & SIGN_MASK) as u32) << 16;
    let value = f32::from_bits(magnitude | sign);

    if half & EXP_MASK != EXP_MASK {
        value * EXP_REBIAS
    } else {
        f32::from_bits(magnitude | sign | 0x7f80_0000)
    }
}

/// Narrows an `f32` to half precision, rounding to nearest even.
///
/// Values beyond the half range saturate to infinity, values below the
/// smallest subnormal flush to signed zero.
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let man = bits & 0x007f_ffff;

    // Infinity and NaN, keep NaN quiet
    if exp == 0xff {
        return sign | EXP_MASK | if man != 0 { 0x0200 } else { 0 };
    }

    let half_exp = exp - 127 + 15;
    if half_exp >= 0x1f {
        return sign | EXP_MASK;
    }

    if half_exp <= 0 {
        // Subnormal half: value = m * 2^-24
        if half_exp < -10 {
            return sign;
        }
        let full_man = man | 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let half_man = full_man >> shift;
        let rem = full_man & ((1 << shift) - 1);
        let halfway = 1 << (shift - 1);
        let rounded = if rem > halfway || (rem == halfway && half_man & 1 == 1) {
            half_man + 1
        } else {
            half_man
        };
        return sign | rounded as u16;
    }

    let half_man = man >> 13;
    let rem = man & 0x1fff;
    let mut out = ((half_exp as u32) << 10) | half_man;
    // A carry out of the mantissa correctly bumps the exponent (up to infinity)
    if rem > 0x1000 || (rem == 0x1000 && half_man & 1 == 1) {
        out += 1;
    }
    sign | out as u16
}
