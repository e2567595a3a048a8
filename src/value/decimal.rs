// decimal64 mantissa arithmetic.
//
// The mantissa is computed from the decimal text of the number rather than
// by multiplying a binary float, so `3.14` with two fraction digits is
// exactly 314. Digits beyond the fraction are rounded half away from zero.

/// `round(text * 10^fraction_digits)` as a 64-bit mantissa.
pub fn to_mantissa(text: &str, fraction_digits: u8) -> Option<i64> {
    let text = text.trim();
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (number, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], unsigned[i + 1..].parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let digits: String = int_part.chars().chain(frac_part.chars()).collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');

    let scale = exponent
        .checked_sub(i32::try_from(frac_part.len()).ok()?)?
        .checked_add(i32::from(fraction_digits))?;

    let magnitude: i128 = if digits.is_empty() {
        0
    } else if scale >= 0 {
        let base: i128 = digits.parse().ok()?;
        base.checked_mul(10i128.checked_pow(u32::try_from(scale).ok()?)?)?
    } else {
        let cut = usize::try_from(-scale).ok()?;
        if cut > digits.len() {
            0
        } else {
            let keep = digits.len() - cut;
            let kept: i128 = if keep == 0 { 0 } else { digits[..keep].parse().ok()? };
            let round_up = digits.as_bytes()[keep] >= b'5';
            kept + i128::from(round_up)
        }
    };

    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

/// `mantissa * 10^exponent` as a binary float.
pub fn from_mantissa(exponent: i64, mantissa: i128) -> Option<f64> {
    let e = i32::try_from(exponent).ok()?;
    let m = mantissa as f64;
    let v = if e < 0 {
        m / 10f64.powi(-e)
    } else {
        m * 10f64.powi(e)
    };
    v.is_finite().then_some(v)
}
