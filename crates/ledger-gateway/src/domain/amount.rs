//! Amount codec between human decimal strings and the ledger's fixed-point integers.
//!
//! All arithmetic is done on digit strings and `U256`; no floating point is involved,
//! so every value with at most `decimals` fractional digits converts exactly.

use primitive_types::U256;

/// Decimal places of the native unit (wei per ether).
pub const NATIVE_DECIMALS: u32 = 18;

/// Decimal places of gwei, used for gas price reporting.
pub const GWEI_DECIMALS: u32 = 9;

/// Why a decimal amount was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount is not a decimal number: {0}")]
    NotANumber(String),
    #[error("Amount must be a positive number")]
    NotPositive,
    #[error("amount has more than {max} fractional digits")]
    TooManyDecimals { max: u32 },
    #[error("amount exceeds 256-bit range")]
    Overflow,
}

/// Convert a decimal amount into native units.
///
/// Rejects zero, negative, non-numeric and over-precise input.
pub fn to_native(amount: &str) -> Result<U256, AmountError> {
    let value = parse_units(amount, NATIVE_DECIMALS)?;
    if value.is_zero() {
        return Err(AmountError::NotPositive);
    }
    Ok(value)
}

/// Format native units as a decimal amount (`1.5`, `2.0`, `0.0`).
pub fn to_decimal(native: U256) -> String {
    format_units(native, NATIVE_DECIMALS)
}

/// Format native units as gwei.
pub fn to_gwei(native: U256) -> String {
    format_units(native, GWEI_DECIMALS)
}

/// Parse a non-negative decimal string scaled by `10^decimals`.
///
/// Accepts plain notation (`12.5`) and exponent notation (`1.25e1`, `1e-7`),
/// which is how JSON numbers are commonly rendered.
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256, AmountError> {
    let text = amount.trim();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }
    if text.starts_with('-') {
        return Err(AmountError::NotPositive);
    }

    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => {
            let exp = text[pos + 1..]
                .parse::<i64>()
                .map_err(|_| AmountError::NotANumber(text.to_string()))?;
            (&text[..pos], exp)
        }
        None => (text, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(AmountError::NotANumber(text.to_string()));
    }

    let mut digits = format!("{}{}", int_part, frac_part);
    let mut scale = (frac_part.len() as i64)
        .checked_sub(exponent)
        .ok_or(AmountError::Overflow)?;

    // Trailing zeros never carry precision
    while scale > 0 && digits.ends_with('0') {
        digits.pop();
        scale -= 1;
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    let shift = (decimals as i64)
        .checked_sub(scale)
        .ok_or(AmountError::Overflow)?;
    if shift < 0 {
        return Err(AmountError::TooManyDecimals { max: decimals });
    }

    let mut value = U256::zero();
    for b in digits.bytes() {
        value = value
            .checked_mul(U256::from(10u8))
            .and_then(|v| v.checked_add(U256::from(b - b'0')))
            .ok_or(AmountError::Overflow)?;
    }

    if shift > 77 {
        return Err(AmountError::Overflow);
    }
    let factor = U256::from(10u8)
        .checked_pow(U256::from(shift as u64))
        .ok_or(AmountError::Overflow)?;
    value.checked_mul(factor).ok_or(AmountError::Overflow)
}

/// Format an integer scaled by `10^decimals` as a decimal string.
pub fn format_units(value: U256, decimals: u32) -> String {
    let raw = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return format!("{}.0", raw);
    }

    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - raw.len()), raw)
    } else {
        raw
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        format!("{}.0", int_part)
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Canonical decimal form of a valid amount, as `to_decimal` would print it.
pub fn canonical(amount: &str) -> Result<String, AmountError> {
    parse_units(amount, NATIVE_DECIMALS).map(to_decimal)
}
