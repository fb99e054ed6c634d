use alloy::primitives::U256;
use thiserror::Error;

/// Fixed-point scale for the settlement ratio (1.0 = 1e18).
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Denominator for target allocations and fees (parts per 1,000,000).
pub const BPS_SCALE: u32 = 1_000_000;

/// Rounding direction for integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// `a * b / denominator` with explicit rounding.
///
/// Returns `None` on a zero denominator or when the product overflows 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256, rounding: Rounding) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let product = a.checked_mul(b)?;
    let quotient = product / denominator;
    match rounding {
        Rounding::Down => Some(quotient),
        Rounding::Up => {
            if (product % denominator).is_zero() {
                Some(quotient)
            } else {
                quotient.checked_add(U256::from(1u64))
            }
        }
    }
}

/// `max(a - b, 0)`.
pub fn zero_floor_sub(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount `{0}`")]
    Invalid(String),
    #[error("amount `{0}` has a fractional remainder after scaling")]
    Fractional(String),
    #[error("amount `{0}` does not fit in 256 bits")]
    Overflow(String),
}

/// Parse a base-unit amount.
///
/// Accepts plain integers (`"1000"`, `"1_000"`) and scientific notation with an
/// optional decimal mantissa (`"600e18"`, `"1.5e18"`). The scaled value must be
/// an integer.
pub fn parse_amount(input: &str) -> Result<U256, AmountParseError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(AmountParseError::Empty);
    }

    let (mantissa, exponent) = match cleaned.split_once(['e', 'E']) {
        Some((m, e)) => {
            let exp: u32 = e
                .parse()
                .map_err(|_| AmountParseError::Invalid(input.to_string()))?;
            (m, exp)
        }
        None => (cleaned.as_str(), 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(AmountParseError::Invalid(input.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AmountParseError::Invalid(input.to_string()));
    }

    let frac_len = frac_part.len() as u32;
    if frac_len > exponent {
        return Err(AmountParseError::Fractional(input.to_string()));
    }

    let digits = format!("{int_part}{frac_part}");
    let digits = if digits.is_empty() { "0" } else { digits.as_str() };
    let base = U256::from_str_radix(digits, 10)
        .map_err(|_| AmountParseError::Overflow(input.to_string()))?;
    let scale = U256::from(10u64)
        .checked_pow(U256::from(exponent - frac_len))
        .ok_or_else(|| AmountParseError::Overflow(input.to_string()))?;
    base.checked_mul(scale)
        .ok_or_else(|| AmountParseError::Overflow(input.to_string()))
}

/// Render base units as a decimal string with `decimals` fractional digits,
/// trimming trailing zeros (`600000000000000000000`, 18 → `"600"`).
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let raw = value.to_string();
    let decimals = decimals as usize;
    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - raw.len() + 1), raw)
    } else {
        raw
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// Serde adapter storing a `U256` as a decimal string.
pub mod u256_dec {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_amount(&raw).map_err(serde::de::Error::custom)
    }
}
