//! 256-bit amounts and nonces, plus ether unit conversion
//!
//! Amounts are integers in the asset's smallest unit (wei for the native
//! currency). Conversion from human-readable ether strings goes through
//! `rust_decimal` so no floating point is ever involved.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::ParseError;

pub use primitive_types::U256;

/// Payout amount in the asset's smallest unit.
pub type Amount = U256;

/// Per-payout replay-protection nonce.
pub type Nonce = U256;

/// Decimal places of the native currency.
pub const ETHER_DECIMALS: u32 = 18;

/// Wei in one ether.
pub fn wei_per_ether() -> U256 {
    U256::exp10(ETHER_DECIMALS as usize)
}

/// Big-endian 32-byte representation of a 256-bit integer.
pub fn to_be_bytes32(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Parse a decimal ether string (e.g. `"0.0001"`) into wei.
///
/// Rejects negative values and more than 18 significant fractional digits.
pub fn parse_ether(s: &str) -> Result<Amount, ParseError> {
    let value = Decimal::from_str(s.trim())
        .map_err(|e| ParseError::InvalidAmount(e.to_string()))?
        .normalize();

    if value.is_sign_negative() && !value.is_zero() {
        return Err(ParseError::InvalidAmount(format!("negative amount {}", s)));
    }

    let scale = value.scale();
    if scale > ETHER_DECIMALS {
        return Err(ParseError::TooPrecise {
            scale,
            max: ETHER_DECIMALS,
        });
    }

    let mantissa = value.mantissa().unsigned_abs();
    U256::from(mantissa)
        .checked_mul(U256::exp10((ETHER_DECIMALS - scale) as usize))
        .ok_or(ParseError::Overflow)
}

/// Format wei as a decimal ether string with trailing zeros trimmed.
pub fn format_ether(wei: Amount) -> String {
    let unit = wei_per_ether();
    let whole = wei / unit;
    let frac = wei % unit;

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac_digits = format!("{:0>width$}", frac.to_string(), width = ETHER_DECIMALS as usize);
    format!("{}.{}", whole, frac_digits.trim_end_matches('0'))
}

/// Convert wei to an ether `Decimal` for reporting.
///
/// Fails with `Overflow` when the amount exceeds what a 96-bit decimal
/// mantissa can hold (roughly 79 billion ether).
pub fn to_ether_decimal(wei: Amount) -> Result<Decimal, ParseError> {
    if wei.bits() > 127 {
        return Err(ParseError::Overflow);
    }
    let raw = i128::try_from(wei.low_u128()).map_err(|_| ParseError::Overflow)?;
    Decimal::try_from_i128_with_scale(raw, ETHER_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| ParseError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ether_small() {
        assert_eq!(parse_ether("0.0001").unwrap(), U256::exp10(14));
        assert_eq!(parse_ether("0.0004").unwrap(), U256::from(4u64) * U256::exp10(14));
    }

    #[test]
    fn test_parse_ether_whole() {
        assert_eq!(parse_ether("1").unwrap(), wei_per_ether());
        assert_eq!(parse_ether("2.5").unwrap(), U256::from(25u64) * U256::exp10(17));
    }

    #[test]
    fn test_parse_ether_trailing_zeros_ignored() {
        assert_eq!(parse_ether("0.100000000000000000000").unwrap(), U256::exp10(17));
    }

    #[test]
    fn test_parse_ether_negative_rejected() {
        assert!(matches!(parse_ether("-1"), Err(ParseError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_ether_too_precise() {
        let result = parse_ether("0.0000000000000000001");
        assert_eq!(result, Err(ParseError::TooPrecise { scale: 19, max: 18 }));
    }

    #[test]
    fn test_parse_ether_garbage() {
        assert!(matches!(parse_ether("abc"), Err(ParseError::InvalidAmount(_))));
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(U256::exp10(14)), "0.0001");
        assert_eq!(format_ether(wei_per_ether()), "1");
        assert_eq!(format_ether(U256::from(15u64) * U256::exp10(17)), "1.5");
        assert_eq!(format_ether(U256::zero()), "0");
        assert_eq!(format_ether(U256::one()), "0.000000000000000001");
    }

    #[test]
    fn test_to_ether_decimal() {
        let d = to_ether_decimal(U256::from(3u64) * U256::exp10(14)).unwrap();
        assert_eq!(d, Decimal::from_str("0.0003").unwrap());
        assert_eq!(to_ether_decimal(U256::MAX), Err(ParseError::Overflow));
    }

    #[test]
    fn test_to_be_bytes32() {
        let bytes = to_be_bytes32(&U256::from(0x0102u64));
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert!(bytes[..30].iter().all(|b| *b == 0));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Formatting then parsing a wei amount is lossless.
            #[test]
            fn format_then_parse_is_identity(wei in any::<u64>(), whole in 0u64..1_000_000u64) {
                let amount = U256::from(whole) * wei_per_ether() + U256::from(wei);
                prop_assert_eq!(parse_ether(&format_ether(amount)).unwrap(), amount);
            }
        }
    }
}
