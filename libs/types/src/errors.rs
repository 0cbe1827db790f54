//! Error types for parsing shared value types
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Errors raised when parsing addresses, digests or amounts from text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount has {scale} fractional digits, at most {max} allowed")]
    TooPrecise { scale: u32, max: u32 },

    #[error("Amount does not fit the target representation")]
    Overflow,
}

/// Decode a `0x`-optional hex string into exactly `N` bytes.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseError> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    let bytes = hex::decode(trimmed).map_err(|e| ParseError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
