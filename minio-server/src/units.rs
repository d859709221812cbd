//! Parsers for human readable sizes and durations used on the command line.

use std::time::Duration;

use thiserror::Error;

/// Error returned by [`parse_size`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    /// The literal does not start with a number.
    #[error("expected a number")]
    MissingNumber,
    /// The number part is malformed.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    /// The unit suffix is not one of B, KB, MB, GB, TB.
    #[error("unknown unit `{0}`, expected one of B, KB, MB, GB, TB")]
    UnknownUnit(String),
    /// The size does not fit into 64 bits.
    #[error("size is too large")]
    Overflow,
}

/// Parses a byte size such as `64MB`, `4 GiB` or `1.5G`.
///
/// Units are case-insensitive and always binary: `KB` and `KiB` both mean 1024 bytes. A literal
/// without a unit is a number of bytes.
pub fn parse_size(literal: &str) -> Result<u64, SizeParseError> {
    let literal = literal.trim();
    let split = literal
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(literal.len());
    let (number, unit) = literal.split_at(split);

    if number.is_empty() {
        return Err(SizeParseError::MissingNumber);
    }

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        "t" | "tb" | "tib" => 1 << 40,
        _ => return Err(SizeParseError::UnknownUnit(unit.trim().to_owned())),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or(SizeParseError::Overflow);
    }

    let fractional: f64 = number
        .parse()
        .map_err(|_| SizeParseError::InvalidNumber(number.to_owned()))?;
    let bytes = fractional * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        return Err(SizeParseError::Overflow);
    }
    Ok(bytes as u64)
}

/// Parses a duration such as `1h`, `30m` or `1h 30m`.
pub fn parse_duration(literal: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(literal.trim())
}
