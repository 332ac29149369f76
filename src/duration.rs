// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for scheduler options.
//!
//! Parses short duration strings (e.g., "500ms", "4s", "1m") into
//! `std::time::Duration`. Used as a clap value parser for the rewrite task delays.

use crate::errors::RewriteError;
use std::time::Duration;

const MILLIS_PER_SECOND: u64 = 1000;
const MILLIS_PER_MINUTE: u64 = 60_000;
const MILLIS_PER_HOUR: u64 = 3_600_000;

/// Parse a duration string into a Rust `Duration`.
///
/// Supported units:
/// - `ms` (milliseconds): "500ms"
/// - `s` (seconds): "4s"
/// - `m` (minutes): "1m"
/// - `h` (hours): "1h"
///
/// # Examples
///
/// ```
/// use keights::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("4s").unwrap(), Duration::from_secs(4));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert!(parse_duration("4").is_err());  // Missing unit
/// assert!(parse_duration("0s").is_err()); // Zero is rejected
/// ```
///
/// # Errors
///
/// Returns [`RewriteError::InvalidDuration`] if:
/// - The string is empty or has no unit
/// - The numeric part is not a positive integer
/// - The unit is unknown
/// - The value is zero or overflows
pub fn parse_duration(duration_str: &str) -> Result<Duration, RewriteError> {
    let invalid = || RewriteError::InvalidDuration(duration_str.to_string());
    let trimmed = duration_str.trim();

    // Find where digits end and unit begins
    let split_pos = trimmed
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    if split_pos == 0 {
        return Err(invalid());
    }

    let (value_str, unit) = trimmed.split_at(split_pos);
    let value: u64 = value_str.parse().map_err(|_| invalid())?;

    let factor = match unit {
        "ms" => 1,
        "s" => MILLIS_PER_SECOND,
        "m" => MILLIS_PER_MINUTE,
        "h" => MILLIS_PER_HOUR,
        _ => return Err(invalid()),
    };

    let millis = value.checked_mul(factor).ok_or_else(invalid)?;
    if millis == 0 {
        return Err(invalid());
    }

    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
