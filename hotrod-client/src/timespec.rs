//! # Expiry Time Specs
//!
//! Parse human-readable lifespan/max-idle strings like `"10s"` into an
//! amount plus wire time-unit code.

use hotrod_common::protocol::time_unit;
use hotrod_common::{HotRodError, HotRodResult};

/// Parsed expiry: an optional amount and a wire time-unit code.
///
/// `"inf"` and `"def"` carry no amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpec {
    /// Amount in `unit`s, absent for `DEFAULT` and `INFINITE`.
    pub amount: Option<u64>,
    /// Wire time-unit code.
    pub unit: u8,
}

/// Parses `^(\d+)(ns|us|ms|s|m|h|d)$`, `"inf"`, or `"def"`.
///
/// Unit suffixes are case-sensitive; anything else is rejected.
pub fn parse(spec: &str) -> HotRodResult<TimeSpec> {
    match spec {
        "inf" => {
            return Ok(TimeSpec {
                amount: None,
                unit: time_unit::INFINITE,
            })
        }
        "def" => {
            return Ok(TimeSpec {
                amount: None,
                unit: time_unit::DEFAULT,
            })
        }
        _ => {}
    }

    let split = spec
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(spec.len());
    let (digits, suffix) = spec.split_at(split);
    let unit = match suffix {
        "s" => time_unit::SECONDS,
        "ms" => time_unit::MILLISECONDS,
        "us" => time_unit::MICROSECONDS,
        "ns" => time_unit::NANOSECONDS,
        "m" => time_unit::MINUTES,
        "h" => time_unit::HOURS,
        "d" => time_unit::DAYS,
        _ => return Err(invalid(spec)),
    };
    if digits.is_empty() {
        return Err(invalid(spec));
    }
    let amount = digits.parse::<u64>().map_err(|_| invalid(spec))?;
    Ok(TimeSpec {
        amount: Some(amount),
        unit,
    })
}

fn invalid(spec: &str) -> HotRodError {
    HotRodError::InvalidArgument(format!("invalid time format '{spec}'"))
}
