//! ISO-8601 duration handling for recipe timings
//!
//! Recipe markup states times as `PT15M`, `PT1H30M`, `P1DT2H` or, on some
//! plugins, `PT5400.0S`. Calendar units (years, months) never describe a
//! cooking time and are rejected rather than approximated.

use chrono::Duration;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// A duration value could not be read as ISO-8601
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable ISO-8601 duration: '{value}'")]
pub struct DurationParseError {
    pub value: String,
}

/// A recipe timing: the raw ISO-8601 text plus its parsed length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDuration {
    iso: String,
    value: Duration,
}

impl RecipeDuration {
    /// Parses an ISO-8601 duration, keeping the trimmed source text
    pub fn parse(raw: &str) -> Result<Self, DurationParseError> {
        let value = parse_iso8601_duration(raw)?;
        Ok(Self {
            iso: raw.trim().to_string(),
            value,
        })
    }

    /// The duration as written in the markup
    pub fn iso(&self) -> &str {
        &self.iso
    }

    pub fn value(&self) -> Duration {
        self.value
    }

    /// Whole minutes, rounded down
    pub fn minutes(&self) -> i64 {
        self.value.num_minutes()
    }
}

impl Serialize for RecipeDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.iso)
    }
}

const DATE_UNITS: &[(char, f64)] = &[('W', 604_800.0), ('D', 86_400.0)];
const TIME_UNITS: &[(char, f64)] = &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)];

/// Parses `P[nW][nD][T[nH][nM][nS]]` into a `chrono::Duration`
///
/// Components must appear in that order, at least one must be present, and a
/// `T` separator must be followed by a time component. Fractions are accepted
/// with either `.` or `,`.
pub fn parse_iso8601_duration(raw: &str) -> Result<Duration, DurationParseError> {
    let error = || DurationParseError {
        value: raw.to_string(),
    };

    let trimmed = raw.trim();
    let rest = trimmed
        .strip_prefix('P')
        .or_else(|| trimmed.strip_prefix('p'))
        .ok_or_else(error)?;

    let (date_part, time_part) = match rest.find(['T', 't']) {
        Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
        None => (rest, None),
    };

    let (date_seconds, date_count) = sum_components(date_part, DATE_UNITS).ok_or_else(error)?;
    let (time_seconds, time_count) = match time_part {
        Some(part) => {
            let (seconds, count) = sum_components(part, TIME_UNITS).ok_or_else(error)?;
            if count == 0 {
                return Err(error());
            }
            (seconds, count)
        }
        None => (0.0, 0),
    };

    if date_count + time_count == 0 {
        return Err(error());
    }

    let millis = ((date_seconds + time_seconds) * 1000.0).round();
    Ok(Duration::milliseconds(millis as i64))
}

/// Sums `<number><unit>` pairs in `part`, returning total seconds and the
/// number of components. Units must follow the order of `units`.
fn sum_components(part: &str, units: &[(char, f64)]) -> Option<(f64, usize)> {
    let mut total = 0.0;
    let mut count = 0;
    let mut next_unit = 0;
    let mut number = String::new();

    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }

        let unit = c.to_ascii_uppercase();
        let offset = units[next_unit..].iter().position(|(u, _)| *u == unit)?;
        let index = next_unit + offset;

        let amount: f64 = number.parse().ok()?;
        total += amount * units[index].1;
        count += 1;
        next_unit = index + 1;
        number.clear();
    }

    if !number.is_empty() {
        return None;
    }

    Some((total, count))
}
