use crate::time::error::Error;
use core::str::FromStr;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

lazy_static! {
    static ref DURATION_REGEX: Regex =
        Regex::new(r"^(?P<value>\d+)\s*(?P<unit>ns|us|ms|s|m|h|d)$").expect("Regex compilation error");
}

/// A duration written as `<number><unit>`, e.g. `250ms` or `5s`.
#[derive(Debug, PartialEq)]
pub struct DurationUnit {
    value: u64,
    unit: TimeUnit,
}

#[derive(Debug, PartialEq)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || Error::Syntax(s.to_owned());
        let caps = DURATION_REGEX.captures(s.trim()).ok_or_else(syntax)?;
        let value: u64 = caps
            .name("value")
            .and_then(|value| value.as_str().parse().ok())
            .ok_or_else(syntax)?;
        let unit = caps.name("unit").ok_or_else(syntax)?.as_str().parse::<TimeUnit>()?;
        if let Some(seconds) = unit.seconds() {
            value.checked_mul(seconds).ok_or_else(syntax)?;
        }
        Ok(Self { value, unit })
    }
}

impl TimeUnit {
    /// Length in whole seconds, for units of at least a minute.
    fn seconds(&self) -> Option<u64> {
        match self {
            TimeUnit::Minute => Some(60),
            TimeUnit::Hour => Some(60 * 60),
            TimeUnit::Day => Some(60 * 60 * 24),
            _ => None,
        }
    }
}

impl From<DurationUnit> for Duration {
    fn from(duration: DurationUnit) -> Self {
        let value = duration.value;
        match duration.unit {
            TimeUnit::Nanosecond => Duration::from_nanos(value),
            TimeUnit::Microsecond => Duration::from_micros(value),
            TimeUnit::Millisecond => Duration::from_millis(value),
            TimeUnit::Second => Duration::from_secs(value),
            unit => Duration::from_secs(value.saturating_mul(unit.seconds().unwrap_or(1))),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" | "nanosecond" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanosecond),
            "us" | "microsecond" | "micros" | "microseconds" => Ok(TimeUnit::Microsecond),
            "ms" | "millisecond" | "millis" | "milliseconds" => Ok(TimeUnit::Millisecond),
            "s" | "second" | "secs" | "seconds" => Ok(TimeUnit::Second),
            "m" | "minute" | "mins" | "minutes" => Ok(TimeUnit::Minute),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hour),
            "d" | "day" | "days" => Ok(TimeUnit::Day),
            _ => Err(Error::UnitNotSupported(s.to_owned())),
        }
    }
}

/// Parses `s` straight into a [`Duration`]; used for command line values.
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    s.parse::<DurationUnit>().map(Duration::from)
}
