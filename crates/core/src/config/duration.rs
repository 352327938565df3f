use std::time::Duration;

use crate::error::CoreError;

/// Parse a human-readable duration.
///
/// Supports `ms`, `s`, `m`, `h` and `d` components, combinable as in
/// `"1h30m"` or `"2m500ms"`. A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, CoreError> {
    let trimmed = s.trim();
    let invalid = || CoreError::Duration(s.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut chars = trimmed.chars().peekable();
    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
            unit.push(c);
            chars.next();
        }
        if digits.is_empty() || unit.is_empty() {
            return Err(invalid());
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        total += match unit.as_str() {
            "ms" => Duration::from_millis(n),
            "s" => Duration::from_secs(n),
            "m" => Duration::from_secs(n * 60),
            "h" => Duration::from_secs(n * 3_600),
            "d" => Duration::from_secs(n * 86_400),
            _ => return Err(invalid()),
        };
    }

    Ok(total)
}

/// Render a duration in the form [`parse_duration`] accepts.
pub fn format_duration(d: Duration) -> String {
    let millis = d.subsec_millis();
    let secs = d.as_secs();
    match (secs, millis) {
        (0, ms) => format!("{ms}ms"),
        (s, 0) if s % 3_600 == 0 => format!("{}h", s / 3_600),
        (s, 0) if s % 60 == 0 => format!("{}m", s / 60),
        (s, 0) => format!("{s}s"),
        (s, ms) => format!("{s}s{ms}ms"),
    }
}

pub(super) mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
