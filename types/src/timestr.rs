//! Time string parsing and formatting.
//!
//! Accepted inputs:
//! - plain numbers of seconds: `"1.5"`, `"-2"`
//! - unit strings, case-insensitive and with optional whitespace:
//!   `"1 day 2 hours 3 min 4 s 5 ms"`, `"1h30m"`, `"0.01s"`
//! - timer format: `"01:02:03.500"`, `"02:30"`, `"-00:01"`
//!
//! Every result is rounded to millisecond precision.

use crate::error::ConfigError;

/// Parse a time string into seconds.
pub fn parse_time_string(text: &str) -> Result<f64, ConfigError> {
    let invalid = || ConfigError::InvalidTimeString(text.to_string());
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let secs = if let Ok(number) = trimmed.parse::<f64>() {
        Some(number)
    } else if trimmed.contains(':') {
        parse_timer(trimmed)
    } else {
        parse_unit_string(trimmed)
    };

    match secs {
        Some(secs) if secs.is_finite() => Ok(round_millis(secs)),
        _ => Err(invalid()),
    }
}

/// Render seconds in compact form, e.g. `90.5` -> `"1min 30s 500ms"`.
#[must_use]
pub fn format_secs(secs: f64) -> String {
    const UNITS: [(u64, &str); 5] = [
        (86_400_000, "d"),
        (3_600_000, "h"),
        (60_000, "min"),
        (1_000, "s"),
        (1, "ms"),
    ];

    let mut remaining = (secs.abs() * 1000.0).round() as u64;
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut parts = Vec::new();
    for (unit_millis, suffix) in UNITS {
        let count = remaining / unit_millis;
        remaining %= unit_millis;
        if count > 0 {
            parts.push(format!("{count}{suffix}"));
        }
    }

    let joined = parts.join(" ");
    if secs < 0.0 {
        format!("- {joined}")
    } else {
        joined
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

fn split_sign(text: &str) -> (f64, &str) {
    match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest.trim_start()),
        None => (1.0, text),
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_timer(text: &str) -> Option<f64> {
    let (sign, body) = split_sign(text);
    let parts: Vec<&str> = body.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => ("0", *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };

    if !is_digits(hours) || !is_digits(minutes) {
        return None;
    }
    let seconds_valid = match seconds.split_once('.') {
        Some((whole, fraction)) => is_digits(whole) && is_digits(fraction),
        None => is_digits(seconds),
    };
    if !seconds_valid {
        return None;
    }

    let hours: f64 = hours.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(sign * (hours * 3_600.0 + minutes * 60.0 + seconds))
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    let multiplier = match unit {
        "d" | "day" | "days" => 86_400.0,
        "h" | "hour" | "hours" => 3_600.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "ms" | "millis" | "millisecond" | "milliseconds" => 0.001,
        _ => return None,
    };
    Some(multiplier)
}

fn parse_unit_string(text: &str) -> Option<f64> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let (sign, mut rest) = split_sign(&compact);
    if rest.is_empty() {
        return None;
    }

    let mut total = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        total += value * unit_multiplier(&rest[..unit_len])?;
        rest = &rest[unit_len..];
    }

    Some(sign * total)
}
