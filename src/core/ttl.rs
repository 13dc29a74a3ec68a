//! Unlock lifetimes.
//!
//! Durations are written as `<n>s`, `<n>m`, `<n>h` or `<n>d`.

use std::time::Duration;

use crate::core::constants;
use crate::core::domain::Env;
use crate::error::{ConfigError, Result};

/// Parse a duration such as `30m` or `9h`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidDuration` for anything else, including zero.
pub fn parse(text: &str) -> Result<Duration> {
    let invalid = || ConfigError::InvalidDuration(text.to_string());
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = text.split_at(split);

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => Some(n),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(60 * 60),
        "d" => n.checked_mul(24 * 60 * 60),
        _ => None,
    }
    .filter(|secs| *secs > 0)
    .ok_or_else(invalid)?;

    Ok(Duration::from_secs(secs))
}

/// Render a duration with its largest whole unit, e.g. `9h` or `90s`.
pub fn format(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s >= 86_400 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s >= 3_600 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

/// Unlock lifetime used when the caller does not supply one.
pub fn default_for(env: Env) -> Duration {
    match env {
        Env::Sudo => constants::SUDO_TTL,
        _ => constants::DEFAULT_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse("9h").unwrap(), Duration::from_secs(32_400));
        assert_eq!(parse("2d").unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "h", "10", "10w", "0m", "-5m", "1.5h"] {
            assert!(parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(format(Duration::from_secs(32_400)), "9h");
        assert_eq!(format(Duration::from_secs(1_800)), "30m");
        assert_eq!(format(Duration::from_secs(90)), "90s");
    }

    #[test]
    fn test_default_ttls() {
        assert_eq!(default_for(Env::Sudo), Duration::from_secs(30 * 60));
        assert_eq!(default_for(Env::Prod), Duration::from_secs(9 * 60 * 60));
    }
}
