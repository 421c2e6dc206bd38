use std::time::Duration;

use tracing::warn;

/// A configuration value that can be parsed from an environment variable string.
///
/// When parsing fails, the default value is used and a warning is logged; a bad
/// environment variable never aborts startup.
pub trait ParsableConfigValue: Sized {
    fn parse_value(s: &str) -> Option<Self>;

    fn parse(name: &str, env_value: Option<String>, default: Self) -> Self {
        let Some(raw) = env_value else {
            return default;
        };

        match Self::parse_value(raw.trim()) {
            Some(v) => v,
            None => {
                warn!("Invalid value {raw:?} for configuration setting {name}; using default.");
                default
            },
        }
    }
}

macro_rules! impl_parsable_from_str {
    ($($t:ty),+) => {
        $(
            impl ParsableConfigValue for $t {
                fn parse_value(s: &str) -> Option<Self> {
                    s.parse::<$t>().ok()
                }
            }
        )+
    };
}

impl_parsable_from_str!(usize, u32, u64, f64, String);

impl ParsableConfigValue for bool {
    fn parse_value(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ParsableConfigValue for Duration {
    /// Accepts `"500ms"`, `"60s"`, `"15m"`, `"2h"`, or a bare number of seconds.
    fn parse_value(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();

        let (number, unit): (&str, &str) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
            Some(idx) => (&s[..idx], s[idx..].trim()),
            None => (&s[..], ""),
        };

        let value: f64 = number.parse().ok()?;

        let scale = match unit {
            "" | "s" | "sec" | "secs" => 1.0,
            "ms" => 1e-3,
            "m" | "min" | "mins" => 60.0,
            "h" | "hr" | "hrs" => 3600.0,
            _ => return None,
        };

        Some(Duration::from_secs_f64(value * scale))
    }
}
