use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ConfigError;

/// Locally configured TTL for cached pages, independent of HTTP validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardLifetime {
    /// Cached rows are never discarded by age.
    #[default]
    Forever,
    For(Duration),
}

impl HardLifetime {
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Forever => None,
            Self::For(d) if d.is_zero() => None,
            Self::For(d) => Some(*d),
        }
    }
}

impl FromStr for HardLifetime {
    type Err = ConfigError;

    /// Parse strings like `"1d"`, `"2d5h3m4s"`; the empty string means forever.
    ///
    /// Each of the units `s`, `m`, `h`, `d` may appear once. Counts are positive
    /// integers without leading zeros. Matching is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        if text.is_empty() {
            return Ok(Self::Forever);
        }

        let invalid = |reason: &str| ConfigError::Lifetime(format!("{:?}: {}", s, reason));

        let mut seen = Vec::with_capacity(4);
        let mut total: u64 = 0;
        let mut chars = text.chars().peekable();

        while chars.peek().is_some() {
            let mut digits = String::new();
            while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(c);
                chars.next();
            }
            if digits.is_empty() {
                return Err(invalid("expected a number"));
            }
            if digits.starts_with('0') {
                return Err(invalid("counts must be positive without leading zeros"));
            }

            let unit = chars.next().ok_or_else(|| invalid("missing unit"))?;
            let secs_per_unit = match unit {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(invalid("unit must be one of s, m, h, d")),
            };
            if seen.contains(&unit) {
                return Err(invalid("duplicate unit"));
            }
            seen.push(unit);

            let count: u64 = digits.parse().map_err(|_| invalid("count out of range"))?;
            total = count
                .checked_mul(secs_per_unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| invalid("lifetime out of range"))?;
        }

        Ok(Self::For(Duration::from_secs(total)))
    }
}

impl fmt::Display for HardLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forever => write!(f, "forever"),
            Self::For(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}
