use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

/// Tried, in order, after the configured format.
const FALLBACK_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d"];

fn localize(naive: NaiveDateTime, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive).single()
}

/// Parse with one strftime-style format. Formats without an offset are read
/// as local time in `tz`; date-only formats mean midnight.
fn parse_with(raw: &str, format: &str, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(raw, format) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
        return localize(naive, tz);
    }
    NaiveDate::parse_from_str(raw, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| localize(naive, tz))
}

/// Parse a captured publish date.
///
/// The configured format wins; otherwise RFC 3339, RFC 2822 and a few common
/// numeric layouts are tried.
pub fn parse(raw: &str, format: Option<&str>, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(dt) = format
        .filter(|f| !f.trim().is_empty())
        .and_then(|f| parse_with(raw, f, tz))
    {
        return Some(dt);
    }

    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .or_else(|| {
            FALLBACK_FORMATS
                .iter()
                .find_map(|format| parse_with(raw, format, tz))
        })
}
