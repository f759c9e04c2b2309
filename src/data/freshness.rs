use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Output format for every timestamp shown to the user.
pub const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Truncated HTTP date some hosts emit without seconds or zone.
const SHORT_HTTP_DATE: &str = "%a, %d %b %Y %H:%M";

/// Marker that prefixes a fallback freshness string.
pub const UNAVAILABLE_MARKER: &str = "unavailable";

/// When the source data was last modified, or when we fetched it if the
/// server did not say.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    LastModified(DateTime<Tz>),
    Unavailable { fetched_at: DateTime<Tz> },
}

impl Freshness {
    /// Derive freshness from an optional `Last-Modified` header value.
    /// Unparseable headers count as absent.
    pub fn derive(last_modified: Option<&str>, tz: Tz, now: DateTime<Utc>) -> Self {
        match last_modified.and_then(parse_http_date) {
            Some(dt) => Freshness::LastModified(dt.with_timezone(&tz)),
            None => {
                if let Some(raw) = last_modified {
                    log::warn!("Ignoring unparseable Last-Modified header {raw:?}");
                }
                Freshness::Unavailable {
                    fetched_at: now.with_timezone(&tz),
                }
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Freshness::Unavailable { .. })
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::LastModified(dt) => write!(f, "{}", dt.format(DISPLAY_FORMAT)),
            Freshness::Unavailable { fetched_at } => write!(
                f,
                "{UNAVAILABLE_MARKER} (last fetched at {})",
                fetched_at.format(DISPLAY_FORMAT)
            ),
        }
    }
}

/// Parse an HTTP date. Accepts RFC 1123 (`Tue, 15 Nov 1994 08:12:31 GMT`) and
/// the truncated `Tue, 15 Nov 1994 08:12` form, which is taken as UTC.
pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_and_remainder(raw, SHORT_HTTP_DATE)
        .ok()
        .map(|(naive, _)| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Asia::Tokyo;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 1, 2, 3).unwrap()
    }

    #[test]
    fn rfc1123_header_is_converted_to_target_zone() {
        let f = Freshness::derive(Some("Tue, 15 Nov 1994 08:12:31 GMT"), Tokyo, now());
        assert!(!f.is_fallback());
        assert_eq!(f.to_string(), "1994/11/15 17:12:31");
    }

    #[test]
    fn short_header_is_read_as_utc() {
        let f = Freshness::derive(Some("Sat, 17 Oct 2026 23:30"), Tokyo, now());
        assert_eq!(f.to_string(), "2026/10/18 08:30:00");
    }

    #[test]
    fn missing_header_falls_back_to_fetch_time() {
        let f = Freshness::derive(None, Tokyo, now());
        assert!(f.is_fallback());
        assert_eq!(f.to_string(), "unavailable (last fetched at 2026/10/18 10:02:03)");
    }

    #[test]
    fn garbage_header_is_treated_as_missing() {
        let f = Freshness::derive(Some("yesterday-ish"), Tokyo, now());
        assert!(f.is_fallback());
    }
}
