//! Post date parsing with a "now" fallback.
//!
//! Accepted forms, all read as UTC unless an offset is given:
//! `2024-01-01`, `2024/01/01`, `2024-01-01 10:30:00`, `2024-01-01T10:30:00`,
//! RFC 3339 (`2024-01-01T10:30:00+08:00`) and RFC 2822.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// A post date, or the instant substituted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostDate {
    Parsed(DateTime<Utc>),
    /// The raw string (possibly empty) could not be read; `now` stands in.
    Fallback { raw: String, now: DateTime<Utc> },
}

impl PostDate {
    /// Parse `raw`, substituting `now` when it isn't a recognizable date.
    pub fn parse_or(raw: &str, now: DateTime<Utc>) -> Self {
        match parse_datetime(raw) {
            Some(dt) => Self::Parsed(dt),
            None => Self::Fallback {
                raw: raw.to_owned(),
                now,
            },
        }
    }

    /// The instant used for ordering and rendering.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Self::Parsed(dt) | Self::Fallback { now: dt, .. } => *dt,
        }
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Render as RFC 2822, the date format RSS requires.
    pub fn to_rfc2822(&self) -> String {
        self.instant().to_rfc2822()
    }
}

/// Parse a date string in any of the accepted forms.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
