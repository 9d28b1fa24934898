//! Signup windows and the gate that enforces them.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Guest,
    Other,
}

impl Category {
    /// Invited participants sign up in the guest window.
    pub fn of_submission(invited: bool) -> Self {
        if invited {
            Category::Guest
        } else {
            Category::Other
        }
    }
}

/// Opening instants per category and the shared closing instant.
///
/// An unset instant keeps its window shut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowSchedule {
    pub guest_open: Option<DateTime<Utc>>,
    pub other_open: Option<DateTime<Utc>>,
    pub signup_close: Option<DateTime<Utc>>,
}

impl WindowSchedule {
    pub fn opens_at(&self, category: Category) -> Option<DateTime<Utc>> {
        match category {
            Category::Guest => self.guest_open,
            Category::Other => self.other_open,
        }
    }

    /// Builds a schedule from raw configuration values. Unparsable values are
    /// logged and treated as unset.
    pub fn from_raw(guest_open: Option<&str>, other_open: Option<&str>, signup_close: Option<&str>) -> Self {
        Self {
            guest_open: guest_open.and_then(|raw| parse_instant_logged("guest open", raw)),
            other_open: other_open.and_then(|raw| parse_instant_logged("other open", raw)),
            signup_close: signup_close.and_then(|raw| parse_instant_logged("signup close", raw)),
        }
    }
}

/// Accepts RFC 3339 or `%Y-%m-%d %H:%M:%S`, the latter read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn parse_instant_logged(name: &str, raw: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_instant(raw);
    if parsed.is_none() {
        warn!("ignoring unparsable {} instant {:?}; that window stays closed", name, raw);
    }
    parsed
}

/// Whether a submission of `category` may be accepted at `now`.
///
/// The open instant is inclusive, the close instant exclusive.
pub fn is_open(schedule: &WindowSchedule, category: Category, now: DateTime<Utc>) -> bool {
    match (schedule.opens_at(category), schedule.signup_close) {
        (Some(open), Some(close)) => open <= now && now < close,
        _ => false,
    }
}
