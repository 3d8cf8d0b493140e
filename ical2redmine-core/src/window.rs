//! The time window a run is responsible for.
//!
//! Events starting after `now` or before the optional `since` cutoff must
//! not have a time entry. Both boundaries are handled the same way by the
//! reconciler.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    Future,
    TooOld,
    InWindow,
}

#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub now: DateTime<Utc>,
    pub since: Option<DateTime<Utc>>,
}

impl Window {
    pub fn new(now: DateTime<Utc>, since: Option<DateTime<Utc>>) -> Self {
        Window { now, since }
    }

    pub fn classify(&self, start: DateTime<Utc>) -> WindowClass {
        if start > self.now {
            return WindowClass::Future;
        }
        match self.since {
            Some(since) if start < since => WindowClass::TooOld,
            _ => WindowClass::InWindow,
        }
    }

    /// Whether an entry booked on `day` lies inside `[since, now]`.
    /// Without a cutoff every day qualifies.
    pub fn covers_day(&self, day: NaiveDate) -> bool {
        match self.since {
            Some(since) => since.date_naive() <= day && day <= self.now.date_naive(),
            None => true,
        }
    }
}

/// Parse the `since` setting as UTC midnight.
///
/// Accepts `MM/DD/YYYY` and, as a convenience, `YYYY-MM-DD`.
pub fn parse_since(value: &str) -> SyncResult<DateTime<Utc>> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(value, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| {
            SyncError::config(format!(
                "Invalid since date '{value}'. Expected MM/DD/YYYY"
            ))
        })?;

    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SyncError::config(format!("Invalid since date '{value}'")))
}
