//! Calendar events as seen by the reconciler.
//!
//! A feed is re-fetched on every run, so events are plain immutable values.
//! Absent text fields are stored as empty strings.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Redmine rejects time entry comments longer than this.
pub const MAX_COMMENT_CHARS: usize = 1024;

/// A single calendar occurrence, keyed by its UID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Hours spent, derived from the event length.
    pub fn hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }

    /// The day the time is booked on, in the event's own offset.
    pub fn spent_on(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    /// Build the time entry comment: prefix followed by the description
    /// flattened onto one line.
    pub fn comments(&self, prefix: &str) -> String {
        let flattened = self.description.replace("\r\n", " ").replace('\n', " ");
        let comments = format!("{prefix}{flattened}");

        if comments.chars().count() > MAX_COMMENT_CHARS {
            comments.chars().take(MAX_COMMENT_CHARS).collect()
        } else {
            comments
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.summary.is_empty() {
            write!(f, "(No title)")
        } else {
            write!(f, "{}", self.summary)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    /// Event on 2024-03-04 starting at `hour`:00 UTC lasting `minutes`.
    pub fn event_at(uid: &str, summary: &str, hour: u32, minutes: i64) -> Event {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 4, hour, 0, 0)
            .unwrap();
        Event {
            uid: uid.to_string(),
            summary: summary.to_string(),
            description: String::new(),
            location: String::new(),
            start,
            end: start + Duration::minutes(minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::event_at;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hours_from_duration() {
        let event = event_at("a", "Standup", 9, 90);
        assert_eq!(event.hours(), 1.5);
    }

    #[test]
    fn test_spent_on_uses_event_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 3, 5, 0, 30, 0).unwrap();
        let event = Event {
            uid: "late".into(),
            summary: String::new(),
            description: String::new(),
            location: String::new(),
            start,
            end: start + Duration::hours(1),
        };

        // 22:30 UTC on the 4th, but the local day is the 5th
        assert_eq!(event.spent_on(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_comments_flatten_newlines_and_prefix() {
        let mut event = event_at("a", "Review", 9, 30);
        event.description = "line one\nline two\r\nline three".into();
        assert_eq!(event.comments("[cal] "), "[cal] line one line two line three");
    }

    #[test]
    fn test_comments_truncated() {
        let mut event = event_at("a", "Review", 9, 30);
        event.description = "x".repeat(MAX_COMMENT_CHARS + 50);
        assert_eq!(event.comments("").chars().count(), MAX_COMMENT_CHARS);
    }
}
