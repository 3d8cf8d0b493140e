//! Deciding whether a time entry needs to be written.

use crate::entry::{TimeEntry, TimeEntryDraft};

/// Canonical text form of an hour count, used for comparisons so that
/// float noise (0.7500000001 vs 0.75) does not force a rewrite.
pub fn format_hours(hours: f64) -> String {
    format!("{hours:.2}")
}

/// True when `existing` is absent or differs from `candidate` in hours,
/// date, comments, issue, or (for explicit mappings) activity.
pub fn needs_write(candidate: &TimeEntryDraft, existing: Option<&TimeEntry>) -> bool {
    let Some(existing) = existing else {
        return true;
    };

    let existing_comments = existing.comments.as_deref().unwrap_or("");

    format_hours(existing.hours) != format_hours(candidate.hours)
        || existing.spent_on != candidate.spent_on
        || existing_comments != candidate.comments
        || existing.issue_id != Some(candidate.issue_id)
        || activity_differs(candidate, existing)
}

/// Activities are only enforced for explicit mappings.
pub fn activity_differs(candidate: &TimeEntryDraft, existing: &TimeEntry) -> bool {
    candidate.explicit_activity
        && candidate.activity_id.is_some()
        && existing.activity_id != candidate.activity_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft() -> TimeEntryDraft {
        TimeEntryDraft {
            correlation_uid: "evt-1".into(),
            hours: 1.5,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            comments: String::new(),
            issue_id: 42,
            activity_id: Some(7),
            user_id: Some(3),
            explicit_activity: false,
        }
    }

    fn existing() -> TimeEntry {
        TimeEntry {
            id: Some(100),
            hours: 1.5,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            comments: None,
            issue_id: Some(42),
            activity_id: Some(9),
            user_id: Some(3),
            correlation_uid: Some("evt-1".into()),
        }
    }

    #[test]
    fn test_absent_entry_needs_write() {
        assert!(needs_write(&draft(), None));
    }

    #[test]
    fn test_identical_entry_is_unchanged() {
        // Absent comments on the remote compare equal to empty comments
        assert!(!needs_write(&draft(), Some(&existing())));
    }

    #[test]
    fn test_hours_compared_in_canonical_form() {
        let mut entry = existing();
        entry.hours = 1.500000001;
        assert!(!needs_write(&draft(), Some(&entry)));

        entry.hours = 1.25;
        assert!(needs_write(&draft(), Some(&entry)));
    }

    #[test]
    fn test_each_field_triggers_write() {
        let mut entry = existing();
        entry.spent_on = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(needs_write(&draft(), Some(&entry)));

        let mut entry = existing();
        entry.comments = Some("edited".into());
        assert!(needs_write(&draft(), Some(&entry)));

        let mut entry = existing();
        entry.issue_id = Some(43);
        assert!(needs_write(&draft(), Some(&entry)));
    }

    #[test]
    fn test_activity_only_compared_for_explicit_mappings() {
        // existing has activity 9, candidate 7
        assert!(!needs_write(&draft(), Some(&existing())));

        let mut explicit = draft();
        explicit.explicit_activity = true;
        assert!(needs_write(&explicit, Some(&existing())));
    }

    #[test]
    fn test_activity_differs() {
        assert!(!activity_differs(&draft(), &existing()));

        let mut explicit = draft();
        explicit.explicit_activity = true;
        assert!(activity_differs(&explicit, &existing()));

        explicit.activity_id = None;
        assert!(!activity_differs(&explicit, &existing()));

        explicit.activity_id = Some(9);
        assert!(!activity_differs(&explicit, &existing()));
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(0.75), "0.75");
        assert_eq!(format_hours(1.0), "1.00");
        assert_eq!(format_hours(1.0 / 3.0), "0.33");
    }
}
