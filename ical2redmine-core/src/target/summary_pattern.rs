use regex::Regex;

use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::target::{Target, TargetResolver};

/// Name of the capture group holding the issue id.
pub const ISSUE_ID_GROUP: &str = "issue_id";

/// Extracts the issue id from the start of an event summary.
#[derive(Debug, Clone)]
pub struct SummaryPatternResolver {
    source: String,
    pattern: Regex,
    activity_id: Option<u64>,
    user_id: Option<u64>,
}

impl SummaryPatternResolver {
    /// Compile the pattern. It is anchored at the start of the summary and
    /// must declare an `issue_id` group.
    pub fn compile(pattern: &str) -> SyncResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| SyncError::pattern(pattern, e.to_string()))?;

        if !regex.capture_names().flatten().any(|name| name == ISSUE_ID_GROUP) {
            return Err(SyncError::pattern(
                pattern,
                format!("missing a named group '{ISSUE_ID_GROUP}', e.g. (?P<{ISSUE_ID_GROUP}>\\d+)"),
            ));
        }

        Ok(SummaryPatternResolver {
            source: pattern.to_string(),
            pattern: regex,
            activity_id: None,
            user_id: None,
        })
    }

    /// Bind the resolver to one subscription's user and activity.
    pub fn for_subscription(&self, user_id: u64, activity_id: Option<u64>) -> Self {
        SummaryPatternResolver {
            user_id: Some(user_id),
            activity_id,
            ..self.clone()
        }
    }
}

impl TargetResolver for SummaryPatternResolver {
    fn resolve(&self, event: &Event) -> SyncResult<Option<Target>> {
        let Some(captures) = self.pattern.captures(&event.summary) else {
            return Ok(None);
        };

        let Some(issue) = captures.name(ISSUE_ID_GROUP) else {
            return Err(SyncError::pattern(
                &self.source,
                format!("matched '{}' without capturing '{ISSUE_ID_GROUP}'", event.summary),
            ));
        };

        let issue_id = match issue.as_str().parse::<u64>() {
            Ok(id) if id > 0 => id,
            _ => {
                log::warn!(
                    "Event '{}' ({}) captured '{}', which is not an issue id; skipping",
                    event.summary,
                    event.uid,
                    issue.as_str()
                );
                return Ok(None);
            }
        };

        log::debug!(
            "iCal event '{}' ({}) matches issue id #{issue_id}",
            event.summary,
            event.uid
        );

        Ok(Some(Target {
            issue_id,
            activity_id: self.activity_id,
            user_id: self.user_id,
            comment_prefix: String::new(),
            explicit_activity: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_support::event_at;

    #[test]
    fn test_extracts_issue_id() {
        let resolver = SummaryPatternResolver::compile(r"#(?P<issue_id>\d+)")
            .unwrap()
            .for_subscription(3, Some(9));

        let target = resolver
            .resolve(&event_at("a", "#1234 Code review", 9, 60))
            .unwrap()
            .expect("Should match");

        assert_eq!(target.issue_id, 1234);
        assert_eq!(target.user_id, Some(3));
        assert_eq!(target.activity_id, Some(9));
        assert!(!target.explicit_activity);
    }

    #[test]
    fn test_anchored_at_start() {
        let resolver = SummaryPatternResolver::compile(r"#(?P<issue_id>\d+)").unwrap();
        assert!(resolver.resolve(&event_at("a", "Review #12", 9, 60)).unwrap().is_none());
    }

    #[test]
    fn test_missing_group_rejected_at_compile() {
        let err = SummaryPatternResolver::compile(r"#(\d+)").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("issue_id"));
    }

    #[test]
    fn test_match_without_group_is_fatal() {
        let resolver = SummaryPatternResolver::compile(r"(?:#(?P<issue_id>\d+)|Meeting)").unwrap();
        let err = resolver.resolve(&event_at("a", "Meeting", 9, 60)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_non_numeric_capture_skips() {
        let resolver = SummaryPatternResolver::compile(r"(?P<issue_id>\w+):").unwrap();
        assert!(resolver.resolve(&event_at("a", "abc: notes", 9, 60)).unwrap().is_none());
    }
}
