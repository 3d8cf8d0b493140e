//! Time entries on the remote store and the candidates built from events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::target::Target;

/// A time entry as held by Redmine.
///
/// `correlation_uid` is the ownership marker: entries without it were not
/// created by this tool and are never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: Option<u64>,
    pub hours: f64,
    pub spent_on: NaiveDate,
    pub comments: Option<String>,
    pub issue_id: Option<u64>,
    pub activity_id: Option<u64>,
    pub user_id: Option<u64>,
    pub correlation_uid: Option<String>,
}

impl TimeEntry {
    pub fn is_managed(&self) -> bool {
        self.correlation_uid.is_some()
    }

    /// Label for log lines, e.g. `#123`.
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => format!("#{id}"),
            None => "(unsaved)".to_string(),
        }
    }
}

/// The fields a time entry should have for a given event and target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEntryDraft {
    /// Written into the correlation custom field on create only.
    pub correlation_uid: String,
    pub hours: f64,
    pub spent_on: NaiveDate,
    pub comments: String,
    pub issue_id: u64,
    pub activity_id: Option<u64>,
    pub user_id: Option<u64>,
    #[serde(skip)]
    pub explicit_activity: bool,
}

impl TimeEntryDraft {
    pub fn from_event(event: &Event, target: &Target) -> Self {
        TimeEntryDraft {
            correlation_uid: event.uid.clone(),
            hours: event.hours(),
            spent_on: event.spent_on(),
            comments: event.comments(&target.comment_prefix),
            issue_id: target.issue_id,
            activity_id: target.activity_id,
            user_id: target.user_id,
            explicit_activity: target.explicit_activity,
        }
    }
}
