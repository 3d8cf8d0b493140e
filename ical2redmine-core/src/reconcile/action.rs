use std::fmt;

use serde::Serialize;

use crate::entry::{TimeEntry, TimeEntryDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Skip,
}

impl ActionKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ActionKind::Create => "+",
            ActionKind::Update => "~",
            ActionKind::Delete => "-",
            ActionKind::Skip => " ",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeleteReason {
    Future,
    TooOld,
    Unmatched,
    Orphaned,
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeleteReason::Future => "the event was moved to the future",
            DeleteReason::TooOld => "the event is older than the since cutoff",
            DeleteReason::Unmatched => "the event no longer matches a mapping",
            DeleteReason::Orphaned => "the event was removed from the feed",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Future,
    TooOld,
    Unmatched,
    Unchanged,
    /// The UID was already handled earlier in this run.
    AlreadyVisited,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Future => "event is in the future",
            SkipReason::TooOld => "event is older than the since cutoff",
            SkipReason::Unmatched => "no mapping matches",
            SkipReason::Unchanged => "nothing has changed",
            SkipReason::AlreadyVisited => "UID already handled in this run",
        };
        write!(f, "{text}")
    }
}

/// One decision of the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SyncAction {
    Create {
        draft: TimeEntryDraft,
    },
    Update {
        existing: TimeEntry,
        draft: TimeEntryDraft,
    },
    Delete {
        existing: TimeEntry,
        reason: DeleteReason,
    },
    Skip {
        uid: String,
        reason: SkipReason,
    },
}

impl SyncAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            SyncAction::Create { .. } => ActionKind::Create,
            SyncAction::Update { .. } => ActionKind::Update,
            SyncAction::Delete { .. } => ActionKind::Delete,
            SyncAction::Skip { .. } => ActionKind::Skip,
        }
    }

    /// Correlation UID the action is about.
    pub fn uid(&self) -> &str {
        match self {
            SyncAction::Create { draft } | SyncAction::Update { draft, .. } => &draft.correlation_uid,
            SyncAction::Delete { existing, .. } => existing.correlation_uid.as_deref().unwrap_or(""),
            SyncAction::Skip { uid, .. } => uid,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, SyncAction::Skip { .. })
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Create { draft } => write!(
                f,
                "{} {} on issue #{} ({}h on {})",
                self.kind(),
                draft.correlation_uid,
                draft.issue_id,
                crate::change::format_hours(draft.hours),
                draft.spent_on
            ),
            SyncAction::Update { existing, draft } => write!(
                f,
                "{} {} entry {} on issue #{} ({}h on {})",
                self.kind(),
                draft.correlation_uid,
                existing.label(),
                draft.issue_id,
                crate::change::format_hours(draft.hours),
                draft.spent_on
            ),
            SyncAction::Delete { existing, reason } => write!(
                f,
                "{} {} entry {}: {}",
                self.kind(),
                self.uid(),
                existing.label(),
                reason
            ),
            SyncAction::Skip { uid, reason } => write!(f, "{} {}: {}", self.kind(), uid, reason),
        }
    }
}
