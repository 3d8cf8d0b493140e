//! Plans of actions and their sequential application to a store.

use serde::Serialize;

use crate::error::{SyncError, SyncResult};
use crate::reconcile::{ActionKind, SyncAction};
use crate::store::TimeEntryStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
}

/// A dispatch that failed. The run carries on with the next action.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    pub action: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyStats {
    pub fn merge(&mut self, other: ApplyStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

impl SyncPlan {
    pub fn push(&mut self, action: SyncAction) {
        self.actions.push(action);
    }

    pub fn extend(&mut self, other: SyncPlan) {
        self.actions.extend(other.actions);
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        !self.actions.iter().any(SyncAction::is_write)
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }

    pub fn writes(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_write())
    }

    /// Dispatch every action in order, one call at a time. A failing call
    /// is recorded and does not stop the remaining actions.
    pub async fn apply<S: TimeEntryStore + ?Sized>(&self, store: &S) -> ApplyStats {
        let mut stats = ApplyStats::default();

        for action in &self.actions {
            match dispatch(store, action).await {
                Ok(()) => match action.kind() {
                    ActionKind::Create => stats.created += 1,
                    ActionKind::Update => stats.updated += 1,
                    ActionKind::Delete => stats.deleted += 1,
                    ActionKind::Skip => stats.skipped += 1,
                },
                Err(e) => {
                    log::warn!("Failed to apply '{action}': {e}");
                    stats.failures.push(ApplyFailure {
                        action: action.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        stats
    }
}

async fn dispatch<S: TimeEntryStore + ?Sized>(store: &S, action: &SyncAction) -> SyncResult<()> {
    match action {
        SyncAction::Create { draft } => {
            let created = store.create_time_entry(draft).await?;
            log::info!(
                "[+] Created time entry {} for {}",
                created.label(),
                draft.correlation_uid
            );
        }
        SyncAction::Update { existing, draft } => {
            let id = existing.id.ok_or(SyncError::MissingId)?;
            store.update_time_entry(id, draft).await?;
            log::info!("[~] Some things have changed, saved time entry #{id}");
        }
        SyncAction::Delete { existing, reason } => {
            let id = existing.id.ok_or(SyncError::MissingId)?;
            store.delete_time_entry(id).await?;
            log::info!("[-] Deleted time entry #{id} because {reason}");
        }
        SyncAction::Skip { uid, reason } => {
            log::debug!("[ ] Skipping {uid}: {reason}");
        }
    }

    Ok(())
}
