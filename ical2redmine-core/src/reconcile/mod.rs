//! The reconciliation engine.
//!
//! `Reconciler` walks feed events and then the remaining indexed entries,
//! deciding per correlation UID whether to create, update, delete or skip.
//! Decisions are pure; `SyncPlan::apply` performs them against a store.

mod action;
mod plan;

pub use action::{ActionKind, DeleteReason, SkipReason, SyncAction};
pub use plan::{ApplyFailure, ApplyStats, SyncPlan};

use std::collections::HashSet;

use crate::change::needs_write;
use crate::correlation::CorrelationIndex;
use crate::entry::TimeEntryDraft;
use crate::error::SyncResult;
use crate::event::Event;
use crate::target::TargetResolver;
use crate::window::{Window, WindowClass};

/// Which orphaned entries this run may delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrphanScope {
    /// Every managed entry.
    All,
    /// Only entries booked by these users.
    Users(HashSet<u64>),
}

impl OrphanScope {
    fn includes(&self, user_id: Option<u64>) -> bool {
        match self {
            OrphanScope::All => true,
            OrphanScope::Users(users) => user_id.is_some_and(|id| users.contains(&id)),
        }
    }
}

pub struct Reconciler<'a> {
    index: &'a CorrelationIndex,
    window: Window,
    orphan_cleanup: bool,
    visited: HashSet<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a CorrelationIndex, window: Window, orphan_cleanup: bool) -> Self {
        Reconciler {
            index,
            window,
            orphan_cleanup,
            visited: HashSet::new(),
        }
    }

    /// Decide the action for one event and mark its UID as visited.
    pub fn reconcile_event<R: TargetResolver + ?Sized>(
        &mut self,
        event: &Event,
        resolver: &R,
    ) -> SyncResult<SyncAction> {
        let uid = event.uid.clone();

        if !self.visited.insert(uid.clone()) {
            log::warn!("Event {uid} was already handled in this run, ignoring it");
            return Ok(SyncAction::Skip {
                uid,
                reason: SkipReason::AlreadyVisited,
            });
        }

        let existing = self.index.get(&uid);

        let (delete_reason, skip_reason) = match self.window.classify(event.start_utc()) {
            WindowClass::Future => (DeleteReason::Future, SkipReason::Future),
            WindowClass::TooOld => (DeleteReason::TooOld, SkipReason::TooOld),
            WindowClass::InWindow => {
                return Ok(match resolver.resolve(event)? {
                    Some(target) => {
                        let draft = TimeEntryDraft::from_event(event, &target);
                        match existing {
                            None => SyncAction::Create { draft },
                            Some(entry) if needs_write(&draft, Some(entry)) => SyncAction::Update {
                                existing: entry.clone(),
                                draft,
                            },
                            Some(_) => SyncAction::Skip {
                                uid,
                                reason: SkipReason::Unchanged,
                            },
                        }
                    }
                    None => match existing {
                        Some(entry) => SyncAction::Delete {
                            existing: entry.clone(),
                            reason: DeleteReason::Unmatched,
                        },
                        None => SyncAction::Skip {
                            uid,
                            reason: SkipReason::Unmatched,
                        },
                    },
                });
            }
        };

        Ok(match existing {
            Some(entry) => SyncAction::Delete {
                existing: entry.clone(),
                reason: delete_reason,
            },
            None => SyncAction::Skip {
                uid,
                reason: skip_reason,
            },
        })
    }

    /// Plan a batch of events, e.g. one subscription's feed.
    pub fn reconcile_events<R: TargetResolver + ?Sized>(
        &mut self,
        events: &[Event],
        resolver: &R,
    ) -> SyncResult<SyncPlan> {
        let mut plan = SyncPlan::default();
        for event in events {
            plan.push(self.reconcile_event(event, resolver)?);
        }
        Ok(plan)
    }

    /// Plan deletion of indexed entries whose UID was not seen in any feed.
    ///
    /// Only runs when orphan cleanup is enabled, and only touches entries
    /// in `scope` whose `spent_on` lies inside the window.
    pub fn collect_orphans(&mut self, scope: &OrphanScope) -> SyncPlan {
        let mut plan = SyncPlan::default();

        if !self.orphan_cleanup {
            log::debug!("Orphan cleanup is disabled, leaving unvisited time entries alone");
            return plan;
        }

        for (uid, entry) in self.index.iter() {
            if self.visited.contains(uid) {
                continue;
            }
            if !scope.includes(entry.user_id) {
                continue;
            }
            if !self.window.covers_day(entry.spent_on) {
                continue;
            }

            self.visited.insert(uid.to_string());
            plan.push(SyncAction::Delete {
                existing: entry.clone(),
                reason: DeleteReason::Orphaned,
            });
        }

        plan
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
