//! Resolving which issue, activity and user an event books time against.
//!
//! Two resolvers exist, selected by the shape of the settings:
//! - `RuleSetResolver`: an ordered list of mapping rules, first match wins
//! - `SummaryPatternResolver`: one pattern extracting the issue id from the
//!   summary, with the activity supplied by the subscription
//!
//! The reconciler only sees the `TargetResolver` trait.

mod rules;
mod summary_pattern;

pub use rules::{MappingRule, RuleSetResolver};
pub use summary_pattern::SummaryPatternResolver;

use crate::error::SyncResult;
use crate::event::Event;

/// Where an event's time gets booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub issue_id: u64,
    pub activity_id: Option<u64>,
    pub user_id: Option<u64>,
    pub comment_prefix: String,
    /// The activity came from an explicit mapping and is enforced on
    /// existing entries. Subscription-level activities are only used on
    /// create.
    pub explicit_activity: bool,
}

pub trait TargetResolver {
    /// `Ok(None)` means the event is out of scope. Errors are configuration
    /// problems and abort the run.
    fn resolve(&self, event: &Event) -> SyncResult<Option<Target>>;
}
