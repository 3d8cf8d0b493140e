//! Colored terminal rendering for plans and run results.

use ical2redmine_core::change::{activity_differs, format_hours};
use ical2redmine_core::entry::{TimeEntry, TimeEntryDraft};
use ical2redmine_core::reconcile::{ActionKind, ApplyStats, SyncAction, SyncPlan};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for ActionKind {
    fn render(&self) -> String {
        colorize(*self, self.symbol())
    }
}

fn colorize(kind: ActionKind, text: &str) -> String {
    match kind {
        ActionKind::Create => text.green().to_string(),
        ActionKind::Update => text.yellow().to_string(),
        ActionKind::Delete => text.red().to_string(),
        ActionKind::Skip => text.dimmed().to_string(),
    }
}

impl Render for SyncAction {
    fn render(&self) -> String {
        let kind = self.kind();
        let detail = match self {
            SyncAction::Create { draft } => {
                format!("{}h on {} for issue #{}", format_hours(draft.hours), draft.spent_on, draft.issue_id)
            }
            SyncAction::Update { existing, draft } => {
                format!("{} {}h on {}", existing.label(), format_hours(draft.hours), draft.spent_on)
            }
            SyncAction::Delete { existing, reason } => format!("{} ({reason})", existing.label()),
            SyncAction::Skip { reason, .. } => reason.to_string(),
        };

        format!("{} {} {}", kind.render(), colorize(kind, self.uid()), detail.dimmed())
    }
}

/// Plans larger than this are summarized unless verbose output is asked for.
const COMPACT_THRESHOLD: usize = 10;

pub trait PlanRender {
    fn render(&self, verbose: bool) -> String;
}

impl PlanRender for SyncPlan {
    fn render(&self, verbose: bool) -> String {
        if self.is_empty() && !verbose {
            return "   No changes".dimmed().to_string();
        }

        let mut lines = Vec::new();
        let writes: Vec<&SyncAction> = self.writes().collect();

        if verbose || writes.len() <= COMPACT_THRESHOLD {
            let shown: Vec<&SyncAction> = if verbose {
                self.actions.iter().collect()
            } else {
                writes
            };
            for action in shown {
                lines.push(format!("   {}", action.render()));
                if let SyncAction::Update { existing, draft } = action {
                    lines.extend(
                        render_field_diffs(existing, draft)
                            .into_iter()
                            .map(|l| format!("      {l}")),
                    );
                }
            }
        } else {
            for kind in [ActionKind::Create, ActionKind::Update, ActionKind::Delete] {
                let count = self.count(kind);
                if count > 0 {
                    let label = format!("({count} {} {})", verb(kind), pluralize(count));
                    lines.push(format!("   {} {}", kind.render(), colorize(kind, &label)));
                }
            }
        }

        lines.join("\n")
    }
}

fn verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Create => "new",
        ActionKind::Update => "changed",
        ActionKind::Delete => "deleted",
        ActionKind::Skip => "skipped",
    }
}

fn pluralize(count: usize) -> &'static str {
    if count == 1 { "time entry" } else { "time entries" }
}

fn render_field_diffs(existing: &TimeEntry, draft: &TimeEntryDraft) -> Vec<String> {
    let mut lines = Vec::new();

    let old_hours = format_hours(existing.hours);
    let new_hours = format_hours(draft.hours);
    if old_hours != new_hours {
        lines.push(format!("{}: {} → {}", "hours".dimmed(), old_hours.red(), new_hours.green()));
    }
    if existing.spent_on != draft.spent_on {
        lines.push(format!(
            "{}: {} → {}",
            "spent_on".dimmed(),
            existing.spent_on.to_string().red(),
            draft.spent_on.to_string().green()
        ));
    }
    let old_comments = existing.comments.as_deref().unwrap_or("");
    if old_comments != draft.comments {
        lines.push(format!(
            "{}: {} → {}",
            "comments".dimmed(),
            old_comments.red(),
            draft.comments.green()
        ));
    }
    if existing.issue_id != Some(draft.issue_id) {
        lines.push(format!("{}: {:?} → {}", "issue".dimmed(), existing.issue_id, draft.issue_id));
    }
    if activity_differs(draft, existing) {
        lines.push(format!(
            "{}: {:?} → {:?}",
            "activity".dimmed(),
            existing.activity_id,
            draft.activity_id
        ));
    }

    lines
}

impl Render for ApplyStats {
    fn render(&self) -> String {
        let failed = format!("{} failed", self.failures.len());
        format!(
            "{} created, {} updated, {} deleted, {}",
            self.created.green(),
            self.updated.yellow(),
            self.deleted.red(),
            if self.failures.is_empty() {
                failed.dimmed().to_string()
            } else {
                failed.red().bold().to_string()
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ical2redmine_core::reconcile::DeleteReason;

    fn entry() -> TimeEntry {
        TimeEntry {
            id: Some(7),
            hours: 1.0,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            comments: None,
            issue_id: Some(42),
            activity_id: Some(7),
            user_id: Some(3),
            correlation_uid: Some("evt-1".into()),
        }
    }

    fn draft() -> TimeEntryDraft {
        TimeEntryDraft {
            correlation_uid: "evt-1".into(),
            hours: 1.0,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            comments: String::new(),
            issue_id: 42,
            activity_id: Some(9),
            user_id: Some(3),
            explicit_activity: false,
        }
    }

    #[test]
    fn test_field_diffs_only_show_changes() {
        let lines = render_field_diffs(&entry(), &draft());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("2024-03-04"));
    }

    #[test]
    fn test_activity_diff_follows_change_detection() {
        let unchanged_day = TimeEntryDraft {
            spent_on: entry().spent_on,
            ..draft()
        };
        assert!(render_field_diffs(&entry(), &unchanged_day).is_empty());

        let explicit = TimeEntryDraft {
            explicit_activity: true,
            ..unchanged_day
        };
        let lines = render_field_diffs(&entry(), &explicit);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("activity"));
    }

    #[test]
    fn test_large_plans_are_compacted() {
        let mut plan = SyncPlan::default();
        for _ in 0..=COMPACT_THRESHOLD {
            plan.push(SyncAction::Delete {
                existing: entry(),
                reason: DeleteReason::Orphaned,
            });
        }

        let rendered = plan.render(false);
        assert_eq!(rendered.lines().count(), 1);
        assert!(rendered.contains("11 deleted time entries"));
    }

    #[test]
    fn test_empty_plan() {
        assert!(SyncPlan::default().render(false).contains("No changes"));
    }
}
