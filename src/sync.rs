//! A full run: list Redmine once, then reconcile every configured feed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ical2redmine_core::config::{Mode, SyncConfig};
use ical2redmine_core::correlation::CorrelationIndex;
use ical2redmine_core::reconcile::{ApplyStats, OrphanScope, Reconciler, SyncAction, SyncPlan};
use ical2redmine_core::store::{TimeEntryStore, fetch_all_time_entries};
use ical2redmine_core::window::Window;
use ical2redmine_core::{SyncError, SyncResult};

use crate::feed::FeedFetcher;

#[derive(Debug, Default)]
pub struct RunReport {
    /// Everything that was decided, including skips.
    pub plan: SyncPlan,
    pub stats: ApplyStats,
    /// Users whose feed was reconciled, in settings order.
    pub processed_users: Vec<u64>,
}

pub struct SyncRun<'a, S> {
    config: &'a SyncConfig,
    /// One store per API key, in the order of `SyncConfig::api_keys`.
    stores: Vec<S>,
    fetcher: FeedFetcher,
    now: DateTime<Utc>,
    dry_run: bool,
}

impl<'a, S: TimeEntryStore> SyncRun<'a, S> {
    pub fn new(
        config: &'a SyncConfig,
        stores: Vec<S>,
        fetcher: FeedFetcher,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Self {
        Self {
            config,
            stores,
            fetcher,
            now,
            dry_run,
        }
    }

    pub async fn run(&self) -> SyncResult<RunReport> {
        let primary = self
            .stores
            .first()
            .ok_or_else(|| SyncError::config("No API key configured"))?;

        let me = primary.current_user().await?;
        log::info!("Connected to Redmine as {}", me.display_name());

        if let Some(since) = self.config.since {
            log::info!("Any event before {} will be skipped.", since.format("%a %b %e %Y"));
        }
        if self.config.insert_future_events {
            log::debug!("insert_future_events is set but has no effect");
        }

        log::info!("Fetching all time entries from Redmine");
        let index = CorrelationIndex::build(fetch_all_time_entries(primary).await?);

        let window = Window::new(self.now, self.config.since);
        let mut reconciler = Reconciler::new(&index, window, self.config.update_existing_entries);
        let mut report = RunReport::default();

        match &self.config.mode {
            Mode::Rules {
                feed_url, resolver, ..
            } => {
                let feed = self.fetcher.fetch(feed_url).await?;
                let plan = reconciler.reconcile_events(&feed.events, resolver)?;
                self.dispatch(plan, primary, &mut report).await;

                let orphans = reconciler.collect_orphans(&OrphanScope::All);
                self.dispatch(orphans, primary, &mut report).await;
            }
            Mode::Subscriptions {
                subscriptions,
                custom_user_field_id,
                resolver,
                activity_id,
            } => {
                // Every feed is fetched and planned before anything is written,
                // so a fatal error leaves Redmine untouched.
                let mut feeds = Vec::new();
                for (subscription, store) in subscriptions.iter().zip(&self.stores) {
                    let user_id = subscription.user_id;
                    log::debug!("Processing user #{user_id}");

                    let user = match store.find_user(user_id).await {
                        Ok(Some(user)) => user,
                        Ok(None) => {
                            log::error!("{}", SyncError::UserNotFound(user_id));
                            continue;
                        }
                        Err(e) => {
                            log::error!("Failed to look up user #{user_id}: {e}");
                            continue;
                        }
                    };
                    log::info!("----- Processing {} ({user_id}) -----", user.display_name());

                    let feed_url = subscription
                        .feed_url
                        .clone()
                        .or_else(|| custom_user_field_id.and_then(|id| user.custom_field(id)))
                        .unwrap_or_default();
                    if feed_url.trim().is_empty() {
                        log::info!(
                            "It seems that {} hasn't specified an iCal feed URL on their Redmine profile.",
                            user.display_name()
                        );
                        continue;
                    }

                    let feed = self.fetcher.fetch(&feed_url).await?;
                    feeds.push((subscription, store, feed));
                }

                let mut plans = Vec::with_capacity(feeds.len());
                for (subscription, store, feed) in &feeds {
                    let resolver = resolver.for_subscription(
                        subscription.user_id,
                        subscription.activity_id.or(*activity_id),
                    );
                    let plan = reconciler.reconcile_events(&feed.events, &resolver)?;
                    plans.push((subscription.user_id, *store, plan));
                }

                let mut processed: HashMap<u64, &S> = HashMap::new();
                for (user_id, store, plan) in plans {
                    self.dispatch(plan, store, &mut report).await;
                    processed.insert(user_id, store);
                    report.processed_users.push(user_id);
                }

                let scope = OrphanScope::Users(processed.keys().copied().collect());
                let orphans = reconciler.collect_orphans(&scope);

                // Each orphan is deleted with its owner's credentials
                for action in orphans.actions {
                    let owner = match &action {
                        SyncAction::Delete { existing, .. } => {
                            existing.user_id.and_then(|id| processed.get(&id).copied())
                        }
                        _ => None,
                    };
                    let single = SyncPlan {
                        actions: vec![action],
                    };
                    self.dispatch(single, owner.unwrap_or(primary), &mut report)
                        .await;
                }
            }
        }

        log::info!(
            "A total of {} iCal events was handled in this run.",
            reconciler.visited_count()
        );

        Ok(report)
    }

    async fn dispatch(&self, plan: SyncPlan, store: &S, report: &mut RunReport) {
        if !self.dry_run {
            report.stats.merge(plan.apply(store).await);
        }
        report.plan.extend(plan);
    }
}
