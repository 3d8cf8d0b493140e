//! Index of managed time entries by correlation UID.
//!
//! Built once per run from the full listing of the store and treated as a
//! snapshot afterwards.

use std::collections::HashMap;

use crate::entry::TimeEntry;

#[derive(Debug, Default, Clone)]
pub struct CorrelationIndex {
    entries: Vec<TimeEntry>,
    by_uid: HashMap<String, usize>,
    duplicates: usize,
}

impl CorrelationIndex {
    /// Keep entries carrying a correlation UID. On duplicate UIDs the first
    /// entry seen stays indexed and each later one is counted and logged.
    pub fn build(records: impl IntoIterator<Item = TimeEntry>) -> Self {
        let mut index = CorrelationIndex::default();

        for entry in records {
            let Some(uid) = entry.correlation_uid.clone() else {
                continue;
            };

            if let Some(&kept) = index.by_uid.get(&uid) {
                index.duplicates += 1;
                // TODO: recurring events expand to one UID; decide whether to merge instead
                log::warn!(
                    "Duplicate time entry in Redmine {} represents {}, which is already represented by Redmine {}",
                    entry.label(),
                    uid,
                    index.entries[kept].label()
                );
                continue;
            }

            index.by_uid.insert(uid, index.entries.len());
            index.entries.push(entry);
        }

        log::debug!(
            "Found {} ical2redmine time entries on Redmine",
            index.entries.len()
        );

        index
    }

    pub fn get(&self, uid: &str) -> Option<&TimeEntry> {
        self.by_uid.get(uid).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.by_uid.contains_key(uid)
    }

    /// Indexed entries in the order they were listed.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeEntry)> {
        self.entries.iter().filter_map(|entry| {
            entry
                .correlation_uid
                .as_deref()
                .map(|uid| (uid, entry))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }
}
