//! The remote time entry store boundary.
//!
//! The reconciler only talks to Redmine through this trait; the HTTP
//! implementation lives in the binary crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entry::{TimeEntry, TimeEntryDraft};
use crate::error::SyncResult;

/// A Redmine user, with the custom fields we read the feed URL from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: u64,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl CustomFieldValue {
    /// The value as text. Multi-value fields yield their first element.
    pub fn text(&self) -> Option<String> {
        match self.value.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
            _ => None,
        }
    }
}

impl RemoteUser {
    pub fn custom_field(&self, field_id: u64) -> Option<String> {
        self.custom_fields
            .iter()
            .find(|f| f.id == field_id)
            .and_then(CustomFieldValue::text)
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.firstname, self.lastname);
        let name = name.trim();
        if name.is_empty() {
            self.login.clone()
        } else {
            name.to_string()
        }
    }
}

#[async_trait]
pub trait TimeEntryStore: Send + Sync {
    /// One page of time entries starting at `offset`. An empty page marks
    /// the end of the listing.
    async fn list_time_entries(&self, offset: usize) -> SyncResult<Vec<TimeEntry>>;

    async fn create_time_entry(&self, draft: &TimeEntryDraft) -> SyncResult<TimeEntry>;

    /// Update the mutable fields of an entry. The correlation field is left
    /// untouched.
    async fn update_time_entry(&self, id: u64, draft: &TimeEntryDraft) -> SyncResult<()>;

    /// Deleting an entry that no longer exists succeeds.
    async fn delete_time_entry(&self, id: u64) -> SyncResult<()>;

    async fn find_user(&self, user_id: u64) -> SyncResult<Option<RemoteUser>>;

    /// The user owning the credentials; used as a startup probe.
    async fn current_user(&self) -> SyncResult<RemoteUser>;
}

/// Page through the whole listing.
pub async fn fetch_all_time_entries<S: TimeEntryStore + ?Sized>(
    store: &S,
) -> SyncResult<Vec<TimeEntry>> {
    let mut entries = Vec::new();

    loop {
        log::debug!("Finding time entries with offset = {}", entries.len());
        let page = store.list_time_entries(entries.len()).await?;
        if page.is_empty() {
            break;
        }
        entries.extend(page);
    }

    Ok(entries)
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use chrono::NaiveDate;

    fn entry(id: u64) -> TimeEntry {
        TimeEntry {
            id: Some(id),
            hours: 1.0,
            spent_on: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            comments: None,
            issue_id: Some(1),
            activity_id: None,
            user_id: None,
            correlation_uid: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_all_pages_until_empty() {
        let store = MemoryStore::with_entries((1..=5).map(entry).collect());
        let all = fetch_all_time_entries(&store).await.unwrap();
        let ids: Vec<_> = all.iter().filter_map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_custom_field_text() {
        let user = RemoteUser {
            id: 3,
            login: "jdoe".into(),
            firstname: String::new(),
            lastname: String::new(),
            custom_fields: vec![
                CustomFieldValue {
                    id: 4,
                    name: "iCal URL".into(),
                    value: Some(serde_json::json!("https://example.com/cal.ics")),
                },
                CustomFieldValue {
                    id: 5,
                    name: "Tags".into(),
                    value: Some(serde_json::json!(["a", "b"])),
                },
            ],
        };

        assert_eq!(user.custom_field(4).as_deref(), Some("https://example.com/cal.ics"));
        assert_eq!(user.custom_field(5).as_deref(), Some("a"));
        assert_eq!(user.custom_field(6), None);
        assert_eq!(user.display_name(), "jdoe");
    }
}
