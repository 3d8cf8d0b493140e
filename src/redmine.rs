//! Redmine REST client.
//!
//! Implements [`TimeEntryStore`] over the JSON API, authenticating every
//! call with the `X-Redmine-API-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ical2redmine_core::entry::{TimeEntry, TimeEntryDraft};
use ical2redmine_core::store::{CustomFieldValue, RemoteUser, TimeEntryStore};
use ical2redmine_core::{SyncError, SyncResult};
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PAGE_LIMIT: usize = 100;
const API_KEY_HEADER: &str = "x-redmine-api-key";

pub struct RedmineClient {
    base_url: String,
    client: Client,
    uid_field_id: u64,
}

#[derive(Debug, Deserialize)]
struct TimeEntryList {
    time_entries: Vec<TimeEntryRecord>,
}

#[derive(Debug, Deserialize)]
struct TimeEntryEnvelope {
    time_entry: TimeEntryRecord,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: RemoteUser,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TimeEntryRecord {
    id: u64,
    hours: f64,
    spent_on: NaiveDate,
    #[serde(default)]
    comments: Option<String>,
    #[serde(default)]
    issue: Option<IdRef>,
    #[serde(default)]
    activity: Option<IdRef>,
    #[serde(default)]
    user: Option<IdRef>,
    #[serde(default)]
    custom_fields: Vec<CustomFieldValue>,
}

impl TimeEntryRecord {
    fn into_entry(self, uid_field_id: u64) -> TimeEntry {
        // Redmine reports unset custom fields as empty strings
        let correlation_uid = self
            .custom_fields
            .iter()
            .find(|f| f.id == uid_field_id)
            .and_then(CustomFieldValue::text)
            .filter(|uid| !uid.is_empty());

        TimeEntry {
            id: Some(self.id),
            hours: self.hours,
            spent_on: self.spent_on,
            comments: self.comments,
            issue_id: self.issue.map(|r| r.id),
            activity_id: self.activity.map(|r| r.id),
            user_id: self.user.map(|r| r.id),
            correlation_uid,
        }
    }
}

#[derive(Debug, Serialize)]
struct TimeEntryPayload<'a> {
    issue_id: u64,
    spent_on: NaiveDate,
    hours: f64,
    comments: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    custom_fields: Vec<CustomFieldPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct CustomFieldPayload<'a> {
    id: u64,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct PayloadEnvelope<'a> {
    time_entry: TimeEntryPayload<'a>,
}

fn http_error(e: reqwest::Error) -> SyncError {
    SyncError::Http(e.to_string())
}

async fn check_status(response: Response) -> SyncResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(SyncError::Remote {
        status: status.as_u16(),
        message: text,
    })
}

impl RedmineClient {
    /// `uid_field_id` is the time entry custom field holding the event UID.
    pub fn new(base_url: &str, api_key: &str, uid_field_id: u64) -> SyncResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            API_KEY_HEADER,
            header::HeaderValue::from_str(api_key)
                .map_err(|e| SyncError::config(format!("Invalid API key: {e}")))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(http_error)?;

        Ok(Self {
            base_url,
            client,
            uid_field_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn payload<'a>(&self, draft: &'a TimeEntryDraft, creating: bool) -> PayloadEnvelope<'a> {
        let activity_id = if creating || draft.explicit_activity {
            draft.activity_id
        } else {
            None
        };

        // The correlation field is written once, on create
        let custom_fields = if creating {
            vec![CustomFieldPayload {
                id: self.uid_field_id,
                value: &draft.correlation_uid,
            }]
        } else {
            Vec::new()
        };

        PayloadEnvelope {
            time_entry: TimeEntryPayload {
                issue_id: draft.issue_id,
                spent_on: draft.spent_on,
                hours: draft.hours,
                comments: &draft.comments,
                activity_id,
                user_id: if creating { draft.user_id } else { None },
                custom_fields,
            },
        }
    }
}

#[async_trait]
impl TimeEntryStore for RedmineClient {
    async fn list_time_entries(&self, offset: usize) -> SyncResult<Vec<TimeEntry>> {
        let response = self
            .client
            .get(self.url("time_entries.json"))
            .query(&[("offset", offset), ("limit", PAGE_LIMIT)])
            .send()
            .await
            .map_err(http_error)?;

        let list: TimeEntryList = check_status(response).await?.json().await.map_err(http_error)?;

        Ok(list
            .time_entries
            .into_iter()
            .map(|record| record.into_entry(self.uid_field_id))
            .collect())
    }

    async fn create_time_entry(&self, draft: &TimeEntryDraft) -> SyncResult<TimeEntry> {
        let response = self
            .client
            .post(self.url("time_entries.json"))
            .json(&self.payload(draft, true))
            .send()
            .await
            .map_err(http_error)?;

        let created: TimeEntryEnvelope =
            check_status(response).await?.json().await.map_err(http_error)?;

        Ok(created.time_entry.into_entry(self.uid_field_id))
    }

    async fn update_time_entry(&self, id: u64, draft: &TimeEntryDraft) -> SyncResult<()> {
        let response = self
            .client
            .put(self.url(&format!("time_entries/{id}.json")))
            .json(&self.payload(draft, false))
            .send()
            .await
            .map_err(http_error)?;

        check_status(response).await?;
        Ok(())
    }

    async fn delete_time_entry(&self, id: u64) -> SyncResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("time_entries/{id}.json")))
            .send()
            .await
            .map_err(http_error)?;

        // Already gone
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("Time entry #{id} was already deleted");
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }

    async fn find_user(&self, user_id: u64) -> SyncResult<Option<RemoteUser>> {
        let response = self
            .client
            .get(self.url(&format!("users/{user_id}.json")))
            .send()
            .await
            .map_err(http_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let found: UserEnvelope = check_status(response).await?.json().await.map_err(http_error)?;
        Ok(Some(found.user))
    }

    async fn current_user(&self) -> SyncResult<RemoteUser> {
        let response = self
            .client
            .get(self.url("users/current.json"))
            .send()
            .await
            .map_err(http_error)?;

        let found: UserEnvelope = check_status(response).await?.json().await.map_err(http_error)?;
        Ok(found.user)
    }
}
