//! Settings loading and validation.
//!
//! The settings file comes in one of two shapes: a list of per-user
//! subscriptions sharing a summary pattern, or a single feed with a list of
//! mapping rules. Both are validated once into an immutable [`SyncConfig`].

use std::path::Path;

use chrono::{DateTime, Utc};
use config::{Config, File};
use serde::Deserialize;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::target::{MappingRule, RuleSetResolver, SummaryPatternResolver};
use crate::window::parse_since;

/// Settings as they appear on disk, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub redmine_url: Option<String>,
    pub custom_time_entry_field_id: Option<i64>,
    #[serde(default)]
    pub update_existing_entries: bool,
    #[serde(default)]
    pub insert_future_events: bool,
    pub since: Option<String>,

    pub subscriptions: Option<Vec<Subscription>>,
    pub custom_user_field_id: Option<i64>,
    pub pattern: Option<String>,
    pub activity_id: Option<i64>,

    pub feed_url: Option<String>,
    pub api_key: Option<String>,
    pub mappings: Option<Vec<MappingRule>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub user_id: u64,
    pub api_key: String,
    pub feed_url: Option<String>,
    pub activity_id: Option<u64>,
}

impl Settings {
    /// Read settings from a file. The format follows the file extension
    /// (`.json` for the legacy format, `.toml` otherwise).
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Err(SyncError::config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| SyncError::config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::config(e.to_string()))
    }
}

#[derive(Debug)]
pub enum Mode {
    Subscriptions {
        subscriptions: Vec<Subscription>,
        custom_user_field_id: Option<u64>,
        resolver: SummaryPatternResolver,
        activity_id: Option<u64>,
    },
    Rules {
        feed_url: String,
        api_key: String,
        resolver: RuleSetResolver,
    },
}

/// Validated configuration for one run.
#[derive(Debug)]
pub struct SyncConfig {
    pub redmine_url: Url,
    pub custom_time_entry_field_id: u64,
    pub update_existing_entries: bool,
    pub insert_future_events: bool,
    pub since: Option<DateTime<Utc>>,
    pub mode: Mode,
}

impl SyncConfig {
    pub fn load(path: &Path) -> SyncResult<Self> {
        Self::from_settings(Settings::load(path)?)
    }

    pub fn from_settings(settings: Settings) -> SyncResult<Self> {
        let redmine_url = settings
            .redmine_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SyncError::config("Missing redmine_url"))?;
        let redmine_url = Url::parse(redmine_url)
            .map_err(|e| SyncError::config(format!("Invalid redmine_url '{redmine_url}': {e}")))?;

        let custom_time_entry_field_id = positive_id(
            "custom_time_entry_field_id",
            settings.custom_time_entry_field_id,
        )?
        .ok_or_else(|| SyncError::config("Missing custom_time_entry_field_id"))?;

        let since = settings.since.as_deref().map(parse_since).transpose()?;

        let mode = match (settings.subscriptions, settings.mappings) {
            (Some(_), Some(_)) => {
                return Err(SyncError::config(
                    "Settings contain both subscriptions and mappings, pick one",
                ));
            }
            (None, None) => {
                return Err(SyncError::config(
                    "Settings need either subscriptions or feed_url/api_key/mappings",
                ));
            }
            (Some(subscriptions), None) => {
                subscription_mode(
                    subscriptions,
                    positive_id("custom_user_field_id", settings.custom_user_field_id)?,
                    settings.pattern,
                    positive_id("activity_id", settings.activity_id)?,
                )?
            }
            (None, Some(mappings)) => rule_mode(settings.feed_url, settings.api_key, mappings)?,
        };

        Ok(SyncConfig {
            redmine_url,
            custom_time_entry_field_id,
            update_existing_entries: settings.update_existing_entries,
            insert_future_events: settings.insert_future_events,
            since,
            mode,
        })
    }

    /// Every API key the run will use, in settings order. The first one
    /// is used for the connectivity probe and the initial listing.
    pub fn api_keys(&self) -> Vec<&str> {
        match &self.mode {
            Mode::Subscriptions { subscriptions, .. } => {
                subscriptions.iter().map(|s| s.api_key.as_str()).collect()
            }
            Mode::Rules { api_key, .. } => vec![api_key.as_str()],
        }
    }
}

fn positive_id(key: &str, value: Option<i64>) -> SyncResult<Option<u64>> {
    match value {
        None => Ok(None),
        Some(id) if id > 0 => Ok(Some(id as u64)),
        Some(id) => Err(SyncError::config(format!(
            "{key} must be a positive id, got {id}"
        ))),
    }
}

fn subscription_mode(
    subscriptions: Vec<Subscription>,
    custom_user_field_id: Option<u64>,
    pattern: Option<String>,
    activity_id: Option<u64>,
) -> SyncResult<Mode> {
    if subscriptions.is_empty() {
        return Err(SyncError::config("subscriptions must not be empty"));
    }

    for subscription in &subscriptions {
        if subscription.user_id == 0 {
            return Err(SyncError::config("Subscription user_id must be positive"));
        }
        if subscription.api_key.trim().is_empty() {
            return Err(SyncError::config(format!(
                "Subscription for user {} has an empty api_key",
                subscription.user_id
            )));
        }
        if subscription.activity_id == Some(0) {
            return Err(SyncError::config(format!(
                "Subscription for user {} has activity_id 0",
                subscription.user_id
            )));
        }
        if subscription.feed_url.is_none() && custom_user_field_id.is_none() {
            return Err(SyncError::config(format!(
                "Subscription for user {} has no feed_url and custom_user_field_id is not set",
                subscription.user_id
            )));
        }
    }

    let pattern = pattern.ok_or_else(|| SyncError::config("Missing pattern"))?;
    let resolver = SummaryPatternResolver::compile(&pattern)?;

    Ok(Mode::Subscriptions {
        subscriptions,
        custom_user_field_id,
        resolver,
        activity_id,
    })
}

fn rule_mode(
    feed_url: Option<String>,
    api_key: Option<String>,
    mappings: Vec<MappingRule>,
) -> SyncResult<Mode> {
    let feed_url = feed_url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| SyncError::config("Missing feed_url"))?;
    let api_key = api_key
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| SyncError::config("Missing api_key"))?;

    if mappings.is_empty() {
        return Err(SyncError::config("mappings must not be empty"));
    }
    if let Some(rule) = mappings
        .iter()
        .find(|r| r.issue_id == 0 || r.activity_id == 0 || r.user_id == 0)
    {
        return Err(SyncError::config(format!(
            "Mapping for issue {} needs positive issue_id, activity_id and user_id",
            rule.issue_id
        )));
    }

    let resolver = RuleSetResolver::compile(&mappings)?;

    Ok(Mode::Rules {
        feed_url,
        api_key,
        resolver,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_legacy_json_subscriptions() {
        let file = write_settings(
            ".json",
            r##"{
                "redmine_url": "https://redmine.example.com",
                "custom_time_entry_field_id": 5,
                "custom_user_field_id": 4,
                "update_existing_entries": true,
                "since": "03/01/2024",
                "pattern": "#(?P<issue_id>\\d+)",
                "activity_id": 9,
                "subscriptions": [
                    {"user_id": 3, "api_key": "abc"},
                    {"user_id": 4, "api_key": "def", "feed_url": "webcal://cal.example.com/a.ics"}
                ]
            }"##,
        );

        let config = SyncConfig::load(file.path()).unwrap();

        assert_eq!(config.redmine_url.as_str(), "https://redmine.example.com/");
        assert_eq!(config.custom_time_entry_field_id, 5);
        assert!(config.update_existing_entries);
        assert!(!config.insert_future_events);
        assert_eq!(
            config.since.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(config.api_keys(), vec!["abc", "def"]);

        let Mode::Subscriptions {
            subscriptions,
            custom_user_field_id,
            activity_id,
            ..
        } = config.mode
        else {
            panic!("Expected subscription mode");
        };
        assert_eq!(subscriptions.len(), 2);
        assert_eq!(custom_user_field_id, Some(4));
        assert_eq!(activity_id, Some(9));
    }

    #[test]
    fn test_load_toml_rules() {
        let file = write_settings(
            ".toml",
            r#"
redmine_url = "https://redmine.example.com"
custom_time_entry_field_id = 5
feed_url = "https://cal.example.com/me.ics"
api_key = "abc"

[[mappings]]
summary = "Standup"
issue_id = 42
activity_id = 7
user_id = 3

[[mappings]]
location = "Office.*"
issue_id = 43
activity_id = 7
user_id = 3
comment_prefix = "On site: "
"#,
        );

        let config = SyncConfig::load(file.path()).unwrap();

        assert!(!config.update_existing_entries);
        assert_eq!(config.since, None);
        let Mode::Rules {
            feed_url, resolver, ..
        } = &config.mode
        else {
            panic!("Expected rule mode");
        };
        assert_eq!(feed_url, "https://cal.example.com/me.ics");
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = SyncConfig::load(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(err.is_fatal());
    }

    fn base() -> Settings {
        Settings {
            redmine_url: Some("https://redmine.example.com".into()),
            custom_time_entry_field_id: Some(5),
            feed_url: Some("https://cal.example.com/me.ics".into()),
            api_key: Some("abc".into()),
            mappings: Some(vec![MappingRule {
                summary: Some("Standup".into()),
                description: None,
                location: None,
                issue_id: 42,
                activity_id: 7,
                user_id: 3,
                comment_prefix: String::new(),
            }]),
            ..Settings::default()
        }
    }

    fn subscriptions() -> Vec<Subscription> {
        vec![Subscription {
            user_id: 3,
            api_key: "abc".into(),
            feed_url: None,
            activity_id: None,
        }]
    }

    #[test]
    fn test_valid_base() {
        assert!(SyncConfig::from_settings(base()).is_ok());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let cases: Vec<(&str, Settings)> = vec![
            ("no url", Settings { redmine_url: None, ..base() }),
            ("bad url", Settings { redmine_url: Some("not a url".into()), ..base() }),
            ("no field", Settings { custom_time_entry_field_id: None, ..base() }),
            ("zero field", Settings { custom_time_entry_field_id: Some(0), ..base() }),
            ("bad since", Settings { since: Some("2024/31/12".into()), ..base() }),
            ("no feed", Settings { feed_url: None, ..base() }),
            ("no key", Settings { api_key: Some(" ".into()), ..base() }),
            ("no shape", Settings { mappings: None, ..base() }),
            ("empty mappings", Settings { mappings: Some(vec![]), ..base() }),
            (
                "both shapes",
                Settings {
                    subscriptions: Some(subscriptions()),
                    pattern: Some("#(?P<issue_id>\\d+)".into()),
                    custom_user_field_id: Some(4),
                    ..base()
                },
            ),
        ];

        for (name, settings) in cases {
            let err = SyncConfig::from_settings(settings).unwrap_err();
            assert!(err.is_fatal(), "{name}: {err}");
        }
    }

    #[test]
    fn test_subscription_validation() {
        let sub = |pattern: Option<&str>, field: Option<i64>| Settings {
            mappings: None,
            subscriptions: Some(subscriptions()),
            pattern: pattern.map(String::from),
            custom_user_field_id: field,
            ..base()
        };

        assert!(SyncConfig::from_settings(sub(Some("#(?P<issue_id>\\d+)"), Some(4))).is_ok());

        // Pattern without the issue_id group
        let err = SyncConfig::from_settings(sub(Some(r"#(\d+)"), Some(4))).unwrap_err();
        assert!(matches!(err, SyncError::Pattern { .. }));

        assert!(SyncConfig::from_settings(sub(None, Some(4))).is_err());
        // No feed_url and nowhere to look one up
        assert!(SyncConfig::from_settings(sub(Some("#(?P<issue_id>\\d+)"), None)).is_err());
        assert!(SyncConfig::from_settings(sub(Some("#(?P<issue_id>\\d+)"), Some(-1))).is_err());
    }
}
