//! Calendar feed download.

use std::time::Duration;

use ical2redmine_core::ics::{Feed, parse_feed};
use ical2redmine_core::{SyncError, SyncResult};
use reqwest::Client;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Turn a subscription URL into something we can GET. `webcal://` is the
/// same resource served over HTTPS.
pub fn normalize_feed_url(raw: &str) -> SyncResult<Url> {
    let raw = raw.trim();
    let feed_error = |message: String| SyncError::Feed {
        url: raw.to_string(),
        message,
    };

    let rewritten = match raw.get(..9) {
        Some(scheme) if scheme.eq_ignore_ascii_case("webcal://") => format!("https://{}", &raw[9..]),
        _ => raw.to_string(),
    };

    let url = Url::parse(&rewritten).map_err(|e| feed_error(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(feed_error(format!("Unsupported scheme '{other}'"))),
    }
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Http(e.to_string()))?;

        Ok(Self { client })
    }

    /// Download and parse a feed. Any failure here is fatal for the run.
    pub async fn fetch(&self, raw_url: &str) -> SyncResult<Feed> {
        let url = normalize_feed_url(raw_url)?;
        let feed_error = |message: String| SyncError::Feed {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| feed_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(feed_error(format!("HTTP {}", response.status())));
        }

        let body = response.text().await.map_err(|e| feed_error(e.to_string()))?;
        let feed = parse_feed(&body)?;

        match &feed.name {
            Some(name) => log::debug!("Succeeded: Loaded '{name}'."),
            None => log::debug!("Succeeded: Loaded an unnamed calendar."),
        }
        log::debug!("Found {} ical events.", feed.events.len());

        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//EN\r\n\
X-WR-CALNAME:Work\r\n\
BEGIN:VEVENT\r\n\
UID:evt-1\r\n\
DTSTART:20240304T090000Z\r\n\
DTEND:20240304T091500Z\r\n\
SUMMARY:#42 Standup\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_webcal_becomes_https() {
        let url = normalize_feed_url("webcal://cal.example.com/jane.ics").unwrap();
        assert_eq!(url.as_str(), "https://cal.example.com/jane.ics");

        let url = normalize_feed_url(" WEBCAL://cal.example.com/a.ics").unwrap();
        assert_eq!(url.scheme(), "https");

        let url = normalize_feed_url("http://cal.example.com/a.ics").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_rejects_unusable_urls() {
        assert!(normalize_feed_url("ftp://cal.example.com/a.ics").unwrap_err().is_fatal());
        assert!(normalize_feed_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_fetch_parses_feed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/jane.ics")
            .with_status(200)
            .with_header("content-type", "text/calendar")
            .with_body(FEED)
            .create_async()
            .await;

        let feed = FeedFetcher::new()
            .unwrap()
            .fetch(&format!("{}/jane.ics", server.url()))
            .await
            .unwrap();

        assert_eq!(feed.name.as_deref(), Some("Work"));
        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].summary, "#42 Standup");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.ics")
            .with_status(404)
            .create_async()
            .await;

        let err = FeedFetcher::new()
            .unwrap()
            .fetch(&format!("{}/missing.ics", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Feed { .. }));
        assert!(err.is_fatal());
    }
}
