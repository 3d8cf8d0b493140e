//! ICS feed parsing using the icalendar crate's parser.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};

use crate::error::{SyncError, SyncResult};
use crate::event::Event;

/// A parsed feed: its display name and its events, one per UID.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub name: Option<String>,
    pub events: Vec<Event>,
}

/// Parse the text of an iCalendar feed.
///
/// Events that cannot be turned into a time entry (no UID, all-day, no end)
/// are skipped. When a UID appears twice the later VEVENT replaces the
/// earlier one.
pub fn parse_feed(content: &str) -> SyncResult<Feed> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| SyncError::IcsParse(e.to_string()))?;

    let name = calendar
        .properties
        .iter()
        .find(|p| p.name == "X-WR-CALNAME")
        .map(|p| unescape_text(p.val.as_ref()));

    let mut events: Vec<Event> = Vec::new();
    let mut position_by_uid: HashMap<String, usize> = HashMap::new();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        let Some(event) = parse_vevent(vevent) else {
            continue;
        };

        match position_by_uid.get(&event.uid) {
            Some(&i) => {
                log::debug!("UID {} appears more than once in the feed, keeping the last", event.uid);
                events[i] = event;
            }
            None => {
                position_by_uid.insert(event.uid.clone(), events.len());
                events.push(event);
            }
        }
    }

    Ok(Feed { name, events })
}

fn parse_vevent(vevent: &Component) -> Option<Event> {
    let Some(uid) = vevent.find_prop("UID").map(|p| p.val.to_string()) else {
        log::debug!("Skipping a VEVENT without UID");
        return None;
    };

    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| unescape_text(p.val.as_ref()))
            .unwrap_or_default()
    };

    let Some(start) = vevent.find_prop("DTSTART").and_then(to_datetime) else {
        log::debug!("Skipping {uid}: DTSTART is missing or an all-day date");
        return None;
    };

    let end = match vevent.find_prop("DTEND") {
        Some(prop) => to_datetime(prop),
        None => vevent
            .find_prop("DURATION")
            .and_then(|p| parse_duration(p.val.as_ref()))
            .map(|d| start + d),
    };
    let Some(end) = end else {
        log::debug!("Skipping {uid}: no usable DTEND or DURATION");
        return None;
    };

    Some(Event {
        uid,
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        location: text("LOCATION"),
        start,
        end,
    })
}

/// Convert a DTSTART/DTEND property into a timezone-aware timestamp.
/// Date-only values yield `None`.
fn to_datetime(prop: &Property) -> Option<DateTime<FixedOffset>> {
    match DatePerhapsTime::try_from(prop).ok()? {
        DatePerhapsTime::Date(_) => None,
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => Some(dt.fixed_offset()),
            CalendarDateTime::Floating(naive) => Some(naive.and_utc().fixed_offset()),
            CalendarDateTime::WithTimezone { date_time, tzid } => Some(zoned(date_time, &tzid)),
        },
    }
}

fn zoned(naive: NaiveDateTime, tzid: &str) -> DateTime<FixedOffset> {
    match tzid.parse::<chrono_tz::Tz>() {
        Ok(tz) => match tz.from_local_datetime(&naive).earliest() {
            Some(dt) => dt.fixed_offset(),
            // Local time falls in a DST gap, read it as UTC instead
            None => tz.from_utc_datetime(&naive).fixed_offset(),
        },
        Err(_) => {
            log::debug!("Unknown TZID '{tzid}', treating the time as UTC");
            Utc.from_utc_datetime(&naive).fixed_offset()
        }
    }
}

fn parse_duration(value: &str) -> Option<chrono::Duration> {
    let duration = iso8601::duration(value.trim_start_matches('+')).ok()?;
    let std_duration: std::time::Duration = duration.into();
    chrono::Duration::from_std(std_duration).ok()
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
