//! iCal feed parsing.
//!
//! Turns the text of an iCalendar feed into the `Event` values the
//! reconciler works with.

mod parse;

pub use parse::{Feed, parse_feed};
