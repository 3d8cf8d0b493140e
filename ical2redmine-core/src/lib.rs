//! Core types and reconciliation logic for ical2redmine.
//!
//! This crate holds everything that decides what should happen to Redmine
//! time entries given a calendar feed:
//! - `event` and `ics` for calendar events and feed parsing
//! - `target` for resolving events to issue/activity/user targets
//! - `window`, `change` and `correlation` for the per-event building blocks
//! - `reconcile` for the planner and sequential plan application
//! - `store` for the remote time entry store boundary
//! - `config` for loading and validating settings

pub mod change;
pub mod config;
pub mod correlation;
pub mod entry;
pub mod error;
pub mod event;
pub mod ics;
pub mod reconcile;
pub mod store;
pub mod target;
pub mod window;

pub use error::{SyncError, SyncResult};
pub use event::Event;
