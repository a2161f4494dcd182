//! Canary token alerts for filesystem activity.
//!
//! Watches a path, coalesces bursts of changes per file, and pings a canary
//! token url with a HEAD request for each burst, retrying along a fixed
//! backoff schedule.

pub mod alert;
pub mod cli;
pub mod config;
pub mod logging;
pub mod watcher;

pub use alert::{BackoffSchedule, DeliveryOutcome, DeliveryReport, Notifier};
pub use config::{SessionConfig, Settings};
pub use watcher::{
    AlertHandler, ChangeEvent, Debouncer, EventSource, Operation, Session, Shutdown, WatchError,
    start_session,
};
