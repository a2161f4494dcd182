//! Event source adapter over `notify`.
//!
//! Splits the watcher callback into two streams, change events and errors,
//! which the dispatch loop consumes independently.

use std::path::{Path, PathBuf};

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::WatchError;
use super::event::ChangeEvent;

/// Capacity of the event and error channels.
const CHANNEL_CAPACITY: usize = 100;

/// Pair of streams feeding the dispatch loop.
///
/// Both streams close together when the underlying watcher is dropped.
pub struct EventSource {
    pub(crate) events: mpsc::Receiver<ChangeEvent>,
    pub(crate) errors: mpsc::Receiver<WatchError>,
    /// Keeps the OS subscription alive.
    _watcher: Option<notify::RecommendedWatcher>,
}

impl EventSource {
    /// Wrap existing channels, e.g. to drive a session from tests.
    pub fn from_channels(
        events: mpsc::Receiver<ChangeEvent>,
        errors: mpsc::Receiver<WatchError>,
    ) -> Self {
        Self {
            events,
            errors,
            _watcher: None,
        }
    }

    /// Start watching `path` with the platform's recommended backend.
    pub fn watch(path: &Path, recursive: bool) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in ChangeEvent::from_notify(&event) {
                    let _ = event_tx.blocking_send(change);
                }
            }
            Err(e) => {
                let _ = error_tx.blocking_send(WatchError::Source {
                    details: e.to_string(),
                });
            }
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher
            .watch(path, mode)
            .map_err(|e| WatchError::PathWatchFailed {
                path: PathBuf::from(path),
                reason: e.to_string(),
            })?;

        crate::log_event!(
            "watcher",
            "watching",
            "{}{}",
            path.display(),
            if recursive { " (recursive)" } else { "" }
        );

        Ok(Self {
            events: event_rx,
            errors: error_rx,
            _watcher: Some(watcher),
        })
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("live", &self._watcher.is_some())
            .finish()
    }
}
