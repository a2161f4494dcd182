//! Per-path debouncing of change events.
//!
//! Each path has at most one pending timer. A new event for a path that
//! already has one aborts it and arms a fresh timer, so a burst of edits
//! surfaces as a single firing carrying the last event. Paths never share
//! timers, so activity on one file cannot delay another.
//!
//! The registry is only touched through `&mut self`, i.e. from the dispatch
//! loop. Timer tasks never mutate it: when one fires it hands the event to
//! the [`AlertHandler`] on a detached task and reports an [`Expiry`] back
//! through a channel, which the loop applies with [`Debouncer::retire`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use super::event::ChangeEvent;
use super::handler::AlertHandler;

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// A scheduled firing for one path.
#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Notice that a timer reached its deadline and handed off its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub path: PathBuf,
    generation: u64,
}

/// Debounces change events by path.
pub struct Debouncer {
    /// Live timers: path -> pending firing.
    pending: HashMap<PathBuf, PendingTimer>,
    /// How long a path must stay quiet before firing.
    quiet_period: Duration,
    /// Receives fired events.
    handler: Arc<dyn AlertHandler>,
    next_generation: u64,
    expired_tx: mpsc::UnboundedSender<Expiry>,
    expired_rx: mpsc::UnboundedReceiver<Expiry>,
}

impl Debouncer {
    /// Create a debouncer that fires into `handler` after `quiet_period`.
    pub fn new(quiet_period: Duration, handler: Arc<dyn AlertHandler>) -> Self {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        Self {
            pending: HashMap::new(),
            quiet_period,
            handler,
            next_generation: 0,
            expired_tx,
            expired_rx,
        }
    }

    /// The configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Record an admitted event, restarting the quiet period for its path.
    ///
    /// With a zero quiet period nothing is coalesced: each event is handed
    /// off immediately and no timer is armed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_event(&mut self, event: ChangeEvent) {
        if self.quiet_period.is_zero() {
            hand_off(Arc::clone(&self.handler), event);
            return;
        }

        let path = event.path.clone();

        if let Some(previous) = self.pending.remove(&path) {
            // Only stops a timer that has not fired yet; a delivery already
            // handed off keeps running.
            previous.handle.abort();
            crate::debug_event!("debounce", "re-armed", "{}", path.display());
        } else {
            crate::debug_event!("debounce", "armed", "{}", path.display());
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let deadline = Instant::now() + self.quiet_period;
        let handler = Arc::clone(&self.handler);
        let expired_tx = self.expired_tx.clone();

        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;

            let expiry = Expiry {
                path: event.path.clone(),
                generation,
            };
            hand_off(handler, event);
            // The loop may already be gone during shutdown.
            let _ = expired_tx.send(expiry);
        });

        self.pending.insert(
            path,
            PendingTimer {
                generation,
                deadline,
                handle,
            },
        );
    }

    /// Wait for the next timer to fire.
    ///
    /// Never returns `None` while the debouncer is alive, since it holds a
    /// sender of its own.
    pub async fn next_expiry(&mut self) -> Option<Expiry> {
        self.expired_rx.recv().await
    }

    /// Drop the registry entry for a fired timer.
    ///
    /// Ignored if the path has been re-armed since that timer fired.
    pub fn retire(&mut self, expiry: Expiry) {
        let current = self
            .pending
            .get(&expiry.path)
            .is_some_and(|timer| timer.generation == expiry.generation);

        if current {
            self.pending.remove(&expiry.path);
        }
    }

    /// Check if a firing is pending for the given path.
    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    /// Deadline of the pending timer for a path, if any.
    pub fn deadline(&self, path: &Path) -> Option<Instant> {
        self.pending.get(path).map(|timer| timer.deadline)
    }

    /// Check if there are any pending timers.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Get the number of pending timers.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Deliver a fired event on its own task, detached from the timer.
fn hand_off(handler: Arc<dyn AlertHandler>, event: ChangeEvent) {
    crate::debug_event!(
        "debounce",
        "fired",
        "{} {}",
        event.operation,
        event.path.display()
    );
    tokio::spawn(async move {
        handler.on_fire(event).await;
    });
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, timer) in self.pending.drain() {
            timer.handle.abort();
        }
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &self.pending.len())
            .field("quiet_period", &self.quiet_period)
            .field("handler", &self.handler.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::event::Operation;
    use async_trait::async_trait;
    use tokio::time::advance;

    /// Forwards fired events with the (paused) time they fired at.
    struct ChannelHandler {
        tx: mpsc::UnboundedSender<(ChangeEvent, Instant)>,
    }

    #[async_trait]
    impl AlertHandler for ChannelHandler {
        fn name(&self) -> &str {
            "test"
        }

        async fn on_fire(&self, event: ChangeEvent) {
            let _ = self.tx.send((event, Instant::now()));
        }
    }

    fn debouncer(
        quiet_ms: u64,
    ) -> (
        Debouncer,
        mpsc::UnboundedReceiver<(ChangeEvent, Instant)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Arc::new(ChannelHandler { tx });
        (Debouncer::new(Duration::from_millis(quiet_ms), handler), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_event() {
        let (mut debouncer, mut fired) = debouncer(1000);
        let start = Instant::now();

        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Write));
        advance(Duration::from_millis(200)).await;
        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Write));
        advance(Duration::from_millis(200)).await;
        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Rename));
        assert_eq!(debouncer.pending_count(), 1);

        let (event, at) = fired.recv().await.unwrap();
        assert_eq!(event.operation, Operation::Rename);
        assert_eq!(at - start, Duration::from_millis(1400));

        // Nothing else fires for the burst.
        advance(Duration::from_secs(10)).await;
        assert!(fired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_are_independent() {
        let (mut debouncer, mut fired) = debouncer(1000);
        let start = Instant::now();

        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Write));
        advance(Duration::from_millis(500)).await;
        debouncer.on_event(ChangeEvent::new("/tmp/b", Operation::Create));
        advance(Duration::from_millis(100)).await;
        // Re-arming b must not move a's deadline.
        debouncer.on_event(ChangeEvent::new("/tmp/b", Operation::Write));

        let (first, at) = fired.recv().await.unwrap();
        assert_eq!(first.path, PathBuf::from("/tmp/a"));
        assert_eq!(at - start, Duration::from_millis(1000));

        let (second, at) = fired.recv().await.unwrap();
        assert_eq!(second.path, PathBuf::from("/tmp/b"));
        assert_eq!(second.operation, Operation::Write);
        assert_eq!(at - start, Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_quiet_period_fires_per_event() {
        let (mut debouncer, mut fired) = debouncer(0);

        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Create));
        let (first, _) = fired.recv().await.unwrap();
        assert_eq!(first.operation, Operation::Create);

        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Write));
        let (second, _) = fired.recv().await.unwrap();
        assert_eq!(second.operation, Operation::Write);
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_quiet_period_keeps_back_to_back_events() {
        let (mut debouncer, mut fired) = debouncer(0);

        // No yield between the two, so nothing has been polled yet.
        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Create));
        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Write));

        let mut operations = vec![
            fired.recv().await.unwrap().0.operation,
            fired.recv().await.unwrap().0.operation,
        ];
        operations.sort_by_key(|op| op.as_str());
        assert_eq!(operations, vec![Operation::Create, Operation::Write]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retire_removes_fired_entry() {
        let (mut debouncer, mut fired) = debouncer(100);
        let path = PathBuf::from("/tmp/a");

        debouncer.on_event(ChangeEvent::new(&path, Operation::Write));
        assert!(debouncer.is_pending(&path));

        let expiry = debouncer.next_expiry().await.unwrap();
        assert_eq!(expiry.path, path);
        debouncer.retire(expiry);

        assert!(!debouncer.has_pending());
        assert!(fired.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_keeps_rearmed_timer() {
        let (mut debouncer, mut fired) = debouncer(100);
        let path = PathBuf::from("/tmp/a");

        debouncer.on_event(ChangeEvent::new(&path, Operation::Write));
        let stale = debouncer.next_expiry().await.unwrap();

        // New event arrives before the loop got around to retiring.
        debouncer.on_event(ChangeEvent::new(&path, Operation::Remove));
        debouncer.retire(stale);
        assert!(debouncer.is_pending(&path));

        // The already fired delivery still happens, then the new one.
        let (first, _) = fired.recv().await.unwrap();
        assert_eq!(first.operation, Operation::Write);
        let (second, _) = fired.recv().await.unwrap();
        assert_eq!(second.operation, Operation::Remove);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_tracks_latest_event() {
        let (mut debouncer, _fired) = debouncer(1000);
        let path = PathBuf::from("/tmp/a");

        debouncer.on_event(ChangeEvent::new(&path, Operation::Write));
        let first = debouncer.deadline(&path).unwrap();
        advance(Duration::from_millis(300)).await;
        debouncer.on_event(ChangeEvent::new(&path, Operation::Write));
        let second = debouncer.deadline(&path).unwrap();

        assert_eq!(second - first, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let (mut debouncer, mut fired) = debouncer(100);
        debouncer.on_event(ChangeEvent::new("/tmp/a", Operation::Write));
        drop(debouncer);

        advance(Duration::from_secs(1)).await;
        // Sender side is gone with the aborted timer and handler.
        assert!(fired.recv().await.is_none());
    }
}
