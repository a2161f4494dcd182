//! The dispatch loop tying the event source, filter and debouncer together.

use std::future::Future;
use std::sync::Arc;

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::event::ChangeEvent;
use super::filter;
use super::source::EventSource;
use crate::alert::{HttpTransport, Notifier};
use crate::config::SessionConfig;

/// Reason a session ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The event stream closed.
    EventsClosed,
    /// The error stream closed without reporting an error.
    ErrorsClosed,
    /// The caller asked the session to stop.
    Interrupted,
}

/// A running watch: one source drained into one debouncer.
///
/// The loop is the only code that touches the debouncer's registry. Firing
/// and delivery run on their own tasks, so a slow canary endpoint never
/// holds up event intake.
#[derive(Debug)]
pub struct Session {
    source: EventSource,
    debouncer: Debouncer,
}

impl Session {
    pub fn new(source: EventSource, debouncer: Debouncer) -> Self {
        Self { source, debouncer }
    }

    /// Run until the source closes or fails.
    pub async fn run(self) -> Result<Shutdown, WatchError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until the source closes or fails, or `shutdown` completes.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<Shutdown, WatchError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break Ok(Shutdown::Interrupted),

                error = self.source.errors.recv() => match error {
                    Some(e) => break Err(e),
                    None => break Ok(Shutdown::ErrorsClosed),
                },

                event = self.source.events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break Ok(Shutdown::EventsClosed),
                },

                Some(expiry) = self.debouncer.next_expiry() => {
                    self.debouncer.retire(expiry);
                }
            }
        };

        match &result {
            Ok(reason) => crate::log_event!(
                "watcher",
                "stopped",
                "{reason:?}, {} pending timer(s) cancelled",
                self.debouncer.pending_count()
            ),
            Err(e) => tracing::error!("[watcher] session failed: {e}"),
        }

        result
    }

    /// Filter one event and, if admitted, hand it to the debouncer.
    fn dispatch(&mut self, event: ChangeEvent) {
        if filter::admit(&event) {
            self.debouncer.on_event(event);
        } else {
            crate::debug_event!(
                "watcher",
                "ignored",
                "{} {}",
                event.operation,
                event.path.display()
            );
        }
    }
}

/// Watch the configured path and ping the canary until the source ends.
pub async fn start_session(config: &SessionConfig) -> Result<Shutdown, WatchError> {
    start_session_until(config, std::future::pending()).await
}

/// Like [`start_session`], but also stops when `shutdown` completes.
pub async fn start_session_until<F>(
    config: &SessionConfig,
    shutdown: F,
) -> Result<Shutdown, WatchError>
where
    F: Future<Output = ()>,
{
    let transport =
        HttpTransport::new(config.request_timeout).map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

    let notifier = Notifier::new(
        transport,
        config.endpoint.clone(),
        Arc::new(config.schedule.clone()),
    )
    .with_success_status(config.success_status);

    let debouncer = Debouncer::new(config.quiet_period, Arc::new(notifier));
    let source = EventSource::watch(&config.path, config.recursive)?;

    crate::log_event!(
        "watcher",
        "started",
        "linger {:?}, {} attempt(s) per alert",
        config.quiet_period,
        config.schedule.len()
    );

    Session::new(source, debouncer).run_until(shutdown).await
}
