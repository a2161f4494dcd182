//! Handler trait invoked when a debounce timer fires.

use async_trait::async_trait;

use super::event::ChangeEvent;

/// Receives the last event of a burst once its quiet period has elapsed.
///
/// Each firing runs on its own task, so implementations may take as long
/// as they need (network retries included) without stalling the watcher.
#[async_trait]
pub trait AlertHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Handle a debounced event.
    async fn on_fire(&self, event: ChangeEvent);
}
