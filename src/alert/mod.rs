//! Canary token delivery.
//!
//! A debounced event becomes one HEAD request against the configured token
//! URL, retried along a fixed [`BackoffSchedule`]. Failures stay inside the
//! delivery: they are logged and reported, never propagated to the watcher.

mod backoff;
mod notifier;
mod transport;

pub use backoff::{BackoffSchedule, DEFAULT_BACKOFF_MS};
pub use notifier::{
    DEFAULT_SUCCESS_STATUS, DeliveryAttempt, DeliveryFailure, DeliveryOutcome, DeliveryReport,
    Notifier,
};
pub use transport::{
    AlertRequest, HttpTransport, OPERATION_HEADER, PATH_HEADER, Transport, TransportError,
};
