//! Canary delivery with bounded retries.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tokio::time::sleep;

use super::backoff::BackoffSchedule;
use super::transport::{AlertRequest, HttpTransport, Transport, TransportError};
use crate::watcher::{AlertHandler, ChangeEvent};

/// Status expected from the canary endpoint when none is configured.
pub const DEFAULT_SUCCESS_STATUS: u16 = 200;

/// Why a single attempt did not count as delivered.
#[derive(Error, Debug)]
pub enum DeliveryFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected status {status}")]
    UnexpectedStatus { status: u16 },
}

/// One network attempt within a delivery.
#[derive(Debug)]
pub struct DeliveryAttempt {
    /// Zero-based position in the backoff schedule.
    pub index: usize,
    pub result: Result<(), DeliveryFailure>,
}

/// Terminal state of a delivery.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The endpoint acknowledged on this one-based attempt.
    Delivered { attempt: usize },
    /// Every schedule entry was used up without success.
    Skipped { attempts: usize },
    /// The request could not be built; nothing was sent.
    /// Not produced for any path, since unusual paths are percent-encoded.
    Invalid { reason: TransportError },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Record of one delivery sequence.
#[derive(Debug)]
pub struct DeliveryReport {
    pub path: PathBuf,
    pub attempts: Vec<DeliveryAttempt>,
    pub outcome: DeliveryOutcome,
}

/// Pings the canary endpoint for debounced events.
///
/// Holds only read-only configuration, so concurrent deliveries for
/// different paths share one instance without coordination.
pub struct Notifier<T: Transport = HttpTransport> {
    transport: T,
    endpoint: Url,
    schedule: Arc<BackoffSchedule>,
    success_status: u16,
}

impl<T: Transport> Notifier<T> {
    pub fn new(transport: T, endpoint: Url, schedule: Arc<BackoffSchedule>) -> Self {
        Self {
            transport,
            endpoint,
            schedule,
            success_status: DEFAULT_SUCCESS_STATUS,
        }
    }

    /// Override the status code that counts as success.
    pub fn with_success_status(mut self, status: u16) -> Self {
        self.success_status = status;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Deliver one event, retrying per the backoff schedule.
    ///
    /// Never fails: every outcome, including exhaustion, is returned in the
    /// report and logged.
    pub async fn notify(&self, event: &ChangeEvent) -> DeliveryReport {
        let path = event.path.clone();

        let request = match AlertRequest::for_event(self.endpoint.clone(), event) {
            Ok(request) => request,
            Err(reason) => {
                tracing::error!("[notify] cannot build alert for {}: {reason}", path.display());
                return DeliveryReport {
                    path,
                    attempts: Vec::new(),
                    outcome: DeliveryOutcome::Invalid { reason },
                };
            }
        };

        let mut attempts = Vec::with_capacity(self.schedule.len());

        for (index, delay) in self.schedule.iter().enumerate() {
            if !delay.is_zero() {
                sleep(delay).await;
            }

            let result = self.attempt(&request).await;
            let delivered = result.is_ok();

            match &result {
                Ok(()) => crate::debug_event!(
                    "notify",
                    "attempt ok",
                    "#{} {}",
                    index + 1,
                    path.display()
                ),
                Err(e) => tracing::warn!(
                    "[notify] attempt {} failed for {}: {e}",
                    index + 1,
                    path.display()
                ),
            }

            attempts.push(DeliveryAttempt { index, result });

            if delivered {
                crate::log_event!(
                    "notify",
                    "delivered",
                    "{} {} after {} attempt(s)",
                    event.operation,
                    path.display(),
                    index + 1
                );
                return DeliveryReport {
                    path,
                    attempts,
                    outcome: DeliveryOutcome::Delivered {
                        attempt: index + 1,
                    },
                };
            }
        }

        tracing::warn!(
            "[notify] skipped {} after exhausting {} attempt(s)",
            path.display(),
            attempts.len()
        );
        DeliveryReport {
            path,
            outcome: DeliveryOutcome::Skipped {
                attempts: attempts.len(),
            },
            attempts,
        }
    }

    async fn attempt(&self, request: &AlertRequest) -> Result<(), DeliveryFailure> {
        let status = self.transport.head(request).await?;
        if status == self.success_status {
            Ok(())
        } else {
            Err(DeliveryFailure::UnexpectedStatus { status })
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> AlertHandler for Notifier<T> {
    fn name(&self) -> &str {
        "notify"
    }

    async fn on_fire(&self, event: ChangeEvent) {
        self.notify(&event).await;
    }
}
