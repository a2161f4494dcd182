//! Noise filter applied before debouncing.

use super::event::{ChangeEvent, Operation};

/// Decide whether an event should reach the debouncer.
///
/// Pure metadata changes fire far more often than real activity and would
/// otherwise keep restarting the quiet period, so they are dropped.
pub fn admit(event: &ChangeEvent) -> bool {
    event.operation != Operation::Metadata
}
