//! File watching and alert dispatch.
//!
//! # Architecture
//!
//! ```text
//! EventSource (notify)
//!   events ----+            errors --> session ends (fatal)
//!              |
//!           Session loop
//!              |  filter::admit (drops CHMOD)
//!              v
//!           Debouncer (one timer per path)
//!              |  quiet period elapsed
//!              v
//!           AlertHandler::on_fire  (own task, e.g. Notifier)
//! ```

mod debouncer;
mod error;
mod event;
pub mod filter;
mod handler;
mod session;
mod source;

pub use debouncer::{DEFAULT_QUIET_PERIOD, Debouncer, Expiry};
pub use error::WatchError;
pub use event::{ChangeEvent, Operation};
pub use handler::AlertHandler;
pub use session::{Session, Shutdown, start_session, start_session_until};
pub use source::EventSource;
