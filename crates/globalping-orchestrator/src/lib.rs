//! Measurement session orchestration.
//!
//! [`MeasurementSession::run`] resolves the locator, submits the
//! measurement, polls it to a terminal state while handing frames to a
//! renderer, and records the probes used into the session history.

mod cancellation;
mod error;
mod session;

pub use cancellation::CooperativeCancellationToken;
pub use error::RunError;
pub use session::{MeasurementSession, MAX_CONSECUTIVE_POLL_FAILURES};
