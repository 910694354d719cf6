//! Session history and probe locator resolution.
//!
//! A process keeps a bounded record of the probes used by its earlier
//! measurements so that later locator expressions (`@1`, `last`, ...) can
//! target the same vantage points again.

mod error;
mod history;
mod locator;

pub use error::LocatorError;
pub use history::{HistoryRef, SessionHistory, SessionRecord, SESSION_HISTORY_CAPACITY};
pub use locator::{
    is_measurement_id, parse_locator, resolve_locator, LocatorReference, ProbeLocator,
    ResolvedLocations, DEFAULT_LOCATOR,
};
