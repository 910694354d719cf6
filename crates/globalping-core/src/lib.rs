//! Foundational low-level utilities shared across the Globalping client crates.
//!
//! Provides the atomic file-write helper used for profile persistence and the
//! unix-time helpers behind token expiry calculations.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{
    current_unix_timestamp, current_unix_timestamp_ms, expiry_after_unix, is_expired_unix,
    NEVER_EXPIRES_UNIX,
};
