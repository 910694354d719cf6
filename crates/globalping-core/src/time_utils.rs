/// Expiry used for credentials that must never be refreshed.
pub const NEVER_EXPIRES_UNIX: u64 = u64::MAX;

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `expires_unix` is present and no longer in the future.
pub fn is_expired_unix(expires_unix: Option<u64>, now_unix: u64) -> bool {
    matches!(expires_unix, Some(value) if value != NEVER_EXPIRES_UNIX && value <= now_unix)
}

/// Adds a server-provided `expires_in` (seconds) to `now_unix`, saturating at
/// [`NEVER_EXPIRES_UNIX`]. Negative lifetimes collapse to `now_unix`.
pub fn expiry_after_unix(now_unix: u64, expires_in_secs: i64) -> u64 {
    let lifetime = u64::try_from(expires_in_secs).unwrap_or(0);
    now_unix.saturating_add(lifetime)
}
