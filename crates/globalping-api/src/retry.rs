use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

const BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Bounds for re-sending a request after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    /// Total time the retries of one request may span; zero means unbounded.
    pub budget: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    /// Delay before re-sending after failed attempt `attempt` (zero-based),
    /// or `None` when the attempts or the budget are exhausted.
    pub fn next_delay(
        &self,
        attempt: usize,
        elapsed: Duration,
        retry_after: Option<Duration>,
    ) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let mut delay = backoff(attempt, self.jitter);
        if let Some(retry_after) = retry_after {
            delay = delay.max(retry_after);
        }
        if !self.budget.is_zero() && elapsed.saturating_add(delay) > self.budget {
            return None;
        }
        Some(delay)
    }
}

/// 200 ms doubling per attempt; jitter keeps the delay within [50%, 100%].
fn backoff(attempt: usize, jitter: bool) -> Duration {
    let doublings = u32::try_from(attempt)
        .unwrap_or(u32::MAX)
        .min(MAX_BACKOFF_DOUBLINGS);
    let full = BASE_BACKOFF.saturating_mul(1_u32 << doublings);
    if !jitter {
        return full;
    }
    let half = full / 2;
    let spread_ms = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
    if spread_ms == 0 {
        return full;
    }
    half + Duration::from_millis(jitter_seed() % (spread_ms + 1))
}

fn jitter_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    u64::from(nanos).wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(29)
}

/// Timeouts, 408, 425, 429 and 5xx are worth another attempt.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || status >= 500
}

pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// `Retry-After` as delta-seconds or an HTTP date; past dates yield zero.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some(
        retry_at
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

/// Reads an integer response header such as `X-RateLimit-Remaining`.
pub fn integer_header(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse::<i64>().ok()
}

pub fn new_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("globalping-cli-{millis}-{count}")
}
