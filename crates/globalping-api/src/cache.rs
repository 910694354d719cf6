//! Time-bounded cache of remote reads.
//!
//! Entries are keyed by request fingerprint and carry their own TTL. A
//! background sweeper, running on an interval independent of any entry TTL,
//! drops expired entries. The cache is best-effort: a miss only costs a
//! network call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("response cache sweep failed: {0}")]
    SweepFailed(String),
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for ResponseCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Expired-but-unswept entries read as a miss.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of stored entries, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sweep(&self) -> Result<usize, CacheError> {
        self.sweep_at(Instant::now())
    }

    /// Drops every entry whose TTL has elapsed at `now`; returns how many.
    pub fn sweep_at(&self, now: Instant) -> Result<usize, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| CacheError::SweepFailed(error.to_string()))?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    /// Starts the periodic sweep. Dropping the returned guard stops it.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> CacheSweeper {
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.sweep() {
                    Ok(0) => {}
                    Ok(evicted) => debug!(evicted, "response cache sweep evicted entries"),
                    Err(error) => warn!(%error, "response cache sweep failed"),
                }
            }
        });
        CacheSweeper { handle }
    }
}

#[derive(Debug)]
pub struct CacheSweeper {
    handle: JoinHandle<()>,
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
