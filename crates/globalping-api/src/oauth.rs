use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

pub const CODE_CHALLENGE_METHOD_S256: &str = "S256";
pub const OAUTH_SCOPE: &str = "measurements";

const CODE_VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;

static SEED_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, PartialEq, Eq)]
/// PKCE verifier and its S256 challenge for one authorization attempt.
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        Self::from_verifier(random_urlsafe("pkce", CODE_VERIFIER_LEN))
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Base64url SHA-256 of `verifier`, without padding.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Opaque value echoed back by the authorization redirect.
pub fn generate_state() -> String {
    random_urlsafe("state", STATE_LEN)
}

fn random_urlsafe(label: &str, len: usize) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let count = SEED_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut seed = format!("{label}:{}:{nanos}:{count}", std::process::id());
    for _ in 0..4 {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(count);
        seed.push_str(&format!(":{:016x}", hasher.finish()));
    }
    let first = Sha256::digest(seed.as_bytes());
    let second = Sha256::digest(first);
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&first);
    bytes.extend_from_slice(&second);
    URL_SAFE_NO_PAD.encode(bytes).chars().take(len).collect()
}
