use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globalping_api::{Token, TokenObserver};
use globalping_core::write_text_atomic;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const PROFILE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct ProfileFile {
    schema_version: u32,
    #[serde(default)]
    token: Option<Token>,
}

/// Persists the stored access token between invocations.
#[derive(Debug, Clone)]
pub(crate) struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored token; a missing profile file means no token.
    pub(crate) fn load(&self) -> Result<Option<Token>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read profile {}", self.path.display()))?;
        let parsed = serde_json::from_str::<ProfileFile>(&raw)
            .with_context(|| format!("failed to parse profile {}", self.path.display()))?;
        if parsed.schema_version != PROFILE_SCHEMA_VERSION {
            bail!(
                "unsupported profile schema_version {} in {} (expected {})",
                parsed.schema_version,
                self.path.display(),
                PROFILE_SCHEMA_VERSION
            );
        }
        Ok(parsed.token)
    }

    pub(crate) fn save(&self, token: Option<&Token>) -> Result<()> {
        let profile = ProfileFile {
            schema_version: PROFILE_SCHEMA_VERSION,
            token: token.cloned(),
        };
        let mut payload =
            serde_json::to_string_pretty(&profile).context("failed to encode profile")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write profile {}", self.path.display()))
    }
}

impl TokenObserver for ProfileStore {
    fn token_refreshed(&self, token: &Token) {
        if token.is_pinned() {
            return;
        }
        match self.save(Some(token)) {
            Ok(()) => debug!(path = %self.path.display(), "refreshed token persisted"),
            Err(error) => warn!(%error, "failed to persist refreshed token"),
        }
    }
}

#[cfg(test)]
mod tests {
    use globalping_api::{Token, TokenObserver};
    use tempfile::tempdir;

    use super::ProfileStore;

    fn refreshable(access: &str) -> Token {
        Token {
            access_token: access.to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_in: 3600,
            expiry_unix: 1_700_000_000,
        }
    }

    #[test]
    fn missing_profile_has_no_token() {
        let dir = tempdir().expect("tempdir");
        let store = ProfileStore::new(dir.path().join("profile.json"));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn saved_token_is_read_back_and_can_be_cleared() {
        let dir = tempdir().expect("tempdir");
        let store = ProfileStore::new(dir.path().join("nested").join("profile.json"));
        let token = refreshable("access-1");

        store.save(Some(&token)).expect("save");
        assert_eq!(store.load().expect("load"), Some(token));

        let raw = std::fs::read_to_string(store.path()).expect("read");
        assert!(raw.contains("\"schema_version\": 1"));

        store.save(None).expect("clear");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"schema_version": 7, "token": null}"#).expect("write");
        let error = ProfileStore::new(path).load().expect_err("schema mismatch");
        assert!(error.to_string().contains("unsupported profile schema_version 7"));
    }

    #[test]
    fn observer_persists_refreshed_tokens_but_not_pinned_ones() {
        let dir = tempdir().expect("tempdir");
        let store = ProfileStore::new(dir.path().join("profile.json"));

        store.token_refreshed(&Token::pinned("env-token"));
        assert!(!store.path().exists());

        let token = refreshable("access-2");
        store.token_refreshed(&token);
        assert_eq!(store.load().expect("load"), Some(token));
    }
}
