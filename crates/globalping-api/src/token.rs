use tracing::info;

use crate::types::{ApiError, Token, TokenRefresher};

/// Receives tokens installed by a refresh so the owner can persist them.
pub trait TokenObserver: Send + Sync {
    fn token_refreshed(&self, token: &Token);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRefreshOutcome {
    /// No credential installed; calls go out unauthenticated.
    Anonymous,
    /// The installed token is usable as-is.
    Fresh,
    /// A refresh exchange ran and installed this token.
    Refreshed(Token),
}

/// Holds the current access credential and runs the refresh exchange.
///
/// Callers sharing a store across concurrent flows must wrap it in a lock so
/// that at most one refresh is in flight.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Option<Token>,
}

impl TokenStore {
    pub fn new(token: Option<Token>) -> Self {
        Self { token }
    }

    pub fn current(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn needs_refresh(&self, now_unix: u64) -> bool {
        self.token
            .as_ref()
            .is_some_and(|token| !token.is_pinned() && token.is_expired_at(now_unix))
    }

    /// Installs `token`, never letting the stored expiry move backwards.
    pub fn install(&mut self, mut token: Token) {
        if let Some(previous) = &self.token {
            if !token.is_pinned() && previous.expiry_unix > token.expiry_unix {
                token.expiry_unix = previous.expiry_unix;
            }
        }
        self.token = Some(token);
    }

    pub fn clear(&mut self) {
        self.token = None;
    }

    /// Refreshes the token first when it expired at `now_unix`.
    pub async fn ensure_fresh<R>(
        &mut self,
        refresher: &R,
        now_unix: u64,
    ) -> Result<TokenRefreshOutcome, ApiError>
    where
        R: TokenRefresher + ?Sized,
    {
        let Some(current) = self.token.as_ref() else {
            return Ok(TokenRefreshOutcome::Anonymous);
        };
        if !self.needs_refresh(now_unix) {
            return Ok(TokenRefreshOutcome::Fresh);
        }

        let Some(refresh_token) = current
            .refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
        else {
            return Err(ApiError::AuthRefreshFailed(
                "access token expired and no refresh token is available".to_string(),
            ));
        };

        let mut refreshed = match refresher.refresh_token(&refresh_token).await {
            Ok(token) => token,
            Err(ApiError::AuthRefreshFailed(message)) => {
                return Err(ApiError::AuthRefreshFailed(message))
            }
            Err(error) => return Err(ApiError::AuthRefreshFailed(error.to_string())),
        };
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }
        self.install(refreshed);
        info!("access token refreshed");

        let installed = self.token.clone().ok_or_else(|| {
            ApiError::AuthRefreshFailed("refreshed token was not installed".to_string())
        })?;
        Ok(TokenRefreshOutcome::Refreshed(installed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{TokenRefreshOutcome, TokenStore};
    use crate::types::{ApiError, Token, TokenRefresher};

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRefresher {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh_token(&self, refresh_token: &str) -> Result<Token, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::HttpStatus {
                    status: 400,
                    body: "invalid_grant".to_string(),
                });
            }
            assert_eq!(refresh_token, "refresh-1");
            Ok(Token {
                access_token: "access-2".to_string(),
                token_type: "Bearer".to_string(),
                refresh_token: None,
                expires_in: 3_600,
                expiry_unix: 5_000,
            })
        }
    }

    fn expiring_token(expiry_unix: u64) -> Token {
        Token {
            access_token: "access-1".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_in: 3_600,
            expiry_unix,
        }
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh() {
        let refresher = CountingRefresher::new(false);
        let mut store = TokenStore::new(Some(expiring_token(1_000)));

        let outcome = store.ensure_fresh(&refresher, 1_000).await.expect("refresh");
        let TokenRefreshOutcome::Refreshed(token) = outcome else {
            panic!("expected refreshed outcome, got {outcome:?}");
        };
        assert_eq!(token.access_token, "access-2");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));

        let second = store.ensure_fresh(&refresher, 1_001).await.expect("fresh");
        assert_eq!(second, TokenRefreshOutcome::Fresh);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pinned_token_is_never_refreshed() {
        let refresher = CountingRefresher::new(false);
        let mut store = TokenStore::new(Some(Token::pinned("pinned")));
        for now in [0, 1_000_000, u64::MAX - 1] {
            let outcome = store.ensure_fresh(&refresher, now).await.expect("fresh");
            assert_eq!(outcome, TokenRefreshOutcome::Fresh);
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.current().map(|t| t.access_token.as_str()), Some("pinned"));
    }

    #[tokio::test]
    async fn refresh_failure_is_surfaced_and_token_is_kept() {
        let refresher = CountingRefresher::new(true);
        let mut store = TokenStore::new(Some(expiring_token(10)));
        let error = store.ensure_fresh(&refresher, 20).await.expect_err("failure");
        assert!(error.is_auth_refresh_failure());
        assert_eq!(store.current().map(|t| t.expiry_unix), Some(10));
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_fails_without_network() {
        let refresher = CountingRefresher::new(false);
        let mut token = expiring_token(10);
        token.refresh_token = None;
        let mut store = TokenStore::new(Some(token));
        let error = store.ensure_fresh(&refresher, 20).await.expect_err("failure");
        assert!(error.is_auth_refresh_failure());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn anonymous_store_skips_refresh() {
        let refresher = CountingRefresher::new(false);
        let mut store = TokenStore::default();
        let outcome = store.ensure_fresh(&refresher, 20).await.expect("anonymous");
        assert_eq!(outcome, TokenRefreshOutcome::Anonymous);
    }

    #[test]
    fn install_keeps_expiry_monotonic() {
        let mut store = TokenStore::new(Some(expiring_token(9_000)));
        store.install(expiring_token(8_000));
        assert_eq!(store.current().map(|t| t.expiry_unix), Some(9_000));
        store.install(expiring_token(10_000));
        assert_eq!(store.current().map(|t| t.expiry_unix), Some(10_000));
    }
}
