use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use globalping_core::{current_unix_timestamp, expiry_after_unix};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, ETAG, IF_NONE_MATCH};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::cache::{CacheSweeper, ResponseCache, DEFAULT_CACHE_TTL};
use crate::oauth::{PkcePair, CODE_CHALLENGE_METHOD_S256, OAUTH_SCOPE};
use crate::retry::{
    integer_header, is_transient_error, is_transient_status, new_request_id, retry_after,
    RetryPolicy,
};
use crate::token::{TokenObserver, TokenRefreshOutcome, TokenStore};
use crate::types::{
    ApiError, CreateMeasurementResponse, LimitsResponse, Measurement, MeasurementApi,
    MeasurementCreate, RateLimitInfo, Token, TokenRefresher,
};

const DEFAULT_API_URL: &str = "https://api.globalping.io/v1";
const DEFAULT_AUTH_URL: &str = "https://auth.globalping.io";
const DEFAULT_AUTH_CLIENT_ID: &str = "be231712-03f4-45bf-9f15-023506ce0b72";

#[derive(Debug, Clone)]
/// Connection settings for [`GlobalpingClient`].
pub struct ClientConfig {
    pub api_url: String,
    pub auth_url: String,
    pub auth_client_id: String,
    pub auth_client_secret: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_budget_ms: u64,
    pub retry_jitter: bool,
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            auth_client_id: DEFAULT_AUTH_CLIENT_ID.to_string(),
            auth_client_secret: String::new(),
            user_agent: format!("globalping-cli/v{}", env!("CARGO_PKG_VERSION")),
            request_timeout_ms: 30_000,
            max_retries: 2,
            retry_budget_ms: 0,
            retry_jitter: true,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Raw measurement body kept for conditional re-fetches.
pub struct CachedMeasurement {
    pub etag: Option<String>,
    pub body: String,
    pub terminal: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    params: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

impl TokenResponse {
    fn into_token(self, now_unix: u64) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            expiry_unix: expiry_after_unix(now_unix, self.expires_in),
        }
    }
}

/// HTTP client for the Globalping measurement and auth endpoints.
pub struct GlobalpingClient {
    client: reqwest::Client,
    config: ClientConfig,
    cache: Arc<ResponseCache<CachedMeasurement>>,
    tokens: Mutex<TokenStore>,
    token_observer: Option<Arc<dyn TokenObserver>>,
    _sweeper: Option<CacheSweeper>,
}

impl GlobalpingClient {
    pub fn new(config: ClientConfig, token: Option<Token>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            client,
            config,
            cache: Arc::new(ResponseCache::new()),
            tokens: Mutex::new(TokenStore::new(token)),
            token_observer: None,
            _sweeper: None,
        })
    }

    pub fn with_token_observer(mut self, observer: Arc<dyn TokenObserver>) -> Self {
        self.token_observer = Some(observer);
        self
    }

    /// Starts the periodic cache sweep; must be called inside a tokio runtime.
    pub fn with_cache_sweeper(mut self, interval: Duration) -> Self {
        self._sweeper = Some(self.cache.spawn_sweeper(interval));
        self
    }

    pub async fn current_token(&self) -> Option<Token> {
        self.tokens.lock().await.current().cloned()
    }

    /// Replaces the installed credential after a login or logout.
    pub async fn set_token(&self, token: Option<Token>) {
        let mut tokens = self.tokens.lock().await;
        tokens.clear();
        if let Some(token) = token {
            tokens.install(token);
        }
    }

    pub async fn limits(&self) -> Result<LimitsResponse, ApiError> {
        let url = self.api_endpoint("limits");
        let authorization = self.authorization().await?;
        let response = self
            .send_with_retry(|| self.with_auth(self.client.get(&url), authorization.as_deref()))
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, "limits").await);
        }
        let raw = response.text().await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Revokes `token` at the auth server. Unknown tokens are not an error.
    pub async fn revoke_token(&self, token: &str) -> Result<(), ApiError> {
        let url = self.auth_endpoint("oauth/token/revoke");
        let form = [
            ("token", token),
            ("client_id", self.config.auth_client_id.as_str()),
            ("client_secret", self.config.auth_client_secret.as_str()),
        ];
        let response = self
            .send_with_retry(|| self.client.post(&url).form(&form))
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(error_from_response(response, "token").await)
    }

    /// Browser URL that starts the authorization-code flow.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        pkce: &PkcePair,
        state: &str,
    ) -> Result<String, ApiError> {
        let endpoint = self.auth_endpoint("oauth/authorize");
        let mut url = Url::parse(&endpoint)
            .map_err(|error| ApiError::InvalidAuthUrl(format!("{endpoint}: {error}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.auth_client_id)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD_S256)
            .append_pair("response_type", "code")
            .append_pair("scope", OAUTH_SCOPE)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Trades the code from the authorization redirect for a refreshable token.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<Token, ApiError> {
        let url = self.auth_endpoint("oauth/token");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.auth_client_id.as_str()),
            ("client_secret", self.config.auth_client_secret.as_str()),
        ];
        let response = self
            .send_with_retry(|| self.client.post(&url).form(&form))
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, "authorization code").await);
        }
        let raw = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&raw)?;
        Ok(parsed.into_token(current_unix_timestamp()))
    }

    fn api_endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.auth_url.trim_end_matches('/'))
    }

    fn with_auth(&self, builder: RequestBuilder, authorization: Option<&str>) -> RequestBuilder {
        match authorization {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    /// Resolves the bearer header, refreshing an expired token first.
    async fn authorization(&self) -> Result<Option<String>, ApiError> {
        let mut tokens = self.tokens.lock().await;
        let outcome = tokens.ensure_fresh(self, current_unix_timestamp()).await?;
        if let TokenRefreshOutcome::Refreshed(token) = &outcome {
            if let Some(observer) = &self.token_observer {
                observer.token_refreshed(token);
            }
        }
        Ok(tokens
            .current()
            .map(|token| format!("Bearer {}", token.access_token)))
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = RetryPolicy {
            max_retries: self.config.max_retries,
            budget: Duration::from_millis(self.config.retry_budget_ms),
            jitter: self.config.retry_jitter,
        };
        let started = Instant::now();
        let mut attempt = 0_usize;

        loop {
            let sent = build()
                .header("x-request-id", new_request_id())
                .header("x-retry-attempt", attempt.to_string())
                .send()
                .await;

            let delay = match &sent {
                Ok(response) if is_transient_status(response.status().as_u16()) => policy
                    .next_delay(attempt, started.elapsed(), retry_after(response.headers())),
                Err(error) if is_transient_error(error) => {
                    policy.next_delay(attempt, started.elapsed(), None)
                }
                _ => None,
            };
            let Some(delay) = delay else {
                return sent.map_err(ApiError::Http);
            };

            match &sent {
                Ok(response) => {
                    debug!(status = response.status().as_u16(), attempt, ?delay, "retrying api request")
                }
                Err(error) => debug!(%error, attempt, ?delay, "retrying api request"),
            }
            sleep(delay).await;
            attempt += 1;
        }
    }

    fn measurement_cache_key(id: &str) -> String {
        format!("measurement:{id}")
    }
}

#[async_trait]
impl MeasurementApi for GlobalpingClient {
    async fn create_measurement(
        &self,
        request: &MeasurementCreate,
    ) -> Result<CreateMeasurementResponse, ApiError> {
        let url = self.api_endpoint("measurements");
        let authorization = self.authorization().await?;
        let response = self
            .send_with_retry(|| {
                self.with_auth(self.client.post(&url), authorization.as_deref())
                    .json(request)
            })
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, "measurement").await);
        }
        let raw = response.text().await?;
        let created: CreateMeasurementResponse = serde_json::from_str(&raw)?;
        debug!(id = %created.id, probes = created.probes_count, "measurement created");
        Ok(created)
    }

    async fn get_measurement(&self, id: &str) -> Result<Measurement, ApiError> {
        let key = Self::measurement_cache_key(id);
        let cached = self.cache.get(&key);
        if let Some(entry) = cached.as_ref().filter(|entry| entry.terminal) {
            debug!(id, "serving terminal measurement from cache");
            return Ok(serde_json::from_str(&entry.body)?);
        }

        let url = self.api_endpoint(&format!("measurements/{id}"));
        let etag = cached.as_ref().and_then(|entry| entry.etag.clone());
        let response = self
            .send_with_retry(|| {
                let builder = self.client.get(&url);
                match etag.as_deref() {
                    Some(etag) => builder.header(IF_NONE_MATCH, etag),
                    None => builder,
                }
            })
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                debug!(id, "measurement not modified");
                return Ok(serde_json::from_str(&entry.body)?);
            }
            return Err(ApiError::InvalidResponse(format!(
                "measurement {id} reported not modified without a cached body"
            )));
        }
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                resource: format!("measurement {id}"),
            });
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, "measurement").await);
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let raw = response.text().await?;
        let measurement: Measurement = serde_json::from_str(&raw)?;
        self.cache.put(
            key,
            CachedMeasurement {
                etag,
                body: raw,
                terminal: measurement.status.is_terminal(),
            },
            self.config.cache_ttl,
        );
        Ok(measurement)
    }
}

#[async_trait]
impl TokenRefresher for GlobalpingClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, ApiError> {
        let url = self.auth_endpoint("oauth/token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.auth_client_id.as_str()),
            ("client_secret", self.config.auth_client_secret.as_str()),
        ];
        let response = self
            .send_with_retry(|| self.client.post(&url).form(&form))
            .await
            .map_err(|error| ApiError::AuthRefreshFailed(error.to_string()))?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::AuthRefreshFailed(format!(
                "auth server returned {}: {raw}",
                status.as_u16()
            )));
        }
        let parsed: TokenResponse = serde_json::from_str(&raw)
            .map_err(|error| ApiError::AuthRefreshFailed(format!("invalid token payload: {error}")))?;
        Ok(parsed.into_token(current_unix_timestamp()))
    }
}

async fn error_from_response(response: Response, resource: &str) -> ApiError {
    let status = response.status();
    let headers = response.headers().clone();
    let raw = match response.text().await {
        Ok(raw) => raw,
        Err(error) => return ApiError::Http(error),
    };
    let body = serde_json::from_str::<ErrorEnvelope>(&raw)
        .ok()
        .map(|envelope| envelope.error);
    let message = body
        .as_ref()
        .map(|body| body.message.clone())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| raw.clone());

    match status {
        StatusCode::BAD_REQUEST => ApiError::Validation {
            message,
            params: body
                .map(|body| {
                    body.params
                        .into_iter()
                        .map(|(key, value)| match value {
                            serde_json::Value::String(text) => (key, text),
                            other => (key, other.to_string()),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::UNPROCESSABLE_ENTITY
            if body.as_ref().map(|body| body.kind.as_str()) == Some("no_probes_found")
                || body.is_none() =>
        {
            ApiError::NoProbesFound(message)
        }
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(RateLimitInfo {
            message,
            remaining: integer_header(&headers, "x-ratelimit-remaining"),
            reset_secs: integer_header(&headers, "x-ratelimit-reset"),
            credits_remaining: integer_header(&headers, "x-credits-remaining"),
        }),
        _ => ApiError::HttpStatus {
            status: status.as_u16(),
            body: raw,
        },
    }
}
