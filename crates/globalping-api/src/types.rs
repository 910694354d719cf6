use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globalping_core::NEVER_EXPIRES_UNIX;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
/// Diagnostic commands the remote probes can execute.
pub enum MeasurementKind {
    Ping,
    Traceroute,
    Dns,
    Mtr,
    Http,
}

impl MeasurementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementKind::Ping => "ping",
            MeasurementKind::Traceroute => "traceroute",
            MeasurementKind::Dns => "dns",
            MeasurementKind::Mtr => "mtr",
            MeasurementKind::Http => "http",
        }
    }

    /// Whether `--latency` output exists for this command.
    pub fn supports_latency(self) -> bool {
        matches!(
            self,
            MeasurementKind::Ping | MeasurementKind::Dns | MeasurementKind::Http
        )
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementStatus {
    #[default]
    InProgress,
    Finished,
    Failed,
    #[serde(other)]
    Unknown,
}

impl MeasurementStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MeasurementStatus::Finished | MeasurementStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeStatus {
    #[default]
    InProgress,
    Finished,
    Failed,
    Offline,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
/// Location and network identity of a single probe.
pub struct ProbeDetails {
    #[serde(default)]
    pub continent: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub asn: u32,
    #[serde(default)]
    pub network: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsCertificateSubject {
    #[serde(rename = "CN", default)]
    pub common_name: String,
    #[serde(rename = "alt", default)]
    pub alternative_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TlsCertificateIssuer {
    #[serde(rename = "C", default)]
    pub country: String,
    #[serde(rename = "O", default)]
    pub organization: String,
    #[serde(rename = "CN", default)]
    pub common_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// TLS certificate details reported by `http` probes over HTTPS.
pub struct HttpTlsCertificate {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub cipher_name: String,
    #[serde(default)]
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub subject: TlsCertificateSubject,
    #[serde(default)]
    pub issuer: TlsCertificateIssuer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_bits: Option<u32>,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub fingerprint256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PingStats {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub loss: Option<f64>,
    #[serde(default)]
    pub rcv: Option<u32>,
    #[serde(default)]
    pub drop: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpTimings {
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub download: Option<f64>,
    #[serde(default)]
    pub first_byte: Option<f64>,
    #[serde(default)]
    pub dns: Option<f64>,
    #[serde(default)]
    pub tls: Option<f64>,
    #[serde(default)]
    pub tcp: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DnsTimings {
    #[serde(default)]
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
/// Raw command output plus the command-specific structured fields.
pub struct ProbeResult {
    #[serde(default)]
    pub status: ProbeStatus,
    #[serde(default)]
    pub raw_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<HttpTlsCertificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PingStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<Value>,
}

impl ProbeResult {
    /// Parses `timings` as the `http` command shape.
    pub fn http_timings(&self) -> Option<HttpTimings> {
        self.timings
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Parses `timings` as the `dns` command shape.
    pub fn dns_timings(&self) -> Option<DnsTimings> {
        self.timings
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProbeMeasurement {
    pub probe: ProbeDetails,
    #[serde(default)]
    pub result: ProbeResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
/// A submitted measurement as reported by the remote service.
pub struct Measurement {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MeasurementKind>,
    #[serde(default)]
    pub status: MeasurementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub probes_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<ProbeMeasurement>,
}

impl Measurement {
    pub fn probes(&self) -> Vec<ProbeDetails> {
        self.results
            .iter()
            .map(|result| result.probe.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
/// One entry of the submission `locations` array.
pub struct MeasurementLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl MeasurementLocation {
    pub fn magic(filter: impl Into<String>) -> Self {
        Self {
            magic: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Pins a location to the identity of a probe seen earlier.
    pub fn for_probe(probe: &ProbeDetails) -> Self {
        let non_empty = |value: &str| (!value.trim().is_empty()).then(|| value.to_string());
        Self {
            magic: None,
            continent: non_empty(&probe.continent),
            country: non_empty(&probe.country),
            state: probe.state.as_deref().and_then(non_empty),
            city: non_empty(&probe.city),
            asn: (probe.asn != 0).then_some(probe.asn),
            network: non_empty(&probe.network),
            limit: Some(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QueryOptions {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Submission payload for `POST /measurements`.
pub struct MeasurementCreate {
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    pub target: String,
    #[serde(default)]
    pub in_progress_updates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<MeasurementLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_options: Option<MeasurementOptions>,
}

impl MeasurementCreate {
    pub fn new(kind: MeasurementKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            in_progress_updates: false,
            limit: None,
            locations: Vec::new(),
            measurement_options: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeasurementResponse {
    pub id: String,
    #[serde(default)]
    pub probes_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CreateRateLimit {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub remaining: i64,
    #[serde(default)]
    pub reset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Credits {
    #[serde(default)]
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
struct MeasurementRateLimits {
    #[serde(default)]
    create: CreateRateLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
struct RateLimits {
    #[serde(default)]
    measurements: MeasurementRateLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
/// Payload of `GET /limits`.
pub struct LimitsResponse {
    #[serde(default)]
    rate_limit: RateLimits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Credits>,
}

impl LimitsResponse {
    pub fn create_limit(&self) -> &CreateRateLimit {
        &self.rate_limit.measurements.create
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Access credential. A pinned token never expires and is never refreshed.
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    pub expiry_unix: u64,
}

impl Token {
    pub fn pinned(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expires_in: i64::MAX,
            expiry_unix: NEVER_EXPIRES_UNIX,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.expiry_unix == NEVER_EXPIRES_UNIX
    }

    pub fn is_expired_at(&self, now_unix: u64) -> bool {
        globalping_core::is_expired_unix(Some(self.expiry_unix), now_unix)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .field("expiry_unix", &self.expiry_unix)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Rate-limit hints parsed from a 429 response.
pub struct RateLimitInfo {
    pub message: String,
    pub remaining: Option<i64>,
    pub reset_secs: Option<i64>,
    pub credits_remaining: Option<i64>,
}

impl fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(remaining) = self.remaining {
            write!(f, " (remaining: {remaining}")?;
            if let Some(reset) = self.reset_secs {
                write!(f, ", resets in {reset}s")?;
            }
            f.write_str(")")?;
        }
        if let Some(credits) = self.credits_remaining {
            write!(f, " (credits remaining: {credits})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
/// Failures reported by the remote service collaborator.
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("rate limit exceeded: {0}")]
    RateLimited(RateLimitInfo),
    #[error("invalid request: {message}{}", validation_params(.params))]
    Validation {
        message: String,
        params: BTreeMap<String, String>,
    },
    #[error("no probes found: {0}")]
    NoProbesFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("failed to refresh access token: {0}")]
    AuthRefreshFailed(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid auth url: {0}")]
    InvalidAuthUrl(String),
}

/// One `\n - name: reason` line per rejected parameter.
fn validation_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(name, reason)| format!("\n - {name}: {reason}"))
        .collect()
}

impl ApiError {
    pub fn is_auth_refresh_failure(&self) -> bool {
        matches!(self, ApiError::AuthRefreshFailed(_))
    }
}

#[async_trait]
/// Measurement operations consumed by the session engine.
pub trait MeasurementApi: Send + Sync {
    async fn create_measurement(
        &self,
        request: &MeasurementCreate,
    ) -> Result<CreateMeasurementResponse, ApiError>;

    async fn get_measurement(&self, id: &str) -> Result<Measurement, ApiError>;
}

#[async_trait]
/// Exchanges a refresh token for a new access token.
pub trait TokenRefresher: Send + Sync {
    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, ApiError>;
}
