//! Remote-service surface for the Globalping client.
//!
//! Holds the measurement wire types, the `MeasurementApi` / `TokenRefresher`
//! seams consumed by the session engine, the reqwest-backed HTTP client with
//! retry handling and the PKCE login exchange, the short-lived response cache, and the token store.
mod cache;
mod client;
mod oauth;
mod retry;
mod token;
mod types;

pub use cache::{CacheError, CacheSweeper, ResponseCache, DEFAULT_CACHE_TTL, DEFAULT_SWEEP_INTERVAL};
pub use client::{CachedMeasurement, ClientConfig, GlobalpingClient};
pub use oauth::{code_challenge, generate_state, PkcePair};
pub use token::{TokenObserver, TokenRefreshOutcome, TokenStore};
pub use types::{
    ApiError, CreateMeasurementResponse, CreateRateLimit, Credits, DnsTimings, HttpTimings,
    HttpTlsCertificate, LimitsResponse, Measurement, MeasurementApi, MeasurementCreate,
    MeasurementKind, MeasurementLocation, MeasurementOptions, MeasurementStatus, PingStats,
    ProbeDetails, ProbeMeasurement, ProbeResult, ProbeStatus, QueryOptions, RateLimitInfo,
    RequestOptions, TlsCertificateIssuer, TlsCertificateSubject, Token, TokenRefresher,
};
