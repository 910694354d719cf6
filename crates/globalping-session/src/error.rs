use globalping_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Failures while turning a locator expression into probe locations.
pub enum LocatorError {
    #[error("no previous measurement matches '{reference}' ({available} in this session)")]
    NoSuchSessionReference { reference: String, available: usize },
    #[error("measurement '{0}' was not found")]
    NoSuchMeasurement(String),
    #[error(
        "locator '{0}' mixes previous-measurement references with location filters"
    )]
    AmbiguousLocatorExpression(String),
    #[error("failed to refresh access token: {0}")]
    AuthRefreshFailed(String),
    #[error("failed to look up measurement '{id}': {source}")]
    Lookup {
        id: String,
        #[source]
        source: ApiError,
    },
}
