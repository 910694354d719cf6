use globalping_api::ApiError;
use globalping_session::LocatorError;
use globalping_view::ViewError;
use thiserror::Error;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
/// Why a measurement run ended without a finished measurement.
pub enum RunError {
    #[error("failed to create measurement: {0}")]
    SubmissionFailed(#[source] ApiError),
    #[error("failed to poll measurement {id} after {attempts} consecutive attempts: {source}")]
    PollFailed {
        id: String,
        attempts: usize,
        #[source]
        source: ApiError,
    },
    #[error("measurement {id} failed: {message}")]
    MeasurementFailed { id: String, message: String },
    #[error("no previous measurement matches '{reference}' ({available} in this session)")]
    NoSuchSessionReference { reference: String, available: usize },
    #[error("measurement '{0}' was not found")]
    NoSuchMeasurement(String),
    #[error("locator '{0}' mixes previous-measurement references with location filters")]
    AmbiguousLocatorExpression(String),
    #[error("failed to resolve probe locations: {0}")]
    LocatorLookup(#[source] LocatorError),
    #[error("failed to refresh access token: {0}")]
    AuthRefreshFailed(String),
    #[error("measurement interrupted")]
    Interrupted { id: Option<String> },
    #[error(transparent)]
    Render(#[from] ViewError),
}

impl RunError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Interrupted { .. } => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<LocatorError> for RunError {
    fn from(error: LocatorError) -> Self {
        match error {
            LocatorError::NoSuchSessionReference {
                reference,
                available,
            } => RunError::NoSuchSessionReference {
                reference,
                available,
            },
            LocatorError::NoSuchMeasurement(id) => RunError::NoSuchMeasurement(id),
            LocatorError::AmbiguousLocatorExpression(expression) => {
                RunError::AmbiguousLocatorExpression(expression)
            }
            LocatorError::AuthRefreshFailed(message) => RunError::AuthRefreshFailed(message),
            other => RunError::LocatorLookup(other),
        }
    }
}
