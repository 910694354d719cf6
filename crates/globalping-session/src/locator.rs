//! Locator expression grammar and resolution.
//!
//! An expression is a comma-separated list of tokens. Every token is either
//! symbolic (`@N`, `@-N`, `first`, `last`, `previous`, or a measurement id)
//! or a literal location filter. Symbolic tokens resolve to the exact probes
//! used before; literal tokens are ANDed into one remote-side filter.

use std::sync::LazyLock;

use globalping_api::{ApiError, MeasurementApi, MeasurementLocation, ProbeDetails};
use regex::Regex;
use tracing::debug;

use crate::{HistoryRef, LocatorError, SessionHistory};

pub const DEFAULT_LOCATOR: &str = "world";

static MEASUREMENT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]{16,32}$").expect("valid measurement id pattern")
});

/// Whether `token` looks like a measurement id rather than a place name.
pub fn is_measurement_id(token: &str) -> bool {
    MEASUREMENT_ID.is_match(token) && token.chars().any(|ch| ch.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorReference {
    Session(HistoryRef),
    Measurement(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Parsed locator expression.
pub enum ProbeLocator {
    /// Literal tokens, ANDed into a single filter.
    FilterList(Vec<String>),
    /// Probes of earlier measurements, concatenated in token order.
    HistoryReference(Vec<LocatorReference>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Locations and probe limit ready for the submission payload.
pub struct ResolvedLocations {
    pub locations: Vec<MeasurementLocation>,
    pub limit: usize,
    /// Exact probes reused from an earlier measurement, empty for filters.
    pub probes: Vec<ProbeDetails>,
}

/// Parses `expression` without touching history or the network.
///
/// A blank expression selects [`DEFAULT_LOCATOR`].
pub fn parse_locator(expression: &str) -> Result<ProbeLocator, LocatorError> {
    let tokens = expression
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();
    if tokens.is_empty() {
        return Ok(ProbeLocator::FilterList(vec![DEFAULT_LOCATOR.to_string()]));
    }

    let (symbolic, literals): (Vec<&str>, Vec<&str>) = tokens
        .into_iter()
        .partition(|token| HistoryRef::is_symbolic(token) || is_measurement_id(token));
    if symbolic.is_empty() {
        return Ok(ProbeLocator::FilterList(
            literals.into_iter().map(str::to_string).collect(),
        ));
    }
    if !literals.is_empty() {
        return Err(LocatorError::AmbiguousLocatorExpression(
            expression.trim().to_string(),
        ));
    }

    symbolic
        .into_iter()
        .map(|token| {
            if HistoryRef::is_symbolic(token) {
                token.parse().map(LocatorReference::Session)
            } else {
                Ok(LocatorReference::Measurement(token.to_string()))
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ProbeLocator::HistoryReference)
}

/// Resolves `expression` into submission locations.
///
/// Session references are answered from `history` alone; measurement ids
/// are fetched through `api`. Literal filters use `limit` probes.
pub async fn resolve_locator(
    expression: &str,
    limit: usize,
    history: &SessionHistory,
    api: &dyn MeasurementApi,
) -> Result<ResolvedLocations, LocatorError> {
    let locator = parse_locator(expression).map_err(|error| match error {
        LocatorError::NoSuchSessionReference { reference, .. } => {
            LocatorError::NoSuchSessionReference {
                reference,
                available: history.len(),
            }
        }
        other => other,
    })?;
    match locator {
        ProbeLocator::FilterList(tokens) => Ok(ResolvedLocations {
            locations: vec![MeasurementLocation::magic(tokens.join("+"))],
            limit: limit.max(1),
            probes: Vec::new(),
        }),
        ProbeLocator::HistoryReference(references) => {
            let mut probes = Vec::new();
            for reference in references {
                match reference {
                    LocatorReference::Session(reference) => {
                        probes.extend_from_slice(history.resolve(reference)?);
                    }
                    LocatorReference::Measurement(id) => {
                        probes.extend(fetch_measurement_probes(&id, api).await?);
                    }
                }
            }
            debug!(probes = probes.len(), "locator resolved to earlier probes");
            Ok(ResolvedLocations {
                locations: probes.iter().map(MeasurementLocation::for_probe).collect(),
                limit: probes.len().max(1),
                probes,
            })
        }
    }
}

async fn fetch_measurement_probes(
    id: &str,
    api: &dyn MeasurementApi,
) -> Result<Vec<ProbeDetails>, LocatorError> {
    let measurement = api.get_measurement(id).await.map_err(|error| match error {
        ApiError::NotFound { .. } => LocatorError::NoSuchMeasurement(id.to_string()),
        ApiError::AuthRefreshFailed(message) => LocatorError::AuthRefreshFailed(message),
        source => LocatorError::Lookup {
            id: id.to_string(),
            source,
        },
    })?;
    let probes = measurement.probes();
    if probes.is_empty() {
        return Err(LocatorError::NoSuchMeasurement(id.to_string()));
    }
    Ok(probes)
}
