//! Error types surfaced to callers of the route generator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::Rejection;

/// Irrecoverable failure of a generation request.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("location has poor road coverage ({:.0}% segments failed)", .failed_ratio * 100.0)]
    UnroutableLocation { failed_ratio: f64 },

    #[error("route failed quality check: {0}")]
    QualityBelowThreshold(#[from] Rejection),

    #[error("could not find a suitable route; tried {tried} shapes")]
    NoCandidatesSucceeded { tried: usize },

    #[error("routing produced no usable geometry")]
    EmptyRouteResult,

    #[error("routing service error: {0}")]
    ExternalService(String),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("need at least 2 waypoints for routing, got {0}")]
    InsufficientWaypoints(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of a [`RouteError`] for API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnroutableLocation,
    QualityBelowThreshold,
    NoCandidatesSucceeded,
    EmptyRouteResult,
    ExternalServiceError,
    InvalidInput,
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::UnroutableLocation { .. } => ErrorKind::UnroutableLocation,
            RouteError::QualityBelowThreshold(_) => ErrorKind::QualityBelowThreshold,
            RouteError::NoCandidatesSucceeded { .. } => ErrorKind::NoCandidatesSucceeded,
            RouteError::EmptyRouteResult => ErrorKind::EmptyRouteResult,
            RouteError::ExternalService(_) => ErrorKind::ExternalServiceError,
            RouteError::InvalidShape(_)
            | RouteError::InsufficientWaypoints(_)
            | RouteError::InvalidConfig(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T, E = RouteError> = std::result::Result<T, E>;
