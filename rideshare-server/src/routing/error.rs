//! Routing provider error types.

use crate::domain::Coordinate;

/// Errors from a routing provider.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a failure status or code
    #[error("routing API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("invalid routing response: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// The provider could not connect the two points
    #[error("no route from {from} to {to}")]
    NoRoute { from: Coordinate, to: Coordinate },

    /// Every attempt failed with a transient error
    #[error("routing failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<RoutingError>,
    },
}

impl RoutingError {
    /// Whether a fresh attempt could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            RoutingError::NoRoute { .. } | RoutingError::RetriesExhausted { .. }
        )
    }
}
