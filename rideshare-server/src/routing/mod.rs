//! Driving distances and directions from an external routing engine.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod types;

use std::future::Future;

use crate::domain::Coordinate;

pub use client::{OsrmClient, OsrmConfig};
pub use error::RoutingError;
pub use types::{RouteStep, RouteSummary, TurnByTurn};

/// Source of point-to-point driving distances and directions.
///
/// This abstraction allows the matcher to be tested without a routing
/// server.
pub trait RoutingProvider: Send + Sync {
    /// Driving distance (meters) and duration (seconds) from `from` to `to`.
    fn distance_duration(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> impl Future<Output = Result<RouteSummary, RoutingError>> + Send;

    /// Turn-by-turn directions with step geometry.
    fn turn_by_turn(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> impl Future<Output = Result<TurnByTurn, RoutingError>> + Send;
}
