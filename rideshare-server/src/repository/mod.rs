//! Read access to nodes and driver routes.
//!
//! The matcher and waypoint discovery only talk to storage through
//! [`RouteRepository`], so tests and the server can share the in-memory
//! [`RouteStore`].

mod store;

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::{
    Coordinate, DomainError, DriverRoute, DriverRouteId, InvalidCoordinate, Node, NodeId,
    TimeWindow,
};
use crate::geometry::Corridor;

pub use store::{RouteStore, SeedFile, SeedRoute, SeedStop};

/// Errors from loading or querying route data.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse seed data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node {0} appears more than once")]
    DuplicateNode(NodeId),

    #[error("route {0} appears more than once")]
    DuplicateRoute(DriverRouteId),

    #[error("node {node} has a bad coordinate: {source}")]
    InvalidCoordinate {
        node: NodeId,
        source: InvalidCoordinate,
    },

    #[error("node {node} is invalid: {source}")]
    InvalidNode { node: NodeId, source: DomainError },

    #[error("route {route} references unknown node {node}")]
    UnknownNode { route: DriverRouteId, node: NodeId },

    #[error("route {route} is invalid: {source}")]
    InvalidRoute {
        route: DriverRouteId,
        source: DomainError,
    },

    #[error("route {0} not found")]
    RouteNotFound(DriverRouteId),
}

/// Queries over nodes and driver routes.
pub trait RouteRepository: Send + Sync {
    /// Routes with a stop at `node` that a rider waiting there during
    /// `window` could board, in route id order.
    ///
    /// An ORIGIN stop qualifies when its departure, or its departure plus the
    /// route's (non-negative) departure flexibility, falls inside the window.
    /// SCHEDULED and POTENTIAL stops qualify on arrival. Routes in `exclude`
    /// are never returned.
    fn find_routes_touching_node(
        &self,
        node: NodeId,
        window: &TimeWindow,
        exclude: &HashSet<DriverRouteId>,
    ) -> impl Future<Output = Result<Vec<Arc<DriverRoute>>, RepositoryError>> + Send;

    fn find_node(
        &self,
        id: NodeId,
    ) -> impl Future<Output = Result<Option<Arc<Node>>, RepositoryError>> + Send;

    /// Nodes with coordinates inside `corridor`, minus those whose
    /// description is listed in `excluded_descriptions`.
    fn find_nodes_in_corridor(
        &self,
        corridor: &Corridor,
        excluded_descriptions: &[String],
    ) -> impl Future<Output = Result<Vec<Arc<Node>>, RepositoryError>> + Send;

    /// Closest node to `coordinate` and its distance in meters.
    fn nearest_node(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Option<(Arc<Node>, f64)>, RepositoryError>> + Send;
}
