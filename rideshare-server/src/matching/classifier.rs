//! Route classification at a node.
//!
//! Turns the repository's "routes touching this node in this window" into
//! search-tree nodes: where the rider boards, which stops follow, and whether
//! the destination is among them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::domain::{DriverRoute, DriverRouteId, DriverRouteStop, NodeId, TimeWindow};
use crate::repository::{RepositoryError, RouteRepository};

/// Depth of a route within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Primary,
    Secondary,
    Tertiary,
}

impl Classification {
    /// The classification of routes reached from this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Classification::Primary => Some(Classification::Secondary),
            Classification::Secondary => Some(Classification::Tertiary),
            Classification::Tertiary => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Primary => "primary",
            Classification::Secondary => "secondary",
            Classification::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider distance between a flexible route's first and last stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectEnrichment {
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

/// A route found during search, positioned in the search tree.
#[derive(Debug, Clone)]
pub struct ClassifiedRoute {
    pub route: Arc<DriverRoute>,
    pub classification: Classification,

    /// Stop where the rider gets on.
    pub boarding_stop: DriverRouteStop,

    /// Stops after the boarding stop, in rank order.
    pub onward_stops: Vec<DriverRouteStop>,

    /// Rank of the first onward stop at the rider's destination.
    pub alighting_rank: Option<u32>,

    /// Rank of the parent route's stop where the rider transferred here.
    pub reached_from_rank: Option<u32>,

    pub direct: Option<DirectEnrichment>,

    pub children: Vec<ClassifiedRoute>,
}

impl ClassifiedRoute {
    /// Position `route` for a rider waiting at `node` during `window`.
    ///
    /// `None` when no stop at `node` admits the window.
    pub fn classify(
        route: Arc<DriverRoute>,
        classification: Classification,
        node: NodeId,
        window: &TimeWindow,
        destination: NodeId,
        reached_from_rank: Option<u32>,
    ) -> Option<Self> {
        let boarding_stop = route
            .stops()
            .iter()
            .find(|stop| stop.node_id() == node && stop.admits(window, route.departure_flexibility))?
            .clone();

        let onward_stops = route.stops_after(boarding_stop.rank).to_vec();
        let alighting_rank = onward_stops
            .iter()
            .find(|stop| stop.node_id() == destination)
            .map(|stop| stop.rank);

        Some(Self {
            route,
            classification,
            boarding_stop,
            onward_stops,
            alighting_rank,
            reached_from_rank,
            direct: None,
            children: Vec::new(),
        })
    }

    pub fn boarding_rank(&self) -> u32 {
        self.boarding_stop.rank
    }

    pub fn reaches_destination(&self) -> bool {
        self.alighting_rank.is_some()
    }

    /// Onward stops a rider could transfer at: timed and not the destination.
    pub fn transfer_stops(&self, destination: NodeId) -> impl Iterator<Item = &DriverRouteStop> {
        self.onward_stops
            .iter()
            .filter(move |stop| stop.node_id() != destination && stop.arrival_time.is_some())
    }

    pub fn with_children(self, children: Vec<ClassifiedRoute>) -> Self {
        Self { children, ..self }
    }
}

/// Parameters for one node search, bundled for a cleaner signature.
#[derive(Debug, Clone)]
pub struct PassingQuery {
    /// When the rider is ready to board, before dwell.
    pub window: TimeWindow,
    pub node: NodeId,

    /// Minutes the rider needs at `node` before boarding.
    pub dwell_minutes: i64,

    pub destination: NodeId,
    pub classification: Classification,
    pub reached_from_rank: Option<u32>,
}

/// Routes a rider at `query.node` could board, classified for the tree.
///
/// The search window is `query.window` pushed later by the dwell time.
/// Routes in `excluded` are dropped even if the repository returns them.
pub async fn find_routes_passing_at_node<R: RouteRepository>(
    repository: &R,
    query: &PassingQuery,
    excluded: &HashSet<DriverRouteId>,
) -> Result<Vec<ClassifiedRoute>, RepositoryError> {
    let window = query.window.shifted(query.dwell_minutes);

    let routes = repository
        .find_routes_touching_node(query.node, &window, excluded)
        .await?;

    Ok(routes
        .into_iter()
        .filter(|route| !excluded.contains(&route.id))
        .filter_map(|route| {
            ClassifiedRoute::classify(
                route,
                query.classification,
                query.node,
                &window,
                query.destination,
                query.reached_from_rank,
            )
        })
        .collect())
}
