//! Waypoint discovery for flexible driver routes.
//!
//! A flexible route is authored as just an origin and a destination. Nodes
//! the driver passes close to on the way become POTENTIAL stops that riders
//! can board at. Candidates come from the corridor box between the route's
//! ends, then are checked against the provider's turn-by-turn geometry.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::{
    Coordinate, DomainError, DriverRoute, DriverRouteId, DriverRouteStop, Node, NodeId,
    RouteTime, StopStatus,
};
use crate::geometry::{
    Corridor, DEFAULT_CURVE_THRESHOLD_DEGREES, interception_distance, meters_to_miles, round_to,
    seconds_to_minutes,
};
use crate::repository::{RepositoryError, RouteRepository, RouteStore};
use crate::routing::{RouteSummary, RoutingError, RoutingProvider};

/// Default distance (meters) within which a node counts as on the way.
pub const DEFAULT_WAYPOINT_METERS: f64 = 250.0;

/// Tuning for waypoint discovery.
#[derive(Debug, Clone)]
pub struct WaypointConfig {
    /// Maximum distance from the driven path, in meters.
    pub waypoint_distance_meters: f64,

    /// Bearing spread above which a road step is treated as curved.
    pub curve_threshold_degrees: f64,

    /// Node descriptions never offered as waypoints.
    pub excluded_descriptions: Vec<String>,
}

impl WaypointConfig {
    pub fn new(waypoint_distance_meters: f64) -> Self {
        Self {
            waypoint_distance_meters,
            ..Self::default()
        }
    }
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            waypoint_distance_meters: DEFAULT_WAYPOINT_METERS,
            curve_threshold_degrees: DEFAULT_CURVE_THRESHOLD_DEGREES,
            excluded_descriptions: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaypointError {
    #[error("route {0} is a fixed route")]
    FixedRoute(DriverRouteId),

    #[error("route {route}: node {node} has no coordinates")]
    MissingCoordinate { route: DriverRouteId, node: NodeId },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

fn position(route: &DriverRoute, stop: &DriverRouteStop) -> Result<Coordinate, WaypointError> {
    stop.node
        .coordinate
        .ok_or(WaypointError::MissingCoordinate {
            route: route.id,
            node: stop.node_id(),
        })
}

/// Nodes close to the road the route's driver would take, in corridor order.
pub async fn discover_waypoints<R, P>(
    route: &DriverRoute,
    repository: &R,
    routing: &P,
    config: &WaypointConfig,
) -> Result<Vec<Arc<Node>>, WaypointError>
where
    R: RouteRepository,
    P: RoutingProvider,
{
    let origin = position(route, route.first_stop())?;
    let destination = position(route, route.last_stop())?;

    let corridor = Corridor::between(origin, destination);
    let candidates = repository
        .find_nodes_in_corridor(&corridor, &config.excluded_descriptions)
        .await?;

    let directions = routing.turn_by_turn(origin, destination).await?;
    // The final step is the zero-length arrival maneuver
    let steps = match directions.steps.split_last() {
        Some((_, driven)) => driven,
        None => &[],
    };

    let (origin_id, destination_id) = (route.origin_node(), route.destination_node());
    let waypoints: Vec<Arc<Node>> = candidates
        .into_iter()
        .filter(|node| node.id != origin_id && node.id != destination_id)
        .filter(|node| {
            let Some(at) = node.coordinate else {
                return false;
            };
            steps
                .iter()
                .filter_map(|step| {
                    interception_distance(at, &step.path, config.curve_threshold_degrees)
                })
                .min_by(f64::total_cmp)
                .is_some_and(|closest| closest <= config.waypoint_distance_meters)
        })
        .collect();

    debug!(
        route = %route.id,
        steps = steps.len(),
        waypoints = waypoints.len(),
        "Discovered waypoints"
    );

    Ok(waypoints)
}

fn timed_stop(
    node: Arc<Node>,
    status: StopStatus,
    departure: RouteTime,
    summary: RouteSummary,
) -> DriverRouteStop {
    DriverRouteStop::new(node, 0, status)
        .with_arrival(departure.plus_seconds(summary.duration_seconds))
        .with_cumulative(
            round_to(meters_to_miles(summary.distance_meters), 2),
            round_to(seconds_to_minutes(summary.duration_seconds), 2),
        )
}

/// Rebuild a flexible route with its discovered waypoints as POTENTIAL stops.
///
/// Waypoints are timed from the origin departure using provider distances,
/// the destination is re-timed the same way, and the inner stops are ordered
/// by cumulative distance (ties keep discovery order) and re-ranked.
/// Waypoints whose cumulative time runs backwards, or that come out
/// further or later than the destination, are dropped.
pub async fn expand_flexible_route<R, P>(
    route: &DriverRoute,
    repository: &R,
    routing: &P,
    config: &WaypointConfig,
) -> Result<DriverRoute, WaypointError>
where
    R: RouteRepository,
    P: RoutingProvider,
{
    if route.fixed_route {
        return Err(WaypointError::FixedRoute(route.id));
    }

    let origin_stop = route.first_stop();
    let origin = position(route, origin_stop)?;
    let departure = origin_stop
        .departure_time
        .ok_or_else(|| DomainError::MissingTime("origin departure".into()))?;

    let waypoints = discover_waypoints(route, repository, routing, config).await?;

    let lookups = waypoints.iter().map(|node| async move {
        match node.coordinate {
            Some(at) => routing.distance_duration(origin, at).await.map_err(WaypointError::from),
            None => Err(WaypointError::MissingCoordinate {
                route: route.id,
                node: node.id,
            }),
        }
    });
    let summaries = join_all(lookups).await;

    let mut inner: Vec<DriverRouteStop> = route.stops()[1..route.stops().len() - 1]
        .iter()
        .filter(|stop| stop.status != StopStatus::Potential)
        .cloned()
        .collect();
    for (node, summary) in waypoints.into_iter().zip(summaries) {
        let stop = timed_stop(node, StopStatus::Potential, departure, summary?);
        inner.push(stop.with_capacity(route.capacity, 0));
    }
    inner.sort_by(|a, b| a.cum_distance.total_cmp(&b.cum_distance));

    let last = route.last_stop();
    let destination = position(route, last)?;
    let summary = routing.distance_duration(origin, destination).await?;
    let mut arrival = timed_stop(last.node.clone(), StopStatus::Destination, departure, summary);
    arrival.capacity = last.capacity;
    arrival.capacity_used = last.capacity_used;

    let mut stops = Vec::with_capacity(inner.len() + 2);
    stops.push(origin_stop.clone());
    for stop in inner {
        let previous = &stops[stops.len() - 1];
        let in_order = stop.cum_distance >= previous.cum_distance
            && stop.cum_time >= previous.cum_time
            && stop.cum_distance <= arrival.cum_distance
            && stop.cum_time <= arrival.cum_time;
        if stop.status == StopStatus::Potential && !in_order {
            debug!(
                route = %route.id,
                node = %stop.node_id(),
                cum_distance = stop.cum_distance,
                cum_time = stop.cum_time,
                "Dropping out-of-order waypoint"
            );
            continue;
        }
        stops.push(stop);
    }
    stops.push(arrival);
    for (rank, stop) in stops.iter_mut().enumerate() {
        stop.rank = rank as u32;
    }

    Ok(route.clone().with_stops(stops)?)
}

/// Expand every flexible route in `store` that has no POTENTIAL stops yet.
///
/// Failures leave the route as authored. Returns how many routes changed.
pub async fn expand_store<P: RoutingProvider>(
    store: &RouteStore,
    routing: &P,
    config: &WaypointConfig,
) -> usize {
    let mut expanded = 0;

    for route in store.routes().await {
        if route.fixed_route || route.has_potential_stops() {
            continue;
        }

        let result = match expand_flexible_route(&route, store, routing, config).await {
            Ok(updated) => store.replace_route(updated).await.map_err(WaypointError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => expanded += 1,
            Err(e) => warn!(route = %route.id, error = %e, "Failed to expand flexible route"),
        }
    }

    info!(expanded, "Flexible route expansion complete");
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::mock::MockRouting;
    use crate::routing::{RouteStep, TurnByTurn};

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn t(s: &str) -> RouteTime {
        RouteTime::parse(s).unwrap()
    }

    fn node(id: i64, lat: f64, lon: f64) -> Arc<Node> {
        Arc::new(Node::new(NodeId(id), Some(c(lat, lon))))
    }

    /// Due-north route from node 1 to node 2, plus nodes at various offsets.
    fn fixture(fixed: bool) -> (RouteStore, DriverRoute) {
        let origin = node(1, 40.0, -74.0);
        let destination = node(2, 40.1, -74.0);
        let nodes = vec![
            origin.clone(),
            destination.clone(),
            // ~85 m east of the road, a third of the way
            node(3, 40.03, -73.999),
            // ~850 m east
            node(4, 40.07, -73.99),
            // ~40 m west, a fifth of the way
            node(5, 40.02, -74.0005),
            // beyond the destination, outside the corridor
            node(6, 40.2, -74.0),
        ];

        let route = DriverRoute::builder(DriverRouteId(1), t("2024-03-15 09:00"))
            .fixed_route(fixed)
            .capacity(3)
            .build(vec![
                DriverRouteStop::new(origin, 0, StopStatus::Origin).with_departure(t("2024-03-15 09:00")),
                DriverRouteStop::new(destination, 1, StopStatus::Destination).with_arrival(t("2024-03-15 09:20")),
            ])
            .unwrap();

        let store = RouteStore::new(nodes, vec![route.clone()]).unwrap();
        (store, route)
    }

    #[tokio::test]
    async fn finds_nodes_near_the_road() {
        let (store, route) = fixture(false);
        let routing = MockRouting::new();

        let found = discover_waypoints(&route, &store, &routing, &WaypointConfig::default())
            .await
            .unwrap();
        let ids: Vec<i64> = found.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[tokio::test]
    async fn wider_threshold_admits_more() {
        let (store, route) = fixture(false);
        let routing = MockRouting::new();

        let found = discover_waypoints(&route, &store, &routing, &WaypointConfig::new(1_000.0))
            .await
            .unwrap();
        let ids: Vec<i64> = found.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn arrival_step_is_ignored() {
        let (store, route) = fixture(false);
        let (from, to) = (c(40.0, -74.0), c(40.1, -74.0));
        // The only step passing node 3 is the final one
        let directions = TurnByTurn {
            summary: RouteSummary {
                distance_meters: 11_120.0,
                duration_seconds: 900.0,
            },
            legs: vec![],
            steps: vec![
                RouteStep {
                    distance_meters: 11_120.0,
                    duration_seconds: 900.0,
                    name: "Far Road".into(),
                    maneuver: "depart".into(),
                    path: vec![c(40.0, -73.9), c(40.1, -73.9)],
                },
                RouteStep {
                    distance_meters: 0.0,
                    duration_seconds: 0.0,
                    name: "Far Road".into(),
                    maneuver: "arrive".into(),
                    path: vec![c(40.0, -74.0), c(40.1, -74.0)],
                },
            ],
            geometry: vec![from, to],
        };
        let routing = MockRouting::new().with_directions(from, to, directions);

        let found = discover_waypoints(&route, &store, &routing, &WaypointConfig::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn expansion_orders_and_ranks_stops() {
        let (store, route) = fixture(false);
        let routing = MockRouting::new();

        let expanded = expand_flexible_route(&route, &store, &routing, &WaypointConfig::default())
            .await
            .unwrap();

        let stops = expanded.stops();
        let summary: Vec<(i64, u32, StopStatus)> =
            stops.iter().map(|s| (s.node_id().0, s.rank, s.status)).collect();
        assert_eq!(
            summary,
            vec![
                (1, 0, StopStatus::Origin),
                (5, 1, StopStatus::Potential),
                (3, 2, StopStatus::Potential),
                (2, 3, StopStatus::Destination),
            ]
        );

        // Node 5 is ~2.2 km along at 30 mph
        let five = &stops[1];
        assert!((five.cum_distance - 1.38).abs() < 0.02, "got {}", five.cum_distance);
        assert!(five.arrival_time.unwrap() > t("2024-03-15 09:00"));
        assert_eq!(five.capacity, Some(3));

        // Destination re-timed from the provider: ~11.1 km is ~13.8 minutes
        let last = &stops[3];
        assert!((last.cum_distance - 6.91).abs() < 0.02, "got {}", last.cum_distance);
        assert_eq!(last.arrival_time, Some(t("2024-03-15 09:13:49")));
        assert!(stops.windows(2).all(|w| w[0].arrival_time <= w[1].arrival_time));
    }

    #[tokio::test]
    async fn waypoints_beyond_the_destination_are_dropped() {
        let (store, route) = fixture(false);
        // A short provider trip: node 3 (~2.07 mi along) overshoots it
        let routing = MockRouting::new().with_summary(c(40.0, -74.0), c(40.1, -74.0), 3_000.0, 300.0);

        let expanded = expand_flexible_route(&route, &store, &routing, &WaypointConfig::default())
            .await
            .unwrap();
        let ids: Vec<i64> = expanded.stops().iter().map(|s| s.node_id().0).collect();
        assert_eq!(ids, vec![1, 5, 2]);
        assert!(
            expanded
                .stops()
                .windows(2)
                .all(|w| w[0].cum_distance <= w[1].cum_distance && w[0].cum_time <= w[1].cum_time)
        );
    }

    #[tokio::test]
    async fn waypoints_running_backwards_in_time_are_dropped() {
        let (store, route) = fixture(false);
        // Node 5 is nearer but ten minutes out; node 3 would arrive earlier
        let routing = MockRouting::new().with_summary(c(40.0, -74.0), c(40.02, -74.0005), 2_220.0, 600.0);

        let expanded = expand_flexible_route(&route, &store, &routing, &WaypointConfig::default())
            .await
            .unwrap();
        let ids: Vec<i64> = expanded.stops().iter().map(|s| s.node_id().0).collect();
        assert_eq!(ids, vec![1, 5, 2]);
        let ranks: Vec<u32> = expanded.stops().iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn fixed_routes_are_not_expanded() {
        let (store, route) = fixture(true);
        let err = expand_flexible_route(&route, &store, &MockRouting::new(), &WaypointConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WaypointError::FixedRoute(DriverRouteId(1))));
    }

    #[tokio::test]
    async fn expand_store_replaces_flexible_routes_once() {
        let (store, _) = fixture(false);
        let routing = MockRouting::new();

        assert_eq!(expand_store(&store, &routing, &WaypointConfig::default()).await, 1);
        assert!(store.routes().await[0].has_potential_stops());

        // Already expanded
        assert_eq!(expand_store(&store, &routing, &WaypointConfig::default()).await, 0);
    }

    #[tokio::test]
    async fn provider_failure_keeps_route_unexpanded() {
        let (store, _) = fixture(false);
        let routing = MockRouting::new().failing(c(40.0, -74.0), c(40.1, -74.0));

        assert_eq!(expand_store(&store, &routing, &WaypointConfig::default()).await, 0);
        assert!(!store.routes().await[0].has_potential_stops());
    }
}
