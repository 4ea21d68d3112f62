//! Rider legs.
//!
//! A `RouteLeg` is the part of one driver route the rider actually rides,
//! from the boarding stop to the alighting stop. It owns its own copy of
//! those stops so a leg can be retimed without touching the shared route.

use std::sync::Arc;

use super::{DomainError, DriverRoute, DriverRouteStop, NodeId, RouteTime};
use crate::geometry::round_to;

/// One leg of a route chain.
///
/// # Invariants
///
/// - At least two stops, ranks strictly increasing
/// - Boarding stop has a departure time (or, for pass-through waypoints, an
///   arrival time)
/// - Alighting stop has an arrival time no earlier than the boarding departure
#[derive(Debug, Clone)]
pub struct RouteLeg {
    route: Arc<DriverRoute>,
    stops: Vec<DriverRouteStop>,
    departure: RouteTime,
    arrival: RouteTime,
}

impl RouteLeg {
    /// Construct a leg, validating that required times exist.
    ///
    /// # Errors
    ///
    /// Returns `Err` if there are fewer than two stops, ranks do not
    /// increase, or the boarding departure / alighting arrival is missing
    /// or out of order.
    pub fn new(route: Arc<DriverRoute>, stops: Vec<DriverRouteStop>) -> Result<Self, DomainError> {
        if stops.len() < 2 {
            return Err(DomainError::InvalidLeg("a leg needs a boarding and an alighting stop"));
        }
        if stops.windows(2).any(|pair| pair[0].rank >= pair[1].rank) {
            return Err(DomainError::InvalidLeg("stop ranks must be strictly increasing"));
        }

        let departure = stops[0]
            .leaves_at()
            .ok_or_else(|| DomainError::MissingTime("boarding departure".into()))?;
        let arrival = stops[stops.len() - 1]
            .arrival_time
            .ok_or_else(|| DomainError::MissingTime("alighting arrival".into()))?;

        if arrival < departure {
            return Err(DomainError::InvalidLeg("alighting arrival precedes boarding departure"));
        }

        Ok(Self {
            route,
            stops,
            departure,
            arrival,
        })
    }

    pub fn route(&self) -> &Arc<DriverRoute> {
        &self.route
    }

    /// Stops from boarding to alighting, inclusive.
    pub fn stops(&self) -> &[DriverRouteStop] {
        &self.stops
    }

    pub fn boarding_stop(&self) -> &DriverRouteStop {
        &self.stops[0]
    }

    pub fn alighting_stop(&self) -> &DriverRouteStop {
        &self.stops[self.stops.len() - 1]
    }

    pub fn boarding_rank(&self) -> u32 {
        self.boarding_stop().rank
    }

    pub fn alighting_rank(&self) -> u32 {
        self.alighting_stop().rank
    }

    pub fn board_node(&self) -> NodeId {
        self.boarding_stop().node_id()
    }

    pub fn alight_node(&self) -> NodeId {
        self.alighting_stop().node_id()
    }

    pub fn departure_time(&self) -> RouteTime {
        self.departure
    }

    pub fn arrival_time(&self) -> RouteTime {
        self.arrival
    }

    /// Miles ridden, summed stop to stop from the cumulative distances.
    pub fn distance_miles(&self) -> f64 {
        let total: f64 = self
            .stops
            .windows(2)
            .map(|pair| pair[1].cum_distance - pair[0].cum_distance)
            .sum();
        round_to(total, 2)
    }

    /// Minutes from boarding departure to alighting arrival.
    pub fn duration_minutes(&self) -> i64 {
        self.arrival.minutes_since(self.departure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DriverRouteId, Node, StopStatus};

    fn t(s: &str) -> RouteTime {
        RouteTime::parse(s).unwrap()
    }

    fn stop(node: i64, rank: u32, arr: &str, dep: &str, miles: f64) -> DriverRouteStop {
        let mut stop = DriverRouteStop::new(
            Arc::new(Node::new(NodeId(node), None)),
            rank,
            if rank == 0 {
                StopStatus::Origin
            } else {
                StopStatus::Scheduled
            },
        )
        .with_cumulative(miles, 0.0);
        if !arr.is_empty() {
            stop = stop.with_arrival(t(arr));
        }
        if !dep.is_empty() {
            stop = stop.with_departure(t(dep));
        }
        stop
    }

    fn route() -> Arc<DriverRoute> {
        Arc::new(
            DriverRoute::builder(DriverRouteId(9), t("2024-03-15 09:00"))
                .build(vec![
                    stop(1, 0, "", "2024-03-15 09:00", 0.0),
                    DriverRouteStop::new(Arc::new(Node::new(NodeId(2), None)), 1, StopStatus::Destination)
                        .with_arrival(t("2024-03-15 09:30")),
                ])
                .unwrap(),
        )
    }

    #[test]
    fn metrics_from_stops() {
        let leg = RouteLeg::new(
            route(),
            vec![
                stop(1, 2, "2024-03-15 09:10", "2024-03-15 09:12", 3.0),
                stop(2, 3, "2024-03-15 09:20", "2024-03-15 09:21", 5.25),
                stop(3, 5, "2024-03-15 09:41", "", 10.333),
            ],
        )
        .unwrap();

        assert_eq!(leg.boarding_rank(), 2);
        assert_eq!(leg.alighting_rank(), 5);
        assert_eq!(leg.board_node(), NodeId(1));
        assert_eq!(leg.alight_node(), NodeId(3));
        assert_eq!(leg.departure_time(), t("2024-03-15 09:12"));
        assert_eq!(leg.arrival_time(), t("2024-03-15 09:41"));
        assert_eq!(leg.duration_minutes(), 29);
        assert_eq!(leg.distance_miles(), 7.33);
    }

    #[test]
    fn pass_through_boarding_uses_arrival() {
        let leg = RouteLeg::new(
            route(),
            vec![
                stop(1, 1, "2024-03-15 09:10", "", 0.0),
                stop(2, 2, "2024-03-15 09:20", "", 1.0),
            ],
        )
        .unwrap();
        assert_eq!(leg.departure_time(), t("2024-03-15 09:10"));
    }

    #[test]
    fn rejects_single_stop() {
        let err = RouteLeg::new(route(), vec![stop(1, 0, "", "2024-03-15 09:00", 0.0)]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidLeg(_)));
    }

    #[test]
    fn rejects_missing_arrival() {
        let err = RouteLeg::new(
            route(),
            vec![
                stop(1, 0, "", "2024-03-15 09:00", 0.0),
                stop(2, 1, "", "", 1.0),
            ],
        )
        .unwrap_err();
        assert_eq!(err, DomainError::MissingTime("alighting arrival".into()));
    }

    #[test]
    fn rejects_time_travel() {
        let err = RouteLeg::new(
            route(),
            vec![
                stop(1, 0, "", "2024-03-15 09:30", 0.0),
                stop(2, 1, "2024-03-15 09:20", "", 1.0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidLeg(_)));
    }
}
