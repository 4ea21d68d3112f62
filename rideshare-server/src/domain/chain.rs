//! Route chains.
//!
//! A `RouteChain` is the linear, externally visible result of a match: one
//! to three legs (primary, secondary, tertiary) ridden in sequence.

use super::{DomainError, DriverRouteId, RouteLeg, RouteTime};
use crate::geometry::round_to;

/// Deepest chain the matcher builds.
pub const MAX_LEGS: usize = 3;

/// Identity of a leg within a chain: route plus boarding and alighting rank.
pub type LegKey = (DriverRouteId, u32, u32);

/// A complete rider trip across one to three driver routes.
///
/// # Invariants
///
/// - Between 1 and [`MAX_LEGS`] legs
/// - Each leg boards at the node where the previous one alights
/// - Each leg departs no earlier than the previous one arrives
#[derive(Debug, Clone)]
pub struct RouteChain {
    legs: Vec<RouteLeg>,
}

impl RouteChain {
    /// Constructs a chain, validating leg connectivity.
    ///
    /// # Errors
    ///
    /// Returns `Err` if there are no legs, too many legs, consecutive legs
    /// meet at different nodes, or a transfer departs before arrival.
    pub fn new(legs: Vec<RouteLeg>) -> Result<Self, DomainError> {
        if legs.is_empty() {
            return Err(DomainError::EmptyChain);
        }
        if legs.len() > MAX_LEGS {
            return Err(DomainError::TooManyLegs(legs.len()));
        }

        for pair in legs.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.alight_node() != next.board_node() {
                return Err(DomainError::LegsNotConnected(
                    prev.alight_node(),
                    next.board_node(),
                ));
            }
            if next.departure_time() < prev.arrival_time() {
                return Err(DomainError::MissedTransfer(next.board_node()));
            }
        }

        Ok(Self { legs })
    }

    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    pub fn primary(&self) -> &RouteLeg {
        &self.legs[0]
    }

    pub fn departure_time(&self) -> RouteTime {
        self.legs[0].departure_time()
    }

    pub fn arrival_time(&self) -> RouteTime {
        self.legs[self.legs.len() - 1].arrival_time()
    }

    /// Miles ridden across all legs.
    pub fn total_distance_miles(&self) -> f64 {
        round_to(self.legs.iter().map(RouteLeg::distance_miles).sum(), 2)
    }

    /// Minutes spent riding, excluding transfer waits.
    pub fn total_duration_minutes(&self) -> i64 {
        self.legs.iter().map(RouteLeg::duration_minutes).sum()
    }

    /// Wait before each leg; zero for the first.
    pub fn transfer_waits(&self) -> Vec<i64> {
        std::iter::once(0)
            .chain(
                self.legs
                    .windows(2)
                    .map(|pair| pair[1].departure_time().minutes_since(pair[0].arrival_time())),
            )
            .collect()
    }

    pub fn route_ids(&self) -> Vec<DriverRouteId> {
        self.legs.iter().map(|leg| leg.route().id).collect()
    }

    /// Identity used for sorting and de-duplication.
    pub fn key(&self) -> Vec<LegKey> {
        self.legs
            .iter()
            .map(|leg| (leg.route().id, leg.boarding_rank(), leg.alighting_rank()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DriverRoute, DriverRouteStop, Node, NodeId, StopStatus};
    use std::sync::Arc;

    fn t(s: &str) -> RouteTime {
        RouteTime::parse(s).unwrap()
    }

    fn leg(id: i64, from: i64, to: i64, dep: &str, arr: &str, miles: f64) -> RouteLeg {
        let origin = DriverRouteStop::new(Arc::new(Node::new(NodeId(from), None)), 0, StopStatus::Origin)
            .with_departure(t(dep));
        let dest = DriverRouteStop::new(Arc::new(Node::new(NodeId(to), None)), 1, StopStatus::Destination)
            .with_arrival(t(arr))
            .with_cumulative(miles, 0.0);
        let route = Arc::new(
            DriverRoute::builder(DriverRouteId(id), t(dep))
                .build(vec![origin.clone(), dest.clone()])
                .unwrap(),
        );
        RouteLeg::new(route, vec![origin, dest]).unwrap()
    }

    #[test]
    fn two_leg_chain() {
        let chain = RouteChain::new(vec![
            leg(1, 10, 20, "2024-03-15 09:00", "2024-03-15 09:20", 6.5),
            leg(2, 20, 30, "2024-03-15 09:25", "2024-03-15 09:50", 8.0),
        ])
        .unwrap();

        assert_eq!(chain.leg_count(), 2);
        assert_eq!(chain.departure_time(), t("2024-03-15 09:00"));
        assert_eq!(chain.arrival_time(), t("2024-03-15 09:50"));
        assert_eq!(chain.total_distance_miles(), 14.5);
        assert_eq!(chain.total_duration_minutes(), 45);
        assert_eq!(chain.transfer_waits(), vec![0, 5]);
        assert_eq!(chain.route_ids(), vec![DriverRouteId(1), DriverRouteId(2)]);
        assert_eq!(chain.key(), vec![(DriverRouteId(1), 0, 1), (DriverRouteId(2), 0, 1)]);
    }

    #[test]
    fn rejects_empty_and_deep_chains() {
        assert!(matches!(RouteChain::new(vec![]), Err(DomainError::EmptyChain)));

        let legs = vec![
            leg(1, 1, 2, "2024-03-15 09:00", "2024-03-15 09:10", 1.0),
            leg(2, 2, 3, "2024-03-15 09:10", "2024-03-15 09:20", 1.0),
            leg(3, 3, 4, "2024-03-15 09:20", "2024-03-15 09:30", 1.0),
            leg(4, 4, 5, "2024-03-15 09:30", "2024-03-15 09:40", 1.0),
        ];
        assert!(matches!(RouteChain::new(legs), Err(DomainError::TooManyLegs(4))));
    }

    #[test]
    fn rejects_disconnected_legs() {
        let err = RouteChain::new(vec![
            leg(1, 10, 20, "2024-03-15 09:00", "2024-03-15 09:20", 1.0),
            leg(2, 21, 30, "2024-03-15 09:25", "2024-03-15 09:50", 1.0),
        ])
        .unwrap_err();
        assert_eq!(err, DomainError::LegsNotConnected(NodeId(20), NodeId(21)));
    }

    #[test]
    fn rejects_missed_transfer() {
        let err = RouteChain::new(vec![
            leg(1, 10, 20, "2024-03-15 09:00", "2024-03-15 09:20", 1.0),
            leg(2, 20, 30, "2024-03-15 09:15", "2024-03-15 09:50", 1.0),
        ])
        .unwrap_err();
        assert_eq!(err, DomainError::MissedTransfer(NodeId(20)));
    }
}
