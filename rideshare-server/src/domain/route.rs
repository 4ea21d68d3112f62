//! Driver routes.
//!
//! A `DriverRoute` is a scheduled (fixed) or flexible path a driver will
//! drive, owning its ordered stop list. Routes are validated at construction
//! so the matcher can rely on a well-formed ORIGIN .. DESTINATION sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DomainError, DriverRouteStop, NodeId, RouteTime, StopStatus, check_offset};

/// Identifier of a driver route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverRouteId(pub i64);

impl fmt::Display for DriverRouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    #[default]
    New,
    Active,
    Completed,
    Cancelled,
}

/// A driver route with its validated stop sequence.
///
/// # Invariants
///
/// - At least two stops
/// - Ranks strictly increasing
/// - Exactly one ORIGIN stop, first, with a departure time
/// - Exactly one DESTINATION stop, last
/// - Cumulative distance and time finite, non-negative and non-decreasing
/// - Departure flexibility and max wait within `0..=MAX_OFFSET_MINUTES`
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRoute {
    pub id: DriverRouteId,
    pub name: String,
    pub departure_time: RouteTime,
    pub capacity: u32,

    /// Longest the driver will wait at a stop (minutes).
    pub max_wait: i64,

    /// True when every stop was explicitly authored.
    pub fixed_route: bool,

    /// How far the departure may slip (minutes).
    pub departure_flexibility: i64,

    pub status: RouteStatus,

    stops: Vec<DriverRouteStop>,
}

impl DriverRoute {
    /// Start building a route.
    pub fn builder(id: DriverRouteId, departure_time: RouteTime) -> DriverRouteBuilder {
        DriverRouteBuilder {
            id,
            name: format!("Route {}", id),
            departure_time,
            capacity: 1,
            max_wait: 0,
            fixed_route: true,
            departure_flexibility: 0,
            status: RouteStatus::default(),
        }
    }

    pub fn stops(&self) -> &[DriverRouteStop] {
        &self.stops
    }

    pub fn origin_node(&self) -> NodeId {
        self.stops[0].node_id()
    }

    pub fn destination_node(&self) -> NodeId {
        self.stops[self.stops.len() - 1].node_id()
    }

    pub fn first_stop(&self) -> &DriverRouteStop {
        &self.stops[0]
    }

    pub fn last_stop(&self) -> &DriverRouteStop {
        &self.stops[self.stops.len() - 1]
    }

    pub fn stop_at_rank(&self, rank: u32) -> Option<&DriverRouteStop> {
        self.stops
            .binary_search_by_key(&rank, |s| s.rank)
            .ok()
            .map(|idx| &self.stops[idx])
    }

    /// Stops strictly after `rank`.
    pub fn stops_after(&self, rank: u32) -> &[DriverRouteStop] {
        let start = self.stops.partition_point(|s| s.rank <= rank);
        &self.stops[start..]
    }

    /// Stops with `from <= rank <= to`.
    pub fn stops_between(&self, from: u32, to: u32) -> &[DriverRouteStop] {
        let start = self.stops.partition_point(|s| s.rank < from);
        let end = self.stops.partition_point(|s| s.rank <= to);
        &self.stops[start..end.max(start)]
    }

    pub fn has_potential_stops(&self) -> bool {
        self.stops.iter().any(|s| s.status == StopStatus::Potential)
    }

    /// Replace the stop list, re-validating every invariant.
    pub fn with_stops(self, stops: Vec<DriverRouteStop>) -> Result<Self, DomainError> {
        validate_stops(&stops)?;
        Ok(Self { stops, ..self })
    }
}

/// Builder for [`DriverRoute`].
#[derive(Debug, Clone)]
pub struct DriverRouteBuilder {
    id: DriverRouteId,
    name: String,
    departure_time: RouteTime,
    capacity: u32,
    max_wait: i64,
    fixed_route: bool,
    departure_flexibility: i64,
    status: RouteStatus,
}

impl DriverRouteBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn max_wait(mut self, minutes: i64) -> Self {
        self.max_wait = minutes;
        self
    }

    pub fn fixed_route(mut self, fixed: bool) -> Self {
        self.fixed_route = fixed;
        self
    }

    pub fn departure_flexibility(mut self, minutes: i64) -> Self {
        self.departure_flexibility = minutes;
        self
    }

    pub fn status(mut self, status: RouteStatus) -> Self {
        self.status = status;
        self
    }

    /// Validate the stop sequence and build the route.
    pub fn build(self, stops: Vec<DriverRouteStop>) -> Result<DriverRoute, DomainError> {
        check_offset("departure flexibility", self.departure_flexibility)?;
        check_offset("max wait", self.max_wait)?;
        validate_stops(&stops)?;
        Ok(DriverRoute {
            id: self.id,
            name: self.name,
            departure_time: self.departure_time,
            capacity: self.capacity,
            max_wait: self.max_wait,
            fixed_route: self.fixed_route,
            departure_flexibility: self.departure_flexibility,
            status: self.status,
            stops,
        })
    }
}

fn validate_stops(stops: &[DriverRouteStop]) -> Result<(), DomainError> {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) if stops.len() >= 2 => (first, last),
        _ => return Err(DomainError::InvalidRoute("a route needs at least two stops")),
    };

    if stops.windows(2).any(|pair| pair[0].rank >= pair[1].rank) {
        return Err(DomainError::InvalidRoute("ranks must be strictly increasing"));
    }

    if first.status != StopStatus::Origin {
        return Err(DomainError::InvalidRoute("first stop must be the ORIGIN"));
    }
    if last.status != StopStatus::Destination {
        return Err(DomainError::InvalidRoute("last stop must be the DESTINATION"));
    }

    let inner = &stops[1..stops.len() - 1];
    if inner
        .iter()
        .any(|s| matches!(s.status, StopStatus::Origin | StopStatus::Destination))
    {
        return Err(DomainError::InvalidRoute(
            "ORIGIN and DESTINATION may only appear once",
        ));
    }

    if first.departure_time.is_none() {
        return Err(DomainError::MissingTime("origin departure".into()));
    }

    if stops.iter().any(|s| {
        !(s.cum_distance.is_finite() && s.cum_time.is_finite())
            || s.cum_distance < 0.0
            || s.cum_time < 0.0
    }) {
        return Err(DomainError::InvalidRoute(
            "cumulative distance and time must be finite and non-negative",
        ));
    }
    if stops.windows(2).any(|pair| {
        pair[1].cum_distance < pair[0].cum_distance || pair[1].cum_time < pair[0].cum_time
    }) {
        return Err(DomainError::InvalidRoute(
            "cumulative distance and time must not decrease",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use std::sync::Arc;

    fn t(s: &str) -> RouteTime {
        RouteTime::parse(s).unwrap()
    }

    fn stop(node: i64, rank: u32, status: StopStatus) -> DriverRouteStop {
        let stop = DriverRouteStop::new(Arc::new(Node::new(NodeId(node), None)), rank, status);
        match status {
            StopStatus::Origin => stop.with_departure(t("2024-03-15 09:00")),
            _ => stop.with_arrival(t("2024-03-15 09:30")),
        }
    }

    fn builder() -> DriverRouteBuilder {
        DriverRoute::builder(DriverRouteId(1), t("2024-03-15 09:00"))
    }

    #[test]
    fn builds_valid_route() {
        let route = builder()
            .name("Morning run")
            .capacity(3)
            .fixed_route(false)
            .departure_flexibility(10)
            .build(vec![
                stop(1, 0, StopStatus::Origin),
                stop(2, 1, StopStatus::Scheduled),
                stop(3, 5, StopStatus::Potential),
                stop(4, 6, StopStatus::Destination),
            ])
            .unwrap();

        assert_eq!(route.name, "Morning run");
        assert_eq!(route.origin_node(), NodeId(1));
        assert_eq!(route.destination_node(), NodeId(4));
        assert!(route.has_potential_stops());
        assert_eq!(route.stop_at_rank(5).map(|s| s.node_id()), Some(NodeId(3)));
        assert!(route.stop_at_rank(4).is_none());
    }

    #[test]
    fn slicing_by_rank() {
        let route = builder()
            .build(vec![
                stop(1, 0, StopStatus::Origin),
                stop(2, 1, StopStatus::Scheduled),
                stop(3, 3, StopStatus::Scheduled),
                stop(4, 4, StopStatus::Destination),
            ])
            .unwrap();

        let after: Vec<u32> = route.stops_after(1).iter().map(|s| s.rank).collect();
        assert_eq!(after, vec![3, 4]);
        assert!(route.stops_after(4).is_empty());

        let between: Vec<u32> = route.stops_between(1, 3).iter().map(|s| s.rank).collect();
        assert_eq!(between, vec![1, 3]);
        assert!(route.stops_between(3, 1).is_empty());
    }

    #[test]
    fn rejects_too_few_stops() {
        let err = builder().build(vec![stop(1, 0, StopStatus::Origin)]).unwrap_err();
        assert_eq!(err, DomainError::InvalidRoute("a route needs at least two stops"));
    }

    #[test]
    fn rejects_non_increasing_ranks() {
        let err = builder()
            .build(vec![
                stop(1, 0, StopStatus::Origin),
                stop(2, 2, StopStatus::Scheduled),
                stop(3, 2, StopStatus::Destination),
            ])
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidRoute("ranks must be strictly increasing"));
    }

    #[test]
    fn rejects_misplaced_terminals() {
        assert!(
            builder()
                .build(vec![
                    stop(1, 0, StopStatus::Scheduled),
                    stop(2, 1, StopStatus::Destination),
                ])
                .is_err()
        );
        assert!(
            builder()
                .build(vec![
                    stop(1, 0, StopStatus::Origin),
                    stop(2, 1, StopStatus::Destination),
                    stop(3, 2, StopStatus::Destination),
                ])
                .is_err()
        );
    }

    #[test]
    fn rejects_origin_without_departure() {
        let origin = DriverRouteStop::new(Arc::new(Node::new(NodeId(1), None)), 0, StopStatus::Origin);
        let err = builder()
            .build(vec![origin, stop(2, 1, StopStatus::Destination)])
            .unwrap_err();
        assert!(matches!(err, DomainError::MissingTime(_)));
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        let stops = || vec![stop(1, 0, StopStatus::Origin), stop(2, 1, StopStatus::Destination)];

        assert!(builder().departure_flexibility(1440).build(stops()).is_ok());
        assert_eq!(
            builder().departure_flexibility(1441).build(stops()).unwrap_err(),
            DomainError::OutOfRange {
                field: "departure flexibility",
                value: 1441,
            }
        );
        assert_eq!(
            builder().departure_flexibility(-1).build(stops()).unwrap_err(),
            DomainError::OutOfRange {
                field: "departure flexibility",
                value: -1,
            }
        );
        assert!(matches!(
            builder().max_wait(i64::MAX).build(stops()),
            Err(DomainError::OutOfRange { field: "max wait", .. })
        ));
    }

    #[test]
    fn rejects_decreasing_cumulative_values() {
        let err = builder()
            .build(vec![
                stop(1, 0, StopStatus::Origin),
                stop(2, 1, StopStatus::Scheduled).with_cumulative(8.0, 10.0),
                stop(3, 2, StopStatus::Destination).with_cumulative(3.0, 20.0),
            ])
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidRoute("cumulative distance and time must not decrease")
        );

        let err = builder()
            .build(vec![
                stop(1, 0, StopStatus::Origin),
                stop(2, 1, StopStatus::Destination).with_cumulative(-2.0, 5.0),
            ])
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidRoute("cumulative distance and time must be finite and non-negative")
        );

        assert!(
            builder()
                .build(vec![
                    stop(1, 0, StopStatus::Origin),
                    stop(2, 1, StopStatus::Destination).with_cumulative(f64::NAN, 5.0),
                ])
                .is_err()
        );

        // Equal consecutive values are fine
        assert!(
            builder()
                .build(vec![
                    stop(1, 0, StopStatus::Origin),
                    stop(2, 1, StopStatus::Scheduled).with_cumulative(4.0, 10.0),
                    stop(3, 2, StopStatus::Destination).with_cumulative(4.0, 10.0),
                ])
                .is_ok()
        );
    }

    #[test]
    fn with_stops_revalidates() {
        let route = builder()
            .build(vec![stop(1, 0, StopStatus::Origin), stop(2, 1, StopStatus::Destination)])
            .unwrap();

        let expanded = route
            .clone()
            .with_stops(vec![
                stop(1, 0, StopStatus::Origin),
                stop(5, 1, StopStatus::Potential),
                stop(2, 2, StopStatus::Destination),
            ])
            .unwrap();
        assert_eq!(expanded.stops().len(), 3);
        assert_eq!(expanded.id, route.id);

        assert!(route.with_stops(vec![stop(1, 0, StopStatus::Origin)]).is_err());
    }
}
