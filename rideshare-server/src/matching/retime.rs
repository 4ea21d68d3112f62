//! Retiming legs that board at a waypoint.
//!
//! A POTENTIAL stop's times are estimates from the route origin. Once a
//! rider boards there the driver has to actually stop, so the stop becomes
//! SCHEDULED and every following stop is pushed back until the schedule
//! absorbs the delay.

use crate::domain::{DriverRoute, DriverRouteStop, NodeId, StopStatus};
use crate::geometry::{meters_to_miles, round_to, seconds_to_minutes};
use crate::routing::{RoutingError, RoutingProvider};

#[derive(Debug, thiserror::Error)]
pub enum RetimeError {
    #[error("stop at rank {0} has no time to retime from")]
    MissingTime(u32),

    #[error("node {0} has no coordinates")]
    MissingCoordinate(NodeId),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Whether a leg over `stops` of `route` must be retimed.
pub fn needs_retiming(route: &DriverRoute, stops: &[DriverRouteStop]) -> bool {
    !route.fixed_route && stops.first().is_some_and(|stop| stop.status == StopStatus::Potential)
}

/// Recompute arrival and departure times along a leg.
///
/// The boarding stop becomes SCHEDULED and departs after the node's driver
/// transit time. Each following stop is reached from the previous departure
/// using the provider's driving time:
///
/// - POTENTIAL stops depart on arrival
/// - a SCHEDULED stop whose authored arrival is no earlier than the new one
///   keeps its times and ends propagation; otherwise it is moved later and
///   propagation continues
/// - the DESTINATION ends propagation, taking the later of the two arrivals
///
/// Ranks never change. Legs that don't need retiming are returned as is.
pub async fn retime_leg<P: RoutingProvider>(
    route: &DriverRoute,
    mut stops: Vec<DriverRouteStop>,
    routing: &P,
) -> Result<Vec<DriverRouteStop>, RetimeError> {
    if !needs_retiming(route, &stops) {
        return Ok(stops);
    }

    let boarding = &mut stops[0];
    let arrival = boarding
        .arrival_time
        .ok_or(RetimeError::MissingTime(boarding.rank))?;
    boarding.status = StopStatus::Scheduled;
    boarding.departure_time = Some(arrival.plus_minutes(boarding.node.driver_transit_time));

    for idx in 1..stops.len() {
        let (done, rest) = stops.split_at_mut(idx);
        let previous = &done[idx - 1];
        let stop = &mut rest[0];

        let leaves = previous
            .leaves_at()
            .ok_or(RetimeError::MissingTime(previous.rank))?;
        let from = previous
            .node
            .coordinate
            .ok_or(RetimeError::MissingCoordinate(previous.node_id()))?;
        let to = stop
            .node
            .coordinate
            .ok_or(RetimeError::MissingCoordinate(stop.node_id()))?;

        let summary = routing.distance_duration(from, to).await?;
        let arrival = leaves.plus_seconds(summary.duration_seconds);
        let cum_distance = round_to(
            previous.cum_distance + meters_to_miles(summary.distance_meters),
            2,
        );
        let cum_time = round_to(
            previous.cum_time + seconds_to_minutes(summary.duration_seconds),
            2,
        );

        match stop.status {
            StopStatus::Potential => {
                stop.arrival_time = Some(arrival);
                stop.departure_time = Some(arrival);
                stop.cum_distance = cum_distance;
                stop.cum_time = cum_time;
            }
            StopStatus::Scheduled => {
                if stop.arrival_time.is_some_and(|authored| arrival <= authored) {
                    break;
                }
                stop.arrival_time = Some(arrival);
                stop.departure_time = Some(arrival.plus_minutes(stop.node.driver_transit_time));
                stop.cum_distance = cum_distance;
                stop.cum_time = cum_time;
            }
            StopStatus::Destination | StopStatus::Origin => {
                if stop.arrival_time.is_none_or(|authored| arrival > authored) {
                    stop.arrival_time = Some(arrival);
                    stop.cum_distance = cum_distance;
                    stop.cum_time = cum_time;
                }
                break;
            }
        }
    }

    Ok(stops)
}
