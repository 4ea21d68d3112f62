//! Driver route stops.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Node, NodeId, RouteTime, TimeWindow};

/// Lifecycle status of a stop within a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    /// First stop; the driver departs from here.
    Origin,
    /// An authored intermediate stop.
    Scheduled,
    /// A waypoint discovered near the route's path, not yet committed.
    Potential,
    /// Final stop; no departure.
    Destination,
}

impl StopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopStatus::Origin => "ORIGIN",
            StopStatus::Scheduled => "SCHEDULED",
            StopStatus::Potential => "POTENTIAL",
            StopStatus::Destination => "DESTINATION",
        }
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stop of a driver route.
///
/// Holds its node by `Arc` so stop lists clone cheaply while the search
/// tree and retimed legs take their own copies.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRouteStop {
    pub node: Arc<Node>,

    /// Position along the route; 0 is the origin.
    pub rank: u32,

    pub arrival_time: Option<RouteTime>,

    /// Absent at the final stop.
    pub departure_time: Option<RouteTime>,

    /// Miles driven from the route origin.
    pub cum_distance: f64,

    /// Minutes driven from the route origin.
    pub cum_time: f64,

    pub capacity: Option<u32>,
    pub capacity_used: u32,
    pub status: StopStatus,
}

impl DriverRouteStop {
    pub fn new(node: Arc<Node>, rank: u32, status: StopStatus) -> Self {
        Self {
            node,
            rank,
            arrival_time: None,
            departure_time: None,
            cum_distance: 0.0,
            cum_time: 0.0,
            capacity: None,
            capacity_used: 0,
            status,
        }
    }

    pub fn with_arrival(mut self, time: RouteTime) -> Self {
        self.arrival_time = Some(time);
        self
    }

    pub fn with_departure(mut self, time: RouteTime) -> Self {
        self.departure_time = Some(time);
        self
    }

    pub fn with_cumulative(mut self, distance_miles: f64, time_mins: f64) -> Self {
        self.cum_distance = distance_miles;
        self.cum_time = time_mins;
        self
    }

    pub fn with_capacity(mut self, capacity: u32, used: u32) -> Self {
        self.capacity = Some(capacity);
        self.capacity_used = used;
        self
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    /// Whether a rider waiting at this stop during `window` can board.
    ///
    /// Origin stops match when the departure time, or the departure pushed
    /// back by the route's flexibility, falls inside the window.
    /// Intermediate stops match on their arrival time. Destination stops
    /// never match.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use rideshare_server::domain::{DriverRouteStop, Node, NodeId, RouteTime, StopStatus, TimeWindow};
    ///
    /// let node = Arc::new(Node::new(NodeId(1), None));
    /// let stop = DriverRouteStop::new(node, 0, StopStatus::Origin)
    ///     .with_departure(RouteTime::parse("2024-03-15 09:00").unwrap());
    /// let window = TimeWindow::starting_at(RouteTime::parse("2024-03-15 09:05").unwrap(), 10);
    ///
    /// assert!(!stop.admits(&window, 0));
    /// assert!(stop.admits(&window, 10));
    /// ```
    pub fn admits(&self, window: &TimeWindow, departure_flexibility_mins: i64) -> bool {
        match self.status {
            StopStatus::Origin => self.departure_time.is_some_and(|departure| {
                window.contains(departure)
                    || window.contains(departure.plus_minutes(departure_flexibility_mins.max(0)))
            }),
            StopStatus::Scheduled | StopStatus::Potential => {
                self.arrival_time.is_some_and(|arrival| window.contains(arrival))
            }
            StopStatus::Destination => false,
        }
    }

    /// Time the vehicle leaves this stop, falling back to arrival for
    /// pass-through waypoints.
    pub fn leaves_at(&self) -> Option<RouteTime> {
        self.departure_time.or(self.arrival_time)
    }
}
