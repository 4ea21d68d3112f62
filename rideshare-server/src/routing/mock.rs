//! Table-driven routing provider for tests.
//!
//! Unless told otherwise, distances are great-circle meters and durations
//! assume a steady 30 mph. Directions default to a single straight step
//! followed by an arrival step.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::domain::Coordinate;
use crate::geometry::distance_meters;

use super::{RouteStep, RouteSummary, RoutingError, RoutingProvider, TurnByTurn};

type Pair = ((u64, u64), (u64, u64));

/// 30 mph in meters per second.
const DEFAULT_SPEED_MPS: f64 = 13.4112;

fn pair(from: Coordinate, to: Coordinate) -> Pair {
    (
        (from.latitude.to_bits(), from.longitude.to_bits()),
        (to.latitude.to_bits(), to.longitude.to_bits()),
    )
}

#[derive(Default)]
pub(crate) struct MockRouting {
    summaries: HashMap<Pair, RouteSummary>,
    directions: HashMap<Pair, TurnByTurn>,
    failing: HashSet<Pair>,
    calls: Mutex<usize>,
}

impl MockRouting {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_summary(mut self, from: Coordinate, to: Coordinate, meters: f64, seconds: f64) -> Self {
        self.summaries.insert(
            pair(from, to),
            RouteSummary {
                distance_meters: meters,
                duration_seconds: seconds,
            },
        );
        self
    }

    pub(crate) fn with_directions(mut self, from: Coordinate, to: Coordinate, directions: TurnByTurn) -> Self {
        self.directions.insert(pair(from, to), directions);
        self
    }

    pub(crate) fn failing(mut self, from: Coordinate, to: Coordinate) -> Self {
        self.failing.insert(pair(from, to));
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn straight_line(from: Coordinate, to: Coordinate) -> RouteSummary {
        let meters = distance_meters(from, to);
        RouteSummary {
            distance_meters: meters,
            duration_seconds: meters / DEFAULT_SPEED_MPS,
        }
    }

    fn record(&self, from: Coordinate, to: Coordinate) -> Result<(), RoutingError> {
        *self.calls.lock().unwrap() += 1;
        if self.failing.contains(&pair(from, to)) {
            return Err(RoutingError::RetriesExhausted {
                attempts: 5,
                last: Box::new(RoutingError::Api {
                    status: 503,
                    message: "mock failure".into(),
                }),
            });
        }
        Ok(())
    }
}

impl RoutingProvider for MockRouting {
    async fn distance_duration(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        self.record(from, to)?;
        Ok(self
            .summaries
            .get(&pair(from, to))
            .copied()
            .unwrap_or_else(|| Self::straight_line(from, to)))
    }

    async fn turn_by_turn(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<TurnByTurn, RoutingError> {
        self.record(from, to)?;
        if let Some(directions) = self.directions.get(&pair(from, to)) {
            return Ok(directions.clone());
        }

        let summary = Self::straight_line(from, to);
        Ok(TurnByTurn {
            summary,
            legs: vec![summary],
            steps: vec![
                RouteStep {
                    distance_meters: summary.distance_meters,
                    duration_seconds: summary.duration_seconds,
                    name: "Straight Road".into(),
                    maneuver: "depart".into(),
                    path: vec![from, to],
                },
                RouteStep {
                    distance_meters: 0.0,
                    duration_seconds: 0.0,
                    name: "Straight Road".into(),
                    maneuver: "arrive".into(),
                    path: vec![to, to],
                },
            ],
            geometry: vec![from, to],
        })
    }
}
