//! Geometry helpers for waypoint discovery.
//!
//! Pure functions over WGS84 coordinates: great-circle distances, rhumb
//! bearings, the corridor box around a straight line, and the distance from
//! a node to a stretch of road geometry. Distances are in meters unless a
//! name says otherwise.

mod corridor;

pub use corridor::Corridor;

use geo::{Bearing, Distance, Haversine, Rhumb};

use crate::domain::Coordinate;

/// Meters in a statute mile.
pub const METERS_PER_MILE: f64 = 1609.34;

/// Default standard deviation of bearings (degrees) above which a road
/// step is treated as curved.
pub const DEFAULT_CURVE_THRESHOLD_DEGREES: f64 = 2.0;

/// Mean earth radius used by `geo`'s haversine measure.
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(a.to_point(), b.to_point())
}

/// Constant-heading bearing from `a` to `b`, degrees in `[0, 360)`.
pub fn rhumb_bearing(a: Coordinate, b: Coordinate) -> f64 {
    Rhumb.bearing(a.to_point(), b.to_point()).rem_euclid(360.0)
}

/// Initial great-circle bearing from `a` to `b`, degrees in `[0, 360)`.
fn initial_bearing(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.bearing(a.to_point(), b.to_point()).rem_euclid(360.0)
}

/// Signed smallest difference `a - b` between two bearings, in `[-180, 180)`.
fn bearing_difference(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

/// Whether a polyline bends noticeably.
///
/// Computes the rhumb bearing of each segment and compares the standard
/// deviation of those bearings, taken around their circular mean, against
/// `threshold_degrees`. Zero-length segments are ignored. Paths with fewer
/// than two usable segments are straight.
pub fn has_significant_curve(path: &[Coordinate], threshold_degrees: f64) -> bool {
    let bearings: Vec<f64> = path
        .windows(2)
        .filter(|pair| pair[0] != pair[1])
        .map(|pair| rhumb_bearing(pair[0], pair[1]))
        .collect();

    if bearings.len() < 2 {
        return false;
    }

    let (sin_sum, cos_sum) = bearings.iter().fold((0.0, 0.0), |(s, c), b| {
        let rad = b.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    let mean = sin_sum.atan2(cos_sum).to_degrees();

    let variance = bearings
        .iter()
        .map(|b| bearing_difference(*b, mean).powi(2))
        .sum::<f64>()
        / bearings.len() as f64;

    variance.sqrt() > threshold_degrees
}

/// Distance from `p` to the great-circle segment `a`..`b`.
///
/// Uses the cross-track distance when `p` projects onto the segment and the
/// distance to the nearer endpoint otherwise.
pub fn distance_to_segment_meters(p: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    let segment = distance_meters(a, b);
    let to_p = distance_meters(a, p);
    if segment <= f64::EPSILON || to_p <= f64::EPSILON {
        return to_p;
    }

    let delta = bearing_difference(initial_bearing(a, p), initial_bearing(a, b)).to_radians();
    if delta.cos() < 0.0 {
        return to_p;
    }

    let angular = to_p / EARTH_RADIUS_METERS;
    let cross = (angular.sin() * delta.sin()).clamp(-1.0, 1.0).asin();
    let along = (angular.cos() / cross.cos()).clamp(-1.0, 1.0).acos() * EARTH_RADIUS_METERS;

    if along > segment {
        return distance_meters(b, p);
    }

    (cross * EARTH_RADIUS_METERS).abs()
}

/// How close `node` comes to one step of road geometry.
///
/// Curved steps use the nearest vertex; straight steps use the segment
/// between the step's first and last vertex. `None` for an empty step.
pub fn interception_distance(
    node: Coordinate,
    step_path: &[Coordinate],
    curve_threshold_degrees: f64,
) -> Option<f64> {
    let (first, last) = (step_path.first()?, step_path.last()?);

    if has_significant_curve(step_path, curve_threshold_degrees) {
        return step_path
            .iter()
            .map(|point| distance_meters(*point, node))
            .min_by(f64::total_cmp);
    }

    Some(distance_to_segment_meters(node, *first, *last))
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

pub fn seconds_to_minutes(seconds: f64) -> f64 {
    seconds / 60.0
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
