//! Corridor box around a straight line between two points.

use geo::{Destination, Rhumb};

use super::{distance_meters, rhumb_bearing};
use crate::domain::Coordinate;

/// Rectangle around segment AB used to shortlist waypoint candidates.
///
/// The half-width is a quarter of |AB|. `a_left`/`b_left` are A and B pushed
/// 90 degrees to the left of the AB heading; `a_right`/`b_right` to the right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    pub a_left: Coordinate,
    pub b_left: Coordinate,
    pub a_right: Coordinate,
    pub b_right: Coordinate,
}

impl Corridor {
    pub fn between(a: Coordinate, b: Coordinate) -> Self {
        let half_width = distance_meters(a, b) / 4.0;
        let heading = rhumb_bearing(a, b);

        let offset = |from: Coordinate, bearing: f64| {
            Coordinate::from_point(Rhumb.destination(
                from.to_point(),
                bearing.rem_euclid(360.0),
                half_width,
            ))
        };

        Self {
            a_left: offset(a, heading - 90.0),
            b_left: offset(b, heading - 90.0),
            a_right: offset(a, heading + 90.0),
            b_right: offset(b, heading + 90.0),
        }
    }

    pub fn corners(&self) -> [Coordinate; 4] {
        [self.a_left, self.b_left, self.b_right, self.a_right]
    }

    /// Whether `point` lies inside the box.
    ///
    /// Works in planar (longitude, latitude) space: the box is the
    /// parallelogram spanned from `a_left` by the edges towards `b_left` and
    /// `a_right`, and `point` is inside when both edge coefficients are in
    /// `[0, 1]`.
    pub fn contains(&self, point: Coordinate) -> bool {
        let origin = planar(self.a_left);
        let along = sub(planar(self.b_left), origin);
        let across = sub(planar(self.a_right), origin);
        let offset = sub(planar(point), origin);

        let det = along.0 * across.1 - along.1 * across.0;
        if det.abs() < f64::EPSILON * f64::EPSILON {
            return false;
        }

        let s = (offset.0 * across.1 - offset.1 * across.0) / det;
        let t = (along.0 * offset.1 - along.1 * offset.0) / det;

        (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
    }
}

fn planar(c: Coordinate) -> (f64, f64) {
    (c.longitude, c.latitude)
}

fn sub(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}
