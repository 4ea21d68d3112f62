//! Nodes: the pickup and dropoff points routes are built from.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DomainError, check_offset};

/// Identifier of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned for out-of-range or non-finite coordinates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinate: {reason}")]
pub struct InvalidCoordinate {
    reason: &'static str,
}

/// A WGS84 latitude/longitude pair in degrees.
///
/// # Examples
///
/// ```
/// use rideshare_server::domain::Coordinate;
///
/// assert!(Coordinate::new(40.7128, -74.0060).is_ok());
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// assert!(Coordinate::new(0.0, f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Validate and build a coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(InvalidCoordinate {
                reason: "latitude and longitude must be finite numbers",
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidCoordinate {
                reason: "latitude must be within -90..=90",
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidCoordinate {
                reason: "longitude must be within -180..=180",
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// As a `geo` point (x = longitude, y = latitude).
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }

    pub fn from_point(point: geo::Point<f64>) -> Self {
        Self {
            latitude: point.y(),
            longitude: point.x(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A geographic point of interest.
///
/// Reference data: the matcher only reads nodes. Coordinates may be missing
/// for nodes that were never geocoded; such nodes are skipped by any
/// computation that needs a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    #[serde(default)]
    pub coordinate: Option<Coordinate>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub state_province: Option<String>,

    #[serde(default)]
    pub zip: Option<String>,

    /// Average dwell time for a rider changing vehicles here (minutes).
    #[serde(default)]
    pub rider_transit_time: i64,

    /// Average time a driver spends stopped here (minutes).
    #[serde(default)]
    pub driver_transit_time: i64,
}

impl Node {
    pub fn new(id: NodeId, coordinate: Option<Coordinate>) -> Self {
        Self {
            id,
            coordinate,
            description: None,
            location: None,
            address: None,
            city: None,
            state_province: None,
            zip: None,
            rider_transit_time: 0,
            driver_transit_time: 0,
        }
    }

    pub fn with_transit_times(mut self, rider_mins: i64, driver_mins: i64) -> Self {
        self.rider_transit_time = rider_mins;
        self.driver_transit_time = driver_mins;
        self
    }

    /// Check the transit times are usable as schedule offsets.
    pub fn validate(&self) -> Result<(), DomainError> {
        check_offset("rider transit time", self.rider_transit_time)?;
        check_offset("driver transit time", self.driver_transit_time)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
