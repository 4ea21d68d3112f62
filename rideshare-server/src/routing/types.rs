//! OSRM response DTOs and the provider-neutral results built from them.
//!
//! Only the fields the matcher reads are modelled; OSRM sends many more.

use serde::Deserialize;

use crate::domain::Coordinate;

use super::error::RoutingError;

/// Response from the OSRM `route` service.
#[derive(Debug, Clone, Deserialize)]
pub struct OsrmResponse {
    /// "Ok" on success, otherwise an error code such as "NoRoute".
    pub code: String,

    pub message: Option<String>,

    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmRoute {
    /// Meters.
    pub distance: f64,

    /// Seconds.
    pub duration: f64,

    #[serde(default)]
    pub legs: Vec<OsrmLeg>,

    /// Present with `overview=full&geometries=geojson`.
    pub geometry: Option<GeoJsonLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmLeg {
    pub distance: f64,
    pub duration: f64,

    #[serde(default)]
    pub steps: Vec<OsrmStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmStep {
    pub distance: f64,
    pub duration: f64,

    #[serde(default)]
    pub name: String,

    pub geometry: Option<GeoJsonLine>,

    pub maneuver: OsrmManeuver,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmManeuver {
    #[serde(rename = "type")]
    pub kind: String,
}

/// GeoJSON `LineString`; positions are `[longitude, latitude]`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoJsonLine {
    pub coordinates: Vec<[f64; 2]>,
}

impl GeoJsonLine {
    fn to_path(&self) -> Result<Vec<Coordinate>, RoutingError> {
        self.coordinates
            .iter()
            .map(|[lon, lat]| {
                Coordinate::new(*lat, *lon).map_err(|e| RoutingError::Json {
                    message: e.to_string(),
                    body: None,
                })
            })
            .collect()
    }
}

/// Driving distance and time between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// One maneuver-to-maneuver stretch of road.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub name: String,

    /// Maneuver type, e.g. "depart", "turn", "arrive".
    pub maneuver: String,

    pub path: Vec<Coordinate>,
}

/// Full driving directions between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnByTurn {
    pub summary: RouteSummary,
    pub legs: Vec<RouteSummary>,

    /// Steps of every leg, in driving order.
    pub steps: Vec<RouteStep>,

    pub geometry: Vec<Coordinate>,
}

impl From<&OsrmRoute> for RouteSummary {
    fn from(route: &OsrmRoute) -> Self {
        Self {
            distance_meters: route.distance,
            duration_seconds: route.duration,
        }
    }
}

impl TryFrom<&OsrmRoute> for TurnByTurn {
    type Error = RoutingError;

    fn try_from(route: &OsrmRoute) -> Result<Self, Self::Error> {
        let legs = route
            .legs
            .iter()
            .map(|leg| RouteSummary {
                distance_meters: leg.distance,
                duration_seconds: leg.duration,
            })
            .collect();

        let steps = route
            .legs
            .iter()
            .flat_map(|leg| &leg.steps)
            .map(|step| {
                Ok(RouteStep {
                    distance_meters: step.distance,
                    duration_seconds: step.duration,
                    name: step.name.clone(),
                    maneuver: step.maneuver.kind.clone(),
                    path: match &step.geometry {
                        Some(line) => line.to_path()?,
                        None => Vec::new(),
                    },
                })
            })
            .collect::<Result<Vec<_>, RoutingError>>()?;

        let geometry = match &route.geometry {
            Some(line) => line.to_path()?,
            None => Vec::new(),
        };

        Ok(Self {
            summary: RouteSummary::from(route),
            legs,
            steps,
            geometry,
        })
    }
}
