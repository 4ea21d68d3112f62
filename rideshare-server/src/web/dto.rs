//! Data transfer objects for web requests and responses.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Coordinate, DriverRouteStop, InvalidCoordinate, MAX_OFFSET_MINUTES, Node, NodeId, RouteLeg,
    RouteTime, StopStatus,
};
use crate::geometry::round_to;
use crate::matching::{LegScore, RiderDirect, ScoredChain};

/// Longest accepted departure flexibility: one day.
pub const MAX_FLEXIBILITY_MINUTES: i64 = MAX_OFFSET_MINUTES;

/// A latitude/longitude pair as sent by clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoordinateDto {
    pub latitude: f64,
    pub longitude: f64,
}

impl TryFrom<CoordinateDto> for Coordinate {
    type Error = InvalidCoordinate;

    fn try_from(dto: CoordinateDto) -> Result<Self, Self::Error> {
        Coordinate::new(dto.latitude, dto.longitude)
    }
}

/// Departure flexibility, sent either as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flexibility {
    Minutes(i64),
    Text(String),
}

impl Flexibility {
    /// Whole minutes, validated to lie within a day.
    pub fn minutes(&self) -> Result<i64, String> {
        let minutes = match self {
            Flexibility::Minutes(m) => *m,
            Flexibility::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("departure flexibility is not a whole number: {s:?}"))?,
        };

        if !(0..=MAX_FLEXIBILITY_MINUTES).contains(&minutes) {
            return Err(format!(
                "departure flexibility must be between 0 and {MAX_FLEXIBILITY_MINUTES} minutes"
            ));
        }
        Ok(minutes)
    }
}

/// Which client shape to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Ios,
    Web,
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(RequestType::Ios),
            "web" => Ok(RequestType::Web),
            other => Err(format!("unknown request type: {other:?}")),
        }
    }
}

/// Request to match a rider trip against driver routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRoutesRequest {
    pub origin_coordinates: CoordinateDto,
    pub destination_coordinates: CoordinateDto,

    /// "YYYY-MM-DD HH:mm[:ss]"
    pub departure_date_time: String,

    pub departure_flexibility: Flexibility,

    /// "ios" or "web"
    pub request_type: String,

    #[serde(default)]
    pub rider_origin_address: Option<String>,

    #[serde(default)]
    pub rider_destination_address: Option<String>,
}

/// Response for route matching.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRoutesResponse {
    pub matching_route_options: Vec<RouteOption>,
}

/// One matching chain, shaped for the requesting client.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RouteOption {
    Ios(IosRouteOption),
    Web(WebRouteOption),
}

impl RouteOption {
    pub fn new(request_type: RequestType, scored: &ScoredChain, rider: &RiderDirect) -> Option<Self> {
        match request_type {
            RequestType::Ios => IosRouteOption::from_chain(scored).map(RouteOption::Ios),
            RequestType::Web => WebRouteOption::from_chain(scored, rider).map(RouteOption::Web),
        }
    }
}

/// Fields shared by both leg shapes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSummary {
    pub droute_id: i64,
    pub droute_name: String,
    pub origin_node: NodeId,
    pub destination_node: NodeId,
    pub origin_departure_time: RouteTime,
    pub destination_arrival_time: RouteTime,

    /// Miles ridden.
    pub distance: f64,

    /// Minutes ridden.
    pub duration: i64,

    pub efficiency_score: f64,
}

impl LegSummary {
    fn from_leg(leg: &RouteLeg, score: &LegScore) -> Self {
        Self {
            droute_id: leg.route().id.0,
            droute_name: leg.route().name.clone(),
            origin_node: leg.board_node(),
            destination_node: leg.alight_node(),
            origin_departure_time: leg.departure_time(),
            destination_arrival_time: leg.arrival_time(),
            distance: leg.distance_miles(),
            duration: leg.duration_minutes(),
            efficiency_score: score.efficiency,
        }
    }
}

/// A leg in the mobile app's shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosLeg {
    #[serde(flatten)]
    pub summary: LegSummary,

    /// Share of the option's distance, scaled so an option sums to 10.
    pub distance_ratio: f64,

    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosRouteOption {
    pub primary: IosLeg,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<IosLeg>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<IosLeg>,
}

impl IosRouteOption {
    /// `None` only for a chain without legs.
    pub fn from_chain(scored: &ScoredChain) -> Option<Self> {
        let ratios = distance_ratios(scored.chain.legs());
        let mut legs = scored
            .chain
            .legs()
            .iter()
            .zip(&scored.legs)
            .zip(ratios)
            .map(|((leg, score), distance_ratio)| {
                let board = &leg.boarding_stop().node;
                IosLeg {
                    summary: LegSummary::from_leg(leg, score),
                    distance_ratio,
                    location: board.location.clone(),
                    description: board.description.clone(),
                }
            });

        Some(Self {
            primary: legs.next()?,
            secondary: legs.next(),
            tertiary: legs.next(),
        })
    }
}

/// Each leg's share of the total distance, scaled to sum to 10.
///
/// Zero-length chains split evenly.
pub fn distance_ratios(legs: &[RouteLeg]) -> Vec<f64> {
    let total: f64 = legs.iter().map(RouteLeg::distance_miles).sum();
    legs.iter()
        .map(|leg| {
            let share = if total > 0.0 {
                leg.distance_miles() / total
            } else {
                1.0 / legs.len() as f64
            };
            round_to(share * 10.0, 2)
        })
        .collect()
}

/// A stop on the rider's part of a route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResult {
    pub node_id: NodeId,
    pub rank: u32,
    pub status: StopStatus,
    pub arrival_time: Option<RouteTime>,
    pub departure_time: Option<RouteTime>,
    pub cum_distance: f64,
    pub cum_time: f64,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl StopResult {
    fn from_stop(stop: &DriverRouteStop) -> Self {
        Self {
            node_id: stop.node_id(),
            rank: stop.rank,
            status: stop.status,
            arrival_time: stop.arrival_time,
            departure_time: stop.departure_time,
            cum_distance: stop.cum_distance,
            cum_time: stop.cum_time,
            description: stop.node.description.clone(),
            location: stop.node.location.clone(),
        }
    }
}

/// A leg in the web client's shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebLeg {
    #[serde(flatten)]
    pub summary: LegSummary,

    /// Minutes waited at the boarding node; zero for the first leg.
    pub transfer_wait_time: i64,

    pub stops: Vec<StopResult>,

    pub origin_node_description: Option<String>,
    pub origin_node_location: Option<String>,
    pub destination_node_description: Option<String>,
    pub destination_node_location: Option<String>,

    /// Whole driver route, flexible routes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_route_distance: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_route_duration: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_route_direct_distance: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_route_direct_duration: Option<f64>,
}

impl WebLeg {
    fn from_leg(leg: &RouteLeg, score: &LegScore, transfer_wait_time: i64) -> Self {
        let route = leg.route();
        let board = &leg.boarding_stop().node;
        let alight = &leg.alighting_stop().node;
        let flexible = !route.fixed_route;

        Self {
            summary: LegSummary::from_leg(leg, score),
            transfer_wait_time,
            stops: leg.stops().iter().map(StopResult::from_stop).collect(),
            origin_node_description: board.description.clone(),
            origin_node_location: board.location.clone(),
            destination_node_description: alight.description.clone(),
            destination_node_location: alight.location.clone(),
            driver_route_distance: flexible.then(|| route.last_stop().cum_distance),
            driver_route_duration: flexible.then(|| route.last_stop().cum_time),
            driver_route_direct_distance: score.direct.map(|d| d.distance_miles),
            driver_route_direct_duration: score.direct.map(|d| d.duration_minutes),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRouteOption {
    pub primary: WebLeg,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<WebLeg>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<WebLeg>,

    pub route_cumulative_distance: f64,
    pub route_cumulative_duration: i64,
    pub rider_route_direct_distance: f64,
    pub rider_route_direct_duration: f64,
    pub distance_quality: f64,
    pub duration_quality: f64,
    pub efficiency_score: f64,
}

impl WebRouteOption {
    pub fn from_chain(scored: &ScoredChain, rider: &RiderDirect) -> Option<Self> {
        let chain = &scored.chain;
        let waits = chain.transfer_waits();
        let mut legs = chain
            .legs()
            .iter()
            .zip(&scored.legs)
            .zip(waits)
            .map(|((leg, score), wait)| WebLeg::from_leg(leg, score, wait));

        let distance = chain.total_distance_miles();
        let duration = chain.total_duration_minutes();

        Some(Self {
            primary: legs.next()?,
            secondary: legs.next(),
            tertiary: legs.next(),
            route_cumulative_distance: distance,
            route_cumulative_duration: duration,
            rider_route_direct_distance: rider.distance_miles,
            rider_route_direct_duration: rider.duration_minutes,
            distance_quality: round_to(distance / rider.distance_miles, 2),
            duration_quality: round_to(duration as f64 / rider.duration_minutes, 2),
            efficiency_score: scored.efficiency,
        })
    }
}

/// Query for the nearest node.
#[derive(Debug, Deserialize)]
pub struct NearestNodeQuery {
    pub latitude: f64,
    pub longitude: f64,
}

/// Response for the nearest node.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestNodeResponse {
    pub node: Node,
    pub distance_meters: f64,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DriverRoute, DriverRouteId, RouteChain};
    use crate::matching::DirectEnrichment;
    use std::sync::Arc;

    fn t(s: &str) -> RouteTime {
        RouteTime::parse(s).unwrap()
    }

    fn leg(id: i64, fixed: bool, from: i64, to: i64, dep: &str, arr: &str, miles: f64) -> RouteLeg {
        let stops = vec![
            DriverRouteStop::new(
                Arc::new(Node::new(NodeId(from), None).with_location("Corner").with_description("Lot")),
                0,
                StopStatus::Origin,
            )
            .with_departure(t(dep)),
            DriverRouteStop::new(Arc::new(Node::new(NodeId(to), None)), 1, StopStatus::Destination)
                .with_arrival(t(arr))
                .with_cumulative(miles, 20.0),
        ];
        let route = DriverRoute::builder(DriverRouteId(id), t(dep))
            .name(format!("Route {id}"))
            .fixed_route(fixed)
            .build(stops.clone())
            .unwrap();
        RouteLeg::new(Arc::new(route), stops).unwrap()
    }

    fn score(efficiency: f64, direct: Option<DirectEnrichment>) -> LegScore {
        LegScore {
            distance_quality: 1.0,
            duration_quality: 1.0,
            efficiency,
            direct,
        }
    }

    fn two_leg_chain() -> ScoredChain {
        let direct = DirectEnrichment {
            distance_miles: 5.5,
            duration_minutes: 12.0,
        };
        ScoredChain {
            chain: RouteChain::new(vec![
                leg(1, true, 1, 2, "2024-03-15 09:00", "2024-03-15 09:10", 3.0),
                leg(2, false, 2, 3, "2024-03-15 09:15", "2024-03-15 09:30", 6.0),
            ])
            .unwrap(),
            legs: vec![score(2.0, None), score(1.0, Some(direct))],
            efficiency: 1.5,
        }
    }

    fn rider() -> RiderDirect {
        RiderDirect {
            distance_miles: 8.0,
            duration_minutes: 20.0,
        }
    }

    #[test]
    fn request_parses_numeric_and_string_flexibility() {
        let body = r#"{
            "originCoordinates": {"latitude": 40.0, "longitude": -74.0},
            "destinationCoordinates": {"latitude": 40.1, "longitude": -74.1},
            "departureDateTime": "2024-03-15 09:00",
            "departureFlexibility": "15",
            "requestType": "web"
        }"#;
        let req: MatchRoutesRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.departure_flexibility.minutes(), Ok(15));
        assert_eq!(req.request_type.parse::<RequestType>(), Ok(RequestType::Web));
        assert!(req.rider_origin_address.is_none());

        assert_eq!(Flexibility::Minutes(0).minutes(), Ok(0));
        assert!(Flexibility::Minutes(-1).minutes().is_err());
        assert!(Flexibility::Minutes(MAX_FLEXIBILITY_MINUTES + 1).minutes().is_err());
        assert!(Flexibility::Text("ten".into()).minutes().is_err());
        assert!("android".parse::<RequestType>().is_err());
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let dto = CoordinateDto {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert!(Coordinate::try_from(dto).is_err());
    }

    #[test]
    fn distance_ratios_sum_to_ten() {
        let chain = two_leg_chain();
        assert_eq!(distance_ratios(chain.chain.legs()), vec![3.33, 6.67]);

        let zero = vec![leg(1, true, 1, 2, "2024-03-15 09:00", "2024-03-15 09:10", 0.0)];
        assert_eq!(distance_ratios(&zero), vec![10.0]);
    }

    #[test]
    fn ios_option_shape() {
        let option = IosRouteOption::from_chain(&two_leg_chain()).unwrap();
        let json = serde_json::to_value(&option).unwrap();

        assert_eq!(json["primary"]["drouteId"], 1);
        assert_eq!(json["primary"]["drouteName"], "Route 1");
        assert_eq!(json["primary"]["originDepartureTime"], "2024-03-15 09:00:00");
        assert_eq!(json["primary"]["distanceRatio"], 3.33);
        assert_eq!(json["primary"]["location"], "Corner");
        assert_eq!(json["secondary"]["originNode"], 2);
        assert_eq!(json["secondary"]["efficiencyScore"], 1.0);
        assert!(json.get("tertiary").is_none());
    }

    #[test]
    fn web_option_shape() {
        let option = WebRouteOption::from_chain(&two_leg_chain(), &rider()).unwrap();
        let json = serde_json::to_value(&option).unwrap();

        assert_eq!(json["routeCumulativeDistance"], 9.0);
        assert_eq!(json["routeCumulativeDuration"], 25);
        assert_eq!(json["riderRouteDirectDistance"], 8.0);
        assert_eq!(json["distanceQuality"], 1.13);
        assert_eq!(json["durationQuality"], 1.25);
        assert_eq!(json["efficiencyScore"], 1.5);

        assert_eq!(json["primary"]["transferWaitTime"], 0);
        assert_eq!(json["primary"]["stops"].as_array().unwrap().len(), 2);
        assert_eq!(json["primary"]["stops"][0]["status"], "ORIGIN");
        assert!(json["primary"].get("driverRouteDistance").is_none());

        assert_eq!(json["secondary"]["transferWaitTime"], 5);
        assert_eq!(json["secondary"]["driverRouteDistance"], 6.0);
        assert_eq!(json["secondary"]["driverRouteDirectDistance"], 5.5);
        assert_eq!(json["secondary"]["driverRouteDirectDuration"], 12.0);
    }
}
