//! HTTP route handlers.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::domain::{Coordinate, RouteTime};
use crate::geometry::{meters_to_miles, round_to, seconds_to_minutes};
use crate::matching::{MatchError, MatchRequest, Matcher, RiderDirect};
use crate::repository::{RepositoryError, RouteRepository};
use crate::routing::{RouteSummary, RoutingError, RoutingProvider};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<P: RoutingProvider + 'static>(state: AppState<P>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/routes/match", post(match_routes::<P>))
        .route("/api/nodes/nearest", get(nearest_node::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// The rider's own trip in scoring units: miles to one decimal place and
/// whole minutes. A positive trip never rounds down to zero.
fn rider_direct(summary: RouteSummary) -> RiderDirect {
    let miles = meters_to_miles(summary.distance_meters);
    let minutes = seconds_to_minutes(summary.duration_seconds);
    RiderDirect {
        distance_miles: at_least(round_to(miles, 1), miles, 0.1),
        duration_minutes: at_least(minutes.round(), minutes, 1.0),
    }
}

fn at_least(rounded: f64, raw: f64, unit: f64) -> f64 {
    if raw > 0.0 { rounded.max(unit) } else { rounded }
}

fn coordinate(dto: CoordinateDto, which: &str) -> Result<Coordinate, AppError> {
    Coordinate::try_from(dto).map_err(|e| AppError::BadRequest {
        message: format!("Invalid {which} coordinates: {e}"),
    })
}

/// Closest node to a coordinate.
async fn nearest_node<P: RoutingProvider>(
    State(state): State<AppState<P>>,
    Query(query): Query<NearestNodeQuery>,
) -> Result<Json<NearestNodeResponse>, AppError> {
    let at = coordinate(
        CoordinateDto {
            latitude: query.latitude,
            longitude: query.longitude,
        },
        "query",
    )?;

    let (node, distance) = state
        .store
        .nearest_node(at)
        .await?
        .ok_or_else(|| AppError::NotFound {
            message: "No geocoded nodes".to_string(),
        })?;

    Ok(Json(NearestNodeResponse {
        node: (*node).clone(),
        distance_meters: round_to(distance, 1),
    }))
}

/// Find driver route chains for a rider trip.
async fn match_routes<P: RoutingProvider>(
    State(state): State<AppState<P>>,
    body: Bytes,
) -> Result<Response, AppError> {
    // Parse JSON manually so we can log the body on failure
    let req: MatchRoutesRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejected route match request body");
        debug!(body = %String::from_utf8_lossy(&body), "Rejected body");
        AppError::BadRequest {
            message: format!("Invalid JSON: {e}"),
        }
    })?;

    let request_type: RequestType = req
        .request_type
        .parse()
        .map_err(|message| AppError::BadRequest { message })?;
    let flexibility = req
        .departure_flexibility
        .minutes()
        .map_err(|message| AppError::BadRequest { message })?;
    let departure_time =
        RouteTime::parse(&req.departure_date_time).map_err(|e| AppError::BadRequest {
            message: format!("Invalid departure time {:?}: {e}", req.departure_date_time),
        })?;
    let origin_at = coordinate(req.origin_coordinates, "origin")?;
    let destination_at = coordinate(req.destination_coordinates, "destination")?;

    // Snap both ends to the network
    let no_nodes = || AppError::NotFound {
        message: "No geocoded nodes".to_string(),
    };
    let (origin, _) = state.store.nearest_node(origin_at).await?.ok_or_else(no_nodes)?;
    let (destination, _) = state
        .store
        .nearest_node(destination_at)
        .await?
        .ok_or_else(no_nodes)?;

    if origin.id == destination.id {
        return Err(AppError::BadRequest {
            message: format!(
                "Origin and destination both resolve to node {}",
                origin.id
            ),
        });
    }

    // Nodes returned by a nearest search always have coordinates
    let (Some(from), Some(to)) = (origin.coordinate, destination.coordinate) else {
        return Err(AppError::Internal {
            message: "resolved node has no coordinate".to_string(),
        });
    };
    let summary = state.routing.distance_duration(from, to).await?;
    let rider_direct = rider_direct(summary);

    let request = MatchRequest {
        departure_time,
        flexibility_minutes: flexibility,
        origin: origin.id,
        destination: destination.id,
        rider_direct,
        origin_address: req.rider_origin_address,
        destination_address: req.rider_destination_address,
    };

    let request_id = state.next_request_id();
    info!(
        request_id,
        origin = %request.origin,
        destination = %request.destination,
        departure = %request.departure_time,
        flexibility,
        "Route match request"
    );

    let matcher = Matcher::new(state.store.as_ref(), state.routing.as_ref(), state.config.as_ref());
    let outcome = matcher.find_matches(&request).await;

    if let Some(audit) = &state.audit {
        audit.record(request_id, &request, &outcome).await;
    }

    let result = outcome?;
    let matching_route_options = result
        .chains
        .iter()
        .filter_map(|scored| RouteOption::new(request_type, scored, &rider_direct))
        .collect();

    Ok(Json(MatchRoutesResponse {
        matching_route_options,
    })
    .into_response())
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl From<RoutingError> for AppError {
    fn from(e: RoutingError) -> Self {
        AppError::Internal {
            message: format!("rider trip lookup failed: {e}"),
        }
    }
}

impl From<MatchError> for AppError {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::InvalidRequest(message) => AppError::BadRequest { message },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => {
                error!(%message, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
