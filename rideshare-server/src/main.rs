use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rideshare_server::audit::AuditLog;
use rideshare_server::cache::{CacheConfig, CachedRouting};
use rideshare_server::matching::MatchConfig;
use rideshare_server::repository::RouteStore;
use rideshare_server::routing::{OsrmClient, OsrmConfig};
use rideshare_server::waypoints::{DEFAULT_WAYPOINT_METERS, WaypointConfig, expand_store};
use rideshare_server::web::{AppState, create_router};

const DEFAULT_OSRM_URL: &str = "http://127.0.0.1:5000";

/// Report a startup failure and exit.
fn fail(message: impl std::fmt::Display) -> ! {
    error!("{message}");
    std::process::exit(1)
}

/// Read an optional environment variable, parsing it if present.
fn env_or<T: FromStr>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| fail(format!("{name} is invalid ({raw:?}): {e}"))),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rideshare_server=info,tower_http=info")),
        )
        .init();

    let seed = std::env::var("RIDESHARE_SEED")
        .map(PathBuf::from)
        .unwrap_or_else(|_| fail("RIDESHARE_SEED must name a route seed file"));
    let addr: SocketAddr = env_or("RIDESHARE_BIND", SocketAddr::from(([127, 0, 0, 1], 3000)));
    let osrm_url = env_or("RIDESHARE_OSRM_URL", DEFAULT_OSRM_URL.to_string());
    let waypoint_meters = env_or("RIDESHARE_WAYPOINT_METERS", DEFAULT_WAYPOINT_METERS);

    // Load nodes and driver routes
    let store = RouteStore::load(&seed)
        .await
        .unwrap_or_else(|e| fail(format!("Failed to load {}: {e}", seed.display())));
    info!(
        nodes = store.node_count().await,
        routes = store.route_count().await,
        seed = %seed.display(),
        "Loaded route data"
    );

    // Routing engine behind a shared distance table
    let osrm = OsrmClient::new(OsrmConfig::new(&osrm_url))
        .unwrap_or_else(|e| fail(format!("Failed to create OSRM client: {e}")));
    let routing = CachedRouting::new(osrm, &CacheConfig::default());

    // Offer nodes along flexible routes as pick-up points
    expand_store(&store, &routing, &WaypointConfig::new(waypoint_meters)).await;

    let mut state = AppState::new(store, routing, MatchConfig::default());
    if let Ok(dir) = std::env::var("RIDESHARE_AUDIT_DIR") {
        info!(dir = %dir, "Writing route match audit files");
        state = state.with_audit(AuditLog::new(dir));
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| fail(format!("Failed to bind {addr}: {e}")));
    info!(%addr, osrm = %osrm_url, "Rideshare route matcher listening");
    info!("  GET  /health              - Health check");
    info!("  POST /api/routes/match    - Match a rider trip");
    info!("  GET  /api/nodes/nearest   - Closest node to a coordinate");

    if let Err(e) = axum::serve(listener, app).await {
        fail(format!("Server error: {e}"));
    }
}
