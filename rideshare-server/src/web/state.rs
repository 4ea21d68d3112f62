//! Application state for the web layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audit::AuditLog;
use crate::cache::CachedRouting;
use crate::matching::MatchConfig;
use crate::repository::RouteStore;
use crate::routing::OsrmClient;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
pub struct AppState<P = CachedRouting<OsrmClient>> {
    /// Nodes and driver routes
    pub store: Arc<RouteStore>,

    /// Driving distances for rider trips and retiming
    pub routing: Arc<P>,

    /// Matcher configuration
    pub config: Arc<MatchConfig>,

    /// Where to leave per-request audit files, if anywhere
    pub audit: Option<Arc<AuditLog>>,

    next_request_id: Arc<AtomicU64>,
}

// Derive would require `P: Clone`
impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            routing: self.routing.clone(),
            config: self.config.clone(),
            audit: self.audit.clone(),
            next_request_id: self.next_request_id.clone(),
        }
    }
}

impl<P> AppState<P> {
    /// Create a new app state.
    pub fn new(store: RouteStore, routing: P, config: MatchConfig) -> Self {
        Self {
            store: Arc::new(store),
            routing: Arc::new(routing),
            config: Arc::new(config),
            audit: None,
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(Arc::new(audit));
        self
    }

    /// Identifier for the next match request, unique for this process.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}
