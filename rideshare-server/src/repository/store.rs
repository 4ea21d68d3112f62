//! In-memory route store.
//!
//! Loads nodes and driver routes from a JSON seed file and serves them
//! through [`RouteRepository`]. Reads take a shared lock; the only writer is
//! waypoint expansion replacing a route's stop list.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::{
    Coordinate, DriverRoute, DriverRouteId, DriverRouteStop, Node, NodeId, RouteStatus,
    RouteTime, StopStatus, TimeWindow,
};
use crate::geometry::{Corridor, distance_meters};

use super::{RepositoryError, RouteRepository};

/// Top-level layout of a seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFile {
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub routes: Vec<SeedRoute>,
}

/// A driver route as written in a seed file. Stops refer to nodes by id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRoute {
    pub id: DriverRouteId,

    #[serde(default)]
    pub name: Option<String>,

    pub departure_time: RouteTime,

    #[serde(default = "default_capacity")]
    pub capacity: u32,

    #[serde(default)]
    pub max_wait: i64,

    #[serde(default = "default_fixed_route")]
    pub fixed_route: bool,

    #[serde(default)]
    pub departure_flexibility: i64,

    #[serde(default)]
    pub status: RouteStatus,

    pub stops: Vec<SeedStop>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedStop {
    pub node_id: NodeId,
    pub rank: u32,
    pub status: StopStatus,

    #[serde(default)]
    pub arrival_time: Option<RouteTime>,

    #[serde(default)]
    pub departure_time: Option<RouteTime>,

    #[serde(default)]
    pub cum_distance: f64,

    #[serde(default)]
    pub cum_time: f64,

    #[serde(default)]
    pub capacity: Option<u32>,

    #[serde(default)]
    pub capacity_used: u32,
}

fn default_capacity() -> u32 {
    1
}

fn default_fixed_route() -> bool {
    true
}

#[derive(Debug, Default)]
struct StoreData {
    /// Seed order; nearest-node ties resolve to the later node.
    nodes: Vec<Arc<Node>>,
    node_index: HashMap<NodeId, usize>,
    routes: BTreeMap<DriverRouteId, Arc<DriverRoute>>,
}

/// Shared in-memory store of nodes and routes.
#[derive(Debug, Clone, Default)]
pub struct RouteStore {
    data: Arc<RwLock<StoreData>>,
}

impl RouteStore {
    /// Build a store from already-constructed nodes and routes.
    ///
    /// # Errors
    ///
    /// Fails on duplicate ids, out-of-range node transit times, or a route
    /// stop whose node is not in `nodes`.
    pub fn new(nodes: Vec<Arc<Node>>, routes: Vec<DriverRoute>) -> Result<Self, RepositoryError> {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            node.validate()
                .map_err(|source| RepositoryError::InvalidNode {
                    node: node.id,
                    source,
                })?;
            if node_index.insert(node.id, idx).is_some() {
                return Err(RepositoryError::DuplicateNode(node.id));
            }
        }

        let mut by_id = BTreeMap::new();
        for route in routes {
            if let Some(stop) = route
                .stops()
                .iter()
                .find(|stop| !node_index.contains_key(&stop.node_id()))
            {
                return Err(RepositoryError::UnknownNode {
                    route: route.id,
                    node: stop.node_id(),
                });
            }
            let id = route.id;
            if by_id.insert(id, Arc::new(route)).is_some() {
                return Err(RepositoryError::DuplicateRoute(id));
            }
        }

        Ok(Self {
            data: Arc::new(RwLock::new(StoreData {
                nodes,
                node_index,
                routes: by_id,
            })),
        })
    }

    /// Build a store from parsed seed data.
    pub fn from_seed(seed: SeedFile) -> Result<Self, RepositoryError> {
        let mut nodes: HashMap<NodeId, Arc<Node>> = HashMap::with_capacity(seed.nodes.len());
        let mut ordered = Vec::with_capacity(seed.nodes.len());

        for node in seed.nodes {
            if let Some(c) = node.coordinate {
                Coordinate::new(c.latitude, c.longitude).map_err(|source| {
                    RepositoryError::InvalidCoordinate {
                        node: node.id,
                        source,
                    }
                })?;
            }
            let node = Arc::new(node);
            if nodes.insert(node.id, node.clone()).is_some() {
                return Err(RepositoryError::DuplicateNode(node.id));
            }
            ordered.push(node);
        }

        let routes = seed
            .routes
            .into_iter()
            .map(|route| build_route(route, &nodes))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(ordered, routes)
    }

    /// Parse seed JSON.
    pub fn from_json(json: &str) -> Result<Self, RepositoryError> {
        let seed: SeedFile = serde_json::from_str(json)?;
        Self::from_seed(seed)
    }

    /// Read and parse a seed file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RepositoryError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Snapshot of every route, in id order.
    pub async fn routes(&self) -> Vec<Arc<DriverRoute>> {
        self.data.read().await.routes.values().cloned().collect()
    }

    pub async fn node_count(&self) -> usize {
        self.data.read().await.nodes.len()
    }

    pub async fn route_count(&self) -> usize {
        self.data.read().await.routes.len()
    }

    /// Swap in a new version of an existing route.
    pub async fn replace_route(&self, route: DriverRoute) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;

        if let Some(stop) = route
            .stops()
            .iter()
            .find(|stop| !data.node_index.contains_key(&stop.node_id()))
        {
            return Err(RepositoryError::UnknownNode {
                route: route.id,
                node: stop.node_id(),
            });
        }

        match data.routes.get_mut(&route.id) {
            Some(slot) => {
                *slot = Arc::new(route);
                Ok(())
            }
            None => Err(RepositoryError::RouteNotFound(route.id)),
        }
    }
}

fn build_route(
    seed: SeedRoute,
    nodes: &HashMap<NodeId, Arc<Node>>,
) -> Result<DriverRoute, RepositoryError> {
    let stops = seed
        .stops
        .into_iter()
        .map(|stop| {
            let node = nodes
                .get(&stop.node_id)
                .cloned()
                .ok_or(RepositoryError::UnknownNode {
                    route: seed.id,
                    node: stop.node_id,
                })?;

            let mut built = DriverRouteStop::new(node, stop.rank, stop.status)
                .with_cumulative(stop.cum_distance, stop.cum_time);
            built.arrival_time = stop.arrival_time;
            built.departure_time = stop.departure_time;
            built.capacity = stop.capacity;
            built.capacity_used = stop.capacity_used;
            Ok(built)
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    let mut builder = DriverRoute::builder(seed.id, seed.departure_time)
        .capacity(seed.capacity)
        .max_wait(seed.max_wait)
        .fixed_route(seed.fixed_route)
        .departure_flexibility(seed.departure_flexibility)
        .status(seed.status);
    if let Some(name) = seed.name {
        builder = builder.name(name);
    }

    builder
        .build(stops)
        .map_err(|source| RepositoryError::InvalidRoute {
            route: seed.id,
            source,
        })
}

impl RouteRepository for RouteStore {
    async fn find_routes_touching_node(
        &self,
        node: NodeId,
        window: &TimeWindow,
        exclude: &HashSet<DriverRouteId>,
    ) -> Result<Vec<Arc<DriverRoute>>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .routes
            .values()
            .filter(|route| !exclude.contains(&route.id))
            .filter(|route| {
                route.stops().iter().any(|stop| {
                    stop.node_id() == node && stop.admits(window, route.departure_flexibility)
                })
            })
            .cloned()
            .collect())
    }

    async fn find_node(&self, id: NodeId) -> Result<Option<Arc<Node>>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data.node_index.get(&id).map(|&idx| data.nodes[idx].clone()))
    }

    async fn find_nodes_in_corridor(
        &self,
        corridor: &Corridor,
        excluded_descriptions: &[String],
    ) -> Result<Vec<Arc<Node>>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .nodes
            .iter()
            .filter(|node| node.coordinate.is_some_and(|c| corridor.contains(c)))
            .filter(|node| {
                node.description
                    .as_ref()
                    .is_none_or(|d| !excluded_descriptions.contains(d))
            })
            .cloned()
            .collect())
    }

    async fn nearest_node(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<(Arc<Node>, f64)>, RepositoryError> {
        let data = self.data.read().await;
        let mut best: Option<(&Arc<Node>, f64)> = None;

        for node in &data.nodes {
            let Some(position) = node.coordinate else {
                continue;
            };
            let distance = distance_meters(coordinate, position);
            if best.is_none_or(|(_, closest)| distance <= closest) {
                best = Some((node, distance));
            }
        }

        Ok(best.map(|(node, distance)| (node.clone(), distance)))
    }
}
