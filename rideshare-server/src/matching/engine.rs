//! Multi-hop rider/driver matching.
//!
//! Answers "which driver routes, ridden in sequence, take a rider from this
//! node to that node, leaving around this time?"
//!
//! The search is a bounded breadth-first expansion:
//!
//! 1. Routes boarding at the rider's origin within the flexibility window
//!    are primaries.
//! 2. At every onward stop of a primary, routes boarding there shortly after
//!    the driver arrives are secondaries; the same again one level deeper
//!    gives tertiaries. A route never appears twice at different depths.
//! 3. Branches that never reach the destination are pruned and each
//!    surviving root-to-node path becomes a candidate chain.
//! 4. Legs boarding at waypoints are retimed, chains are scored against the
//!    rider's direct trip, dominated chains are dropped and the rest ranked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::classifier::{
    find_routes_passing_at_node, Classification, ClassifiedRoute, DirectEnrichment, PassingQuery,
};
use super::config::MatchConfig;
use super::retime::retime_leg;
use super::scoring::{rank_chains, remove_spurious, score_chain, RiderDirect, ScoredChain};
use super::tree;
use crate::domain::{
    DriverRoute, DriverRouteId, NodeId, RouteChain, RouteLeg, RouteTime, TimeWindow, MAX_LEGS,
    MAX_OFFSET_MINUTES,
};
use crate::geometry::{meters_to_miles, round_to, seconds_to_minutes};
use crate::repository::{RepositoryError, RouteRepository};
use crate::routing::RoutingProvider;

/// Error from route matching.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid match request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("route matching timed out")]
    Timeout,
}

/// A rider's trip request, resolved to nodes.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub departure_time: RouteTime,

    /// How long after `departure_time` the rider is willing to leave (minutes).
    pub flexibility_minutes: i64,

    pub origin: NodeId,
    pub destination: NodeId,

    /// The rider's own driving trip, used for quality scoring.
    pub rider_direct: RiderDirect,

    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
}

impl MatchRequest {
    /// Validate the request before any search runs.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !(0..=MAX_OFFSET_MINUTES).contains(&self.flexibility_minutes) {
            return Err(MatchError::InvalidRequest(format!(
                "departure flexibility must be between 0 and {MAX_OFFSET_MINUTES} minutes"
            )));
        }

        if self.origin == self.destination {
            return Err(MatchError::InvalidRequest(
                "origin and destination are the same node".to_string(),
            ));
        }

        let RiderDirect {
            distance_miles,
            duration_minutes,
        } = self.rider_direct;
        if !(distance_miles.is_finite() && distance_miles > 0.0)
            || !(duration_minutes.is_finite() && duration_minutes > 0.0)
        {
            return Err(MatchError::InvalidRequest(
                "rider direct distance and duration must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Result of route matching.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Matching chains, best-first.
    pub chains: Vec<ScoredChain>,

    /// Number of classified routes in the search tree before pruning.
    pub routes_explored: usize,
}

impl MatchResult {
    pub fn empty() -> Self {
        Self {
            chains: Vec::new(),
            routes_explored: 0,
        }
    }
}

/// One leg of a flattened search path, before retiming.
#[derive(Debug, Clone)]
struct Candidate {
    route: Arc<DriverRoute>,
    boarding_rank: u32,
    alighting_rank: u32,
    direct: Option<DirectEnrichment>,
}

/// Multi-hop route matcher.
pub struct Matcher<'a, R: RouteRepository, P: RoutingProvider> {
    repository: &'a R,
    routing: &'a P,
    config: &'a MatchConfig,
}

impl<'a, R: RouteRepository, P: RoutingProvider> Matcher<'a, R, P> {
    pub fn new(repository: &'a R, routing: &'a P, config: &'a MatchConfig) -> Self {
        Self {
            repository,
            routing,
            config,
        }
    }

    /// Find route chains serving the request, within the configured deadline.
    pub async fn find_matches(&self, request: &MatchRequest) -> Result<MatchResult, MatchError> {
        request.validate()?;

        match tokio::time::timeout(self.config.deadline(), self.search(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    origin = %request.origin,
                    destination = %request.destination,
                    deadline_secs = self.config.deadline_secs,
                    "Route matching exceeded deadline"
                );
                Err(MatchError::Timeout)
            }
        }
    }

    async fn search(&self, request: &MatchRequest) -> Result<MatchResult, MatchError> {
        let primary_query = PassingQuery {
            window: TimeWindow::starting_at(request.departure_time, request.flexibility_minutes),
            node: request.origin,
            dwell_minutes: 0,
            destination: request.destination,
            classification: Classification::Primary,
            reached_from_rank: None,
        };

        let mut roots =
            find_routes_passing_at_node(self.repository, &primary_query, &HashSet::new()).await?;

        if roots.is_empty() {
            info!(
                origin = %request.origin,
                departure = %request.departure_time,
                "No primary routes at origin"
            );
            return Ok(MatchResult::empty());
        }

        let mut used_route_ids: HashSet<DriverRouteId> =
            roots.iter().map(|node| node.route.id).collect();

        let mut classification = Classification::Primary;
        for depth in 0..MAX_LEGS - 1 {
            let Some(next) = classification.next() else {
                break;
            };

            let parents = nodes_at_depth(&mut roots, depth);
            let found = self
                .attach_children(parents, next, request, used_route_ids.clone())
                .await;
            used_route_ids.extend(found);

            classification = next;
        }

        let routes_explored = tree::count(&roots);
        let mut roots = tree::prune(roots);
        self.enrich(&mut roots).await;

        let candidates = candidate_chains(&roots);
        debug!(
            routes_explored,
            candidates = candidates.len(),
            "Search tree flattened"
        );

        let mut chains = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(self.batch_size()) {
            let built = join_all(batch.iter().map(|legs| self.build_chain(legs))).await;
            chains.extend(built.into_iter().flatten());
        }

        let scored: Vec<ScoredChain> = chains
            .into_iter()
            .filter_map(|(chain, directs)| {
                score_chain(chain, &directs, &request.rider_direct, self.config)
            })
            .collect();
        let scored_count = scored.len();

        let mut ranked = rank_chains(remove_spurious(scored));
        ranked.truncate(self.config.max_results);

        info!(
            origin = %request.origin,
            destination = %request.destination,
            routes_explored,
            passed_quality = scored_count,
            returned = ranked.len(),
            "Route matching complete"
        );

        Ok(MatchResult {
            chains: ranked,
            routes_explored,
        })
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Search every transfer stop of `parents` and attach what boards there.
    ///
    /// Returns the ids of the routes found.
    async fn attach_children(
        &self,
        mut parents: Vec<&mut ClassifiedRoute>,
        classification: Classification,
        request: &MatchRequest,
        excluded: HashSet<DriverRouteId>,
    ) -> HashSet<DriverRouteId> {
        let queries: Vec<(usize, PassingQuery)> = parents
            .iter()
            .enumerate()
            .flat_map(|(idx, parent)| {
                parent
                    .transfer_stops(request.destination)
                    .filter_map(|stop| {
                        let arrival = stop.arrival_time?;
                        Some((
                            idx,
                            PassingQuery {
                                window: TimeWindow::starting_at(arrival, request.flexibility_minutes),
                                node: stop.node_id(),
                                dwell_minutes: stop.node.rider_transit_time,
                                destination: request.destination,
                                classification,
                                reached_from_rank: Some(stop.rank),
                            },
                        ))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut children: Vec<Vec<ClassifiedRoute>> = vec![Vec::new(); parents.len()];
        let excluded = &excluded;

        for batch in queries.chunks(self.batch_size()) {
            let futures = batch.iter().map(|(idx, query)| async move {
                let result = find_routes_passing_at_node(self.repository, query, excluded).await;
                (*idx, query, result)
            });

            for (idx, query, result) in join_all(futures).await {
                match result {
                    Ok(found) => children[idx].extend(found),
                    Err(e) => {
                        warn!(
                            node = %query.node,
                            classification = %classification,
                            error = %e,
                            "Dropping branch after failed search"
                        );
                    }
                }
            }
        }

        let mut found = HashSet::new();
        for (parent, kids) in parents.iter_mut().zip(children) {
            found.extend(kids.iter().map(|kid| kid.route.id));
            parent.children = kids;
        }

        debug!(
            classification = %classification,
            queries = queries.len(),
            routes = found.len(),
            "Search level complete"
        );

        found
    }

    /// Attach the driver's direct trip to every flexible route in the tree.
    ///
    /// Failed lookups leave the enrichment absent.
    async fn enrich(&self, roots: &mut [ClassifiedRoute]) {
        let mut flexible: HashMap<DriverRouteId, Arc<DriverRoute>> = HashMap::new();
        visit(roots, &mut |node| {
            if !node.route.fixed_route {
                flexible.entry(node.route.id).or_insert_with(|| node.route.clone());
            }
        });
        if flexible.is_empty() {
            return;
        }

        let routes: Vec<Arc<DriverRoute>> = flexible.into_values().collect();
        let mut directs: HashMap<DriverRouteId, DirectEnrichment> = HashMap::new();

        for batch in routes.chunks(self.batch_size()) {
            let results = join_all(batch.iter().map(|route| async move {
                (route.id, self.direct_trip(route).await)
            }))
            .await;
            directs.extend(
                results
                    .into_iter()
                    .filter_map(|(id, direct)| direct.map(|d| (id, d))),
            );
        }

        visit_mut(roots, &mut |node| {
            node.direct = directs.get(&node.route.id).copied();
        });
    }

    async fn direct_trip(&self, route: &DriverRoute) -> Option<DirectEnrichment> {
        let from = route.first_stop().node.coordinate?;
        let to = route.last_stop().node.coordinate?;

        match self.routing.distance_duration(from, to).await {
            Ok(summary) => Some(DirectEnrichment {
                distance_miles: round_to(meters_to_miles(summary.distance_meters), 2),
                duration_minutes: round_to(seconds_to_minutes(summary.duration_seconds), 2),
            }),
            Err(e) => {
                warn!(route = %route.id, error = %e, "Driver direct trip unavailable");
                None
            }
        }
    }

    /// Retime and validate one candidate; `None` drops it.
    async fn build_chain(
        &self,
        candidates: &[Candidate],
    ) -> Option<(RouteChain, Vec<Option<DirectEnrichment>>)> {
        let mut legs = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let route = &candidate.route;
            let stops = route
                .stops_between(candidate.boarding_rank, candidate.alighting_rank)
                .to_vec();

            let stops = match retime_leg(route, stops, self.routing).await {
                Ok(stops) => stops,
                Err(e) => {
                    warn!(route = %route.id, error = %e, "Dropping chain with unreachable leg");
                    return None;
                }
            };

            match RouteLeg::new(route.clone(), stops) {
                Ok(leg) => legs.push(leg),
                Err(e) => {
                    debug!(route = %route.id, error = %e, "Dropping chain with invalid leg");
                    return None;
                }
            }
        }

        match RouteChain::new(legs) {
            Ok(chain) => Some((chain, candidates.iter().map(|c| c.direct).collect())),
            Err(e) => {
                debug!(error = %e, "Dropping disconnected chain");
                None
            }
        }
    }
}

/// Mutable references to every node `depth` levels below the roots.
fn nodes_at_depth(nodes: &mut [ClassifiedRoute], depth: usize) -> Vec<&mut ClassifiedRoute> {
    if depth == 0 {
        return nodes.iter_mut().collect();
    }
    nodes
        .iter_mut()
        .flat_map(|node| nodes_at_depth(&mut node.children, depth - 1))
        .collect()
}

fn visit(nodes: &[ClassifiedRoute], f: &mut impl FnMut(&ClassifiedRoute)) {
    for node in nodes {
        f(node);
        visit(&node.children, f);
    }
}

fn visit_mut(nodes: &mut [ClassifiedRoute], f: &mut impl FnMut(&mut ClassifiedRoute)) {
    for node in nodes {
        f(node);
        visit_mut(&mut node.children, f);
    }
}

/// Flatten the pruned tree into candidate chains.
///
/// Each leg but the last alights where the next one was reached; the last
/// alights at the destination. Candidates are sorted and de-duplicated by
/// their (route, boarding rank) sequence.
fn candidate_chains(roots: &[ClassifiedRoute]) -> Vec<Vec<Candidate>> {
    let mut candidates: Vec<Vec<Candidate>> = tree::flatten(roots)
        .into_iter()
        .filter_map(|path| {
            path.iter()
                .enumerate()
                .map(|(idx, node)| {
                    let alighting_rank = match path.get(idx + 1) {
                        Some(next) => next.reached_from_rank?,
                        None => node.alighting_rank?,
                    };
                    Some(Candidate {
                        route: node.route.clone(),
                        boarding_rank: node.boarding_rank(),
                        alighting_rank,
                        direct: node.direct,
                    })
                })
                .collect::<Option<Vec<_>>>()
        })
        .collect();

    candidates.sort_by_key(|legs| boarding_key(legs));
    candidates.dedup_by_key(|legs| boarding_key(legs));
    candidates
}

fn boarding_key(legs: &[Candidate]) -> Vec<(DriverRouteId, u32)> {
    legs.iter()
        .map(|leg| (leg.route.id, leg.boarding_rank))
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
