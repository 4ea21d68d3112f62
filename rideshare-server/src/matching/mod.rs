//! Rider/driver route matching.
//!
//! Given a rider's origin, destination and departure window, finds chains of
//! up to three driver routes that carry the rider there, retimes legs that
//! board at waypoints, and ranks the chains by how closely they track the
//! rider's own direct trip.

mod classifier;
mod config;
mod engine;
mod retime;
mod scoring;
mod tree;

pub use classifier::{
    find_routes_passing_at_node, Classification, ClassifiedRoute, DirectEnrichment, PassingQuery,
};
pub use config::{MatchConfig, QosThresholds};
pub use engine::{MatchError, MatchRequest, MatchResult, Matcher};
pub use retime::{retime_leg, RetimeError};
pub use scoring::{LegScore, RiderDirect, ScoredChain};
