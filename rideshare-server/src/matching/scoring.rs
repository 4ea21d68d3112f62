//! Chain quality scoring, elimination and ranking.
//!
//! Each leg is compared with the rider's own direct trip. Chains that make
//! the rider travel too far or too long are rejected outright; the rest are
//! thinned by dominance and ordered by efficiency.

use std::cmp::Ordering;

use crate::domain::{RouteChain, RouteLeg};
use crate::geometry::round_to;

use super::classifier::DirectEnrichment;
use super::config::MatchConfig;

/// The rider's own door-to-door trip, used as the quality baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiderDirect {
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

/// Quality figures for one leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegScore {
    pub distance_quality: f64,
    pub duration_quality: f64,

    /// `1 / (distance_quality * duration_quality)`, higher is better.
    pub efficiency: f64,

    /// Driver's direct trip, for flexible routes only.
    pub direct: Option<DirectEnrichment>,
}

/// A chain that passed the quality thresholds.
#[derive(Debug, Clone)]
pub struct ScoredChain {
    pub chain: RouteChain,
    pub legs: Vec<LegScore>,

    /// Mean of the leg efficiencies.
    pub efficiency: f64,
}

/// Smallest quality product used as a divisor.
const MIN_QUALITY_PRODUCT: f64 = 0.01;

fn usable(quality: f64) -> bool {
    quality.is_finite() && quality >= 0.0
}

/// Quality ratios of one leg against the rider's direct trip.
pub fn leg_quality(leg: &RouteLeg, rider: &RiderDirect) -> (f64, f64) {
    let distance_quality = round_to(leg.distance_miles() / rider.distance_miles, 2);
    let duration_quality = round_to(leg.duration_minutes() as f64 / rider.duration_minutes, 2);
    (distance_quality, duration_quality)
}

/// Score a chain, or `None` if any leg exceeds its route's thresholds.
///
/// A leg with a negative or non-finite quality (a leg that goes backwards
/// along its route) never scores. `directs` holds the per-leg direct enrichment, aligned with the legs.
pub fn score_chain(
    chain: RouteChain,
    directs: &[Option<DirectEnrichment>],
    rider: &RiderDirect,
    config: &MatchConfig,
) -> Option<ScoredChain> {
    let mut legs = Vec::with_capacity(chain.leg_count());

    for (idx, leg) in chain.legs().iter().enumerate() {
        let (distance_quality, duration_quality) = leg_quality(leg, rider);
        if !(usable(distance_quality) && usable(duration_quality)) {
            return None;
        }
        let thresholds = config.thresholds(leg.route().fixed_route);
        if !thresholds.admits(distance_quality, duration_quality) {
            return None;
        }

        let product = (distance_quality * duration_quality).max(MIN_QUALITY_PRODUCT);
        legs.push(LegScore {
            distance_quality,
            duration_quality,
            efficiency: round_to(1.0 / product, 2),
            direct: directs.get(idx).copied().flatten(),
        });
    }

    let efficiency = round_to(
        legs.iter().map(|leg| leg.efficiency).sum::<f64>() / legs.len() as f64,
        2,
    );

    Some(ScoredChain {
        chain,
        legs,
        efficiency,
    })
}

/// Whether `a` makes `b` redundant.
///
/// Only chains boarding the same primary route at the same stop compete.
/// `a` must be no worse on distance, duration and leg count, and strictly
/// better on one of them.
fn dominates(a: &ScoredChain, b: &ScoredChain) -> bool {
    let (pa, pb) = (a.chain.primary(), b.chain.primary());
    if pa.route().id != pb.route().id || pa.boarding_rank() != pb.boarding_rank() {
        return false;
    }

    let (da, db) = (a.chain.total_distance_miles(), b.chain.total_distance_miles());
    let (ta, tb) = (a.chain.total_duration_minutes(), b.chain.total_duration_minutes());
    let (la, lb) = (a.chain.leg_count(), b.chain.leg_count());

    da <= db && ta <= tb && la <= lb && (da < db || ta < tb || la < lb)
}

/// Remove chains dominated by another chain over the same primary boarding.
pub fn remove_spurious(chains: Vec<ScoredChain>) -> Vec<ScoredChain> {
    if chains.len() <= 1 {
        return chains;
    }

    let mut result: Vec<ScoredChain> = Vec::with_capacity(chains.len());

    for chain in chains {
        if result.iter().any(|existing| dominates(existing, &chain)) {
            continue;
        }
        result.retain(|existing| !dominates(&chain, existing));
        result.push(chain);
    }

    result
}

/// Order chains best-first.
///
/// Chains are ranked by:
/// 1. Efficiency (higher is better)
/// 2. Arrival time (earlier is better)
/// 3. Number of legs (fewer is better)
/// 4. Route and rank sequence, for a stable order
pub fn rank_chains(mut chains: Vec<ScoredChain>) -> Vec<ScoredChain> {
    chains.sort_by(|a, b| {
        b.efficiency
            .total_cmp(&a.efficiency)
            .then_with(|| a.chain.arrival_time().cmp(&b.chain.arrival_time()))
            .then_with(|| a.chain.leg_count().cmp(&b.chain.leg_count()))
            .then_with(|| compare_keys(a, b))
    });
    chains
}

fn compare_keys(a: &ScoredChain, b: &ScoredChain) -> Ordering {
    a.chain.key().cmp(&b.chain.key())
}
