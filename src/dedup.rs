//! Route deduplication.
//!
//! Three layers, cheapest first:
//! - [`ExactRouteSet`]: the ordered edge sequence; a repeat is a true duplicate
//! - [`EndpointIndex`]: unordered (start, far end) pair; only the longest
//!   route per pair survives
//! - [`remove_contained`]: drops routes whose edge set is a subset of a
//!   longer kept route's edge set (quadratic, run once per finished set)

use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;

use crate::engine::{RouteCandidate, RouteRecommendation};

/// Anything that can take part in containment deduplication.
pub trait RouteEdges {
    fn edge_set(&self) -> BTreeSet<u64>;
    fn length_km(&self) -> f64;
    /// Secondary ordering among equally long routes (higher kept first).
    fn rank(&self) -> f64 {
        0.0
    }
}

impl RouteEdges for RouteRecommendation {
    fn edge_set(&self) -> BTreeSet<u64> {
        RouteRecommendation::edge_set(self)
    }

    fn length_km(&self) -> f64 {
        self.recommended_distance_km
    }

    fn rank(&self) -> f64 {
        self.route_score
    }
}

impl RouteEdges for RouteCandidate {
    fn edge_set(&self) -> BTreeSet<u64> {
        RouteCandidate::edge_set(self)
    }

    fn length_km(&self) -> f64 {
        self.distance_km
    }
}

// ============================================================================
// Exact route hash
// ============================================================================

/// Set of ordered edge sequences already produced.
#[derive(Debug, Clone, Default)]
pub struct ExactRouteSet {
    seen: HashSet<Vec<u64>>,
}

impl ExactRouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, edges: &[u64]) -> bool {
        self.seen.contains(edges)
    }

    /// Record a sequence; returns `false` if it was already present.
    pub fn insert(&mut self, edges: &[u64]) -> bool {
        self.seen.insert(edges.to_vec())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// ============================================================================
// Endpoint hash
// ============================================================================

/// Outcome of offering a route to the [`EndpointIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointDecision {
    /// No route between these endpoints yet
    New,
    /// Longer than the stored route at this slot; replace it
    Replace(usize),
    /// Not longer than the stored route; drop the newcomer
    KeepExisting,
}

/// Longest accepted route per unordered endpoint pair.
#[derive(Debug, Clone, Default)]
pub struct EndpointIndex {
    best: HashMap<(u64, u64), (usize, f64)>,
}

impl EndpointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decide(&self, key: (u64, u64), length_km: f64) -> EndpointDecision {
        match self.best.get(&normalize(key)) {
            None => EndpointDecision::New,
            Some(&(slot, best)) if length_km > best => EndpointDecision::Replace(slot),
            Some(_) => EndpointDecision::KeepExisting,
        }
    }

    /// Record the route at `slot` as the best for `key`. Never lowers the
    /// recorded length.
    pub fn record(&mut self, key: (u64, u64), slot: usize, length_km: f64) {
        let entry = self.best.entry(normalize(key)).or_insert((slot, length_km));
        if length_km >= entry.1 {
            *entry = (slot, length_km);
        }
    }

    /// Best recorded length for a pair.
    pub fn best_length(&self, key: (u64, u64)) -> Option<f64> {
        self.best.get(&normalize(key)).map(|&(_, len)| len)
    }
}

fn normalize(key: (u64, u64)) -> (u64, u64) {
    (key.0.min(key.1), key.0.max(key.1))
}

// ============================================================================
// Containment
// ============================================================================

/// Drop every route whose edge set is a subset of a longer (or equally long
/// and better ranked) kept route. Survivors are returned longest first.
pub fn remove_contained<T: RouteEdges>(mut routes: Vec<T>) -> Vec<T> {
    if routes.len() < 2 {
        return routes;
    }
    routes.sort_by(|a, b| {
        b.length_km()
            .total_cmp(&a.length_km())
            .then_with(|| b.rank().total_cmp(&a.rank()))
    });

    let mut kept: Vec<(T, BTreeSet<u64>)> = Vec::with_capacity(routes.len());
    let mut removed = 0usize;
    for route in routes {
        let edges = route.edge_set();
        if kept.iter().any(|(_, k)| edges.is_subset(k)) {
            removed += 1;
            continue;
        }
        kept.push((route, edges));
    }
    if removed > 0 {
        debug!("[Dedup] Containment removed {} route(s)", removed);
    }
    kept.into_iter().map(|(route, _)| route).collect()
}
