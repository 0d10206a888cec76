//! # Route Generation Engine
//!
//! Searches a [`RoutingGraph`] for routes matching each [`RoutePattern`].
//!
//! For every pattern the engine walks the tolerance ladder from strict to
//! wide. At each level it asks the pattern's [`RouteStrategy`] for
//! candidates, gates them on the distance window, scores them and offers
//! them to a fresh [`RouteGenerationSession`] until the pattern's route
//! target is met. The finished set goes through containment deduplication.

mod candidate;
mod patterns;
mod session;
pub mod strategies;

pub use candidate::{RouteCandidate, RouteRecommendation};
pub use patterns::{RoutePattern, RouteShape, ToleranceLevel, DEFAULT_PATTERNS, DEFAULT_TOLERANCES};
pub use session::{OfferOutcome, RejectReason, RouteGenerationSession};
pub use strategies::{strategy_for, RouteStrategy};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::dedup::remove_contained;
use crate::error::{OracleError, Result, TrailRouteError};
use crate::oracle::{GraphOracle, NetworkGraph, NetworkOracle};
use crate::routing::RoutingGraph;
use crate::scoring::ScoringConfig;
use crate::spatial::{build_rtree, within_meters};
use crate::TrailPoint;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for route generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteGenerationConfig {
    /// Patterns to generate. Default: the built-in pattern set
    pub patterns: Vec<RoutePattern>,
    /// Tolerance ladder, strict first. Default: strict 10%, medium 20%, wide 35%
    pub tolerance_levels: Vec<ToleranceLevel>,
    /// Routes wanted per pattern. Default: 5
    pub target_routes_per_pattern: usize,
    /// K for K-shortest-path queries. Default: 5
    pub ksp_k: usize,
    /// Cap on entry points, 0 for no cap. Default: 50
    pub max_entry_points: usize,
    /// Trailhead coordinates. Empty means every connected node is an entry
    /// point. Default: empty
    pub trailheads: Vec<TrailPoint>,
    /// Radius in meters for snapping a trailhead to a node. Default: 100.0
    pub trailhead_snap_meters: f64,
    /// Candidate far ends tried per entry point. Default: 20
    pub max_destinations_per_entry: usize,
    /// Cycles requested per enumeration. Default: 500
    pub max_cycles: usize,
    /// One-way stem length of a lollipop as a fraction of the target.
    /// Default: 1/3
    pub lollipop_stem_fraction: f64,
    /// Targets at or above this distance (km) get wider tolerances.
    /// Default: 15.0
    pub long_route_threshold_km: f64,
    /// Multiplier applied to tolerance percentages of long targets.
    /// Default: 1.5
    pub long_route_tolerance_multiplier: f64,
    /// Candidates gathered per missing route before a level stops searching.
    /// Default: 10
    pub candidate_overfetch: usize,
    /// Reject a route starting closer than this (m) to an accepted route's
    /// start. 0 disables. Default: 0.0
    pub min_area_separation_meters: f64,
    /// Treat the elevation window as a hard gate. Off, only the distance
    /// window gates and elevation feeds the score. Default: false
    pub enforce_elevation_window: bool,
    /// Keep at most one route per shape and set of trails. Default: true
    pub unique_trail_combinations: bool,
    /// Shapes that may run. Default: all four
    pub strategies: Vec<RouteShape>,
    pub scoring: ScoringConfig,
}

impl Default for RouteGenerationConfig {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
            tolerance_levels: DEFAULT_TOLERANCES.clone(),
            target_routes_per_pattern: 5,
            ksp_k: 5,
            max_entry_points: 50,
            trailheads: Vec::new(),
            trailhead_snap_meters: 100.0,
            max_destinations_per_entry: 20,
            max_cycles: 500,
            lollipop_stem_fraction: 1.0 / 3.0,
            long_route_threshold_km: 15.0,
            long_route_tolerance_multiplier: 1.5,
            candidate_overfetch: 10,
            min_area_separation_meters: 0.0,
            enforce_elevation_window: false,
            unique_trail_combinations: true,
            strategies: RouteShape::ALL.to_vec(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl RouteGenerationConfig {
    /// Reject values no search can run with.
    pub fn validate(&self) -> Result<()> {
        if self.tolerance_levels.is_empty() {
            return Err(TrailRouteError::Config("no tolerance levels".to_string()));
        }
        if let Some(bad) = self
            .tolerance_levels
            .iter()
            .find(|t| t.distance_pct < 0.0 || t.elevation_pct < 0.0 || !(0.0..=1.0).contains(&t.quality))
        {
            return Err(TrailRouteError::Config(format!(
                "tolerance level '{}' has a negative band or quality outside 0..=1",
                bad.name
            )));
        }
        if let Some(bad) = self
            .patterns
            .iter()
            .find(|p| !(p.target_distance_km > 0.0) || p.target_elevation_gain < 0.0)
        {
            return Err(TrailRouteError::Config(format!(
                "pattern '{}' needs a positive distance and non-negative elevation",
                bad.name
            )));
        }
        if self.ksp_k == 0 {
            return Err(TrailRouteError::Config("ksp_k must be at least 1".to_string()));
        }
        if self.target_routes_per_pattern == 0 {
            return Err(TrailRouteError::Config(
                "target_routes_per_pattern must be at least 1".to_string(),
            ));
        }
        if self.candidate_overfetch == 0 {
            return Err(TrailRouteError::Config(
                "candidate_overfetch must be at least 1".to_string(),
            ));
        }
        if !(self.lollipop_stem_fraction > 0.0 && self.lollipop_stem_fraction < 0.5) {
            return Err(TrailRouteError::Config(
                "lollipop_stem_fraction must be between 0 and 0.5".to_string(),
            ));
        }
        if self.trailhead_snap_meters < 0.0
            || self.min_area_separation_meters < 0.0
            || self.long_route_tolerance_multiplier <= 0.0
        {
            return Err(TrailRouteError::Config(
                "distances and multipliers must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// The tolerance level actually applied to `pattern`.
    pub fn effective_tolerance(&self, level: &ToleranceLevel, pattern: &RoutePattern) -> ToleranceLevel {
        if pattern.target_distance_km >= self.long_route_threshold_km {
            level.scaled(self.long_route_tolerance_multiplier)
        } else {
            level.clone()
        }
    }
}

// ============================================================================
// Search Context
// ============================================================================

/// Everything a strategy needs for one (pattern, tolerance) search.
///
/// The candidate budget is shared by all workers; once it is spent,
/// strategies stop issuing new queries.
pub struct SearchContext<'a> {
    pub graph: &'a RoutingGraph,
    pub network: &'a NetworkGraph,
    pub oracle: &'a dyn GraphOracle,
    pub entry_points: &'a [u64],
    pub config: &'a RouteGenerationConfig,
    budget: AtomicUsize,
    failed_queries: AtomicUsize,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        graph: &'a RoutingGraph,
        network: &'a NetworkGraph,
        oracle: &'a dyn GraphOracle,
        entry_points: &'a [u64],
        config: &'a RouteGenerationConfig,
        budget: usize,
    ) -> Self {
        Self {
            graph,
            network,
            oracle,
            entry_points,
            config,
            budget: AtomicUsize::new(budget),
            failed_queries: AtomicUsize::new(0),
        }
    }

    pub fn budget_spent(&self) -> bool {
        self.budget.load(Ordering::Relaxed) == 0
    }

    /// Count `n` found candidates against the budget.
    pub fn spend(&self, n: usize) {
        let _ = self
            .budget
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |b| Some(b.saturating_sub(n)));
    }

    /// Log a failed oracle query and move on.
    pub fn record_failure(&self, query: &str, error: &OracleError) {
        self.failed_queries.fetch_add(1, Ordering::Relaxed);
        debug!("[Engine] {} failed: {}", query, error);
    }

    pub fn failed_queries(&self) -> usize {
        self.failed_queries.load(Ordering::Relaxed)
    }

    /// Whether trailheads restrict where routes may start.
    pub fn restricted_entries(&self) -> bool {
        !self.config.trailheads.is_empty()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome class of one pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    /// The route target was met
    Satisfied,
    /// Some routes, fewer than the target
    Partial,
    /// Nothing matched at any tolerance level
    NoRoutes,
}

/// Finalized, deduplicated routes for one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub pattern: RoutePattern,
    pub status: PatternStatus,
    /// Highest score first
    pub routes: Vec<RouteRecommendation>,
    /// Widest tolerance level that contributed a route
    pub tolerance_used: Option<String>,
    pub candidates_considered: usize,
    pub failed_queries: usize,
}

impl PatternResult {
    /// Fail when two kept routes share the same ordered edge sequence.
    pub fn check_distinct_routes(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.route_edges.as_slice()) {
                return Err(TrailRouteError::invariant(format!(
                    "pattern '{}' kept route {} twice",
                    self.pattern.name, route.route_name
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Generates scored routes over a built graph.
pub struct RouteGenerationEngine<'g> {
    graph: &'g RoutingGraph,
    network: NetworkGraph,
    oracle: Arc<dyn GraphOracle>,
    config: RouteGenerationConfig,
    entry_points: Vec<u64>,
}

impl<'g> RouteGenerationEngine<'g> {
    /// Create an engine using the default [`NetworkOracle`].
    pub fn new(graph: &'g RoutingGraph, config: RouteGenerationConfig) -> Self {
        Self::with_oracle(graph, config, Arc::new(NetworkOracle::default()))
    }

    pub fn with_oracle(
        graph: &'g RoutingGraph,
        config: RouteGenerationConfig,
        oracle: Arc<dyn GraphOracle>,
    ) -> Self {
        let network = graph.network();
        let entry_points = select_entry_points(graph, &config);
        info!(
            "[Engine] {} entry points over {} nodes / {} edges",
            entry_points.len(),
            graph.node_count(),
            graph.edge_count()
        );
        Self {
            graph,
            network,
            oracle,
            config,
            entry_points,
        }
    }

    pub fn config(&self) -> &RouteGenerationConfig {
        &self.config
    }

    pub fn entry_points(&self) -> &[u64] {
        &self.entry_points
    }

    /// Run every configured pattern.
    pub fn generate_all(&self) -> Vec<PatternResult> {
        self.config
            .patterns
            .iter()
            .map(|p| self.generate_pattern(p))
            .collect()
    }

    /// Search for one pattern, strict tolerance first.
    pub fn generate_pattern(&self, pattern: &RoutePattern) -> PatternResult {
        let target = self.config.target_routes_per_pattern;
        let mut session = RouteGenerationSession::new(
            self.config.unique_trail_combinations,
            self.config.min_area_separation_meters,
        );
        let mut tolerance_used = None;
        let mut candidates_considered = 0;
        let mut failed_queries = 0;

        if !self.config.strategies.contains(&pattern.shape) {
            warn!(
                "[Engine] Pattern '{}' skipped: {} strategy disabled",
                pattern.name, pattern.shape
            );
        } else if self.graph.is_empty() {
            debug!("[Engine] Pattern '{}' skipped: empty graph", pattern.name);
        } else {
            let strategy = strategy_for(pattern.shape);
            for level in &self.config.tolerance_levels {
                if session.len() >= target {
                    break;
                }
                let tolerance = self.config.effective_tolerance(level, pattern);
                let budget = (target - session.len()) * self.config.candidate_overfetch;
                let ctx = SearchContext::new(
                    self.graph,
                    &self.network,
                    self.oracle.as_ref(),
                    &self.entry_points,
                    &self.config,
                    budget,
                );

                let mut candidates = strategy.generate(&ctx, pattern, &tolerance);
                failed_queries += ctx.failed_queries();
                candidates_considered += candidates.len();
                candidates.sort_by(|a, b| {
                    let da = (a.distance_km - pattern.target_distance_km).abs();
                    let db = (b.distance_km - pattern.target_distance_km).abs();
                    da.total_cmp(&db).then_with(|| a.edge_ids().cmp(&b.edge_ids()))
                });

                let mut kept_here = 0;
                for candidate in candidates {
                    if session.len() >= target {
                        break;
                    }
                    if !self.passes_gates(&candidate, pattern, &tolerance) {
                        continue;
                    }
                    let start = self.graph.node(candidate.start_node).map(|n| n.position);
                    let route = RouteRecommendation::from_candidate(
                        candidate,
                        pattern,
                        &tolerance,
                        self.graph,
                        &self.config.scoring,
                    );
                    if session.offer(route, start).is_kept() {
                        kept_here += 1;
                    }
                }
                if kept_here > 0 {
                    tolerance_used = Some(tolerance.name.clone());
                }
                debug!(
                    "[Engine] '{}' @ {}: {} kept, {} total",
                    pattern.name,
                    tolerance.name,
                    kept_here,
                    session.len()
                );
            }
        }

        let mut routes = remove_contained(session.into_routes());
        debug_assert!(
            routes.iter().map(|r| &r.route_edges).collect::<HashSet<_>>().len() == routes.len(),
            "duplicate edge sequence kept for '{}'",
            pattern.name
        );
        routes.sort_by(|a, b| b.route_score.total_cmp(&a.route_score));

        let status = if routes.len() >= target {
            PatternStatus::Satisfied
        } else if routes.is_empty() {
            PatternStatus::NoRoutes
        } else {
            PatternStatus::Partial
        };
        info!(
            "[Engine] Pattern '{}' ({} {:.1} km): {} route(s), {:?}",
            pattern.name,
            pattern.shape,
            pattern.target_distance_km,
            routes.len(),
            status
        );

        PatternResult {
            pattern: pattern.clone(),
            status,
            routes,
            tolerance_used,
            candidates_considered,
            failed_queries,
        }
    }

    fn passes_gates(&self, candidate: &RouteCandidate, pattern: &RoutePattern, tolerance: &ToleranceLevel) -> bool {
        if candidate.steps.is_empty() || candidate.shape != pattern.shape {
            return false;
        }
        if !tolerance.accepts_distance(pattern.target_distance_km, candidate.distance_km) {
            return false;
        }
        !self.config.enforce_elevation_window
            || tolerance.accepts_elevation(pattern.target_elevation_gain, candidate.elevation_gain)
    }
}

/// Trailheads snapped to their nearest node, or every connected node with
/// dangling ends first. Capped by `max_entry_points`.
fn select_entry_points(graph: &RoutingGraph, config: &RouteGenerationConfig) -> Vec<u64> {
    let degrees = graph.degrees();
    let mut entries: Vec<u64> = if config.trailheads.is_empty() {
        let mut connected: Vec<(bool, u64)> = graph
            .nodes()
            .filter_map(|n| match degrees.get(&n.id).copied().unwrap_or(0) {
                0 => None,
                1 => Some((false, n.id)),
                _ => Some((true, n.id)),
            })
            .collect();
        connected.sort();
        connected.into_iter().map(|(_, id)| id).collect()
    } else {
        let ids: Vec<u64> = graph
            .nodes()
            .filter(|n| degrees.get(&n.id).copied().unwrap_or(0) > 0)
            .map(|n| n.id)
            .collect();
        let positions: Vec<TrailPoint> = ids
            .iter()
            .filter_map(|id| graph.node(*id).map(|n| n.position))
            .collect();
        let tree = build_rtree(&positions);
        let mut seen = HashSet::new();
        let mut snapped = Vec::new();
        for trailhead in &config.trailheads {
            match within_meters(&tree, trailhead, config.trailhead_snap_meters).first() {
                Some(&(idx, _)) => {
                    if seen.insert(ids[idx]) {
                        snapped.push(ids[idx]);
                    }
                }
                None => warn!(
                    "[Engine] Trailhead ({:.5}, {:.5}) has no node within {} m",
                    trailhead.lng, trailhead.lat, config.trailhead_snap_meters
                ),
            }
        }
        snapped
    };
    if config.max_entry_points > 0 {
        entries.truncate(config.max_entry_points);
    }
    entries
}
