//! Route candidates produced by strategies and the recommendations built
//! from them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patterns::{RoutePattern, RouteShape, ToleranceLevel};
use crate::oracle::PathStep;
use crate::routing::RoutingGraph;
use crate::scoring::{route_name, score_route, similarity, ScoringConfig};
use crate::TrailPoint;

/// A raw route found by a strategy, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub shape: RouteShape,
    /// Full traversal, return legs included
    pub steps: Vec<PathStep>,
    pub start_node: u64,
    pub end_node: u64,
    /// Unordered (start, far end) pair for endpoint deduplication
    pub endpoint_key: Option<(u64, u64)>,
    pub distance_km: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    /// Distinct parent trail ids in traversal order
    pub trail_ids: Vec<u64>,
    /// Distinct trail names in traversal order
    pub trail_names: Vec<String>,
}

impl RouteCandidate {
    /// Build a candidate from a walk over `graph`, summing length and
    /// direction-aware elevation. Returns `None` for an empty walk or one
    /// that references unknown edges.
    pub fn from_steps(graph: &RoutingGraph, shape: RouteShape, steps: Vec<PathStep>) -> Option<Self> {
        let start_node = steps.first()?.from;
        let end_node = steps.last()?.to;
        let mut distance_km = 0.0;
        let mut elevation_gain = 0.0;
        let mut elevation_loss = 0.0;
        let mut trail_ids: Vec<u64> = Vec::new();
        let mut trail_names: Vec<String> = Vec::new();

        for step in &steps {
            let edge = graph.edge(step.edge_id)?;
            distance_km += edge.length_km;
            let (gain, loss) = edge.elevation_from(step.from);
            elevation_gain += gain;
            elevation_loss += loss;
            if let Some(trail_id) = edge.trail_id {
                if !trail_ids.contains(&trail_id) {
                    trail_ids.push(trail_id);
                }
                if !trail_names.contains(&edge.trail_name) {
                    trail_names.push(edge.trail_name.clone());
                }
            }
        }

        let endpoint_key = match shape {
            RouteShape::PointToPoint => Some(ordered_pair(start_node, end_node)),
            _ => None,
        };

        Some(Self {
            shape,
            steps,
            start_node,
            end_node,
            endpoint_key,
            distance_km,
            elevation_gain,
            elevation_loss,
            trail_ids,
            trail_names,
        })
    }

    /// Set the (start, far end) pair used for endpoint deduplication.
    pub fn with_endpoints(mut self, start: u64, far_end: u64) -> Self {
        self.endpoint_key = Some(ordered_pair(start, far_end));
        self
    }

    pub fn edge_ids(&self) -> Vec<u64> {
        self.steps.iter().map(|s| s.edge_id).collect()
    }

    pub fn edge_set(&self) -> BTreeSet<u64> {
        self.steps.iter().map(|s| s.edge_id).collect()
    }
}

pub(crate) fn ordered_pair(a: u64, b: u64) -> (u64, u64) {
    (a.min(b), a.max(b))
}

/// A scored, named route ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecommendation {
    pub id: Uuid,
    pub route_name: String,
    pub route_shape: RouteShape,
    pub pattern_name: String,
    pub target_distance_km: f64,
    pub target_elevation_gain: f64,
    pub recommended_distance_km: f64,
    pub recommended_elevation_gain: f64,
    pub elevation_loss: f64,
    /// Ordered traversal
    pub route_path: Vec<PathStep>,
    /// Ordered edge ids of the traversal
    pub route_edges: Vec<u64>,
    pub trail_count: usize,
    pub trail_ids: Vec<u64>,
    pub trail_names: Vec<String>,
    pub start_node: u64,
    pub end_node: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_key: Option<(u64, u64)>,
    /// Composite score, 0..=100
    pub route_score: f64,
    /// Closeness to the pattern, 0..=1
    pub similarity_score: f64,
    pub tolerance_level: String,
    /// One line per traversed edge, oriented in walking direction
    pub geometry: Vec<Vec<TrailPoint>>,
}

impl RouteRecommendation {
    pub fn from_candidate(
        candidate: RouteCandidate,
        pattern: &RoutePattern,
        tolerance: &ToleranceLevel,
        graph: &RoutingGraph,
        scoring: &ScoringConfig,
    ) -> Self {
        let geometry = candidate
            .steps
            .iter()
            .filter_map(|s| graph.edge(s.edge_id).map(|e| e.geometry_from(s.from)))
            .collect();
        let route_score = score_route(&candidate, pattern, tolerance, scoring);
        let similarity_score = similarity(&candidate, pattern);
        let route_edges = candidate.edge_ids();

        Self {
            id: Uuid::new_v4(),
            route_name: route_name(&candidate.trail_names, candidate.shape),
            route_shape: candidate.shape,
            pattern_name: pattern.name.clone(),
            target_distance_km: pattern.target_distance_km,
            target_elevation_gain: pattern.target_elevation_gain,
            recommended_distance_km: candidate.distance_km,
            recommended_elevation_gain: candidate.elevation_gain,
            elevation_loss: candidate.elevation_loss,
            route_path: candidate.steps,
            route_edges,
            trail_count: candidate.trail_ids.len(),
            trail_ids: candidate.trail_ids,
            trail_names: candidate.trail_names,
            start_node: candidate.start_node,
            end_node: candidate.end_node,
            endpoint_key: candidate.endpoint_key,
            route_score,
            similarity_score,
            tolerance_level: tolerance.name.clone(),
            geometry,
        }
    }

    pub fn edge_set(&self) -> BTreeSet<u64> {
        self.route_edges.iter().copied().collect()
    }
}
