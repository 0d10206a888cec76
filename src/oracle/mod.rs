//! # Geometry and Graph Oracles
//!
//! The pipeline never does topology math or path search inline. Everything
//! goes through two interfaces:
//!
//! - [`GeometryOracle`]: line intersection, distance, nearest point on a line,
//!   substring and merge of linestrings.
//! - [`GraphOracle`]: shortest path, K shortest paths, single-source distances,
//!   connected components and cycle enumeration over a [`NetworkGraph`].
//!
//! [`GeoOracle`] and [`NetworkOracle`] are the default implementations; tests
//! and callers may swap in their own (for example a database-backed oracle).

mod geometry;
mod graph;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::TrailPoint;

pub use geometry::GeoOracle;
pub use graph::{NetworkOracle, DEFAULT_STEP_LIMIT};

// ============================================================================
// Oracle Interfaces
// ============================================================================

/// Geometry queries over trail linestrings.
pub trait GeometryOracle: Send + Sync {
    /// All points where `a` crosses or touches `b`.
    fn intersection_points(
        &self,
        a: &[TrailPoint],
        b: &[TrailPoint],
    ) -> Result<Vec<TrailPoint>, OracleError>;

    /// First point where `a` crosses `b`, if any.
    fn intersect(&self, a: &[TrailPoint], b: &[TrailPoint]) -> Result<Option<TrailPoint>, OracleError> {
        Ok(self.intersection_points(a, b)?.into_iter().next())
    }

    /// Points where a line crosses itself (non-adjacent parts only).
    fn self_intersections(&self, line: &[TrailPoint]) -> Result<Vec<TrailPoint>, OracleError>;

    /// Distance between two points in meters.
    fn distance(&self, a: &TrailPoint, b: &TrailPoint) -> f64;

    /// The point on `line` closest to `point`.
    fn nearest_point_on_line(
        &self,
        point: &TrailPoint,
        line: &[TrailPoint],
    ) -> Result<TrailPoint, OracleError>;

    /// The part of `line` between two length fractions (0..=1).
    fn substring(
        &self,
        line: &[TrailPoint],
        start_fraction: f64,
        end_fraction: f64,
    ) -> Result<Vec<TrailPoint>, OracleError>;

    /// Join end-to-end lines into one, reversing pieces where needed.
    fn merge(&self, lines: &[Vec<TrailPoint>]) -> Result<Vec<TrailPoint>, OracleError>;
}

/// Path queries over a weighted network.
pub trait GraphOracle: Send + Sync {
    /// Lowest-cost path between two nodes, `None` if unreachable.
    fn shortest_path(
        &self,
        graph: &NetworkGraph,
        from: u64,
        to: u64,
    ) -> Result<Option<Path>, OracleError>;

    /// Up to `k` distinct loopless paths in ascending cost order.
    fn k_shortest_paths(
        &self,
        graph: &NetworkGraph,
        from: u64,
        to: u64,
        k: usize,
    ) -> Result<Vec<Path>, OracleError>;

    /// Network distance from `from` to every node reachable within `max_cost`.
    fn shortest_distances(
        &self,
        graph: &NetworkGraph,
        from: u64,
        max_cost: f64,
    ) -> Result<HashMap<u64, f64>, OracleError>;

    /// Component id for every node. Ids are dense and ordered by the smallest
    /// node id in each component.
    fn connected_components(&self, graph: &NetworkGraph) -> BTreeMap<u64, usize>;

    /// Simple cycles with total cost at most `max_cost`, at most `max_results`
    /// of them.
    fn enumerate_cycles(
        &self,
        graph: &NetworkGraph,
        max_results: usize,
        max_cost: f64,
    ) -> Result<Vec<Cycle>, OracleError>;
}

// ============================================================================
// Paths
// ============================================================================

/// One traversed edge of a [`Path`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub edge_id: u64,
    pub from: u64,
    pub to: u64,
    pub cost: f64,
}

/// A path through the network: node sequence plus the edges between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<u64>,
    pub steps: Vec<PathStep>,
    pub cost: f64,
}

/// A closed path whose first and last node coincide.
pub type Cycle = Path;

impl Path {
    /// Build a path from its steps. Returns `None` for an empty or
    /// discontinuous step list.
    pub fn from_steps(steps: Vec<PathStep>) -> Option<Self> {
        let first = steps.first()?;
        let mut nodes = Vec::with_capacity(steps.len() + 1);
        nodes.push(first.from);
        for step in &steps {
            if *nodes.last()? != step.from {
                return None;
            }
            nodes.push(step.to);
        }
        let cost = steps.iter().map(|s| s.cost).sum();
        Some(Self { nodes, steps, cost })
    }

    pub fn start(&self) -> Option<u64> {
        self.nodes.first().copied()
    }

    pub fn end(&self) -> Option<u64> {
        self.nodes.last().copied()
    }

    pub fn edge_ids(&self) -> Vec<u64> {
        self.steps.iter().map(|s| s.edge_id).collect()
    }

    pub fn is_closed(&self) -> bool {
        !self.steps.is_empty() && self.start() == self.end()
    }

    /// Rotate a closed path so it starts and ends at `node`.
    pub fn rotated_to(&self, node: u64) -> Option<Self> {
        if !self.is_closed() {
            return None;
        }
        let offset = self.steps.iter().position(|s| s.from == node)?;
        let mut steps = self.steps[offset..].to_vec();
        steps.extend_from_slice(&self.steps[..offset]);
        Path::from_steps(steps)
    }

    /// The same path walked in the opposite direction.
    pub fn reversed(&self) -> Self {
        let steps: Vec<PathStep> = self
            .steps
            .iter()
            .rev()
            .map(|s| PathStep {
                edge_id: s.edge_id,
                from: s.to,
                to: s.from,
                cost: s.cost,
            })
            .collect();
        let mut nodes = self.nodes.clone();
        nodes.reverse();
        Self {
            nodes,
            steps,
            cost: self.cost,
        }
    }
}

// ============================================================================
// Network Graph
// ============================================================================

/// An edge of a [`NetworkGraph`]: (id, source, target, cost).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub id: u64,
    pub source: u64,
    pub target: u64,
    pub cost: f64,
}

/// An outgoing connection stored in a node's adjacency list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjacent {
    pub edge_id: u64,
    pub to: u64,
    pub cost: f64,
}

/// Weighted graph handed to a [`GraphOracle`].
///
/// Nodes carry a position (used as the A* heuristic) and an adjacency list.
/// Undirected graphs store every edge in both endpoint lists.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    nodes: BTreeMap<u64, (TrailPoint, Vec<Adjacent>)>,
    edges: BTreeMap<u64, NetworkEdge>,
    directed: bool,
}

impl NetworkGraph {
    /// Create an empty undirected graph.
    pub fn undirected() -> Self {
        Self::default()
    }

    /// Create an empty directed graph.
    pub fn directed() -> Self {
        Self {
            directed: true,
            ..Self::default()
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Creates or repositions a node. Existing adjacency is preserved.
    pub fn add_node(&mut self, id: u64, position: TrailPoint) {
        self.nodes
            .entry(id)
            .and_modify(|(p, _)| *p = position)
            .or_insert((position, Vec::new()));
    }

    /// Adds an edge. Both endpoints must already exist; edges referring to
    /// unknown nodes are ignored and `false` is returned.
    pub fn add_edge(&mut self, edge: NetworkEdge) -> bool {
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            return false;
        }
        if let Some((_, adjacency)) = self.nodes.get_mut(&edge.source) {
            adjacency.push(Adjacent {
                edge_id: edge.id,
                to: edge.target,
                cost: edge.cost,
            });
        }
        if !self.directed && edge.source != edge.target {
            if let Some((_, adjacency)) = self.nodes.get_mut(&edge.target) {
                adjacency.push(Adjacent {
                    edge_id: edge.id,
                    to: edge.source,
                    cost: edge.cost,
                });
            }
        }
        self.edges.insert(edge.id, edge);
        true
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = &NetworkEdge> {
        self.edges.values()
    }

    pub fn edge(&self, id: u64) -> Option<&NetworkEdge> {
        self.edges.get(&id)
    }

    pub fn position(&self, id: u64) -> Option<TrailPoint> {
        self.nodes.get(&id).map(|(p, _)| *p)
    }

    /// Outgoing connections of a node (empty for unknown nodes).
    pub fn neighbors(&self, id: u64) -> &[Adjacent] {
        self.nodes
            .get(&id)
            .map(|(_, adjacency)| adjacency.as_slice())
            .unwrap_or_default()
    }

    pub fn degree(&self, id: u64) -> usize {
        self.neighbors(id).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(edge_id: u64, from: u64, to: u64, cost: f64) -> PathStep {
        PathStep {
            edge_id,
            from,
            to,
            cost,
        }
    }

    #[test]
    fn test_path_from_steps_rejects_gaps() {
        let path = Path::from_steps(vec![step(1, 1, 2, 1.0), step(2, 2, 3, 2.0)]).unwrap();
        assert_eq!(path.nodes, vec![1, 2, 3]);
        assert_eq!(path.cost, 3.0);
        assert!(Path::from_steps(vec![step(1, 1, 2, 1.0), step(2, 5, 3, 2.0)]).is_none());
        assert!(Path::from_steps(vec![]).is_none());
    }

    #[test]
    fn test_rotate_and_reverse_cycle() {
        let cycle = Path::from_steps(vec![
            step(1, 1, 2, 1.0),
            step(2, 2, 3, 1.0),
            step(3, 3, 1, 1.0),
        ])
        .unwrap();
        let rotated = cycle.rotated_to(3).unwrap();
        assert_eq!(rotated.nodes, vec![3, 1, 2, 3]);
        assert_eq!(rotated.edge_ids(), vec![3, 1, 2]);

        let reversed = cycle.reversed();
        assert_eq!(reversed.nodes, vec![1, 3, 2, 1]);
        assert_eq!(reversed.steps[0].from, 1);
        assert_eq!(reversed.steps[0].to, 3);
    }

    #[test]
    fn test_undirected_graph_adjacency() {
        let mut g = NetworkGraph::undirected();
        g.add_node(1, TrailPoint::new(0.0, 0.0));
        g.add_node(2, TrailPoint::new(0.0, 0.01));
        assert!(g.add_edge(NetworkEdge {
            id: 10,
            source: 1,
            target: 2,
            cost: 1.1
        }));
        assert!(!g.add_edge(NetworkEdge {
            id: 11,
            source: 1,
            target: 99,
            cost: 1.0
        }));
        assert_eq!(g.degree(1), 1);
        assert_eq!(g.degree(2), 1);
        assert_eq!(g.neighbors(2)[0].to, 1);
        assert_eq!(g.edge_count(), 1);
    }
}
