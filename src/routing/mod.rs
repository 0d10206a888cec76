//! # Routing Graph
//!
//! Turns trail segments into a routable network: one node per distinct
//! segment endpoint (deduplicated by a rounded coordinate key plus an optional
//! snap radius) and one edge per segment, weighted by length in kilometers.
//!
//! [`GapBridger`] runs afterwards to stitch dangling ends that digitizing left
//! a few meters apart.

mod bridging;

pub use bridging::{BridgeConfig, BridgeReport, GapBridger};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, info};
use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::collaborators::{ElevationSource, NoElevation};
use crate::error::{Result, TrailRouteError};
use crate::geo_utils::{coordinate_key, elevation_gain_loss, polyline_length_km};
use crate::oracle::{NetworkEdge, NetworkGraph};
use crate::spatial::{within_meters, IndexedPoint};
use crate::union_find::UnionFind;
use crate::{ElevationStats, TrailPoint, TrailSegment};

// ============================================================================
// Graph Types
// ============================================================================

/// Role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Touched by more than one trail, or a junction of three or more edges
    Intersection,
    /// End of a single trail
    Endpoint,
    /// Created by the gap bridger
    Bridge,
    /// Auxiliary mid-segment node, never referenced by edges
    Interior,
}

/// A point in the routable graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingNode {
    pub id: u64,
    /// Coordinate rounded to the graph's precision
    pub position: TrailPoint,
    pub node_type: NodeType,
    /// Parent trail ids touching this node
    pub trail_ids: BTreeSet<u64>,
}

impl RoutingNode {
    pub fn elevation(&self) -> Option<f64> {
        self.position.elevation
    }
}

/// An undirected arc between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEdge {
    pub id: u64,
    pub source: u64,
    pub target: u64,
    /// Parent trail id, `None` for bridge edges
    pub trail_id: Option<u64>,
    /// External id of the segment this edge was built from
    pub segment_id: String,
    pub trail_name: String,
    pub length_km: f64,
    /// Gain walking source -> target, meters
    pub elevation_gain: f64,
    /// Loss walking source -> target, meters
    pub elevation_loss: f64,
    /// Coordinates from source to target
    pub geometry: Vec<TrailPoint>,
    pub is_bridge: bool,
}

impl RoutingEdge {
    /// The node at the other end of the edge from `node`.
    pub fn other_end(&self, node: u64) -> Option<u64> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }

    /// Gain and loss when walked starting at `from`.
    pub fn elevation_from(&self, from: u64) -> (f64, f64) {
        if from == self.target && from != self.source {
            (self.elevation_loss, self.elevation_gain)
        } else {
            (self.elevation_gain, self.elevation_loss)
        }
    }

    /// Geometry oriented to start at `from`.
    pub fn geometry_from(&self, from: u64) -> Vec<TrailPoint> {
        if from == self.target && from != self.source {
            self.geometry.iter().rev().copied().collect()
        } else {
            self.geometry.clone()
        }
    }
}

/// Summary of a built graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub bridge_node_count: usize,
    pub bridge_edge_count: usize,
    pub auxiliary_node_count: usize,
    /// Nodes with exactly one incident edge
    pub dangling_node_count: usize,
    pub component_count: usize,
    pub largest_component_nodes: usize,
    pub total_length_km: f64,
}

/// The routable network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingGraph {
    nodes: BTreeMap<u64, RoutingNode>,
    edges: BTreeMap<u64, RoutingEdge>,
    auxiliary_nodes: Vec<RoutingNode>,
    next_node_id: u64,
    next_edge_id: u64,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self {
            next_node_id: 1,
            next_edge_id: 1,
            ..Self::default()
        }
    }

    pub fn node(&self, id: u64) -> Option<&RoutingNode> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: u64) -> Option<&RoutingEdge> {
        self.edges.get(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &RoutingNode> {
        self.nodes.values()
    }

    /// Edges in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = &RoutingEdge> {
        self.edges.values()
    }

    pub fn auxiliary_nodes(&self) -> &[RoutingNode] {
        &self.auxiliary_nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges touching a node.
    pub fn incident_edges(&self, node: u64) -> Vec<&RoutingEdge> {
        self.edges
            .values()
            .filter(|e| e.source == node || e.target == node)
            .collect()
    }

    /// Number of edges touching each node.
    pub fn degrees(&self) -> HashMap<u64, usize> {
        let mut degrees: HashMap<u64, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for e in self.edges.values() {
            *degrees.entry(e.source).or_default() += 1;
            *degrees.entry(e.target).or_default() += 1;
        }
        degrees
    }

    pub fn degree(&self, node: u64) -> usize {
        self.incident_edges(node).len()
    }

    /// Incident edge ids per node, in edge id order. One pass over the edges;
    /// reflects the graph at the time of the call.
    pub fn incidence(&self) -> HashMap<u64, Vec<u64>> {
        let mut incidence: HashMap<u64, Vec<u64>> = HashMap::with_capacity(self.nodes.len());
        for e in self.edges.values() {
            incidence.entry(e.source).or_default().push(e.id);
            incidence.entry(e.target).or_default().push(e.id);
        }
        incidence
    }

    /// Add a node and return its id.
    pub fn add_node(&mut self, position: TrailPoint, node_type: NodeType, trail_ids: BTreeSet<u64>) -> u64 {
        let id = self.take_node_id();
        self.nodes.insert(
            id,
            RoutingNode {
                id,
                position,
                node_type,
                trail_ids,
            },
        );
        id
    }

    fn take_node_id(&mut self) -> u64 {
        if self.next_node_id == 0 {
            self.next_node_id = 1;
        }
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// Add an edge, assigning its id. Fails on self-loops, unknown endpoints
    /// and non-positive lengths.
    pub fn add_edge(&mut self, mut edge: RoutingEdge) -> Result<u64> {
        check_edge(&edge, &self.nodes)?;
        if self.next_edge_id == 0 {
            self.next_edge_id = 1;
        }
        edge.id = self.next_edge_id;
        self.next_edge_id += 1;
        let id = edge.id;
        self.edges.insert(id, edge);
        Ok(id)
    }

    fn add_auxiliary(&mut self, position: TrailPoint, trail_id: Option<u64>) {
        let id = self.take_node_id();
        self.auxiliary_nodes.push(RoutingNode {
            id,
            position,
            node_type: NodeType::Interior,
            trail_ids: trail_id.into_iter().collect(),
        });
    }

    fn set_node_type(&mut self, id: u64, node_type: NodeType) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.node_type = node_type;
        }
    }

    /// Check the graph invariants: every edge joins two distinct existing
    /// nodes and has a positive length.
    pub fn validate(&self) -> Result<()> {
        for edge in self.edges.values() {
            check_edge(edge, &self.nodes)?;
        }
        for aux in &self.auxiliary_nodes {
            if self.nodes.contains_key(&aux.id) {
                return Err(TrailRouteError::invariant(format!(
                    "auxiliary node {} shares an id with a network node",
                    aux.id
                )));
            }
        }
        Ok(())
    }

    /// Weighted network for a graph oracle (cost = length in km).
    pub fn network(&self) -> NetworkGraph {
        let mut network = NetworkGraph::undirected();
        for node in self.nodes.values() {
            network.add_node(node.id, node.position);
        }
        for edge in self.edges.values() {
            network.add_edge(NetworkEdge {
                id: edge.id,
                source: edge.source,
                target: edge.target,
                cost: edge.length_km,
            });
        }
        network
    }

    pub fn stats(&self) -> GraphStats {
        let degrees = self.degrees();
        let mut uf: UnionFind<u64> = UnionFind::with_capacity(self.nodes.len());
        for &id in self.nodes.keys() {
            uf.make_set(id);
        }
        for e in self.edges.values() {
            uf.union(&e.source, &e.target);
        }
        let largest = uf.groups().values().map(Vec::len).max().unwrap_or(0);

        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            bridge_node_count: self
                .nodes
                .values()
                .filter(|n| n.node_type == NodeType::Bridge)
                .count(),
            bridge_edge_count: self.edges.values().filter(|e| e.is_bridge).count(),
            auxiliary_node_count: self.auxiliary_nodes.len(),
            dangling_node_count: degrees.values().filter(|&&d| d == 1).count(),
            component_count: uf.component_count(),
            largest_component_nodes: largest,
            total_length_km: self.edges.values().map(|e| e.length_km).sum(),
        }
    }
}

fn check_edge(edge: &RoutingEdge, nodes: &BTreeMap<u64, RoutingNode>) -> Result<()> {
    if edge.source == edge.target {
        return Err(TrailRouteError::invariant(format!(
            "edge {} ({}) is a self-loop on node {}",
            edge.id, edge.segment_id, edge.source
        )));
    }
    if !nodes.contains_key(&edge.source) || !nodes.contains_key(&edge.target) {
        return Err(TrailRouteError::invariant(format!(
            "edge {} ({}) references a missing node",
            edge.id, edge.segment_id
        )));
    }
    if !(edge.length_km > 0.0 && edge.length_km.is_finite()) {
        return Err(TrailRouteError::invariant(format!(
            "edge {} ({}) has non-positive length {}",
            edge.id, edge.segment_id, edge.length_km
        )));
    }
    Ok(())
}

// ============================================================================
// Builder
// ============================================================================

/// Configuration for graph construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Decimal places of the node dedup key. Default: 7 (about 1 cm)
    pub coordinate_precision: u32,
    /// Endpoints within this many meters of an existing node reuse it.
    /// 0 disables snapping. Default: 3.0
    pub node_snap_tolerance_meters: f64,
    /// Place an auxiliary interior node every N coordinates of each edge.
    /// 0 disables. Default: 0
    pub interior_node_stride: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            coordinate_precision: 7,
            node_snap_tolerance_meters: 3.0,
            interior_node_stride: 0,
        }
    }
}

/// Builds a [`RoutingGraph`] from trail segments.
#[derive(Clone)]
pub struct RoutingGraphBuilder {
    config: GraphConfig,
    elevation: Arc<dyn ElevationSource>,
}

/// Node lookup state used while building.
struct NodeIndex {
    by_key: HashMap<(i64, i64), u64>,
    tree: RTree<IndexedPoint>,
    precision: u32,
    snap_meters: f64,
}

impl NodeIndex {
    fn lookup(&self, point: &TrailPoint, exclude: Option<u64>) -> Option<u64> {
        if let Some(&id) = self.by_key.get(&coordinate_key(point, self.precision)) {
            return Some(id);
        }
        if self.snap_meters <= 0.0 {
            return None;
        }
        within_meters(&self.tree, point, self.snap_meters)
            .into_iter()
            .map(|(idx, _)| idx as u64)
            .find(|&id| Some(id) != exclude)
    }

    fn insert(&mut self, id: u64, point: &TrailPoint) {
        self.by_key.insert(coordinate_key(point, self.precision), id);
        self.tree.insert(IndexedPoint::new(id as usize, point));
    }
}

impl RoutingGraphBuilder {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            elevation: Arc::new(NoElevation),
        }
    }

    /// Use `source` for elevation where segments carry none.
    pub fn with_elevation_source(mut self, source: Arc<dyn ElevationSource>) -> Self {
        self.elevation = source;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Build the graph. A segment with unusable geometry fails the build.
    pub fn build(&self, segments: &[TrailSegment]) -> Result<RoutingGraph> {
        let mut graph = RoutingGraph::new();
        let mut index = NodeIndex {
            by_key: HashMap::new(),
            tree: RTree::new(),
            precision: self.config.coordinate_precision,
            snap_meters: self.config.node_snap_tolerance_meters,
        };

        for segment in segments {
            check_segment(segment)?;
            let first = segment.geometry[0];
            let last = segment.geometry[segment.geometry.len() - 1];

            let start = self.obtain_node(&mut graph, &mut index, &first, segment.trail_id, None);
            let end = self.obtain_node(&mut graph, &mut index, &last, segment.trail_id, Some(start));

            if start != end {
                self.push_edge(&mut graph, segment, start, end, segment.geometry.clone(), 1.0)?;
                continue;
            }

            // Closed loop: route it through an extra node at the middle.
            let mid = segment.geometry.len() / 2;
            if segment.geometry.len() < 3 {
                return Err(TrailRouteError::invalid_geometry(
                    &segment.external_id,
                    format!("both ends collapse to node {}", start),
                ));
            }
            let mid_node = self.obtain_node(
                &mut graph,
                &mut index,
                &segment.geometry[mid],
                segment.trail_id,
                Some(start),
            );
            if mid_node == start {
                return Err(TrailRouteError::invalid_geometry(
                    &segment.external_id,
                    "closed loop collapses to a single node",
                ));
            }
            let total = polyline_length_km(&segment.geometry);
            let head = segment.geometry[..=mid].to_vec();
            let tail = segment.geometry[mid..].to_vec();
            let head_share = if total > 0.0 {
                polyline_length_km(&head) / total
            } else {
                0.5
            };
            self.push_edge(&mut graph, segment, start, mid_node, head, head_share)?;
            self.push_edge(&mut graph, segment, mid_node, end, tail, 1.0 - head_share)?;
        }

        classify_nodes(&mut graph);

        if self.config.interior_node_stride > 0 {
            let stride = self.config.interior_node_stride;
            let placements: Vec<(TrailPoint, Option<u64>)> = graph
                .edges()
                .flat_map(|e| {
                    e.geometry
                        .iter()
                        .enumerate()
                        .skip(stride)
                        .step_by(stride)
                        .filter(|(i, _)| *i + 1 < e.geometry.len())
                        .map(|(_, p)| (*p, e.trail_id))
                        .collect::<Vec<_>>()
                })
                .collect();
            for (point, trail_id) in placements {
                graph.add_auxiliary(point, trail_id);
            }
        }

        info!(
            "[Graph] Built {} nodes, {} edges from {} segments ({} auxiliary nodes)",
            graph.node_count(),
            graph.edge_count(),
            segments.len(),
            graph.auxiliary_nodes.len()
        );
        Ok(graph)
    }

    fn obtain_node(
        &self,
        graph: &mut RoutingGraph,
        index: &mut NodeIndex,
        point: &TrailPoint,
        trail_id: u64,
        exclude: Option<u64>,
    ) -> u64 {
        if let Some(id) = index.lookup(point, exclude) {
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.trail_ids.insert(trail_id);
            }
            return id;
        }

        let factor = 10f64.powi(self.config.coordinate_precision as i32);
        let elevation = point
            .elevation
            .or_else(|| self.elevation.elevation_at(point.lng, point.lat));
        let position = TrailPoint {
            lng: (point.lng * factor).round() / factor,
            lat: (point.lat * factor).round() / factor,
            elevation,
        };
        let id = graph.add_node(position, NodeType::Endpoint, BTreeSet::from([trail_id]));
        index.insert(id, point);
        debug!("[Graph] Node {} at ({:.7}, {:.7})", id, position.lng, position.lat);
        id
    }

    fn push_edge(
        &self,
        graph: &mut RoutingGraph,
        segment: &TrailSegment,
        source: u64,
        target: u64,
        geometry: Vec<TrailPoint>,
        share: f64,
    ) -> Result<u64> {
        let (elevation_gain, elevation_loss) =
            self.edge_elevation(&geometry, segment.elevation.as_ref(), share);
        graph.add_edge(RoutingEdge {
            id: 0,
            source,
            target,
            trail_id: Some(segment.trail_id),
            segment_id: segment.external_id.clone(),
            trail_name: segment.name.clone(),
            length_km: polyline_length_km(&geometry),
            elevation_gain,
            elevation_loss,
            geometry,
            is_bridge: false,
        })
    }

    /// Segment statistics first, then per-vertex elevation, then the
    /// elevation source sampled at each vertex; flat if all are absent.
    fn edge_elevation(
        &self,
        geometry: &[TrailPoint],
        stats: Option<&ElevationStats>,
        share: f64,
    ) -> (f64, f64) {
        if let Some(s) = stats {
            if share >= 1.0 {
                return (s.gain, s.loss);
            }
        }
        if let Some(gain_loss) = elevation_gain_loss(geometry) {
            return gain_loss;
        }
        if let Some(s) = stats {
            return (s.gain * share, s.loss * share);
        }
        let sampled: Vec<TrailPoint> = geometry
            .iter()
            .filter_map(|p| {
                self.elevation
                    .elevation_at(p.lng, p.lat)
                    .map(|e| TrailPoint::with_elevation(p.lng, p.lat, e))
            })
            .collect();
        elevation_gain_loss(&sampled).unwrap_or((0.0, 0.0))
    }
}

fn check_segment(segment: &TrailSegment) -> Result<()> {
    if segment.geometry.len() < 2 {
        return Err(TrailRouteError::invalid_geometry(
            &segment.external_id,
            format!("segment has {} coordinate(s)", segment.geometry.len()),
        ));
    }
    if let Some(bad) = segment.geometry.iter().find(|p| !p.is_valid()) {
        return Err(TrailRouteError::invalid_geometry(
            &segment.external_id,
            format!("invalid coordinate ({}, {})", bad.lng, bad.lat),
        ));
    }
    Ok(())
}

fn classify_nodes(graph: &mut RoutingGraph) {
    let degrees = graph.degrees();
    let updates: Vec<(u64, NodeType)> = graph
        .nodes()
        .filter(|n| n.node_type != NodeType::Bridge)
        .map(|n| {
            let degree = degrees.get(&n.id).copied().unwrap_or(0);
            let node_type = if n.trail_ids.len() > 1 || degree >= 3 {
                NodeType::Intersection
            } else {
                NodeType::Endpoint
            };
            (n.id, node_type)
        })
        .collect();
    for (id, node_type) in updates {
        graph.set_node_type(id, node_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(trail_id: u64, index: u32, points: &[(f64, f64)]) -> TrailSegment {
        let geometry: Vec<TrailPoint> = points.iter().map(|&(lng, lat)| TrailPoint::new(lng, lat)).collect();
        TrailSegment {
            trail_id,
            segment_index: index,
            external_id: format!("s{}-{}", trail_id, index),
            parent_external_id: format!("s{}", trail_id),
            name: format!("Trail {}", trail_id),
            length_km: polyline_length_km(&geometry),
            geometry,
            elevation: None,
            tags: Default::default(),
        }
    }

    fn plus_sign() -> Vec<TrailSegment> {
        vec![
            segment(1, 1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)]),
            segment(1, 2, &[(0.002, 0.0), (0.003, 0.0), (0.004, 0.0)]),
            segment(2, 1, &[(0.002, -0.002), (0.002, -0.001), (0.002, 0.0)]),
            segment(2, 2, &[(0.002, 0.0), (0.002, 0.001), (0.002, 0.002)]),
        ]
    }

    #[test]
    fn test_shared_endpoints_collapse_to_one_node() {
        let graph = RoutingGraphBuilder::new(GraphConfig::default())
            .build(&plus_sign())
            .unwrap();
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);

        let center = graph.nodes().find(|n| graph.degree(n.id) == 4).unwrap();
        assert_eq!(center.node_type, NodeType::Intersection);
        assert_eq!(center.trail_ids.len(), 2);
        assert_eq!(
            graph.nodes().filter(|n| n.node_type == NodeType::Endpoint).count(),
            4
        );
        graph.validate().unwrap();
    }

    #[test]
    fn test_incidence_matches_degrees() {
        let graph = RoutingGraphBuilder::new(GraphConfig::default())
            .build(&plus_sign())
            .unwrap();
        let incidence = graph.incidence();
        let degrees = graph.degrees();
        for node in graph.nodes() {
            let ids = incidence.get(&node.id).map(Vec::as_slice).unwrap_or(&[]);
            assert_eq!(ids.len(), degrees[&node.id]);
            for id in ids {
                let edge = graph.edge(*id).unwrap();
                assert!(edge.source == node.id || edge.target == node.id);
            }
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = RoutingGraphBuilder::new(GraphConfig::default());
        let first = builder.build(&plus_sign()).unwrap();
        let second = builder.build(&plus_sign()).unwrap();
        assert_eq!(first.node_count(), second.node_count());
        assert_eq!(first.edge_count(), second.edge_count());
    }

    #[test]
    fn test_nearby_endpoints_snap() {
        // Second segment starts about 1.1 m from where the first ends
        let segments = vec![
            segment(1, 1, &[(0.0, 0.0), (0.001, 0.0)]),
            segment(2, 1, &[(0.00101, 0.0), (0.002, 0.0)]),
        ];
        let snapped = RoutingGraphBuilder::new(GraphConfig::default())
            .build(&segments)
            .unwrap();
        assert_eq!(snapped.node_count(), 3);

        let exact = RoutingGraphBuilder::new(GraphConfig {
            node_snap_tolerance_meters: 0.0,
            ..GraphConfig::default()
        })
        .build(&segments)
        .unwrap();
        assert_eq!(exact.node_count(), 4);
    }

    #[test]
    fn test_closed_loop_split_through_middle_node() {
        let segments = vec![segment(
            3,
            1,
            &[(0.0, 0.0), (0.001, 0.0), (0.001, 0.001), (0.0, 0.001), (0.0, 0.0)],
        )];
        let graph = RoutingGraphBuilder::new(GraphConfig::default())
            .build(&segments)
            .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.edges().all(|e| e.source != e.target));
        graph.validate().unwrap();
    }

    #[test]
    fn test_collapsed_segment_fails_build() {
        // Both ends round to the same 7-decimal key
        let segments = vec![segment(3, 1, &[(0.0, 0.0), (0.000_000_01, 0.0)])];
        let result = RoutingGraphBuilder::new(GraphConfig::default()).build(&segments);
        match result {
            Err(TrailRouteError::InvalidGeometry { trail_id, .. }) => assert_eq!(trail_id, "s3-1"),
            other => panic!("expected InvalidGeometry, got {:?}", other),
        }
    }

    #[test]
    fn test_collapsed_loop_fails_build() {
        let segments = vec![segment(
            4,
            1,
            &[(0.0, 0.0), (0.000_000_02, 0.0), (0.000_000_01, 0.0), (0.0, 0.0)],
        )];
        let result = RoutingGraphBuilder::new(GraphConfig::default()).build(&segments);
        assert!(matches!(result, Err(TrailRouteError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_invalid_segment_geometry_is_fatal() {
        let segments = vec![segment(1, 1, &[(0.0, 0.0)])];
        let result = RoutingGraphBuilder::new(GraphConfig::default()).build(&segments);
        assert!(matches!(result, Err(TrailRouteError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_edge_elevation_falls_back_to_source() {
        let segments = vec![segment(1, 1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)])];
        let ramp = |lng: f64, _lat: f64| Some(lng * 100_000.0);
        let graph = RoutingGraphBuilder::new(GraphConfig::default())
            .with_elevation_source(Arc::new(ramp))
            .build(&segments)
            .unwrap();
        let edge = graph.edges().next().unwrap();
        assert!((edge.elevation_gain - 200.0).abs() < 1e-6);
        assert_eq!(edge.elevation_loss, 0.0);
        assert_eq!(edge.elevation_from(edge.target), (0.0, edge.elevation_gain));
    }

    #[test]
    fn test_interior_nodes_are_auxiliary() {
        let segments = vec![segment(
            1,
            1,
            &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0), (0.003, 0.0), (0.004, 0.0)],
        )];
        let graph = RoutingGraphBuilder::new(GraphConfig {
            interior_node_stride: 2,
            ..GraphConfig::default()
        })
        .build(&segments)
        .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.auxiliary_nodes().len(), 1);
        assert_eq!(graph.auxiliary_nodes()[0].node_type, NodeType::Interior);
        assert_eq!(graph.stats().auxiliary_node_count, 1);
        graph.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_self_loop() {
        let mut graph = RoutingGraph::new();
        let a = graph.add_node(TrailPoint::new(0.0, 0.0), NodeType::Endpoint, BTreeSet::new());
        let result = graph.add_edge(RoutingEdge {
            id: 0,
            source: a,
            target: a,
            trail_id: Some(1),
            segment_id: "loop".to_string(),
            trail_name: "Loop".to_string(),
            length_km: 1.0,
            elevation_gain: 0.0,
            elevation_loss: 0.0,
            geometry: vec![],
            is_bridge: false,
        });
        assert!(matches!(result, Err(TrailRouteError::InvariantViolation(_))));
    }
}
