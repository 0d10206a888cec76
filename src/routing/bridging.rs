//! Gap bridging: connect dangling trail ends that stop just short of each
//! other.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{NodeType, RoutingEdge, RoutingGraph};
use crate::error::Result;
use crate::geo_utils::{elevation_gain_loss, haversine_distance, polyline_length_km};
use crate::oracle::{GeoOracle, GeometryOracle};
use crate::spatial::{build_rtree, within_meters};
use crate::TrailPoint;

/// Connector points closer than this to their neighbor are folded away.
const MIN_CONNECTOR_METERS: f64 = 0.5;

/// Configuration for gap bridging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Run the bridger at all. Default: true
    pub enabled: bool,
    /// Maximum gap in meters between two dangling nodes, and maximum length
    /// of any connector edge. Default: 20.0
    pub tolerance_meters: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_meters: 20.0,
        }
    }
}

/// What one bridging pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeReport {
    pub dangling_nodes: usize,
    pub pairs_considered: usize,
    pub pairs_bridged: usize,
    pub nodes_added: usize,
    pub edges_added: usize,
}

/// Materializes short connector edges between nearly-touching dangling
/// nodes.
#[derive(Clone)]
pub struct GapBridger {
    config: BridgeConfig,
    oracle: Arc<dyn GeometryOracle>,
}

impl GapBridger {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_oracle(config, Arc::new(GeoOracle))
    }

    pub fn with_oracle(config: BridgeConfig, oracle: Arc<dyn GeometryOracle>) -> Self {
        Self { config, oracle }
    }

    /// Bridge every eligible pair of degree-1 nodes. Pairs are taken nearest
    /// first and each node is bridged at most once, so running the bridger
    /// again on its own output adds nothing.
    pub fn bridge(&self, graph: &mut RoutingGraph) -> Result<BridgeReport> {
        let mut report = BridgeReport::default();
        if !self.config.enabled || self.config.tolerance_meters <= 0.0 {
            return Ok(report);
        }
        let tolerance = self.config.tolerance_meters;

        let degrees = graph.degrees();
        let mut dangling: Vec<(u64, TrailPoint)> = graph
            .nodes()
            .filter(|n| degrees.get(&n.id).copied() == Some(1))
            .map(|n| (n.id, n.position))
            .collect();
        dangling.sort_by_key(|(id, _)| *id);
        report.dangling_nodes = dangling.len();

        let positions: Vec<TrailPoint> = dangling.iter().map(|(_, p)| *p).collect();
        let tree = build_rtree(&positions);
        // Dangling nodes are bridged at most once, so their incident edges
        // stay as captured here for the whole pass.
        let incidence = graph.incidence();

        let mut pairs: Vec<(f64, u64, u64)> = Vec::new();
        for (i, (id, position)) in dangling.iter().enumerate() {
            for (j, d) in within_meters(&tree, position, tolerance) {
                if j <= i {
                    continue;
                }
                let other = dangling[j].0;
                if joined(graph, &incidence, *id, other) {
                    continue;
                }
                pairs.push((d, *id, other));
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        report.pairs_considered = pairs.len();

        let mut used: BTreeSet<u64> = BTreeSet::new();
        for (gap, a, b) in pairs {
            if used.contains(&a) || used.contains(&b) {
                continue;
            }
            let chain = self.connector_chain(graph, &incidence, a, b);
            let (nodes_added, edges_added) = self.materialize(graph, a, b, &chain)?;
            debug!(
                "[Bridge] Bridged {} <-> {} across {:.1} m with {} connector(s)",
                a, b, gap, edges_added
            );
            used.insert(a);
            used.insert(b);
            report.pairs_bridged += 1;
            report.nodes_added += nodes_added;
            report.edges_added += edges_added;
        }

        info!(
            "[Bridge] {} dangling nodes, bridged {} of {} candidate pairs ({} edges added)",
            report.dangling_nodes, report.pairs_bridged, report.pairs_considered, report.edges_added
        );
        Ok(report)
    }

    /// Waypoints from node `a` to node `b`: a's position, the point on a's
    /// edge nearest b, the point on b's edge nearest a, b's position.
    /// Falls back to the straight `a -> b` jump when a hop would exceed the
    /// tolerance.
    fn connector_chain(
        &self,
        graph: &RoutingGraph,
        incidence: &HashMap<u64, Vec<u64>>,
        a: u64,
        b: u64,
    ) -> Vec<TrailPoint> {
        let (Some(node_a), Some(node_b)) = (graph.node(a), graph.node(b)) else {
            return Vec::new();
        };
        let pa = node_a.position;
        let pb = node_b.position;
        let direct = vec![pa, pb];

        let near_on_a = self.nearest_on_incident(graph, incidence, a, &pb);
        let near_on_b = self.nearest_on_incident(graph, incidence, b, &pa);

        let mut chain = vec![pa];
        for p in [near_on_a, near_on_b].into_iter().flatten().chain(std::iter::once(pb)) {
            let last = chain[chain.len() - 1];
            if haversine_distance(&last, &p) >= MIN_CONNECTOR_METERS {
                chain.push(p);
            }
        }
        // The last kept point must be b itself.
        if chain.len() < 2 || haversine_distance(&chain[chain.len() - 1], &pb) > 0.0 {
            return direct;
        }
        let within = chain
            .windows(2)
            .all(|w| haversine_distance(&w[0], &w[1]) <= self.config.tolerance_meters);
        if within {
            chain
        } else {
            direct
        }
    }

    fn nearest_on_incident(
        &self,
        graph: &RoutingGraph,
        incidence: &HashMap<u64, Vec<u64>>,
        node: u64,
        target: &TrailPoint,
    ) -> Option<TrailPoint> {
        let edge = incidence.get(&node)?.first().and_then(|id| graph.edge(*id))?;
        match self.oracle.nearest_point_on_line(target, &edge.geometry) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!("[Bridge] Nearest-point query on edge {} failed: {}", edge.id, e);
                None
            }
        }
    }

    fn materialize(
        &self,
        graph: &mut RoutingGraph,
        a: u64,
        b: u64,
        chain: &[TrailPoint],
    ) -> Result<(usize, usize)> {
        if chain.len() < 2 {
            return Ok((0, 0));
        }
        let mut node_ids = vec![a];
        let mut nodes_added = 0;
        for p in &chain[1..chain.len() - 1] {
            node_ids.push(graph.add_node(*p, NodeType::Bridge, BTreeSet::new()));
            nodes_added += 1;
        }
        node_ids.push(b);

        let mut edges_added = 0;
        for (w, ids) in chain.windows(2).zip(node_ids.windows(2)) {
            let geometry = w.to_vec();
            let (elevation_gain, elevation_loss) = elevation_gain_loss(&geometry).unwrap_or((0.0, 0.0));
            graph.add_edge(RoutingEdge {
                id: 0,
                source: ids[0],
                target: ids[1],
                trail_id: None,
                segment_id: format!("bridge-{}-{}", a, b),
                trail_name: "Connector".to_string(),
                length_km: polyline_length_km(&geometry),
                elevation_gain,
                elevation_loss,
                geometry,
                is_bridge: true,
            })?;
            edges_added += 1;
        }
        Ok((nodes_added, edges_added))
    }
}

fn joined(graph: &RoutingGraph, incidence: &HashMap<u64, Vec<u64>>, a: u64, b: u64) -> bool {
    incidence.get(&a).map_or(false, |ids| {
        ids.iter()
            .filter_map(|id| graph.edge(*id))
            .any(|e| e.source == b || e.target == b)
    })
}
