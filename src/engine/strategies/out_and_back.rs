use log::debug;

use super::{fan_out, mirrored, RouteStrategy};
use crate::engine::{RouteCandidate, RoutePattern, RouteShape, SearchContext, ToleranceLevel};

/// Walk out along one of the K shortest paths to a far node, then back the
/// same way.
///
/// Far nodes are those whose network distance from the entry point is
/// within the upper half-window; they are tried closest to half the target
/// first.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutAndBackStrategy;

impl RouteStrategy for OutAndBackStrategy {
    fn shape(&self) -> RouteShape {
        RouteShape::OutAndBack
    }

    fn generate(
        &self,
        ctx: &SearchContext<'_>,
        pattern: &RoutePattern,
        tolerance: &ToleranceLevel,
    ) -> Vec<RouteCandidate> {
        let (min_total, max_total) = tolerance.distance_window(pattern.target_distance_km);
        let (min_one_way, max_one_way) = (min_total / 2.0, max_total / 2.0);
        let half_target = pattern.target_distance_km / 2.0;

        fan_out(ctx.entry_points, |&start| {
            let mut found = Vec::new();
            if ctx.budget_spent() {
                return found;
            }
            let reachable = match ctx.oracle.shortest_distances(ctx.network, start, max_one_way) {
                Ok(d) => d,
                Err(e) => {
                    ctx.record_failure(&format!("reachable search from {}", start), &e);
                    return found;
                }
            };

            let mut ends: Vec<(u64, f64)> = reachable
                .into_iter()
                .filter(|&(node, _)| node != start)
                .collect();
            ends.sort_by(|a, b| {
                (a.1 - half_target)
                    .abs()
                    .total_cmp(&(b.1 - half_target).abs())
                    .then(a.0.cmp(&b.0))
            });
            ends.truncate(ctx.config.max_destinations_per_entry);

            for (end, _) in ends {
                if ctx.budget_spent() {
                    break;
                }
                let paths = match ctx
                    .oracle
                    .k_shortest_paths(ctx.network, start, end, ctx.config.ksp_k)
                {
                    Ok(p) => p,
                    Err(e) => {
                        ctx.record_failure(&format!("ksp {} -> {}", start, end), &e);
                        continue;
                    }
                };
                let before = found.len();
                for path in paths
                    .iter()
                    .filter(|p| p.cost >= min_one_way && p.cost <= max_one_way)
                {
                    if let Some(candidate) =
                        RouteCandidate::from_steps(ctx.graph, RouteShape::OutAndBack, mirrored(path))
                    {
                        found.push(candidate.with_endpoints(start, end));
                    }
                }
                ctx.spend(found.len() - before);
            }
            debug!("[OutAndBack] Entry {}: {} candidate(s)", start, found.len());
            found
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RouteGenerationConfig;
    use crate::oracle::NetworkOracle;
    use crate::routing::{GraphConfig, RoutingGraphBuilder};
    use crate::{TrailPoint, TrailSegment};

    /// A straight 4.9 km trail climbing 140 m.
    fn single_trail_graph() -> crate::routing::RoutingGraph {
        let geometry: Vec<TrailPoint> = (0..=49)
            .map(|i| {
                let lat = i as f64 * 0.000_898_3;
                TrailPoint::with_elevation(0.0, lat, 1000.0 + i as f64 * 140.0 / 49.0)
            })
            .collect();
        let segment = TrailSegment {
            trail_id: 1,
            segment_index: 1,
            external_id: "ridge".to_string(),
            parent_external_id: "ridge".to_string(),
            name: "Ridge".to_string(),
            length_km: crate::geo_utils::polyline_length_km(&geometry),
            elevation: crate::ElevationStats::from_points(&geometry),
            geometry,
            tags: Default::default(),
        };
        RoutingGraphBuilder::new(GraphConfig::default())
            .build(&[segment])
            .unwrap()
    }

    #[test]
    fn test_mirrored_path_doubles_distance_and_swaps_elevation() {
        let graph = single_trail_graph();
        let network = graph.network();
        let config = RouteGenerationConfig::default();
        let entries: Vec<u64> = graph.nodes().map(|n| n.id).collect();
        let oracle = NetworkOracle::default();
        let ctx = SearchContext::new(&graph, &network, &oracle, &entries, &config, 100);

        let pattern = RoutePattern::new("ten", 10.0, 300.0, RouteShape::OutAndBack);
        let tolerance = ToleranceLevel::new("medium", 20.0, 20.0, 0.8);
        let candidates = OutAndBackStrategy.generate(&ctx, &pattern, &tolerance);

        assert!(!candidates.is_empty());
        let c = &candidates[0];
        let one_way = graph.edges().next().unwrap();
        assert!((c.distance_km - 2.0 * one_way.length_km).abs() < 1e-9);
        assert!((c.elevation_gain - (one_way.elevation_gain + one_way.elevation_loss)).abs() < 1e-9);
        assert!((c.elevation_gain - 140.0).abs() < 1e-6);
        assert_eq!(c.start_node, c.end_node);
        assert_eq!(c.steps.len(), 2);
        assert!(c.endpoint_key.is_some());
    }
}
