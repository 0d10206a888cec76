use std::collections::{BTreeMap, HashMap};

use log::debug;

use super::{fan_out, RouteStrategy};
use crate::engine::{RouteCandidate, RoutePattern, RouteShape, SearchContext, ToleranceLevel};

/// One-way route across a connected component, approximating its diameter.
///
/// From a seed node (the first entry point in the component, else its
/// smallest node) the farthest node `a` is found, then the farthest node `b`
/// from `a`. The longest of the K shortest `a -> b` paths that fits the
/// distance window becomes the candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointToPointStrategy;

impl RouteStrategy for PointToPointStrategy {
    fn shape(&self) -> RouteShape {
        RouteShape::PointToPoint
    }

    fn generate(
        &self,
        ctx: &SearchContext<'_>,
        pattern: &RoutePattern,
        tolerance: &ToleranceLevel,
    ) -> Vec<RouteCandidate> {
        let (min_total, max_total) = tolerance.distance_window(pattern.target_distance_km);

        let mut members: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for (node, component) in ctx.oracle.connected_components(ctx.network) {
            members.entry(component).or_default().push(node);
        }
        let entry_rank: HashMap<u64, usize> = ctx
            .entry_points
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect();

        let seeds: Vec<u64> = members
            .values()
            .filter(|nodes| nodes.len() >= 2)
            .filter_map(|nodes| {
                let entry = nodes
                    .iter()
                    .filter_map(|n| entry_rank.get(n).map(|&r| (r, *n)))
                    .min()
                    .map(|(_, n)| n);
                match entry {
                    Some(n) => Some(n),
                    None if ctx.restricted_entries() => None,
                    None => nodes.iter().min().copied(),
                }
            })
            .collect();

        let found = fan_out(&seeds, |&seed| {
            if ctx.budget_spent() {
                return Vec::new();
            }
            let Some(a) = farthest(ctx, seed) else {
                return Vec::new();
            };
            let Some(b) = farthest(ctx, a) else {
                return Vec::new();
            };
            if a == b {
                return Vec::new();
            }
            let mut paths = match ctx.oracle.k_shortest_paths(ctx.network, a, b, ctx.config.ksp_k) {
                Ok(p) => p,
                Err(e) => {
                    ctx.record_failure(&format!("ksp {} -> {}", a, b), &e);
                    return Vec::new();
                }
            };
            paths.sort_by(|x, y| y.cost.total_cmp(&x.cost));
            let Some(path) = paths
                .into_iter()
                .find(|p| p.cost >= min_total && p.cost <= max_total)
            else {
                return Vec::new();
            };
            match RouteCandidate::from_steps(ctx.graph, RouteShape::PointToPoint, path.steps) {
                Some(candidate) => {
                    ctx.spend(1);
                    vec![candidate]
                }
                None => Vec::new(),
            }
        });
        debug!("[PointToPoint] {} candidate(s) from {} components", found.len(), seeds.len());
        found
    }
}

/// The node farthest (by network distance) from `from`, smallest id on ties.
fn farthest(ctx: &SearchContext<'_>, from: u64) -> Option<u64> {
    match ctx.oracle.shortest_distances(ctx.network, from, f64::INFINITY) {
        Ok(distances) => distances
            .into_iter()
            .filter(|&(n, _)| n != from)
            .max_by(|x, y| x.1.total_cmp(&y.1).then(y.0.cmp(&x.0)))
            .map(|(n, _)| n),
        Err(e) => {
            ctx.record_failure(&format!("farthest-node probe from {}", from), &e);
            None
        }
    }
}
