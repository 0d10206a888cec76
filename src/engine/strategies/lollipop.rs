use std::collections::HashSet;

use log::debug;

use super::{fan_out, RouteStrategy};
use crate::engine::{RouteCandidate, RoutePattern, RouteShape, SearchContext, ToleranceLevel};
use crate::oracle::{Cycle, PathStep};

/// Stem ends tried per loop node.
const STEM_ENDS_PER_NODE: usize = 3;

/// A stem out to a loop, around the loop, and back down the stem.
///
/// Loops come from cycle enumeration. For every node on a loop, stem ends
/// are nodes off the loop whose network distance is near the configured
/// stem fraction of the target; the stem itself is the shortest path and
/// must meet the loop only at its junction.
#[derive(Debug, Clone, Copy, Default)]
pub struct LollipopStrategy;

impl RouteStrategy for LollipopStrategy {
    fn shape(&self) -> RouteShape {
        RouteShape::Lollipop
    }

    fn generate(
        &self,
        ctx: &SearchContext<'_>,
        pattern: &RoutePattern,
        tolerance: &ToleranceLevel,
    ) -> Vec<RouteCandidate> {
        let (min_total, max_total) = tolerance.distance_window(pattern.target_distance_km);
        let stem_target = pattern.target_distance_km * ctx.config.lollipop_stem_fraction;
        let loop_target = pattern.target_distance_km - 2.0 * stem_target;

        let mut loops = match ctx
            .oracle
            .enumerate_cycles(ctx.network, ctx.config.max_cycles, max_total)
        {
            Ok(c) => c,
            Err(e) => {
                ctx.record_failure("cycle enumeration", &e);
                return Vec::new();
            }
        };
        loops.retain(|c| c.cost < max_total);
        loops.sort_by(|a, b| {
            (a.cost - loop_target)
                .abs()
                .total_cmp(&(b.cost - loop_target).abs())
                .then_with(|| a.edge_ids().cmp(&b.edge_ids()))
        });

        let entry_set: HashSet<u64> = ctx.entry_points.iter().copied().collect();
        let found = fan_out(&loops, |cycle| {
            lollipops_on(ctx, cycle, min_total, max_total, stem_target, &entry_set)
        });
        debug!("[Lollipop] {} candidate(s) from {} loops", found.len(), loops.len());
        found
    }
}

fn lollipops_on(
    ctx: &SearchContext<'_>,
    cycle: &Cycle,
    min_total: f64,
    max_total: f64,
    stem_target: f64,
    entry_set: &HashSet<u64>,
) -> Vec<RouteCandidate> {
    let mut found = Vec::new();
    if ctx.budget_spent() {
        return found;
    }
    // Stem walked twice: its one-way length must fill the remaining window.
    let stem_min = ((min_total - cycle.cost) / 2.0).max(0.0);
    let stem_max = (max_total - cycle.cost) / 2.0;
    if stem_max <= 0.0 {
        return found;
    }
    let on_loop: HashSet<u64> = cycle.nodes.iter().copied().collect();
    let mut junctions: Vec<u64> = on_loop.iter().copied().collect();
    junctions.sort_unstable();

    for junction in junctions {
        if ctx.budget_spent() {
            break;
        }
        let Some(rotated) = cycle.rotated_to(junction) else {
            continue;
        };
        let distances = match ctx.oracle.shortest_distances(ctx.network, junction, stem_max) {
            Ok(d) => d,
            Err(e) => {
                ctx.record_failure(&format!("stem search from {}", junction), &e);
                continue;
            }
        };

        let mut ends: Vec<(u64, f64)> = distances
            .iter()
            .map(|(&n, &d)| (n, d))
            .filter(|&(n, d)| !on_loop.contains(&n) && d > 0.0 && d >= stem_min && d <= stem_max)
            .filter(|&(n, _)| !ctx.restricted_entries() || entry_set.contains(&n))
            .collect();
        ends.sort_by(|a, b| {
            (a.1 - stem_target)
                .abs()
                .total_cmp(&(b.1 - stem_target).abs())
                .then(a.0.cmp(&b.0))
        });
        ends.truncate(STEM_ENDS_PER_NODE);

        for (end, _) in ends {
            let stem = match ctx.oracle.shortest_path(ctx.network, end, junction) {
                Ok(Some(p)) => p,
                Ok(None) => continue,
                Err(e) => {
                    ctx.record_failure(&format!("stem path {} -> {}", end, junction), &e);
                    continue;
                }
            };
            // The stem may only touch the loop at the junction.
            let touches_loop = stem.nodes[..stem.nodes.len() - 1]
                .iter()
                .any(|n| on_loop.contains(n));
            if touches_loop {
                continue;
            }
            let total = cycle.cost + 2.0 * stem.cost;
            if total < min_total || total > max_total {
                continue;
            }

            let mut steps: Vec<PathStep> = stem.steps.clone();
            steps.extend(rotated.steps.iter().copied());
            steps.extend(stem.reversed().steps);
            if let Some(candidate) = RouteCandidate::from_steps(ctx.graph, RouteShape::Lollipop, steps) {
                found.push(candidate);
                ctx.spend(1);
            }
        }
    }
    found
}
