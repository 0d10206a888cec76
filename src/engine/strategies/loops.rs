use std::collections::HashSet;

use log::debug;

use super::RouteStrategy;
use crate::engine::{RouteCandidate, RoutePattern, RouteShape, SearchContext, ToleranceLevel};
use crate::oracle::Cycle;

/// Closed loops from cycle enumeration, filtered to the distance window.
///
/// Each loop is rotated to start at an entry point on it. With trailheads
/// configured, loops touching none of them are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopStrategy;

/// Rotate `cycle` to start at the first entry point it passes through, or at
/// its smallest node when entries are unrestricted. `None` if it touches no
/// allowed entry.
pub(crate) fn anchor_cycle(cycle: &Cycle, entries: &[u64], restricted: bool) -> Option<Cycle> {
    let on_cycle: HashSet<u64> = cycle.nodes.iter().copied().collect();
    if let Some(&entry) = entries.iter().find(|e| on_cycle.contains(e)) {
        return cycle.rotated_to(entry);
    }
    if restricted {
        return None;
    }
    let smallest = *on_cycle.iter().min()?;
    cycle.rotated_to(smallest)
}

impl RouteStrategy for LoopStrategy {
    fn shape(&self) -> RouteShape {
        RouteShape::Loop
    }

    fn generate(
        &self,
        ctx: &SearchContext<'_>,
        pattern: &RoutePattern,
        tolerance: &ToleranceLevel,
    ) -> Vec<RouteCandidate> {
        let (min_total, max_total) = tolerance.distance_window(pattern.target_distance_km);
        let cycles = match ctx
            .oracle
            .enumerate_cycles(ctx.network, ctx.config.max_cycles, max_total)
        {
            Ok(c) => c,
            Err(e) => {
                ctx.record_failure("cycle enumeration", &e);
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for cycle in cycles
            .iter()
            .filter(|c| c.cost >= min_total && c.cost <= max_total)
        {
            if ctx.budget_spent() {
                break;
            }
            let Some(anchored) = anchor_cycle(cycle, ctx.entry_points, ctx.restricted_entries()) else {
                continue;
            };
            if let Some(candidate) = RouteCandidate::from_steps(ctx.graph, RouteShape::Loop, anchored.steps) {
                found.push(candidate);
                ctx.spend(1);
            }
        }
        debug!(
            "[Loop] {} of {} cycles in {:.1}..{:.1} km",
            found.len(),
            cycles.len(),
            min_total,
            max_total
        );
        found
    }
}
