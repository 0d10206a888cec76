//! Default [`GraphOracle`]: A* shortest paths with a great-circle heuristic,
//! Yen's K shortest paths, bounded Dijkstra, union-find components and a
//! bounded depth-first cycle search.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use log::debug;

use super::{Cycle, GraphOracle, NetworkGraph, Path, PathStep};
use crate::error::OracleError;
use crate::geo_utils::haversine_distance;
use crate::union_find::UnionFind;

/// Recommended number of node expansions allowed per query before
/// [`OracleError::StepLimitExceeded`] is returned.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Graph oracle over an in-memory [`NetworkGraph`].
///
/// Edge costs are expected in kilometers so that the straight-line distance
/// to the goal is an admissible A* heuristic.
#[derive(Debug, Clone)]
pub struct NetworkOracle {
    /// Node expansions allowed per path query
    pub step_limit: usize,
    /// Longest cycle (in edges) the cycle search will follow
    pub max_cycle_edges: usize,
}

impl Default for NetworkOracle {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            max_cycle_edges: 24,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    at: u64,
    cost: f64,
    score: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.at == other.at
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; lower scores must come out first.
        // Node id breaks ties so results do not depend on push order.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.at.cmp(&self.at))
    }
}

/// Edges and nodes a search may not use (Yen's spur searches).
#[derive(Default)]
struct Exclusions {
    edges: HashSet<u64>,
    nodes: HashSet<u64>,
}

impl NetworkOracle {
    fn heuristic(graph: &NetworkGraph, from: u64, goal: &crate::TrailPoint) -> f64 {
        graph
            .position(from)
            .map(|p| haversine_distance(&p, goal) / 1000.0)
            .unwrap_or(0.0)
    }

    fn astar(
        &self,
        graph: &NetworkGraph,
        from: u64,
        to: u64,
        exclusions: &Exclusions,
    ) -> Result<Option<Path>, OracleError> {
        let goal = graph.position(to).ok_or(OracleError::UnknownNode(to))?;
        if !graph.contains_node(from) {
            return Err(OracleError::UnknownNode(from));
        }
        if from == to {
            return Ok(None);
        }

        let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();
        let mut came_from: HashMap<u64, PathStep> = HashMap::new();
        let mut known_costs: HashMap<u64, f64> = HashMap::new();
        let mut steps = 0usize;

        known_costs.insert(from, 0.0);
        queue.push(QueueItem {
            at: from,
            cost: 0.0,
            score: Self::heuristic(graph, from, &goal),
        });

        while let Some(item) = queue.pop() {
            if item.at == to {
                return Ok(reconstruct(&came_from, from, to));
            }

            // Stale queue entries are skipped rather than decreased in place.
            if item.cost > known_costs.get(&item.at).copied().unwrap_or(f64::INFINITY) {
                continue;
            }

            steps += 1;
            if steps > self.step_limit {
                return Err(OracleError::StepLimitExceeded(steps));
            }

            for adjacent in graph.neighbors(item.at) {
                if exclusions.edges.contains(&adjacent.edge_id)
                    || exclusions.nodes.contains(&adjacent.to)
                {
                    continue;
                }
                let neighbor_cost = item.cost + adjacent.cost;
                if neighbor_cost >= known_costs.get(&adjacent.to).copied().unwrap_or(f64::INFINITY) {
                    continue;
                }
                came_from.insert(
                    adjacent.to,
                    PathStep {
                        edge_id: adjacent.edge_id,
                        from: item.at,
                        to: adjacent.to,
                        cost: adjacent.cost,
                    },
                );
                known_costs.insert(adjacent.to, neighbor_cost);
                queue.push(QueueItem {
                    at: adjacent.to,
                    cost: neighbor_cost,
                    score: neighbor_cost + Self::heuristic(graph, adjacent.to, &goal),
                });
            }
        }

        Ok(None)
    }
}

fn reconstruct(came_from: &HashMap<u64, PathStep>, from: u64, to: u64) -> Option<Path> {
    let mut steps = Vec::new();
    let mut at = to;
    while at != from {
        let step = came_from.get(&at)?;
        steps.push(*step);
        at = step.from;
    }
    steps.reverse();
    Path::from_steps(steps)
}

fn concat(root: &[PathStep], spur: &Path) -> Option<Path> {
    let mut steps = root.to_vec();
    steps.extend_from_slice(&spur.steps);
    Path::from_steps(steps)
}

fn same_prefix(a: &Path, b: &Path, len: usize) -> bool {
    a.steps.len() > len
        && b.steps.len() >= len
        && a.steps[..len]
            .iter()
            .zip(&b.steps[..len])
            .all(|(x, y)| x.edge_id == y.edge_id && x.from == y.from)
}

impl GraphOracle for NetworkOracle {
    fn shortest_path(
        &self,
        graph: &NetworkGraph,
        from: u64,
        to: u64,
    ) -> Result<Option<Path>, OracleError> {
        self.astar(graph, from, to, &Exclusions::default())
    }

    fn k_shortest_paths(
        &self,
        graph: &NetworkGraph,
        from: u64,
        to: u64,
        k: usize,
    ) -> Result<Vec<Path>, OracleError> {
        let mut accepted: Vec<Path> = Vec::new();
        if k == 0 {
            return Ok(accepted);
        }
        let first = match self.shortest_path(graph, from, to)? {
            Some(path) => path,
            None => return Ok(accepted),
        };

        let mut seen: HashSet<Vec<u64>> = HashSet::new();
        seen.insert(first.edge_ids());
        accepted.push(first);
        let mut candidates: Vec<Path> = Vec::new();

        while accepted.len() < k {
            let previous = accepted[accepted.len() - 1].clone();

            for i in 0..previous.steps.len() {
                let spur_node = previous.nodes[i];
                let root = &previous.steps[..i];

                let mut exclusions = Exclusions::default();
                for path in &accepted {
                    if same_prefix(path, &previous, i) {
                        exclusions.edges.insert(path.steps[i].edge_id);
                    }
                }
                exclusions.nodes.extend(previous.nodes[..i].iter().copied());

                let spur = match self.astar(graph, spur_node, to, &exclusions) {
                    Ok(Some(spur)) => spur,
                    Ok(None) => continue,
                    Err(OracleError::StepLimitExceeded(n)) => {
                        debug!("[Oracle] KSP spur search from {} gave up after {} steps", spur_node, n);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                if let Some(total) = concat(root, &spur) {
                    if seen.insert(total.edge_ids()) {
                        candidates.push(total);
                    }
                }
            }

            if candidates.is_empty() {
                break;
            }

            // Pick the cheapest candidate; edge ids break ties deterministically.
            let best = candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.cost
                        .total_cmp(&b.cost)
                        .then_with(|| a.edge_ids().cmp(&b.edge_ids()))
                })
                .map(|(idx, _)| idx);
            match best {
                Some(idx) => accepted.push(candidates.swap_remove(idx)),
                None => break,
            }
        }

        Ok(accepted)
    }

    fn shortest_distances(
        &self,
        graph: &NetworkGraph,
        from: u64,
        max_cost: f64,
    ) -> Result<HashMap<u64, f64>, OracleError> {
        if !graph.contains_node(from) {
            return Err(OracleError::UnknownNode(from));
        }

        let mut distances: HashMap<u64, f64> = HashMap::new();
        let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();
        let mut steps = 0usize;

        distances.insert(from, 0.0);
        queue.push(QueueItem {
            at: from,
            cost: 0.0,
            score: 0.0,
        });

        while let Some(item) = queue.pop() {
            if item.cost > distances.get(&item.at).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            steps += 1;
            if steps > self.step_limit {
                return Err(OracleError::StepLimitExceeded(steps));
            }
            for adjacent in graph.neighbors(item.at) {
                let cost = item.cost + adjacent.cost;
                if cost > max_cost {
                    continue;
                }
                if cost < distances.get(&adjacent.to).copied().unwrap_or(f64::INFINITY) {
                    distances.insert(adjacent.to, cost);
                    queue.push(QueueItem {
                        at: adjacent.to,
                        cost,
                        score: cost,
                    });
                }
            }
        }

        Ok(distances)
    }

    fn connected_components(&self, graph: &NetworkGraph) -> BTreeMap<u64, usize> {
        let mut uf: UnionFind<u64> = UnionFind::with_capacity(graph.len());
        for id in graph.node_ids() {
            uf.make_set(id);
        }
        for edge in graph.edges() {
            uf.union(&edge.source, &edge.target);
        }
        uf.component_labels().into_iter().collect()
    }

    fn enumerate_cycles(
        &self,
        graph: &NetworkGraph,
        max_results: usize,
        max_cost: f64,
    ) -> Result<Vec<Cycle>, OracleError> {
        let mut search = CycleSearch {
            graph,
            max_results,
            max_cost,
            max_edges: self.max_cycle_edges,
            step_limit: self.step_limit,
            steps: 0,
            seen: HashSet::new(),
            found: Vec::new(),
        };

        let starts: Vec<u64> = graph.node_ids().collect();
        for start in starts {
            if search.done() {
                break;
            }
            let mut on_path: HashSet<u64> = HashSet::new();
            on_path.insert(start);
            let mut steps = Vec::new();
            search.extend(start, start, 0.0, &mut steps, &mut on_path);
        }

        if search.steps > search.step_limit {
            debug!(
                "[Oracle] Cycle search stopped at step limit with {} cycle(s)",
                search.found.len()
            );
        }
        Ok(search.found)
    }
}

/// Depth-first enumeration of simple cycles. Each cycle is rooted at its
/// smallest node id, so every cycle is reachable from exactly one start; the
/// sorted edge set removes the mirrored traversal of undirected cycles.
struct CycleSearch<'a> {
    graph: &'a NetworkGraph,
    max_results: usize,
    max_cost: f64,
    max_edges: usize,
    step_limit: usize,
    steps: usize,
    seen: HashSet<Vec<u64>>,
    found: Vec<Cycle>,
}

impl CycleSearch<'_> {
    fn done(&self) -> bool {
        self.found.len() >= self.max_results || self.steps > self.step_limit
    }

    fn extend(
        &mut self,
        start: u64,
        at: u64,
        cost: f64,
        steps: &mut Vec<PathStep>,
        on_path: &mut HashSet<u64>,
    ) {
        for adjacent in self.graph.neighbors(at) {
            if self.done() {
                return;
            }
            self.steps += 1;

            let next_cost = cost + adjacent.cost;
            if next_cost > self.max_cost {
                continue;
            }
            if steps.iter().any(|s| s.edge_id == adjacent.edge_id) {
                continue;
            }

            let step = PathStep {
                edge_id: adjacent.edge_id,
                from: at,
                to: adjacent.to,
                cost: adjacent.cost,
            };

            if adjacent.to == start {
                // Two distinct parallel edges already form a cycle.
                if steps.is_empty() {
                    continue;
                }
                let mut closed = steps.clone();
                closed.push(step);
                let mut key: Vec<u64> = closed.iter().map(|s| s.edge_id).collect();
                key.sort_unstable();
                if self.seen.insert(key) {
                    if let Some(cycle) = Path::from_steps(closed) {
                        self.found.push(cycle);
                    }
                }
                continue;
            }

            if adjacent.to < start || on_path.contains(&adjacent.to) {
                continue;
            }
            if steps.len() + 1 >= self.max_edges {
                continue;
            }

            steps.push(step);
            on_path.insert(adjacent.to);
            self.extend(start, adjacent.to, next_cost, steps, on_path);
            on_path.remove(&adjacent.to);
            steps.pop();
        }
    }
}
