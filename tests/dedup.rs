//! Deduplication properties over hand-built candidates.
//!
//! Run with: `cargo test --test dedup`

use trail_router::dedup::{remove_contained, EndpointDecision, EndpointIndex, ExactRouteSet};
use trail_router::{PathStep, RouteCandidate, RouteShape};

fn candidate(edges: &[u64], km: f64) -> RouteCandidate {
    let steps = edges
        .iter()
        .enumerate()
        .map(|(i, &edge_id)| PathStep {
            edge_id,
            from: i as u64,
            to: i as u64 + 1,
            cost: km / edges.len() as f64,
        })
        .collect();
    RouteCandidate {
        shape: RouteShape::Loop,
        steps,
        start_node: 0,
        end_node: edges.len() as u64,
        endpoint_key: None,
        distance_km: km,
        elevation_gain: 0.0,
        elevation_loss: 0.0,
        trail_ids: edges.to_vec(),
        trail_names: vec![],
    }
}

#[test]
fn test_contained_routes_removed() {
    let kept = remove_contained(vec![
        candidate(&[1, 2], 4.0),
        candidate(&[1, 2, 3, 4], 8.0),
        candidate(&[3, 4, 5], 6.0),
        candidate(&[4], 2.0),
    ]);
    let sets: Vec<Vec<u64>> = kept.iter().map(|c| c.edge_ids()).collect();
    assert_eq!(sets, vec![vec![1, 2, 3, 4], vec![3, 4, 5]]);
}

#[test]
fn test_endpoint_best_length_never_drops() {
    let mut index = EndpointIndex::new();
    let key = (7, 3);
    let mut best_seen = 0.0_f64;
    for (slot, km) in [5.0, 9.0, 6.5, 9.5, 2.0].into_iter().enumerate() {
        match index.decide(key, km) {
            EndpointDecision::New | EndpointDecision::Replace(_) => index.record(key, slot, km),
            EndpointDecision::KeepExisting => {}
        }
        let best = index.best_length((3, 7)).unwrap();
        assert!(best >= best_seen);
        best_seen = best;
    }
    assert_eq!(best_seen, 9.5);
}

#[test]
fn test_exact_sequence_is_ordered() {
    let mut seen = ExactRouteSet::new();
    assert!(seen.insert(&[1, 2, 3]));
    assert!(!seen.insert(&[1, 2, 3]));
    assert!(seen.insert(&[3, 2, 1]), "reversed traversal is a different route");
    assert_eq!(seen.len(), 2);
}
