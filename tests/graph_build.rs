//! Graph construction, gap bridging and GeoJSON export.
//!
//! Run with: `cargo test --test graph_build`

use trail_router::export::{graph_to_geojson, validate_feature_collection};
use trail_router::wkt::write_linestring;
use trail_router::{
    BridgeConfig, GapBridger, GraphConfig, NodeType, RoutingGraphBuilder, SplitterConfig, TrailPoint,
    TrailRow, TrailSplitter,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn row(id: u64, points: &[(f64, f64)]) -> TrailRow {
    let geometry: Vec<TrailPoint> = points.iter().map(|&(lng, lat)| TrailPoint::new(lng, lat)).collect();
    TrailRow::new(id, &format!("trail-{}", id), &format!("Trail {}", id), &write_linestring(&geometry))
}

/// Two trails on one line with a gap of about 17 m between them.
fn gapped_rows() -> Vec<TrailRow> {
    vec![
        row(1, &[(0.0, 0.0), (0.0005, 0.0), (0.001, 0.0)]),
        row(2, &[(0.00115, 0.0), (0.0015, 0.0), (0.002, 0.0)]),
    ]
}

// ============================================================================
// Test: Gap Bridging
// ============================================================================

#[test]
fn test_gap_within_tolerance_is_bridged() {
    init_logging();
    let split = TrailSplitter::new(SplitterConfig::default()).split_rows(&gapped_rows());
    let mut graph = RoutingGraphBuilder::new(GraphConfig::default())
        .build(&split.segments)
        .unwrap();
    assert_eq!(graph.stats().component_count, 2);

    let tolerance = 20.0;
    let report = GapBridger::new(BridgeConfig {
        enabled: true,
        tolerance_meters: tolerance,
    })
    .bridge(&mut graph)
    .unwrap();

    assert_eq!(report.dangling_nodes, 4);
    assert_eq!(report.pairs_bridged, 1);
    let stats = graph.stats();
    assert_eq!(stats.component_count, 1);
    assert!(stats.bridge_edge_count >= 1);

    for edge in graph.edges().filter(|e| e.is_bridge) {
        assert!(edge.trail_id.is_none());
        assert!(
            edge.length_km * 1000.0 <= tolerance,
            "connector of {:.1} m exceeds tolerance",
            edge.length_km * 1000.0
        );
    }
    graph.validate().unwrap();
}

#[test]
fn test_gap_beyond_tolerance_stays_open() {
    let split = TrailSplitter::new(SplitterConfig::default()).split_rows(&gapped_rows());
    let mut graph = RoutingGraphBuilder::new(GraphConfig::default())
        .build(&split.segments)
        .unwrap();

    let report = GapBridger::new(BridgeConfig {
        enabled: true,
        tolerance_meters: 5.0,
    })
    .bridge(&mut graph)
    .unwrap();

    assert_eq!(report.pairs_bridged, 0);
    assert_eq!(graph.stats().component_count, 2);
    assert!(graph.edges().all(|e| !e.is_bridge));
}

// ============================================================================
// Test: Closed Loops
// ============================================================================

#[test]
fn test_closed_trail_never_makes_self_loop() {
    init_logging();
    let rows = vec![row(
        1,
        &[(0.0, 0.0), (0.01, 0.0), (0.01, 0.01), (0.0, 0.01), (0.0, 0.0)],
    )];
    let split = TrailSplitter::new(SplitterConfig::default()).split_rows(&rows);
    let graph = RoutingGraphBuilder::new(GraphConfig::default())
        .build(&split.segments)
        .unwrap();

    assert!(graph.edge_count() >= 2);
    assert!(graph.edges().all(|e| e.source != e.target));
    let total: f64 = graph.edges().map(|e| e.length_km).sum();
    assert!((total - split.segments.iter().map(|s| s.length_km).sum::<f64>()).abs() < 1e-6);
    graph.validate().unwrap();
}

// ============================================================================
// Test: Export
// ============================================================================

#[test]
fn test_graph_geojson_is_renderable() {
    let split = TrailSplitter::new(SplitterConfig::default()).split_rows(&gapped_rows());
    let mut graph = RoutingGraphBuilder::new(GraphConfig::default())
        .build(&split.segments)
        .unwrap();
    GapBridger::new(BridgeConfig::default()).bridge(&mut graph).unwrap();

    let geojson = graph_to_geojson(&graph);
    let features = geojson["features"].as_array().unwrap();
    assert_eq!(features.len(), graph.node_count() + graph.edge_count());
    assert!(validate_feature_collection(&geojson).is_empty());

    let bridge_nodes = graph.nodes().filter(|n| n.node_type == NodeType::Bridge).count();
    let exported_bridge_nodes = features
        .iter()
        .filter(|f| f["properties"]["node_type"] == "bridge")
        .count();
    assert_eq!(bridge_nodes, exported_bridge_nodes);
}
