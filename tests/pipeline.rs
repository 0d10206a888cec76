//! End-to-end pipeline runs: rows in, scored routes out.
//!
//! Run with: `cargo test --test pipeline`

use trail_router::export::{routes_to_geojson, validate_feature_collection};
use trail_router::wkt::write_linestring;
use trail_router::{
    CancellationFlag, PatternResult, PatternStatus, PipelineConfig, Result, RouteGenerationConfig,
    RoutePattern, RouteShape, RouteStore, RoutingGraph, ToleranceLevel, TrailPipeline, TrailPoint,
    TrailRouteError, TrailRow,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A straight 4.9 km trail climbing 140 m from south to north.
fn ridge_row() -> TrailRow {
    let geometry: Vec<TrailPoint> = (0..=49)
        .map(|i| {
            let lat = 40.0 + i as f64 * 0.000_898_3;
            TrailPoint::with_elevation(-105.3, lat, 1700.0 + i as f64 * 140.0 / 49.0)
        })
        .collect();
    TrailRow::new(1, "ridge", "Ridge Trail", &write_linestring(&geometry))
}

/// Ten kilometres out and back with the medium tolerance level only.
fn out_and_back_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.generation = RouteGenerationConfig {
        patterns: vec![RoutePattern::new(
            "Medium Out & Back",
            10.0,
            300.0,
            RouteShape::OutAndBack,
        )],
        tolerance_levels: vec![ToleranceLevel::new("medium", 20.0, 20.0, 0.8)],
        ..RouteGenerationConfig::default()
    };
    config
}

// ============================================================================
// Test: Out-and-Back Acceptance
// ============================================================================

#[test]
fn test_short_trail_doubles_into_ten_km_route() {
    init_logging();
    let report = TrailPipeline::new(out_and_back_config())
        .run(&[ridge_row()])
        .unwrap();

    assert_eq!(report.graph.node_count, 2);
    assert_eq!(report.graph.edge_count, 1);
    assert_eq!(report.patterns.len(), 1);

    let result = &report.patterns[0];
    assert_eq!(result.status, PatternStatus::Partial);
    assert_eq!(result.routes.len(), 1, "both ends give the same walk");
    let route = &result.routes[0];
    assert_eq!(route.route_shape, RouteShape::OutAndBack);
    assert!((route.recommended_distance_km - 9.8).abs() < 0.05);
    assert!((8.0..=12.0).contains(&route.recommended_distance_km));
    assert!((route.recommended_elevation_gain - 140.0).abs() < 1e-6);
    assert_eq!(route.tolerance_level, "medium");
    assert_eq!(route.route_name, "Ridge Trail Out & Back");
    assert!(route.route_score > 0.0 && route.route_score <= 100.0);

    let geojson = routes_to_geojson(&result.routes);
    assert_eq!(geojson["features"].as_array().unwrap().len(), 1);
    assert!(validate_feature_collection(&geojson).is_empty());
}

#[test]
fn test_unmatched_pattern_is_a_normal_result() {
    let mut config = out_and_back_config();
    config.generation.patterns.push(RoutePattern::new(
        "Marathon Loop",
        42.0,
        1000.0,
        RouteShape::Loop,
    ));
    let report = TrailPipeline::new(config).run(&[ridge_row()]).unwrap();

    assert_eq!(report.patterns.len(), 2);
    assert_eq!(report.empty_patterns(), vec!["Marathon Loop"]);
    assert_eq!(report.total_routes(), 1);
}

#[test]
fn test_invalid_config_fails_before_any_stage() {
    let mut config = out_and_back_config();
    config.generation.ksp_k = 0;
    let result = TrailPipeline::new(config).run(&[ridge_row()]);
    assert!(matches!(result, Err(TrailRouteError::Config(_))));
}

// ============================================================================
// Test: Storage and Cancellation
// ============================================================================

#[derive(Default)]
struct RecordingStore {
    graphs: Vec<usize>,
    patterns: Vec<(String, usize)>,
    fail_routes: bool,
}

impl RouteStore for RecordingStore {
    fn store_graph(&mut self, graph: &RoutingGraph) -> Result<()> {
        self.graphs.push(graph.edge_count());
        Ok(())
    }

    fn store_routes(&mut self, result: &PatternResult) -> Result<()> {
        if self.fail_routes {
            return Err(TrailRouteError::invariant("disk full"));
        }
        self.patterns
            .push((result.pattern.name.clone(), result.routes.len()));
        Ok(())
    }
}

#[test]
fn test_store_sees_graph_then_each_finished_pattern() {
    let mut store = RecordingStore::default();
    let report = TrailPipeline::new(out_and_back_config())
        .run_with_store(&[ridge_row()], &mut store)
        .unwrap();

    assert_eq!(store.graphs, vec![1]);
    assert_eq!(store.patterns, vec![("Medium Out & Back".to_string(), 1)]);
    assert_eq!(report.total_routes(), 1);
}

#[test]
fn test_store_failure_surfaces_as_collaborator_error() {
    let mut store = RecordingStore {
        fail_routes: true,
        ..RecordingStore::default()
    };
    let result = TrailPipeline::new(out_and_back_config()).run_with_store(&[ridge_row()], &mut store);
    assert!(matches!(
        result,
        Err(TrailRouteError::Collaborator { .. })
    ));
}

#[test]
fn test_cancellation_between_patterns() {
    let flag = CancellationFlag::new();
    flag.cancel();
    let mut store = RecordingStore::default();
    let result = TrailPipeline::new(out_and_back_config())
        .with_cancellation(flag)
        .run_with_store(&[ridge_row()], &mut store);

    assert_eq!(
        result.unwrap_err(),
        TrailRouteError::Cancelled {
            completed_patterns: 0
        }
    );
    assert_eq!(store.graphs.len(), 1, "the graph was already final");
    assert!(store.patterns.is_empty());
}

#[test]
fn test_config_round_trips_through_json() {
    let config = out_and_back_config();
    let json = serde_json::to_string(&config).unwrap();
    let loaded = PipelineConfig::from_json_str(&json).unwrap();
    assert_eq!(loaded, config);
}
