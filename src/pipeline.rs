//! # Trail Pipeline
//!
//! Runs one ingest end to end: parse and split trails, build and bridge the
//! routing graph, validate it, then generate routes pattern by pattern.
//!
//! Stages run strictly in order. A graph that cannot be built or fails
//! validation is a hard error; a pattern with no routes is a normal result.
//! Cancellation is checked between patterns, and storage only ever sees
//! finalized data.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::collaborators::{ElevationSource, NoElevation, RouteStore};
use crate::engine::{PatternResult, PatternStatus, RouteGenerationConfig, RouteGenerationEngine};
use crate::error::{Result, TrailRouteError};
use crate::oracle::{GeoOracle, GeometryOracle, GraphOracle, NetworkOracle};
use crate::routing::{BridgeConfig, BridgeReport, GapBridger, GraphConfig, GraphStats, RoutingGraph, RoutingGraphBuilder};
use crate::splitter::{SplitReport, SplitterConfig, TrailSplitter};
use crate::TrailRow;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a whole ingest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub splitter: SplitterConfig,
    pub graph: GraphConfig,
    pub bridge: BridgeConfig,
    pub generation: RouteGenerationConfig,
}

impl PipelineConfig {
    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TrailRouteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run can work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.splitter.intersection_tolerance_meters >= 0.0) {
            return Err(TrailRouteError::Config(
                "intersection_tolerance_meters must not be negative".to_string(),
            ));
        }
        if !(self.graph.node_snap_tolerance_meters >= 0.0) {
            return Err(TrailRouteError::Config(
                "node_snap_tolerance_meters must not be negative".to_string(),
            ));
        }
        if self.graph.coordinate_precision > 12 {
            return Err(TrailRouteError::Config(format!(
                "coordinate_precision {} is beyond f64 resolution",
                self.graph.coordinate_precision
            )));
        }
        if !(self.bridge.tolerance_meters >= 0.0) {
            return Err(TrailRouteError::Config(
                "bridge tolerance_meters must not be negative".to_string(),
            ));
        }
        self.generation.validate()
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared flag for coarse cancellation. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Per-stage results of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub split: SplitReport,
    pub bridge: BridgeReport,
    pub graph: GraphStats,
    pub routing_graph: RoutingGraph,
    /// One entry per configured pattern, in configuration order
    pub patterns: Vec<PatternResult>,
}

impl PipelineReport {
    pub fn total_routes(&self) -> usize {
        self.patterns.iter().map(|p| p.routes.len()).sum()
    }

    /// Patterns that produced nothing at any tolerance level.
    pub fn empty_patterns(&self) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.status == PatternStatus::NoRoutes)
            .map(|p| p.pattern.name.as_str())
            .collect()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Staged trails -> graph -> routes pipeline.
pub struct TrailPipeline {
    config: PipelineConfig,
    geometry_oracle: Arc<dyn GeometryOracle>,
    graph_oracle: Arc<dyn GraphOracle>,
    elevation: Arc<dyn ElevationSource>,
    cancellation: CancellationFlag,
}

impl TrailPipeline {
    /// Create a pipeline with the default oracles and no elevation source.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            geometry_oracle: Arc::new(GeoOracle),
            graph_oracle: Arc::new(NetworkOracle::default()),
            elevation: Arc::new(NoElevation),
            cancellation: CancellationFlag::new(),
        }
    }

    pub fn with_geometry_oracle(mut self, oracle: Arc<dyn GeometryOracle>) -> Self {
        self.geometry_oracle = oracle;
        self
    }

    pub fn with_graph_oracle(mut self, oracle: Arc<dyn GraphOracle>) -> Self {
        self.graph_oracle = oracle;
        self
    }

    pub fn with_elevation_source(mut self, source: Arc<dyn ElevationSource>) -> Self {
        self.elevation = source;
        self
    }

    /// Observe `flag` between patterns.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Run every stage without persisting anything.
    pub fn run(&self, rows: &[TrailRow]) -> Result<PipelineReport> {
        self.execute(rows, None)
    }

    /// Run every stage, handing the validated graph and each finalized
    /// pattern to `store`.
    pub fn run_with_store(&self, rows: &[TrailRow], store: &mut dyn RouteStore) -> Result<PipelineReport> {
        self.execute(rows, Some(store))
    }

    fn execute(&self, rows: &[TrailRow], mut store: Option<&mut dyn RouteStore>) -> Result<PipelineReport> {
        self.config.validate()?;
        info!("[Pipeline] Starting run over {} trail rows", rows.len());

        let splitter = TrailSplitter::with_oracle(self.config.splitter.clone(), self.geometry_oracle.clone());
        let split = splitter.split_rows(rows);
        if !split.skipped.is_empty() {
            warn!("[Pipeline] {} trail(s) skipped during splitting", split.skipped.len());
        }

        let builder =
            RoutingGraphBuilder::new(self.config.graph.clone()).with_elevation_source(self.elevation.clone());
        let mut graph = builder.build(&split.segments)?;

        let bridger = GapBridger::with_oracle(self.config.bridge.clone(), self.geometry_oracle.clone());
        let bridge = bridger.bridge(&mut graph)?;
        graph.validate()?;

        let stats = graph.stats();
        info!(
            "[Pipeline] Graph ready: {} nodes, {} edges, {} component(s), {} bridge edge(s)",
            stats.node_count, stats.edge_count, stats.component_count, stats.bridge_edge_count
        );
        if let Some(store) = store.as_deref_mut() {
            store.store_graph(&graph).map_err(|e| collaborator_error("graph store", e))?;
        }

        let engine = RouteGenerationEngine::with_oracle(
            &graph,
            self.config.generation.clone(),
            self.graph_oracle.clone(),
        );
        let mut patterns = Vec::with_capacity(self.config.generation.patterns.len());
        for pattern in &self.config.generation.patterns {
            if self.cancellation.is_cancelled() {
                warn!(
                    "[Pipeline] Cancelled before '{}' ({} pattern(s) done)",
                    pattern.name,
                    patterns.len()
                );
                return Err(TrailRouteError::Cancelled {
                    completed_patterns: patterns.len(),
                });
            }
            let result = engine.generate_pattern(pattern);
            result.check_distinct_routes()?;
            if let Some(store) = store.as_deref_mut() {
                store
                    .store_routes(&result)
                    .map_err(|e| collaborator_error("route store", e))?;
            }
            patterns.push(result);
        }

        let report = PipelineReport {
            split,
            bridge,
            graph: stats,
            routing_graph: graph,
            patterns,
        };
        info!(
            "[Pipeline] Done: {} route(s) over {} pattern(s), {} with none",
            report.total_routes(),
            report.patterns.len(),
            report.empty_patterns().len()
        );
        Ok(report)
    }
}

fn collaborator_error(collaborator: &str, error: TrailRouteError) -> TrailRouteError {
    match error {
        TrailRouteError::Collaborator { .. } => error,
        other => TrailRouteError::Collaborator {
            collaborator: collaborator.to_string(),
            message: other.to_string(),
        },
    }
}
