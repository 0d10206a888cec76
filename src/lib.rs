//! # Trail Router
//!
//! Turns a raw collection of overlapping trail linestrings into a routable
//! graph, then searches that graph for recreational routes matching a target
//! distance and elevation profile.
//!
//! This library provides:
//! - Trail intersection detection and splitting into disjoint segments
//! - Routing graph construction with coordinate-keyed node deduplication
//! - Gap bridging for nearly-touching trail ends
//! - Route generation (out-and-back, loop, lollipop, point-to-point)
//! - Exact, endpoint and containment deduplication plus composite scoring
//!
//! ## Features
//!
//! - **`parallel`** - Fan route search out over entry points with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trail_router::{TrailPipeline, PipelineConfig, TrailRow};
//!
//! let rows = vec![
//!     TrailRow::new(1, "mesa", "Mesa Trail", "LINESTRING Z (-105.30 40.00 1700, -105.30 40.01 1750, -105.30 40.02 1800)"),
//!     TrailRow::new(2, "bluebell", "Bluebell Road", "LINESTRING Z (-105.31 40.01 1720, -105.30 40.01 1750, -105.29 40.01 1760)"),
//! ];
//!
//! let pipeline = TrailPipeline::new(PipelineConfig::default());
//! let report = pipeline.run(&rows).expect("graph build failed");
//! println!("{} nodes, {} edges", report.graph.node_count, report.graph.edge_count);
//! for pattern in &report.patterns {
//!     println!("{}: {} route(s)", pattern.pattern.name, pattern.routes.len());
//! }
//! ```

use rstar::{RTreeObject, AABB};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, OracleError, Result, TrailRouteError};

// Geographic utilities (distance, bounds, coordinate keys)
pub mod geo_utils;

// WKT geometry text
pub mod wkt;

// R-tree point index with meter-radius queries
pub mod spatial;

// Union-Find for connected components
pub mod union_find;
pub use union_find::UnionFind;

// Geometry and graph query interfaces with default implementations
pub mod oracle;
pub use oracle::{
    Cycle, GeoOracle, GeometryOracle, GraphOracle, NetworkGraph, NetworkOracle, Path, PathStep,
};

// External collaborators (elevation lookup, storage)
pub mod collaborators;
pub use collaborators::{ElevationSource, NoElevation, RouteStore};

// Trail splitting at intersections
pub mod splitter;
pub use splitter::{detect_intersections, SplitReport, SplitterConfig, TrailSplitter};

// Routing graph construction and gap bridging
pub mod routing;
pub use routing::{
    BridgeConfig, GapBridger, GraphConfig, GraphStats, NodeType, RoutingEdge, RoutingGraph,
    RoutingGraphBuilder, RoutingNode,
};

// Route generation engine and strategies
pub mod engine;
pub use engine::{
    PatternResult, PatternStatus, RouteCandidate, RouteGenerationConfig, RouteGenerationEngine,
    RoutePattern, RouteRecommendation, RouteShape, RouteStrategy, ToleranceLevel,
};

// Route deduplication
pub mod dedup;

// Composite scoring and naming
pub mod scoring;
pub use scoring::ScoringConfig;

// GeoJSON export of routes and graphs
pub mod export;

// Staged pipeline tying everything together
pub mod pipeline;
pub use pipeline::{CancellationFlag, PipelineConfig, PipelineReport, TrailPipeline};

// Algorithm toolbox - standalone access to the building blocks
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A trail coordinate: longitude, latitude and optional elevation in meters.
///
/// # Example
/// ```
/// use trail_router::TrailPoint;
/// let point = TrailPoint::with_elevation(-105.2705, 40.0150, 1655.0); // Boulder
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub lng: f64,
    pub lat: f64,
    pub elevation: Option<f64>,
}

impl TrailPoint {
    /// Create a 2D point.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            lng,
            lat,
            elevation: None,
        }
    }

    /// Create a 3D point.
    pub fn with_elevation(lng: f64, lat: f64, elevation: f64) -> Self {
        Self {
            lng,
            lat,
            elevation: Some(elevation),
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
            && self.elevation.map_or(true, f64::is_finite)
    }

    /// Planar coordinate for `geo` algorithms (x = lng, y = lat).
    pub fn coord(&self) -> geo::Coord<f64> {
        geo::Coord {
            x: self.lng,
            y: self.lat,
        }
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from trail points.
    pub fn from_points(points: &[TrailPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> TrailPoint {
        TrailPoint::new(
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

/// Elevation statistics in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationStats {
    pub gain: f64,
    pub loss: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ElevationStats {
    /// Derive statistics from the elevations carried by `points`.
    ///
    /// Returns `None` if fewer than two points have elevation.
    pub fn from_points(points: &[TrailPoint]) -> Option<Self> {
        let (gain, loss) = geo_utils::elevation_gain_loss(points)?;
        let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
        let min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
        let max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = elevations.iter().sum::<f64>() / elevations.len() as f64;
        Some(Self {
            gain,
            loss,
            min,
            max,
            avg,
        })
    }
}

/// Classification tags carried from source trails to segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailTags {
    pub trail_type: Option<String>,
    pub surface: Option<String>,
    pub difficulty: Option<String>,
}

/// An immutable source trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    /// Internal numeric id (unique per ingest)
    pub id: u64,
    /// Stable external identifier, kept by the first split segment
    pub external_id: String,
    pub name: String,
    /// Ordered coordinates
    pub geometry: Vec<TrailPoint>,
    /// Length in kilometers
    pub length_km: f64,
    /// Elevation statistics, if known
    pub elevation: Option<ElevationStats>,
    pub tags: TrailTags,
}

impl Trail {
    /// Create a trail from parsed geometry, deriving length and elevation
    /// statistics from the coordinates.
    pub fn new(id: u64, external_id: &str, name: &str, geometry: Vec<TrailPoint>) -> Self {
        let length_km = geo_utils::polyline_length_km(&geometry);
        let elevation = ElevationStats::from_points(&geometry);
        Self {
            id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            geometry,
            length_km,
            elevation,
            tags: TrailTags::default(),
        }
    }

    /// Attach classification tags.
    pub fn with_tags(mut self, tags: TrailTags) -> Self {
        self.tags = tags;
        self
    }
}

/// A trail record as it arrives from the staging layer, with geometry still
/// in text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailRow {
    pub id: u64,
    pub external_id: String,
    pub name: String,
    /// WKT `LINESTRING [Z]` text
    pub geometry_wkt: String,
    /// Stored length; recomputed from geometry when absent
    pub length_km: Option<f64>,
    /// Stored elevation statistics; derived from geometry when absent
    pub elevation: Option<ElevationStats>,
    #[serde(default)]
    pub tags: TrailTags,
}

impl TrailRow {
    /// Create a row with only the required fields.
    pub fn new(id: u64, external_id: &str, name: &str, geometry_wkt: &str) -> Self {
        Self {
            id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            geometry_wkt: geometry_wkt.to_string(),
            length_km: None,
            elevation: None,
            tags: TrailTags::default(),
        }
    }

    /// Parse the geometry text into a typed [`Trail`].
    pub fn parse(&self) -> Result<Trail> {
        let geometry = wkt::parse_linestring(&self.external_id, &self.geometry_wkt)?;
        let mut trail = Trail::new(self.id, &self.external_id, &self.name, geometry);
        if let Some(length_km) = self.length_km.filter(|l| *l > 0.0) {
            trail.length_km = length_km;
        }
        if self.elevation.is_some() {
            trail.elevation = self.elevation;
        }
        trail.tags = self.tags.clone();
        Ok(trail)
    }
}

/// A point where two trails (or one trail with itself) meet.
///
/// Ephemeral: computed per ingest run and consumed by the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionPoint {
    pub point: TrailPoint,
    pub trail_a: u64,
    pub trail_b: u64,
    /// Distance between the two source geometries at this point, in meters
    pub distance_meters: f64,
}

impl IntersectionPoint {
    /// Whether the point is a crossing of a trail with itself.
    pub fn is_self_intersection(&self) -> bool {
        self.trail_a == self.trail_b
    }
}

/// A non-overlapping piece of a trail produced by splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailSegment {
    /// Parent trail id
    pub trail_id: u64,
    /// 1-based position within the parent trail
    pub segment_index: u32,
    /// Parent's external id for segment 1, `<parent>-N` afterwards
    pub external_id: String,
    /// Parent's external id
    pub parent_external_id: String,
    pub name: String,
    /// Contiguous sub-sequence of the parent's coordinates
    pub geometry: Vec<TrailPoint>,
    /// Recomputed from `geometry`, in kilometers
    pub length_km: f64,
    pub elevation: Option<ElevationStats>,
    pub tags: TrailTags,
}

impl TrailSegment {
    pub fn start(&self) -> Option<&TrailPoint> {
        self.geometry.first()
    }

    pub fn end(&self) -> Option<&TrailPoint> {
        self.geometry.last()
    }
}

// ============================================================================
// Spatial Indexing Types
// ============================================================================

/// Bounding box of a trail, used to find candidate intersecting pairs.
#[derive(Debug, Clone)]
pub struct TrailBounds {
    /// Index into the trail slice the tree was built from
    pub index: usize,
    pub bounds: Bounds,
}

impl RTreeObject for TrailBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_point_validation() {
        assert!(TrailPoint::new(-105.27, 40.01).is_valid());
        assert!(!TrailPoint::new(0.0, 91.0).is_valid());
        assert!(!TrailPoint::new(181.0, 0.0).is_valid());
        assert!(!TrailPoint::with_elevation(0.0, 0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_elevation_stats() {
        let points = vec![
            TrailPoint::with_elevation(0.0, 0.0, 100.0),
            TrailPoint::with_elevation(0.0, 0.001, 160.0),
            TrailPoint::with_elevation(0.0, 0.002, 130.0),
        ];
        let stats = ElevationStats::from_points(&points).unwrap();
        assert_eq!(stats.gain, 60.0);
        assert_eq!(stats.loss, 30.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 160.0);
        assert!((stats.avg - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_trail_row_parse() {
        let mut row = TrailRow::new(3, "ext-3", "Mesa", "LINESTRING (0 0, 0 0.01)");
        row.length_km = Some(1.5);
        let trail = row.parse().unwrap();
        assert_eq!(trail.geometry.len(), 2);
        assert_eq!(trail.length_km, 1.5);
        assert!(trail.elevation.is_none());

        let bad = TrailRow::new(4, "ext-4", "Broken", "LINESTRING (0 0, nope)");
        assert!(matches!(
            bad.parse(),
            Err(TrailRouteError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_trail_new_computes_length() {
        let trail = Trail::new(
            1,
            "t1",
            "North",
            vec![TrailPoint::new(0.0, 0.0), TrailPoint::new(0.0, 0.01)],
        );
        // 0.01 degrees of latitude is about 1.11 km
        assert!((trail.length_km - 1.11).abs() < 0.01);
    }
}
