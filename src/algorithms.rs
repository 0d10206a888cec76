//! # Algorithm Toolbox
//!
//! This module provides direct access to the building blocks of the
//! trail pipeline. Use these for integrating specific steps into your own
//! systems without running the full [`TrailPipeline`](crate::TrailPipeline).
//!
//! ## Core Algorithms
//!
//! - **Intersection Detection**: crossings, near-touches and self-crossings
//! - **Trail Splitting**: cut trails into disjoint segments
//! - **Graph Building**: coordinate-keyed node dedup plus gap bridging
//! - **Path Search**: A*, Yen's K shortest paths, bounded cycle enumeration
//! - **Deduplication and Scoring**: exact, endpoint and containment rules
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance between trail points
//! - **Polyline Length**: Total distance along a path, optionally 3D
//! - **Douglas-Peucker**: Line simplification
//!
//! # Example
//!
//! ```rust
//! use trail_router::algorithms::{haversine_distance, parse_linestring, TrailPoint};
//!
//! let line = parse_linestring("demo", "LINESTRING (-105.27 40.01, -105.27 40.02)").unwrap();
//! let meters = haversine_distance(&line[0], &line[1]);
//! assert!((meters - 1112.0).abs() < 5.0);
//! let _ = TrailPoint::new(-105.27, 40.01);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{
    Bounds, ElevationStats, IntersectionPoint, Trail, TrailPoint, TrailRow, TrailSegment,
};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    bounds_overlap, compute_bounds, coordinate_key, elevation_gain_loss, haversine_distance,
    interpolate, meters_to_degrees, path_length_3d, polyline_length, polyline_length_km,
};

/// WKT `LINESTRING [Z]` parsing and writing
pub use crate::wkt::{parse_linestring, write_linestring};

// =============================================================================
// Splitting and Graph Building
// =============================================================================

/// Find every point where trails cross, nearly touch, or cross themselves
pub use crate::splitter::detect_intersections;
pub use crate::splitter::{SplitReport, SplitterConfig, TrailSplitter};

pub use crate::routing::{
    BridgeConfig, BridgeReport, GapBridger, GraphConfig, RoutingGraph, RoutingGraphBuilder,
};

// =============================================================================
// Path Search
// =============================================================================

/// Graph queries (shortest path, K shortest paths, cycles, components)
pub use crate::oracle::{GraphOracle, NetworkGraph, NetworkOracle, Path, PathStep};
/// Geometry queries (intersections, closest points, distances)
pub use crate::oracle::{GeoOracle, GeometryOracle};

/// Union-Find with path compression
pub use crate::union_find::UnionFind;

// =============================================================================
// Deduplication and Scoring
// =============================================================================

pub use crate::dedup::{remove_contained, EndpointIndex, ExactRouteSet, RouteEdges};
pub use crate::scoring::{route_name, score_route, similarity, ScoringConfig};

// =============================================================================
// Line Simplification
// =============================================================================

/// Douglas-Peucker line simplification.
///
/// `tolerance` is in degrees. Elevation survives on every kept vertex.
///
/// # Example
/// ```rust
/// use trail_router::algorithms::{simplify_trail, TrailPoint};
///
/// let trail = vec![
///     TrailPoint::new(-105.2700, 40.0100),
///     TrailPoint::new(-105.2700, 40.0150),
///     TrailPoint::new(-105.2700, 40.0200),
/// ];
/// assert_eq!(simplify_trail(&trail, 0.0001).len(), 2);
/// ```
pub fn simplify_trail(points: &[TrailPoint], tolerance: f64) -> Vec<TrailPoint> {
    use geo::{algorithm::simplify::SimplifyIdx, Coord, LineString};

    if points.len() < 3 {
        return points.to_vec();
    }

    let line = LineString::new(points.iter().map(|p| p.coord()).collect::<Vec<Coord<f64>>>());
    line.simplify_idx(&tolerance)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

// =============================================================================
// Spatial Indexing
// =============================================================================

/// Point index with meter-radius queries
pub use crate::spatial::{build_rtree, nearest_index, within_meters, IndexedPoint};

/// R-tree spatial index for custom geographic queries.
pub use rstar::RTree;
