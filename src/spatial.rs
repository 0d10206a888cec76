//! R-tree indexed point types and radius queries in meters.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::TrailPoint;

/// A coordinate with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub idx: usize,
    pub lng: f64,
    pub lat: f64,
}

impl IndexedPoint {
    pub fn new(idx: usize, point: &TrailPoint) -> Self {
        Self {
            idx,
            lng: point.lng,
            lat: point.lat,
        }
    }

    fn as_point(&self) -> TrailPoint {
        TrailPoint::new(self.lng, self.lat)
    }
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlng = self.lng - point[0];
        let dlat = self.lat - point[1];
        dlng * dlng + dlat * dlat
    }
}

/// Build R-tree from trail points for efficient spatial queries
pub fn build_rtree(points: &[TrailPoint]) -> RTree<IndexedPoint> {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| IndexedPoint::new(i, p))
        .collect();
    RTree::bulk_load(indexed)
}

/// Index of the planar-nearest point.
pub fn nearest_index(tree: &RTree<IndexedPoint>, point: &TrailPoint) -> Option<usize> {
    tree.nearest_neighbor(&[point.lng, point.lat]).map(|p| p.idx)
}

/// All indexed points within `meters` of `point` (haversine), nearest first.
/// Returns `(index, distance_meters)` pairs.
pub fn within_meters(
    tree: &RTree<IndexedPoint>,
    point: &TrailPoint,
    meters: f64,
) -> Vec<(usize, f64)> {
    let radius = meters_to_degrees(meters, point.lat);
    let mut hits: Vec<(usize, f64)> = tree
        .locate_within_distance([point.lng, point.lat], radius * radius)
        .map(|p| (p.idx, haversine_distance(&p.as_point(), point)))
        .filter(|(_, d)| *d <= meters)
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    hits
}
