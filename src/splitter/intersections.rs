//! Pairwise intersection detection between trails.

use log::{debug, warn};
use rstar::{RTree, AABB};

use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::oracle::GeometryOracle;
use crate::{Bounds, IntersectionPoint, Trail, TrailBounds, TrailPoint};

/// Intersection points for the same trail pair closer than this are merged.
const DUPLICATE_POINT_METERS: f64 = 0.1;

/// Find every point where two trails cross or nearly touch, plus points
/// where a trail crosses itself.
///
/// Candidate pairs come from an R-tree over trail bounding boxes padded by
/// `tolerance_meters`; the geometry work is delegated to `oracle`. A failing
/// oracle query only loses the intersections of that pair.
pub fn detect_intersections(
    trails: &[Trail],
    oracle: &dyn GeometryOracle,
    tolerance_meters: f64,
) -> Vec<IntersectionPoint> {
    let usable: Vec<&Trail> = trails.iter().filter(|t| t.geometry.len() >= 2).collect();
    let boxes: Vec<TrailBounds> = usable
        .iter()
        .enumerate()
        .filter_map(|(index, t)| {
            Bounds::from_points(&t.geometry).map(|bounds| TrailBounds { index, bounds })
        })
        .collect();
    let rtree = RTree::bulk_load(boxes.clone());

    let mut found: Vec<IntersectionPoint> = Vec::new();

    for tb in &boxes {
        let trail_a = usable[tb.index];
        let pad = meters_to_degrees(tolerance_meters, tb.bounds.center().lat);
        let search = AABB::from_corners(
            [tb.bounds.min_lng - pad, tb.bounds.min_lat - pad],
            [tb.bounds.max_lng + pad, tb.bounds.max_lat + pad],
        );

        for other in rtree.locate_in_envelope_intersecting(&search) {
            if other.index <= tb.index {
                continue;
            }
            let trail_b = usable[other.index];
            let mut pair_points = Vec::new();

            match oracle.intersection_points(&trail_a.geometry, &trail_b.geometry) {
                Ok(points) => {
                    for p in points {
                        pair_points.push(IntersectionPoint {
                            point: p,
                            trail_a: trail_a.id,
                            trail_b: trail_b.id,
                            distance_meters: 0.0,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "[Splitter] Intersection query {} x {} failed: {}",
                        trail_a.external_id, trail_b.external_id, e
                    );
                    continue;
                }
            }

            near_touches(oracle, trail_a, trail_b, tolerance_meters, &mut pair_points);
            near_touches(oracle, trail_b, trail_a, tolerance_meters, &mut pair_points);

            for ip in pair_points {
                push_unique(&mut found, ip);
            }
        }

        match oracle.self_intersections(&trail_a.geometry) {
            Ok(points) => {
                for p in points {
                    push_unique(
                        &mut found,
                        IntersectionPoint {
                            point: p,
                            trail_a: trail_a.id,
                            trail_b: trail_a.id,
                            distance_meters: 0.0,
                        },
                    );
                }
            }
            Err(e) => warn!(
                "[Splitter] Self-intersection query for {} failed: {}",
                trail_a.external_id, e
            ),
        }
    }

    found.sort_by(|a, b| {
        (a.trail_a, a.trail_b)
            .cmp(&(b.trail_a, b.trail_b))
            .then_with(|| a.point.lng.total_cmp(&b.point.lng))
            .then_with(|| a.point.lat.total_cmp(&b.point.lat))
    });
    debug!("[Splitter] Detected {} intersection point(s) across {} trails", found.len(), trails.len());
    found
}

/// Endpoints of `from` lying within tolerance of `onto` (T-junctions that
/// stop just short of, or just past, the other trail).
fn near_touches(
    oracle: &dyn GeometryOracle,
    from: &Trail,
    onto: &Trail,
    tolerance_meters: f64,
    out: &mut Vec<IntersectionPoint>,
) {
    let ends: [&TrailPoint; 2] = [&from.geometry[0], &from.geometry[from.geometry.len() - 1]];
    for end in ends {
        let nearest = match oracle.nearest_point_on_line(end, &onto.geometry) {
            Ok(p) => p,
            Err(e) => {
                debug!(
                    "[Splitter] Nearest-point query {} -> {} failed: {}",
                    from.external_id, onto.external_id, e
                );
                continue;
            }
        };
        let d = oracle.distance(end, &nearest);
        if d <= tolerance_meters {
            out.push(IntersectionPoint {
                point: nearest,
                trail_a: from.id.min(onto.id),
                trail_b: from.id.max(onto.id),
                distance_meters: d,
            });
        }
    }
}

fn push_unique(found: &mut Vec<IntersectionPoint>, ip: IntersectionPoint) {
    let duplicate = found.iter().any(|other| {
        other.trail_a == ip.trail_a
            && other.trail_b == ip.trail_b
            && haversine_distance(&other.point, &ip.point) < DUPLICATE_POINT_METERS
    });
    if !duplicate {
        found.push(ip);
    }
}
