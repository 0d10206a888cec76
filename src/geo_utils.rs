//! Geographic utilities: distances, lengths, bounds and coordinate keys.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, TrailPoint};

/// Meters per degree of latitude (approximately constant)
pub const METERS_PER_LAT_DEGREE: f64 = 111_319.0;

/// Great-circle distance between two points in meters.
pub fn haversine_distance(p1: &TrailPoint, p2: &TrailPoint) -> f64 {
    let a = Point::new(p1.lng, p1.lat);
    let b = Point::new(p2.lng, p2.lat);
    Haversine::distance(a, b)
}

/// Total horizontal length of a polyline in meters.
pub fn polyline_length(points: &[TrailPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Total horizontal length of a polyline in kilometers.
pub fn polyline_length_km(points: &[TrailPoint]) -> f64 {
    polyline_length(points) / 1000.0
}

/// Length of a path including elevation change, in meters.
///
/// Each step combines the horizontal haversine distance with the vertical
/// difference. Steps where either side lacks elevation count as flat.
pub fn path_length_3d(points: &[TrailPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let horizontal = haversine_distance(&w[0], &w[1]);
            let vertical = match (w[0].elevation, w[1].elevation) {
                (Some(a), Some(b)) => b - a,
                _ => 0.0,
            };
            (horizontal * horizontal + vertical * vertical).sqrt()
        })
        .sum()
}

/// Cumulative elevation gain and loss along a polyline, in meters.
///
/// Returns `None` when fewer than two points carry elevation.
pub fn elevation_gain_loss(points: &[TrailPoint]) -> Option<(f64, f64)> {
    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
    if elevations.len() < 2 {
        return None;
    }
    let mut gain = 0.0;
    let mut loss = 0.0;
    for w in elevations.windows(2) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }
    Some((gain, loss))
}

/// Convert a distance in meters to degrees of longitude at `ref_lat`.
///
/// Longitude degrees shrink towards the poles, so this is the larger of the
/// two degree spans and safe to use as a search buffer on both axes.
pub fn meters_to_degrees(meters: f64, ref_lat: f64) -> f64 {
    let cos_lat = ref_lat.to_radians().cos().abs().max(0.01);
    meters / (METERS_PER_LAT_DEGREE * cos_lat)
}

/// Compute the bounding box of a polyline.
pub fn compute_bounds(points: &[TrailPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lng = min_lng.min(p.lng);
        max_lng = max_lng.max(p.lng);
    }

    Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    }
}

/// Check whether two bounding boxes overlap once padded by `buffer_meters`.
pub fn bounds_overlap(a: &Bounds, b: &Bounds, buffer_meters: f64, ref_lat: f64) -> bool {
    let buffer = meters_to_degrees(buffer_meters, ref_lat);
    a.min_lat - buffer <= b.max_lat
        && a.max_lat + buffer >= b.min_lat
        && a.min_lng - buffer <= b.max_lng
        && a.max_lng + buffer >= b.min_lng
}

/// Round a coordinate to `precision` decimal places and return it as an
/// integer key suitable for hashing.
pub fn coordinate_key(point: &TrailPoint, precision: u32) -> (i64, i64) {
    let factor = 10f64.powi(precision as i32);
    (
        (point.lng * factor).round() as i64,
        (point.lat * factor).round() as i64,
    )
}

/// Linear interpolation between two points at fraction `t` (0..=1).
pub fn interpolate(a: &TrailPoint, b: &TrailPoint, t: f64) -> TrailPoint {
    let elevation = match (a.elevation, b.elevation) {
        (Some(ea), Some(eb)) => Some(ea + (eb - ea) * t),
        (Some(e), None) | (None, Some(e)) => Some(e),
        (None, None) => None,
    };
    TrailPoint {
        lng: a.lng + (b.lng - a.lng) * t,
        lat: a.lat + (b.lat - a.lat) * t,
        elevation,
    }
}
