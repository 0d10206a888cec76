//! Default [`GeometryOracle`] backed by the `geo` crate.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Closest, ClosestPoint, Line, Point};

use super::GeometryOracle;
use crate::error::OracleError;
use crate::geo_utils::{haversine_distance, interpolate};
use crate::TrailPoint;

/// Two points closer than this (in degrees) are the same vertex.
const SAME_POINT_DEGREES: f64 = 1e-9;

/// Geometry oracle using planar segment math on lng/lat for topology and
/// haversine for distances.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoOracle;

fn segment(a: &TrailPoint, b: &TrailPoint) -> Line<f64> {
    Line::new(a.coord(), b.coord())
}

fn boxes_touch(a: &Line<f64>, b: &Line<f64>) -> bool {
    let (a_min_x, a_max_x) = (a.start.x.min(a.end.x), a.start.x.max(a.end.x));
    let (a_min_y, a_max_y) = (a.start.y.min(a.end.y), a.start.y.max(a.end.y));
    let (b_min_x, b_max_x) = (b.start.x.min(b.end.x), b.start.x.max(b.end.x));
    let (b_min_y, b_max_y) = (b.start.y.min(b.end.y), b.start.y.max(b.end.y));
    a_min_x <= b_max_x && a_max_x >= b_min_x && a_min_y <= b_max_y && a_max_y >= b_min_y
}

/// Fraction along `a -> b` of the planar projection of `p`.
fn fraction_on_segment(a: &TrailPoint, b: &TrailPoint, p: &geo::Coord<f64>) -> f64 {
    let dx = b.lng - a.lng;
    let dy = b.lat - a.lat;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return 0.0;
    }
    (((p.x - a.lng) * dx + (p.y - a.lat) * dy) / len_sq).clamp(0.0, 1.0)
}

fn push_unique(points: &mut Vec<TrailPoint>, p: TrailPoint) {
    let duplicate = points.iter().any(|q| {
        (q.lng - p.lng).abs() < SAME_POINT_DEGREES && (q.lat - p.lat).abs() < SAME_POINT_DEGREES
    });
    if !duplicate {
        points.push(p);
    }
}

fn require_line(line: &[TrailPoint]) -> Result<(), OracleError> {
    if line.len() < 2 {
        return Err(OracleError::DegenerateGeometry(format!(
            "line with {} point(s)",
            line.len()
        )));
    }
    Ok(())
}

impl GeoOracle {
    /// Intersections of segment `i` of `a` with segment `j` of `b`, with
    /// elevation interpolated along `a`.
    fn segment_crossings(
        a0: &TrailPoint,
        a1: &TrailPoint,
        b0: &TrailPoint,
        b1: &TrailPoint,
        out: &mut Vec<TrailPoint>,
    ) {
        let la = segment(a0, a1);
        let lb = segment(b0, b1);
        if !boxes_touch(&la, &lb) {
            return;
        }
        match line_intersection(la, lb) {
            Some(LineIntersection::SinglePoint { intersection, .. }) => {
                let t = fraction_on_segment(a0, a1, &intersection);
                let mut p = interpolate(a0, a1, t);
                p.lng = intersection.x;
                p.lat = intersection.y;
                push_unique(out, p);
            }
            Some(LineIntersection::Collinear { intersection }) => {
                // Shared stretch: report where the overlap begins and ends.
                for c in [intersection.start, intersection.end] {
                    let t = fraction_on_segment(a0, a1, &c);
                    let mut p = interpolate(a0, a1, t);
                    p.lng = c.x;
                    p.lat = c.y;
                    push_unique(out, p);
                }
            }
            None => {}
        }
    }
}

impl GeometryOracle for GeoOracle {
    fn intersection_points(
        &self,
        a: &[TrailPoint],
        b: &[TrailPoint],
    ) -> Result<Vec<TrailPoint>, OracleError> {
        require_line(a)?;
        require_line(b)?;
        let mut out = Vec::new();
        for wa in a.windows(2) {
            for wb in b.windows(2) {
                Self::segment_crossings(&wa[0], &wa[1], &wb[0], &wb[1], &mut out);
            }
        }
        Ok(out)
    }

    fn self_intersections(&self, line: &[TrailPoint]) -> Result<Vec<TrailPoint>, OracleError> {
        require_line(line)?;
        let n = line.len() - 1;
        let closed = n > 2 && haversine_distance(&line[0], &line[n]) < 1e-6;
        let mut out = Vec::new();
        for i in 0..n {
            for j in (i + 2)..n {
                // First and last segments of a closed ring share the closing vertex.
                if closed && i == 0 && j == n - 1 {
                    continue;
                }
                Self::segment_crossings(&line[i], &line[i + 1], &line[j], &line[j + 1], &mut out);
            }
        }
        Ok(out)
    }

    fn distance(&self, a: &TrailPoint, b: &TrailPoint) -> f64 {
        haversine_distance(a, b)
    }

    fn nearest_point_on_line(
        &self,
        point: &TrailPoint,
        line: &[TrailPoint],
    ) -> Result<TrailPoint, OracleError> {
        require_line(line)?;
        let query = Point::new(point.lng, point.lat);
        let mut best: Option<(f64, TrailPoint)> = None;

        for w in line.windows(2) {
            let candidate = match segment(&w[0], &w[1]).closest_point(&query) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => p,
                Closest::Indeterminate => Point::from(w[0].coord()),
            };
            let t = fraction_on_segment(&w[0], &w[1], &candidate.0);
            let mut p = interpolate(&w[0], &w[1], t);
            p.lng = candidate.x();
            p.lat = candidate.y();
            let d = haversine_distance(point, &p);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, p));
            }
        }

        best.map(|(_, p)| p)
            .ok_or_else(|| OracleError::DegenerateGeometry("no segments".to_string()))
    }

    fn substring(
        &self,
        line: &[TrailPoint],
        start_fraction: f64,
        end_fraction: f64,
    ) -> Result<Vec<TrailPoint>, OracleError> {
        require_line(line)?;
        if !(0.0..=1.0).contains(&start_fraction)
            || !(0.0..=1.0).contains(&end_fraction)
            || start_fraction >= end_fraction
        {
            return Err(OracleError::DegenerateGeometry(format!(
                "invalid substring range {}..{}",
                start_fraction, end_fraction
            )));
        }

        let lengths: Vec<f64> = line
            .windows(2)
            .map(|w| haversine_distance(&w[0], &w[1]))
            .collect();
        let total: f64 = lengths.iter().sum();
        if total == 0.0 {
            return Err(OracleError::DegenerateGeometry("zero-length line".to_string()));
        }
        let start_m = start_fraction * total;
        let end_m = end_fraction * total;

        let mut out = Vec::new();
        let mut walked = 0.0;
        for (i, len) in lengths.iter().enumerate() {
            let seg_start = walked;
            let seg_end = walked + len;
            walked = seg_end;
            if seg_end < start_m || seg_start > end_m || *len == 0.0 {
                continue;
            }
            if out.is_empty() {
                let t = ((start_m - seg_start) / len).clamp(0.0, 1.0);
                out.push(interpolate(&line[i], &line[i + 1], t));
            }
            if seg_end <= end_m {
                push_unique(&mut out, line[i + 1]);
            } else {
                let t = ((end_m - seg_start) / len).clamp(0.0, 1.0);
                push_unique(&mut out, interpolate(&line[i], &line[i + 1], t));
                break;
            }
        }

        if out.len() < 2 {
            return Err(OracleError::DegenerateGeometry("substring collapsed to a point".to_string()));
        }
        Ok(out)
    }

    fn merge(&self, lines: &[Vec<TrailPoint>]) -> Result<Vec<TrailPoint>, OracleError> {
        let mut remaining: Vec<&Vec<TrailPoint>> = lines.iter().filter(|l| !l.is_empty()).collect();
        if remaining.is_empty() {
            return Err(OracleError::DegenerateGeometry("nothing to merge".to_string()));
        }
        let mut merged: Vec<TrailPoint> = remaining.remove(0).clone();

        let touches = |a: &TrailPoint, b: &TrailPoint| haversine_distance(a, b) < 0.05;

        while !remaining.is_empty() {
            let head = merged[0];
            let tail = merged[merged.len() - 1];
            let position = remaining.iter().position(|l| {
                let first = &l[0];
                let last = &l[l.len() - 1];
                touches(&tail, first) || touches(&tail, last) || touches(&head, first) || touches(&head, last)
            });
            let idx = position.ok_or_else(|| {
                OracleError::DegenerateGeometry(format!(
                    "{} line(s) do not connect to the merged line",
                    remaining.len()
                ))
            })?;
            let piece = remaining.remove(idx);
            let first = piece[0];
            let last = piece[piece.len() - 1];

            if touches(&tail, &first) {
                merged.extend(piece.iter().skip(1).copied());
            } else if touches(&tail, &last) {
                merged.extend(piece.iter().rev().skip(1).copied());
            } else if touches(&head, &last) {
                let mut joined = piece.clone();
                joined.extend(merged.iter().skip(1).copied());
                merged = joined;
            } else {
                let mut joined: Vec<TrailPoint> = piece.iter().rev().copied().collect();
                joined.extend(merged.iter().skip(1).copied());
                merged = joined;
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64)]) -> Vec<TrailPoint> {
        points.iter().map(|&(lng, lat)| TrailPoint::new(lng, lat)).collect()
    }

    #[test]
    fn test_crossing_lines_intersect_once() {
        let a = line(&[(0.0, 0.0), (0.02, 0.02)]);
        let b = line(&[(0.0, 0.02), (0.02, 0.0)]);
        let points = GeoOracle.intersection_points(&a, &b).unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].lng - 0.01).abs() < 1e-12);
        assert!((points[0].lat - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_shared_vertex_reported_once() {
        let a = line(&[(0.0, 0.0), (0.01, 0.01), (0.02, 0.02)]);
        let b = line(&[(0.0, 0.02), (0.01, 0.01), (0.02, 0.0)]);
        let points = GeoOracle.intersection_points(&a, &b).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_elevation_interpolated_along_first_line() {
        let a = vec![
            TrailPoint::with_elevation(0.0, 0.0, 100.0),
            TrailPoint::with_elevation(0.02, 0.0, 200.0),
        ];
        let b = line(&[(0.01, -0.01), (0.01, 0.01)]);
        let p = GeoOracle.intersect(&a, &b).unwrap().unwrap();
        assert!((p.elevation.unwrap() - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_self_intersection_of_figure_eight() {
        let figure = line(&[(0.0, 0.0), (0.02, 0.02), (0.02, 0.0), (0.0, 0.02)]);
        let points = GeoOracle.self_intersections(&figure).unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].lng - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_point_on_line() {
        let l = line(&[(0.0, 0.0), (0.02, 0.0)]);
        let p = GeoOracle
            .nearest_point_on_line(&TrailPoint::new(0.005, 0.001), &l)
            .unwrap();
        assert!((p.lng - 0.005).abs() < 1e-12);
        assert!(p.lat.abs() < 1e-12);
    }

    #[test]
    fn test_substring_middle_half() {
        let l = line(&[(0.0, 0.0), (0.01, 0.0), (0.02, 0.0), (0.03, 0.0), (0.04, 0.0)]);
        let sub = GeoOracle.substring(&l, 0.25, 0.75).unwrap();
        assert!((sub[0].lng - 0.01).abs() < 1e-9);
        assert!((sub[sub.len() - 1].lng - 0.03).abs() < 1e-9);
        assert!(GeoOracle.substring(&l, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_merge_reverses_pieces() {
        let a = line(&[(0.0, 0.0), (0.01, 0.0)]);
        let b = line(&[(0.02, 0.0), (0.01, 0.0)]);
        let merged = GeoOracle.merge(&[a, b]).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2], TrailPoint::new(0.02, 0.0));

        let far = line(&[(1.0, 1.0), (1.01, 1.0)]);
        assert!(GeoOracle.merge(&[line(&[(0.0, 0.0), (0.01, 0.0)]), far]).is_err());
    }
}
