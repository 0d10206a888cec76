//! # Trail Splitting
//!
//! Cuts crossing trails into non-overlapping segments so that every physical
//! junction becomes a segment endpoint.
//!
//! ## Algorithm
//! 1. Group intersection points by trail (both trails of a pair get the point)
//! 2. Optionally insert intersection points that fall between two coordinates
//! 3. Map each intersection to the nearest coordinate index, dropping matches
//!    beyond the tolerance (self-crossings map to one index per pass)
//! 4. Cut at the sorted indices plus the trail's own first and last index
//!
//! Concatenating a trail's segments in index order (dropping the repeated
//! split coordinate) reproduces the trail's coordinate sequence.

mod intersections;

pub use intersections::detect_intersections;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, polyline_length, polyline_length_km};
use crate::oracle::{GeoOracle, GeometryOracle};
use crate::spatial::{build_rtree, nearest_index, within_meters};
use crate::{ElevationStats, IntersectionPoint, Trail, TrailPoint, TrailRow, TrailSegment};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for trail splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Maximum distance in meters between an intersection and the trail
    /// coordinate it cuts at. Also the near-touch distance used when
    /// detecting intersections. Default: 3.0
    pub intersection_tolerance_meters: f64,
    /// Insert an intersection point into the trail when no existing
    /// coordinate lies within tolerance of it but the line itself does.
    /// Segments then no longer rejoin into the original coordinate
    /// sequence. Default: false
    pub insert_missing_vertices: bool,
    /// Recompute segment elevation statistics from the segment's own
    /// coordinates when they carry elevation. Default: true
    pub recompute_elevation: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            intersection_tolerance_meters: 3.0,
            insert_missing_vertices: false,
            recompute_elevation: true,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// A trail dropped during splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrail {
    pub external_id: String,
    pub reason: String,
}

/// Output of one splitting run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitReport {
    pub segments: Vec<TrailSegment>,
    /// Trails handed to the splitter
    pub trails_in: usize,
    /// Trails that produced more than one segment
    pub trails_split: usize,
    pub skipped: Vec<SkippedTrail>,
    /// Intersection points handed to the splitter
    pub intersections_in: usize,
    /// Per-trail matches dropped for exceeding the tolerance
    pub intersections_discarded: usize,
    pub vertices_inserted: usize,
    /// Zero-length pieces that were not emitted
    pub degenerate_segments: usize,
}

impl SplitReport {
    /// Segments belonging to one parent trail, in index order.
    pub fn segments_of(&self, trail_id: u64) -> Vec<&TrailSegment> {
        let mut found: Vec<&TrailSegment> =
            self.segments.iter().filter(|s| s.trail_id == trail_id).collect();
        found.sort_by_key(|s| s.segment_index);
        found
    }
}

// ============================================================================
// Splitter
// ============================================================================

/// Splits trails at their intersection points.
#[derive(Clone)]
pub struct TrailSplitter {
    config: SplitterConfig,
    oracle: Arc<dyn GeometryOracle>,
}

impl TrailSplitter {
    /// Create a splitter using the default [`GeoOracle`].
    pub fn new(config: SplitterConfig) -> Self {
        Self::with_oracle(config, Arc::new(GeoOracle))
    }

    pub fn with_oracle(config: SplitterConfig, oracle: Arc<dyn GeometryOracle>) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Parse rows, detect their intersections and split them.
    ///
    /// Rows whose geometry cannot be parsed are skipped with a warning and
    /// listed in [`SplitReport::skipped`].
    pub fn split_rows(&self, rows: &[TrailRow]) -> SplitReport {
        let mut trails = Vec::with_capacity(rows.len());
        let mut skipped = Vec::new();
        for row in rows {
            match row.parse() {
                Ok(trail) => trails.push(trail),
                Err(e) => {
                    warn!("[Splitter] Skipping trail {}: {}", row.external_id, e);
                    skipped.push(SkippedTrail {
                        external_id: row.external_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let intersections = detect_intersections(
            &trails,
            self.oracle.as_ref(),
            self.config.intersection_tolerance_meters,
        );
        let mut report = self.split(&trails, &intersections);
        report.trails_in += skipped.len();
        skipped.append(&mut report.skipped);
        report.skipped = skipped;
        report
    }

    /// Split `trails` at `intersections`.
    pub fn split(&self, trails: &[Trail], intersections: &[IntersectionPoint]) -> SplitReport {
        let mut by_trail: HashMap<u64, Vec<&IntersectionPoint>> = HashMap::new();
        for ip in intersections {
            by_trail.entry(ip.trail_a).or_default().push(ip);
            if ip.trail_b != ip.trail_a {
                by_trail.entry(ip.trail_b).or_default().push(ip);
            }
        }

        let mut report = SplitReport {
            trails_in: trails.len(),
            intersections_in: intersections.len(),
            ..SplitReport::default()
        };

        for trail in trails {
            if let Some(reason) = malformed(trail) {
                warn!("[Splitter] Skipping trail {}: {}", trail.external_id, reason);
                report.skipped.push(SkippedTrail {
                    external_id: trail.external_id.clone(),
                    reason,
                });
                continue;
            }

            let hits = by_trail.get(&trail.id).map(Vec::as_slice).unwrap_or(&[]);
            if hits.is_empty() {
                report.segments.push(self.make_segment(trail, 1, trail.geometry.clone(), 1.0));
                continue;
            }

            let geometry = if self.config.insert_missing_vertices {
                let (densified, inserted) = self.insert_vertices(trail, hits);
                report.vertices_inserted += inserted;
                densified
            } else {
                trail.geometry.clone()
            };

            let (cuts, discarded) = self.cut_indices(trail.id, &geometry, hits);
            report.intersections_discarded += discarded;

            let total_m = polyline_length(&geometry);
            let mut emitted = 0u32;
            for w in cuts.windows(2) {
                let (start, end) = (w[0], w[1]);
                if end <= start {
                    continue;
                }
                let piece = geometry[start..=end].to_vec();
                let piece_m = polyline_length(&piece);
                if piece_m <= 0.0 {
                    debug!(
                        "[Splitter] Dropping zero-length piece {}..{} of {}",
                        start, end, trail.external_id
                    );
                    report.degenerate_segments += 1;
                    continue;
                }
                emitted += 1;
                let share = if total_m > 0.0 { piece_m / total_m } else { 1.0 };
                report.segments.push(self.make_segment(trail, emitted, piece, share));
            }
            if emitted > 1 {
                report.trails_split += 1;
            }
        }

        info!(
            "[Splitter] Split {} trails into {} segments ({} split, {} skipped, {} intersections discarded)",
            report.trails_in,
            report.segments.len(),
            report.trails_split,
            report.skipped.len(),
            report.intersections_discarded
        );
        report
    }

    /// Insert intersection points lying on the line but away from any
    /// existing coordinate. Returns the new geometry and the insert count.
    fn insert_vertices(&self, trail: &Trail, hits: &[&IntersectionPoint]) -> (Vec<TrailPoint>, usize) {
        let tolerance = self.config.intersection_tolerance_meters;
        let geometry = &trail.geometry;
        let tree = build_rtree(geometry);

        // (window index, distance from window start, point)
        let mut inserts: Vec<(usize, f64, TrailPoint)> = Vec::new();

        for ip in hits {
            if !within_meters(&tree, &ip.point, tolerance).is_empty() {
                continue;
            }
            let mut close_windows: Vec<(usize, f64, TrailPoint)> = Vec::new();
            for (k, w) in geometry.windows(2).enumerate() {
                match self.oracle.nearest_point_on_line(&ip.point, w) {
                    Ok(q) => {
                        let d = self.oracle.distance(&ip.point, &q);
                        if d <= tolerance {
                            close_windows.push((k, d, q));
                        }
                    }
                    Err(e) => debug!("[Splitter] Nearest-point query failed: {}", e),
                }
            }

            // Self-crossings pass the point more than once: keep the best
            // window of every run of consecutive windows. Other crossings
            // keep only the single best window.
            let mut chosen: Vec<(usize, f64, TrailPoint)> = Vec::new();
            for candidate in close_windows {
                match chosen.last_mut() {
                    Some(last) if candidate.0 == last.0 + 1 => {
                        if candidate.1 < last.1 {
                            *last = candidate;
                        }
                    }
                    _ => chosen.push(candidate),
                }
            }
            if !ip.is_self_intersection() {
                chosen.sort_by(|a, b| a.1.total_cmp(&b.1));
                chosen.truncate(1);
            }

            for (k, _, q) in chosen {
                let offset = haversine_distance(&geometry[k], &q);
                let duplicate = inserts
                    .iter()
                    .any(|(ik, _, iq)| *ik == k && haversine_distance(iq, &q) < 1e-3);
                if !duplicate {
                    inserts.push((k, offset, q));
                }
            }
        }

        if inserts.is_empty() {
            return (geometry.clone(), 0);
        }
        inserts.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut out = Vec::with_capacity(geometry.len() + inserts.len());
        let mut pending = inserts.iter().peekable();
        for (i, p) in geometry.iter().enumerate() {
            out.push(*p);
            while let Some((k, _, q)) = pending.peek() {
                if *k != i {
                    break;
                }
                out.push(*q);
                pending.next();
            }
        }
        debug!(
            "[Splitter] Inserted {} vertices into {}",
            inserts.len(),
            trail.external_id
        );
        (out, inserts.len())
    }

    /// Sorted, unique cut indices (always including both ends) and the
    /// number of intersections that matched no coordinate.
    fn cut_indices(
        &self,
        trail_id: u64,
        geometry: &[TrailPoint],
        hits: &[&IntersectionPoint],
    ) -> (Vec<usize>, usize) {
        let tolerance = self.config.intersection_tolerance_meters;
        let tree = build_rtree(geometry);
        let last = geometry.len() - 1;
        let mut cuts = vec![0, last];
        let mut discarded = 0;

        for ip in hits {
            if ip.is_self_intersection() && ip.trail_a == trail_id {
                let mut near: Vec<(usize, f64)> = within_meters(&tree, &ip.point, tolerance);
                if near.is_empty() {
                    discarded += 1;
                    continue;
                }
                near.sort_by_key(|(idx, _)| *idx);
                let mut best_of_run: Option<(usize, f64)> = None;
                let mut prev_idx: Option<usize> = None;
                for (idx, d) in near {
                    let continues_run = prev_idx.map_or(false, |p| idx == p + 1);
                    if !continues_run {
                        if let Some((b, _)) = best_of_run.take() {
                            cuts.push(b);
                        }
                    }
                    if best_of_run.map_or(true, |(_, bd)| d < bd) {
                        best_of_run = Some((idx, d));
                    }
                    prev_idx = Some(idx);
                }
                if let Some((b, _)) = best_of_run {
                    cuts.push(b);
                }
            } else {
                match nearest_index(&tree, &ip.point) {
                    Some(idx) if haversine_distance(&geometry[idx], &ip.point) <= tolerance => {
                        cuts.push(idx)
                    }
                    _ => discarded += 1,
                }
            }
        }

        cuts.sort_unstable();
        cuts.dedup();
        (cuts, discarded)
    }

    fn make_segment(
        &self,
        trail: &Trail,
        segment_index: u32,
        geometry: Vec<TrailPoint>,
        length_share: f64,
    ) -> TrailSegment {
        let recomputed = if self.config.recompute_elevation {
            ElevationStats::from_points(&geometry)
        } else {
            None
        };
        let elevation = recomputed.or_else(|| {
            trail.elevation.map(|stats| ElevationStats {
                gain: stats.gain * length_share,
                loss: stats.loss * length_share,
                ..stats
            })
        });
        let external_id = if segment_index == 1 {
            trail.external_id.clone()
        } else {
            format!("{}-{}", trail.external_id, segment_index)
        };

        TrailSegment {
            trail_id: trail.id,
            segment_index,
            external_id,
            parent_external_id: trail.external_id.clone(),
            name: trail.name.clone(),
            length_km: polyline_length_km(&geometry),
            geometry,
            elevation,
            tags: trail.tags.clone(),
        }
    }
}

fn malformed(trail: &Trail) -> Option<String> {
    if trail.geometry.len() < 2 {
        return Some(format!("{} coordinate(s)", trail.geometry.len()));
    }
    if let Some(bad) = trail.geometry.iter().find(|p| !p.is_valid()) {
        return Some(format!("invalid coordinate ({}, {})", bad.lng, bad.lat));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail(id: u64, points: &[(f64, f64)]) -> Trail {
        Trail::new(
            id,
            &format!("t{}", id),
            &format!("Trail {}", id),
            points.iter().map(|&(lng, lat)| TrailPoint::new(lng, lat)).collect(),
        )
    }

    /// Concatenate segments in index order, dropping each shared split point.
    fn rejoin(segments: &[&TrailSegment]) -> Vec<TrailPoint> {
        let mut out: Vec<TrailPoint> = Vec::new();
        for s in segments {
            let skip = if out.is_empty() { 0 } else { 1 };
            out.extend(s.geometry.iter().skip(skip).copied());
        }
        out
    }

    fn inserting_config() -> SplitterConfig {
        SplitterConfig {
            insert_missing_vertices: true,
            ..SplitterConfig::default()
        }
    }

    fn crossing_pair() -> Vec<Trail> {
        vec![
            trail(1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0), (0.003, 0.0), (0.004, 0.0)]),
            trail(
                2,
                &[(0.002, -0.001), (0.002, 0.0), (0.002, 0.001), (0.002, 0.002), (0.002, 0.003)],
            ),
        ]
    }

    #[test]
    fn test_trail_without_intersections_is_one_segment() {
        let trails = vec![trail(1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)])];
        let report = TrailSplitter::new(SplitterConfig::default()).split(&trails, &[]);
        assert_eq!(report.segments.len(), 1);
        let seg = &report.segments[0];
        assert_eq!(seg.external_id, "t1");
        assert_eq!(seg.segment_index, 1);
        assert_eq!(seg.geometry, trails[0].geometry);
        assert_eq!(report.trails_split, 0);
    }

    #[test]
    fn test_crossing_trails_split_in_two_each() {
        let trails = crossing_pair();
        let splitter = TrailSplitter::new(SplitterConfig::default());
        let intersections = detect_intersections(&trails, &GeoOracle, 3.0);
        let report = splitter.split(&trails, &intersections);

        let a = report.segments_of(1);
        let b = report.segments_of(2);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert_eq!(a[0].external_id, "t1");
        assert_eq!(a[1].external_id, "t1-2");
        assert_eq!(a[0].end(), b[0].end());
        assert_eq!(rejoin(&a), trails[0].geometry);
        assert_eq!(rejoin(&b), trails[1].geometry);
        assert_eq!(report.trails_split, 2);
    }

    #[test]
    fn test_far_intersection_is_discarded_without_insertion() {
        // Crossing at (0.0015, 0.0) is ~55 m from the nearest coordinate
        let trails = vec![
            trail(1, &[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0), (0.003, 0.0)]),
            trail(2, &[(0.0015, -0.001), (0.0015, 0.001)]),
        ];
        let intersections = detect_intersections(&trails, &GeoOracle, 3.0);
        assert_eq!(intersections.len(), 1);

        let strict = TrailSplitter::new(SplitterConfig::default());
        let report = strict.split(&trails, &intersections);
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.intersections_discarded, 2);
        assert_eq!(report.vertices_inserted, 0);

        let inserting = TrailSplitter::new(inserting_config());
        let report = inserting.split(&trails, &intersections);
        assert_eq!(report.segments_of(1).len(), 2);
        assert_eq!(report.segments_of(2).len(), 2);
        assert_eq!(report.vertices_inserted, 2);
        let a = report.segments_of(1);
        let b = report.segments_of(2);
        let gap = haversine_distance(a[0].end().unwrap(), b[0].end().unwrap());
        assert!(gap < 0.01);
    }

    #[test]
    fn test_self_intersection_cuts_every_pass() {
        let trails = vec![trail(
            5,
            &[(0.0, 0.0), (0.002, 0.002), (0.002, 0.0), (0.0, 0.002)],
        )];
        let intersections = detect_intersections(&trails, &GeoOracle, 3.0);
        let report = TrailSplitter::new(inserting_config()).split(&trails, &intersections);
        let segments = report.segments_of(5);
        assert_eq!(segments.len(), 3);
        let gap = haversine_distance(segments[0].end().unwrap(), segments[2].start().unwrap());
        assert!(gap < 0.01);
        assert_eq!(segments[2].external_id, "t5-3");
    }

    #[test]
    fn test_malformed_trail_skipped() {
        let trails = vec![
            trail(1, &[(0.0, 0.0)]),
            trail(2, &[(0.0, 0.0), (f64::NAN, 0.0)]),
            trail(3, &[(0.0, 0.0), (0.001, 0.0)]),
        ];
        let report = TrailSplitter::new(SplitterConfig::default()).split(&trails, &[]);
        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_split_rows_skips_unparsable_geometry() {
        let rows = vec![
            TrailRow::new(1, "good", "Good", "LINESTRING (0 0, 0.001 0)"),
            TrailRow::new(2, "bad", "Bad", "LINESTRING (0 0, what)"),
        ];
        let report = TrailSplitter::new(SplitterConfig::default()).split_rows(&rows);
        assert_eq!(report.trails_in, 2);
        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.skipped[0].external_id, "bad");
    }

    #[test]
    fn test_segment_elevation_recomputed_from_coordinates() {
        let a = Trail::new(
            1,
            "climb",
            "Climb",
            vec![
                TrailPoint::with_elevation(0.0, 0.0, 100.0),
                TrailPoint::with_elevation(0.001, 0.0, 150.0),
                TrailPoint::with_elevation(0.002, 0.0, 120.0),
            ],
        );
        let ip = IntersectionPoint {
            point: TrailPoint::new(0.001, 0.0),
            trail_a: 1,
            trail_b: 9,
            distance_meters: 0.0,
        };
        let report = TrailSplitter::new(SplitterConfig::default()).split(&[a], &[ip]);
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.segments[0].elevation.unwrap().gain, 50.0);
        assert_eq!(report.segments[1].elevation.unwrap().gain, 0.0);
        assert_eq!(report.segments[1].elevation.unwrap().loss, 30.0);
    }
}
