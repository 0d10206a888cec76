//! Reading and writing trail geometry as WKT `LINESTRING` text.
//!
//! Accepted forms:
//! - `LINESTRING Z (lng lat ele, lng lat ele, ...)`
//! - `LINESTRING (lng lat, lng lat, ...)`
//! - a bare coordinate list `lng lat [ele], ...`
//!
//! An optional `SRID=4326;` prefix is ignored.

use crate::error::{Result, TrailRouteError};
use crate::TrailPoint;

/// Parse WKT linestring text into trail points.
///
/// `trail_id` is only used for error messages.
pub fn parse_linestring(trail_id: &str, text: &str) -> Result<Vec<TrailPoint>> {
    let mut body = text.trim();

    if let Some(idx) = body.find(';') {
        if body[..idx].trim_start().to_ascii_uppercase().starts_with("SRID") {
            body = body[idx + 1..].trim();
        }
    }

    let upper = body.to_ascii_uppercase();
    if upper.starts_with("LINESTRING") {
        let open = body
            .find('(')
            .ok_or_else(|| TrailRouteError::invalid_geometry(trail_id, "missing '('"))?;
        let close = body
            .rfind(')')
            .ok_or_else(|| TrailRouteError::invalid_geometry(trail_id, "missing ')'"))?;
        if close <= open {
            return Err(TrailRouteError::invalid_geometry(trail_id, "unbalanced parentheses"));
        }
        let tag = upper[..open].trim();
        if tag.contains("EMPTY") {
            return Err(TrailRouteError::invalid_geometry(trail_id, "empty linestring"));
        }
        body = &body[open + 1..close];
    } else if upper.starts_with("MULTI") || upper.starts_with("POINT") || upper.starts_with("POLYGON") {
        return Err(TrailRouteError::invalid_geometry(
            trail_id,
            format!("unsupported geometry type in '{}'", truncate(body)),
        ));
    }

    let mut points = Vec::new();
    for raw in body.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        points.push(parse_coordinate(trail_id, raw)?);
    }

    if points.len() < 2 {
        return Err(TrailRouteError::invalid_geometry(
            trail_id,
            format!("{} coordinate(s), at least 2 required", points.len()),
        ));
    }

    Ok(points)
}

fn parse_coordinate(trail_id: &str, raw: &str) -> Result<TrailPoint> {
    let values: Vec<f64> = raw
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>().map_err(|_| {
                TrailRouteError::invalid_geometry(trail_id, format!("unparsable coordinate '{}'", raw))
            })
        })
        .collect::<Result<_>>()?;

    let point = match values.as_slice() {
        [lng, lat] => TrailPoint::new(*lng, *lat),
        [lng, lat, ele] => TrailPoint::with_elevation(*lng, *lat, *ele),
        // XYZM: measure is dropped
        [lng, lat, ele, _m] => TrailPoint::with_elevation(*lng, *lat, *ele),
        _ => {
            return Err(TrailRouteError::invalid_geometry(
                trail_id,
                format!("coordinate '{}' has {} ordinates", raw, values.len()),
            ))
        }
    };

    if !point.is_valid() {
        return Err(TrailRouteError::invalid_geometry(
            trail_id,
            format!("coordinate '{}' is out of range", raw),
        ));
    }

    Ok(point)
}

/// Write trail points as WKT. Emits `LINESTRING Z` when every point carries
/// elevation, plain `LINESTRING` otherwise.
pub fn write_linestring(points: &[TrailPoint]) -> String {
    let has_z = !points.is_empty() && points.iter().all(|p| p.elevation.is_some());
    let coords: Vec<String> = points
        .iter()
        .map(|p| match (has_z, p.elevation) {
            (true, Some(e)) => format!("{} {} {}", p.lng, p.lat, e),
            _ => format!("{} {}", p.lng, p.lat),
        })
        .collect();
    if has_z {
        format!("LINESTRING Z ({})", coords.join(", "))
    } else {
        format!("LINESTRING ({})", coords.join(", "))
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(40) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linestring_z() {
        let points =
            parse_linestring("t1", "LINESTRING Z (-105.1 40.1 1650.5, -105.2 40.2 1700)").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].lng, -105.1);
        assert_eq!(points[1].elevation, Some(1700.0));
    }

    #[test]
    fn test_parse_2d_with_srid() {
        let points = parse_linestring("t1", "SRID=4326;LINESTRING(1 2, 3 4, 5 6)").unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.elevation.is_none()));
    }

    #[test]
    fn test_parse_bare_coordinates() {
        let points = parse_linestring("t1", "1 2 3, 4 5 6").unwrap();
        assert_eq!(points[1], TrailPoint::with_elevation(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_linestring("bad", "LINESTRING (1 2, x y)"),
            Err(TrailRouteError::InvalidGeometry { .. })
        ));
        assert!(parse_linestring("bad", "LINESTRING (1 2)").is_err());
        assert!(parse_linestring("bad", "LINESTRING EMPTY").is_err());
        assert!(parse_linestring("bad", "POINT (1 2)").is_err());
        assert!(parse_linestring("bad", "LINESTRING (1 2, 3 200)").is_err());
    }

    #[test]
    fn test_write_then_parse_preserves_points() {
        let points = vec![
            TrailPoint::with_elevation(-105.25, 40.0, 1600.0),
            TrailPoint::with_elevation(-105.26, 40.01, 1625.5),
        ];
        let text = write_linestring(&points);
        assert!(text.starts_with("LINESTRING Z"));
        assert_eq!(parse_linestring("t", &text).unwrap(), points);
    }
}
