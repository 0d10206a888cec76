//! GeoJSON views of routes and graphs.
//!
//! Everything here builds `serde_json::Value`s; writing them anywhere is the
//! caller's business.

use serde_json::{json, Value};

use crate::engine::RouteRecommendation;
use crate::routing::RoutingGraph;
use crate::TrailPoint;

/// Lines shorter than this (in degrees) are flagged as unlikely to render.
const MIN_RENDERABLE_DEGREES: f64 = 0.0001;

fn position(p: &TrailPoint) -> Value {
    match p.elevation {
        Some(e) => json!([p.lng, p.lat, e]),
        None => json!([p.lng, p.lat]),
    }
}

fn line(points: &[TrailPoint]) -> Value {
    Value::Array(points.iter().map(position).collect())
}

/// A `MultiLineString` feature for one route.
pub fn route_feature(route: &RouteRecommendation) -> Value {
    let lines: Vec<Value> = route
        .geometry
        .iter()
        .filter(|l| l.len() >= 2)
        .map(|l| line(l))
        .collect();
    json!({
        "type": "Feature",
        "geometry": {
            "type": "MultiLineString",
            "coordinates": lines,
        },
        "properties": {
            "id": route.id.to_string(),
            "route_name": route.route_name,
            "route_score": route.route_score,
            "route_shape": route.route_shape.as_str(),
            "recommended_length_km": route.recommended_distance_km,
            "recommended_elevation_gain": route.recommended_elevation_gain,
            "trail_count": route.trail_count,
            "layer": "routes",
        },
    })
}

/// Routes as a `FeatureCollection`, highest score first.
pub fn routes_to_geojson(routes: &[RouteRecommendation]) -> Value {
    let mut ordered: Vec<&RouteRecommendation> = routes.iter().collect();
    ordered.sort_by(|a, b| b.route_score.total_cmp(&a.route_score));
    json!({
        "type": "FeatureCollection",
        "features": ordered.into_iter().map(route_feature).collect::<Vec<_>>(),
    })
}

/// Nodes as `Point` features and edges as `LineString` features.
pub fn graph_to_geojson(graph: &RoutingGraph) -> Value {
    let mut features: Vec<Value> = graph
        .nodes()
        .map(|n| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": position(&n.position) },
                "properties": {
                    "id": n.id,
                    "node_type": n.node_type,
                    "trail_ids": n.trail_ids,
                    "layer": "nodes",
                },
            })
        })
        .collect();
    features.extend(graph.edges().map(|e| {
        json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": line(&e.geometry) },
            "properties": {
                "id": e.id,
                "source": e.source,
                "target": e.target,
                "trail_id": e.trail_id,
                "trail_name": e.trail_name,
                "length_km": e.length_km,
                "elevation_gain": e.elevation_gain,
                "elevation_loss": e.elevation_loss,
                "is_bridge": e.is_bridge,
                "layer": "edges",
            },
        })
    }));
    json!({ "type": "FeatureCollection", "features": features })
}

/// Rendering problems in a feature collection: malformed collections,
/// `LineString`s with fewer than two positions or barely any extent, and
/// `Point`s without two or three coordinates. Empty when clean.
pub fn validate_feature_collection(collection: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    if collection.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        issues.push("not a FeatureCollection".to_string());
    }
    let Some(features) = collection.get("features").and_then(Value::as_array) else {
        issues.push("missing features array".to_string());
        return issues;
    };

    for (i, feature) in features.iter().enumerate() {
        let geometry_type = feature.pointer("/geometry/type").and_then(Value::as_str);
        let coordinates = feature
            .pointer("/geometry/coordinates")
            .and_then(Value::as_array);
        match (geometry_type, coordinates) {
            (Some("LineString"), Some(coords)) => check_line(i, coords, &mut issues),
            (Some("MultiLineString"), Some(lines)) => {
                for l in lines {
                    match l.as_array() {
                        Some(coords) => check_line(i, coords, &mut issues),
                        None => issues.push(format!("feature {}: malformed line", i)),
                    }
                }
            }
            (Some("Point"), Some(coords)) => {
                if !(2..=3).contains(&coords.len()) {
                    issues.push(format!("feature {}: Point with {} coordinates", i, coords.len()));
                }
            }
            (Some(_), Some(_)) => {}
            _ => issues.push(format!("feature {}: missing geometry", i)),
        }
    }
    issues
}

fn check_line(i: usize, coords: &[Value], issues: &mut Vec<String>) {
    if coords.len() < 2 {
        issues.push(format!("feature {}: LineString with < 2 points", i));
        return;
    }
    if coords.len() == 2 {
        let xy = |v: &Value| -> Option<(f64, f64)> {
            let a = v.as_array()?;
            Some((a.first()?.as_f64()?, a.get(1)?.as_f64()?))
        };
        if let (Some((x1, y1)), Some((x2, y2))) = (xy(&coords[0]), xy(&coords[1])) {
            let extent = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
            if extent < MIN_RENDERABLE_DEGREES {
                issues.push(format!("feature {}: very short LineString ({:.6} degrees)", i, extent));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_flags_degenerate_lines() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0]] } },
                { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.00001, 0.0]] } },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.0] } },
                { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.01, 0.0]] } },
            ]
        });
        let issues = validate_feature_collection(&collection);
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("< 2 points"));
    }

    #[test]
    fn test_empty_graph_exports_empty_collection() {
        let value = graph_to_geojson(&RoutingGraph::new());
        assert_eq!(value["type"], "FeatureCollection");
        assert!(value["features"].as_array().unwrap().is_empty());
        assert!(validate_feature_collection(&value).is_empty());
    }
}
