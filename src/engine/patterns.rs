//! Route patterns (target profiles) and tolerance levels.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Shape of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteShape {
    OutAndBack,
    Loop,
    Lollipop,
    PointToPoint,
}

impl RouteShape {
    pub const ALL: [RouteShape; 4] = [
        RouteShape::OutAndBack,
        RouteShape::Loop,
        RouteShape::Lollipop,
        RouteShape::PointToPoint,
    ];

    /// Machine name, as used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteShape::OutAndBack => "out-and-back",
            RouteShape::Loop => "loop",
            RouteShape::Lollipop => "lollipop",
            RouteShape::PointToPoint => "point-to-point",
        }
    }

    /// Suffix used in route names.
    pub fn label(&self) -> &'static str {
        match self {
            RouteShape::OutAndBack => "Out & Back",
            RouteShape::Loop => "Loop",
            RouteShape::Lollipop => "Lollipop",
            RouteShape::PointToPoint => "Point to Point",
        }
    }

    /// Shapes deduplicated by their unordered (start, far end) pair.
    pub fn uses_endpoint_hash(&self) -> bool {
        matches!(self, RouteShape::OutAndBack | RouteShape::PointToPoint)
    }
}

impl fmt::Display for RouteShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named target profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePattern {
    pub name: String,
    pub target_distance_km: f64,
    /// Target total elevation gain in meters
    pub target_elevation_gain: f64,
    pub shape: RouteShape,
}

impl RoutePattern {
    pub fn new(name: &str, target_distance_km: f64, target_elevation_gain: f64, shape: RouteShape) -> Self {
        Self {
            name: name.to_string(),
            target_distance_km,
            target_elevation_gain,
            shape,
        }
    }
}

/// A named acceptance band around a pattern's targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceLevel {
    pub name: String,
    /// Allowed distance deviation, percent of target
    pub distance_pct: f64,
    /// Allowed elevation deviation, percent of target
    pub elevation_pct: f64,
    /// Base quality weight (0..=1) fed into the score
    pub quality: f64,
}

impl ToleranceLevel {
    pub fn new(name: &str, distance_pct: f64, elevation_pct: f64, quality: f64) -> Self {
        Self {
            name: name.to_string(),
            distance_pct,
            elevation_pct,
            quality,
        }
    }

    /// The same level with both percentages multiplied.
    pub fn scaled(&self, multiplier: f64) -> Self {
        Self {
            name: self.name.clone(),
            distance_pct: self.distance_pct * multiplier,
            elevation_pct: self.elevation_pct * multiplier,
            quality: self.quality,
        }
    }

    /// Inclusive `(min, max)` accepted distance for a target.
    pub fn distance_window(&self, target_km: f64) -> (f64, f64) {
        let delta = target_km * self.distance_pct / 100.0;
        ((target_km - delta).max(0.0), target_km + delta)
    }

    /// Inclusive `(min, max)` accepted elevation gain for a target.
    pub fn elevation_window(&self, target_gain: f64) -> (f64, f64) {
        let delta = target_gain * self.elevation_pct / 100.0;
        ((target_gain - delta).max(0.0), target_gain + delta)
    }

    pub fn accepts_distance(&self, target_km: f64, distance_km: f64) -> bool {
        let (min, max) = self.distance_window(target_km);
        distance_km >= min && distance_km <= max
    }

    /// A target of zero gain leaves elevation unconstrained.
    pub fn accepts_elevation(&self, target_gain: f64, gain: f64) -> bool {
        if target_gain <= 0.0 {
            return true;
        }
        let (min, max) = self.elevation_window(target_gain);
        gain >= min && gain <= max
    }
}

/// Tolerance ladder from strict to wide.
pub static DEFAULT_TOLERANCES: Lazy<Vec<ToleranceLevel>> = Lazy::new(|| {
    vec![
        ToleranceLevel::new("strict", 10.0, 10.0, 1.0),
        ToleranceLevel::new("medium", 20.0, 20.0, 0.8),
        ToleranceLevel::new("wide", 35.0, 40.0, 0.6),
    ]
});

/// Patterns generated when none are configured.
pub static DEFAULT_PATTERNS: Lazy<Vec<RoutePattern>> = Lazy::new(|| {
    vec![
        RoutePattern::new("Short Out & Back", 5.0, 100.0, RouteShape::OutAndBack),
        RoutePattern::new("Medium Out & Back", 10.0, 300.0, RouteShape::OutAndBack),
        RoutePattern::new("Short Loop", 5.0, 150.0, RouteShape::Loop),
        RoutePattern::new("Medium Loop", 10.0, 300.0, RouteShape::Loop),
        RoutePattern::new("Medium Lollipop", 12.0, 400.0, RouteShape::Lollipop),
        RoutePattern::new("Long Point to Point", 20.0, 600.0, RouteShape::PointToPoint),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_window() {
        let medium = ToleranceLevel::new("medium", 20.0, 20.0, 0.8);
        assert_eq!(medium.distance_window(10.0), (8.0, 12.0));
        assert!(medium.accepts_distance(10.0, 9.8));
        assert!(!medium.accepts_distance(10.0, 12.5));
        let (lo, hi) = medium.scaled(1.5).distance_window(20.0);
        assert!((lo - 14.0).abs() < 1e-9 && (hi - 26.0).abs() < 1e-9);
    }

    #[test]
    fn test_elevation_window() {
        let strict = ToleranceLevel::new("strict", 10.0, 10.0, 1.0);
        assert!(strict.accepts_elevation(300.0, 280.0));
        assert!(!strict.accepts_elevation(300.0, 260.0));
        assert!(!strict.accepts_elevation(300.0, 0.0));
        assert!(strict.accepts_elevation(0.0, 450.0));
    }

    #[test]
    fn test_shape_serializes_kebab_case() {
        let json = serde_json::to_string(&RouteShape::PointToPoint).unwrap();
        assert_eq!(json, "\"point-to-point\"");
        assert_eq!(RouteShape::OutAndBack.to_string(), "out-and-back");
    }

    #[test]
    fn test_default_ladder_is_strict_to_wide() {
        let pcts: Vec<f64> = DEFAULT_TOLERANCES.iter().map(|t| t.distance_pct).collect();
        assert!(pcts.windows(2).all(|w| w[0] < w[1]));
        assert!(!DEFAULT_PATTERNS.is_empty());
    }
}
