//! Composite route scoring, pattern similarity and route naming.

use serde::{Deserialize, Serialize};

use crate::engine::{RouteCandidate, RoutePattern, RouteShape, ToleranceLevel};

/// Weights and thresholds of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points for the tolerance level's quality (multiplied by 0..=1). Default: 40
    pub quality_weight: f64,
    /// Points for hitting the target distance exactly. Default: 25
    pub distance_weight: f64,
    /// Points for hitting the target elevation exactly. Default: 15
    pub elevation_weight: f64,
    /// Points per distinct trail. Default: 2
    pub points_per_trail: f64,
    /// Trails counted for the per-trail points. Default: 5
    pub max_counted_trails: usize,
    /// Extra points at or above `diversity_bonus_trails` trails. Default: 5
    pub diversity_bonus: f64,
    /// Default: 3
    pub diversity_bonus_trails: usize,
    /// Flat bonus for routes at least this long (km). Default: 10
    pub long_route_km: f64,
    /// Default: 5
    pub long_route_bonus: f64,
    /// Second flat bonus for routes at least this long (km). Default: 20
    pub very_long_route_km: f64,
    /// Default: 5
    pub very_long_route_bonus: f64,
    /// Gain (m) at which the challenge bonus applies. Default: 500
    pub elevation_challenge_gain: f64,
    /// Default: 5
    pub elevation_challenge_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            quality_weight: 40.0,
            distance_weight: 25.0,
            elevation_weight: 15.0,
            points_per_trail: 2.0,
            max_counted_trails: 5,
            diversity_bonus: 5.0,
            diversity_bonus_trails: 3,
            long_route_km: 10.0,
            long_route_bonus: 5.0,
            very_long_route_km: 20.0,
            very_long_route_bonus: 5.0,
            elevation_challenge_gain: 500.0,
            elevation_challenge_bonus: 5.0,
        }
    }
}

/// Accuracy in 0..=1: 1 on target, 0 at the edge of the allowed band.
fn accuracy(actual: f64, target: f64, allowed_pct: f64) -> f64 {
    if target <= 0.0 {
        return 1.0;
    }
    let band = (allowed_pct / 100.0).max(f64::EPSILON);
    let relative_error = (actual - target).abs() / target;
    (1.0 - relative_error / band).clamp(0.0, 1.0)
}

/// Composite score in 0..=100.
pub fn score_route(
    candidate: &RouteCandidate,
    pattern: &RoutePattern,
    tolerance: &ToleranceLevel,
    config: &ScoringConfig,
) -> f64 {
    let trails = candidate.trail_ids.len();

    let mut score = config.quality_weight * tolerance.quality.clamp(0.0, 1.0);
    score += config.distance_weight
        * accuracy(candidate.distance_km, pattern.target_distance_km, tolerance.distance_pct);
    score += config.elevation_weight
        * accuracy(
            candidate.elevation_gain,
            pattern.target_elevation_gain,
            tolerance.elevation_pct,
        );

    score += config.points_per_trail * trails.min(config.max_counted_trails) as f64;
    if trails >= config.diversity_bonus_trails {
        score += config.diversity_bonus;
    }

    if candidate.distance_km >= config.long_route_km {
        score += config.long_route_bonus;
    }
    if candidate.distance_km >= config.very_long_route_km {
        score += config.very_long_route_bonus;
    }
    if candidate.elevation_gain >= config.elevation_challenge_gain {
        score += config.elevation_challenge_bonus;
    }

    score.clamp(0.0, 100.0)
}

/// How closely a candidate matches its pattern, 0..=1.
///
/// Distance error weighs 70%, elevation error 30%; each error is relative
/// to the target and capped at 1.
pub fn similarity(candidate: &RouteCandidate, pattern: &RoutePattern) -> f64 {
    let relative = |actual: f64, target: f64| {
        if target > 0.0 {
            ((actual - target).abs() / target).min(1.0)
        } else {
            0.0
        }
    };
    let distance_error = relative(candidate.distance_km, pattern.target_distance_km);
    let elevation_error = relative(candidate.elevation_gain, pattern.target_elevation_gain);
    (1.0 - (0.7 * distance_error + 0.3 * elevation_error)).clamp(0.0, 1.0)
}

/// Human-readable name from the distinct trail names and the shape.
pub fn route_name(trail_names: &[String], shape: RouteShape) -> String {
    let names: Vec<&str> = trail_names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    let joined = match names.as_slice() {
        [] => "Unnamed Trails".to_string(),
        [one] => one.to_string(),
        [a, b] => format!("{} & {}", a, b),
        [a, b, c] => format!("{}, {} & {}", a, b, c),
        [a, b, rest @ ..] => format!("{}, {} & {} more", a, b, rest.len()),
    };
    format!("{} {}", joined, shape.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(distance_km: f64, gain: f64, trails: usize) -> RouteCandidate {
        RouteCandidate {
            shape: RouteShape::OutAndBack,
            steps: vec![],
            start_node: 1,
            end_node: 1,
            endpoint_key: None,
            distance_km,
            elevation_gain: gain,
            elevation_loss: gain,
            trail_ids: (1..=trails as u64).collect(),
            trail_names: (1..=trails).map(|i| format!("T{}", i)).collect(),
        }
    }

    #[test]
    fn test_perfect_match_scores_high() {
        let pattern = RoutePattern::new("p", 10.0, 300.0, RouteShape::OutAndBack);
        let strict = ToleranceLevel::new("strict", 10.0, 10.0, 1.0);
        let wide = ToleranceLevel::new("wide", 35.0, 40.0, 0.6);
        let exact = candidate(10.0, 300.0, 1);

        let s = score_route(&exact, &pattern, &strict, &ScoringConfig::default());
        // 40 + 25 + 15 + 2 + long-route 5
        assert!((s - 87.0).abs() < 1e-9);
        assert!(score_route(&exact, &pattern, &wide, &ScoringConfig::default()) < s);
        assert_eq!(similarity(&exact, &pattern), 1.0);
    }

    #[test]
    fn test_score_clamped_to_hundred() {
        let pattern = RoutePattern::new("p", 25.0, 800.0, RouteShape::Loop);
        let strict = ToleranceLevel::new("strict", 10.0, 10.0, 1.0);
        let rich = candidate(25.0, 800.0, 6);
        assert_eq!(score_route(&rich, &pattern, &strict, &ScoringConfig::default()), 100.0);
    }

    #[test]
    fn test_accuracy_degrades_with_error() {
        let pattern = RoutePattern::new("p", 10.0, 300.0, RouteShape::OutAndBack);
        let medium = ToleranceLevel::new("medium", 20.0, 20.0, 0.8);
        let close = score_route(&candidate(9.8, 280.0, 1), &pattern, &medium, &ScoringConfig::default());
        let far = score_route(&candidate(8.2, 200.0, 1), &pattern, &medium, &ScoringConfig::default());
        assert!(close > far);
        assert!(similarity(&candidate(9.8, 280.0, 1), &pattern) > similarity(&candidate(8.2, 200.0, 1), &pattern));
    }

    #[test]
    fn test_route_names() {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(route_name(&names(&["Mesa"]), RouteShape::OutAndBack), "Mesa Out & Back");
        assert_eq!(route_name(&names(&["Mesa", "Bluebell"]), RouteShape::Loop), "Mesa & Bluebell Loop");
        assert_eq!(
            route_name(&names(&["A", "B", "C", "D", "E"]), RouteShape::Lollipop),
            "A, B & 3 more Lollipop"
        );
        assert_eq!(route_name(&[], RouteShape::PointToPoint), "Unnamed Trails Point to Point");
    }
}
