//! Per-pattern accumulator of accepted routes and the dedup state around it.

use log::debug;

use super::candidate::RouteRecommendation;
use super::patterns::RouteShape;
use crate::dedup::{EndpointDecision, EndpointIndex, ExactRouteSet};
use crate::geo_utils::haversine_distance;
use crate::TrailPoint;

/// Why an offered route was not taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Same ordered edge sequence as a route seen before
    ExactDuplicate,
    /// Same endpoints as an accepted route that is at least as long
    NotLongerThanExisting,
    /// Same shape over the same set of trails as an accepted route
    SameTrails,
    /// Starts too close to an accepted route's start
    AreaUsed,
}

/// Result of [`RouteGenerationSession::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// Replaced the shorter route at this slot
    Replaced(usize),
    Rejected(RejectReason),
}

impl OfferOutcome {
    pub fn is_kept(&self) -> bool {
        !matches!(self, OfferOutcome::Rejected(_))
    }
}

/// State for one pattern's search. Created fresh for every pattern.
#[derive(Debug, Clone, Default)]
pub struct RouteGenerationSession {
    routes: Vec<RouteRecommendation>,
    starts: Vec<Option<TrailPoint>>,
    exact: ExactRouteSet,
    endpoints: EndpointIndex,
    combinations: Vec<(RouteShape, Vec<u64>)>,
    unique_trail_combinations: bool,
    min_area_separation_meters: f64,
}

impl RouteGenerationSession {
    pub fn new(unique_trail_combinations: bool, min_area_separation_meters: f64) -> Self {
        Self {
            unique_trail_combinations,
            min_area_separation_meters,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[RouteRecommendation] {
        &self.routes
    }

    pub fn into_routes(self) -> Vec<RouteRecommendation> {
        self.routes
    }

    /// Best recorded length for an endpoint pair, if any.
    pub fn best_endpoint_length(&self, key: (u64, u64)) -> Option<f64> {
        self.endpoints.best_length(key)
    }

    /// Offer a scored route. `start` is the position of its first node, used
    /// by the area-separation rule.
    ///
    /// A longer route replacing one with the same endpoints still has to
    /// pass the trail-combination and area rules against every other
    /// accepted route.
    pub fn offer(&mut self, route: RouteRecommendation, start: Option<TrailPoint>) -> OfferOutcome {
        if self.exact.contains(&route.route_edges) {
            return OfferOutcome::Rejected(RejectReason::ExactDuplicate);
        }

        let replacing = match route.endpoint_key {
            Some(key) => match self.endpoints.decide(key, route.recommended_distance_km) {
                EndpointDecision::KeepExisting => {
                    self.exact.insert(&route.route_edges);
                    return OfferOutcome::Rejected(RejectReason::NotLongerThanExisting);
                }
                EndpointDecision::Replace(slot) => Some(slot),
                EndpointDecision::New => None,
            },
            None => None,
        };

        let combination = trail_combination(&route);
        let not_replaced = |i: &usize| Some(*i) != replacing;

        let same_trails = self.unique_trail_combinations
            && (0..self.routes.len())
                .filter(not_replaced)
                .any(|i| self.combinations[i] == combination);
        if same_trails {
            return OfferOutcome::Rejected(RejectReason::SameTrails);
        }

        if self.min_area_separation_meters > 0.0 {
            if let Some(p) = start {
                let crowded = (0..self.routes.len())
                    .filter(not_replaced)
                    .filter_map(|i| self.starts[i].as_ref())
                    .any(|q| haversine_distance(&p, q) < self.min_area_separation_meters);
                if crowded {
                    return OfferOutcome::Rejected(RejectReason::AreaUsed);
                }
            }
        }

        self.exact.insert(&route.route_edges);
        match replacing {
            Some(slot) => {
                debug!(
                    "[Session] Replacing {} ({:.2} km) with {} ({:.2} km)",
                    self.routes[slot].route_name,
                    self.routes[slot].recommended_distance_km,
                    route.route_name,
                    route.recommended_distance_km
                );
                if let Some(key) = route.endpoint_key {
                    self.endpoints.record(key, slot, route.recommended_distance_km);
                }
                self.combinations[slot] = combination;
                self.starts[slot] = start;
                self.routes[slot] = route;
                OfferOutcome::Replaced(slot)
            }
            None => {
                let slot = self.routes.len();
                if let Some(key) = route.endpoint_key {
                    self.endpoints.record(key, slot, route.recommended_distance_km);
                }
                self.combinations.push(combination);
                self.starts.push(start);
                self.routes.push(route);
                OfferOutcome::Accepted
            }
        }
    }
}

fn trail_combination(route: &RouteRecommendation) -> (RouteShape, Vec<u64>) {
    let mut ids = route.trail_ids.clone();
    ids.sort_unstable();
    (route.route_shape, ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn route(edges: &[u64], km: f64, trails: &[u64], endpoints: Option<(u64, u64)>) -> RouteRecommendation {
        RouteRecommendation {
            id: Uuid::new_v4(),
            route_name: format!("{:?}", edges),
            route_shape: RouteShape::OutAndBack,
            pattern_name: "test".to_string(),
            target_distance_km: 10.0,
            target_elevation_gain: 300.0,
            recommended_distance_km: km,
            recommended_elevation_gain: 0.0,
            elevation_loss: 0.0,
            route_path: vec![],
            route_edges: edges.to_vec(),
            trail_count: trails.len(),
            trail_ids: trails.to_vec(),
            trail_names: vec![],
            start_node: 1,
            end_node: 1,
            endpoint_key: endpoints,
            route_score: 50.0,
            similarity_score: 0.5,
            tolerance_level: "medium".to_string(),
            geometry: vec![],
        }
    }

    #[test]
    fn test_exact_duplicate_rejected() {
        let mut session = RouteGenerationSession::new(false, 0.0);
        assert_eq!(session.offer(route(&[1, 2], 9.0, &[1], None), None), OfferOutcome::Accepted);
        assert_eq!(
            session.offer(route(&[1, 2], 9.0, &[1], None), None),
            OfferOutcome::Rejected(RejectReason::ExactDuplicate)
        );
    }

    #[test]
    fn test_longer_route_replaces_same_endpoints() {
        let mut session = RouteGenerationSession::new(true, 0.0);
        session.offer(route(&[1, 1], 8.5, &[1], Some((1, 5))), None);
        assert_eq!(
            session.offer(route(&[1, 2, 2, 1], 9.5, &[1, 2], Some((5, 1))), None),
            OfferOutcome::Replaced(0)
        );
        assert_eq!(
            session.offer(route(&[3, 3], 9.0, &[3], Some((1, 5))), None),
            OfferOutcome::Rejected(RejectReason::NotLongerThanExisting)
        );
        assert_eq!(session.len(), 1);
        assert_eq!(session.routes()[0].recommended_distance_km, 9.5);
        assert_eq!(session.best_endpoint_length((1, 5)), Some(9.5));
    }

    #[test]
    fn test_trail_combination_and_area_rules() {
        let mut session = RouteGenerationSession::new(true, 500.0);
        let here = TrailPoint::new(0.0, 0.0);
        let near = TrailPoint::new(0.001, 0.0);
        let far = TrailPoint::new(0.1, 0.0);
        assert!(session.offer(route(&[1], 9.0, &[1, 2], None), Some(here)).is_kept());
        assert_eq!(
            session.offer(route(&[2], 9.0, &[2, 1], None), Some(far)),
            OfferOutcome::Rejected(RejectReason::SameTrails)
        );
        assert_eq!(
            session.offer(route(&[3], 9.0, &[3], None), Some(near)),
            OfferOutcome::Rejected(RejectReason::AreaUsed)
        );
        assert!(session.offer(route(&[4], 9.0, &[4], None), Some(far)).is_kept());
    }

    #[test]
    fn test_replacement_cannot_duplicate_another_routes_trails() {
        let mut session = RouteGenerationSession::new(true, 0.0);
        assert_eq!(session.offer(route(&[1, 1], 8.0, &[1], Some((1, 5))), None), OfferOutcome::Accepted);
        assert_eq!(session.offer(route(&[2, 2], 9.0, &[2], Some((2, 6))), None), OfferOutcome::Accepted);
        assert_eq!(
            session.offer(route(&[3, 2, 2, 3], 9.5, &[2], Some((1, 5))), None),
            OfferOutcome::Rejected(RejectReason::SameTrails)
        );

        let trails: Vec<Vec<u64>> = session.routes().iter().map(|r| r.trail_ids.clone()).collect();
        assert_eq!(trails, vec![vec![1], vec![2]]);
        assert_eq!(session.best_endpoint_length((1, 5)), Some(8.0));
    }

    #[test]
    fn test_replacement_may_keep_its_own_trails_and_start() {
        let mut session = RouteGenerationSession::new(true, 500.0);
        let here = TrailPoint::new(0.0, 0.0);
        session.offer(route(&[1, 1], 8.0, &[1], Some((1, 5))), Some(here));
        assert_eq!(
            session.offer(route(&[1, 4, 4, 1], 9.5, &[1], Some((1, 5))), Some(here)),
            OfferOutcome::Replaced(0)
        );
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_replacement_respects_area_of_other_routes() {
        let mut session = RouteGenerationSession::new(false, 500.0);
        let here = TrailPoint::new(0.0, 0.0);
        let far = TrailPoint::new(0.1, 0.0);
        session.offer(route(&[1, 1], 8.0, &[1], Some((1, 5))), Some(far));
        session.offer(route(&[2, 2], 9.0, &[2], Some((2, 6))), Some(here));
        assert_eq!(
            session.offer(route(&[3, 3], 9.5, &[3], Some((1, 5))), Some(TrailPoint::new(0.001, 0.0))),
            OfferOutcome::Rejected(RejectReason::AreaUsed)
        );
        assert_eq!(session.routes()[0].recommended_distance_km, 8.0);
    }
}
