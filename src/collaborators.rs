//! External collaborators the pipeline talks to but does not implement:
//! elevation lookup and storage of finalized results.

use crate::engine::PatternResult;
use crate::error::Result;
use crate::routing::RoutingGraph;

/// Elevation lookup used when trail data carries no elevation.
pub trait ElevationSource: Send + Sync {
    /// Elevation in meters at a position, `None` if unknown.
    fn elevation_at(&self, lng: f64, lat: f64) -> Option<f64>;
}

/// Elevation source that knows nothing. Edges built with it get zero gain
/// unless the trail data itself carries elevation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoElevation;

impl ElevationSource for NoElevation {
    fn elevation_at(&self, _lng: f64, _lat: f64) -> Option<f64> {
        None
    }
}

impl<F> ElevationSource for F
where
    F: Fn(f64, f64) -> Option<f64> + Send + Sync,
{
    fn elevation_at(&self, lng: f64, lat: f64) -> Option<f64> {
        self(lng, lat)
    }
}

/// Storage for finalized pipeline output.
///
/// Only complete, deduplicated data is handed over: the graph once it is
/// built and validated, and each pattern's routes once that pattern is done.
pub trait RouteStore {
    fn store_graph(&mut self, graph: &RoutingGraph) -> Result<()>;
    fn store_routes(&mut self, result: &PatternResult) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_an_elevation_source() {
        let flat_plateau = |_lng: f64, lat: f64| if lat > 0.0 { Some(2000.0) } else { None };
        assert_eq!(flat_plateau.elevation_at(0.0, 1.0), Some(2000.0));
        assert_eq!(flat_plateau.elevation_at(0.0, -1.0), None);
        assert_eq!(NoElevation.elevation_at(1.0, 1.0), None);
    }
}
