//! Route search strategies, one per [`RouteShape`].

mod loops;
mod lollipop;
mod out_and_back;
mod point_to_point;

pub use loops::LoopStrategy;
pub use lollipop::LollipopStrategy;
pub use out_and_back::OutAndBackStrategy;
pub use point_to_point::PointToPointStrategy;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{RouteCandidate, RoutePattern, RouteShape, SearchContext, ToleranceLevel};
use crate::oracle::Path;

/// A way of turning the graph into route candidates for a pattern.
pub trait RouteStrategy: Send + Sync {
    fn shape(&self) -> RouteShape;

    /// Candidates whose distance falls in `tolerance`'s window around the
    /// pattern target. Failed oracle queries are recorded on `ctx` and
    /// skipped.
    fn generate(
        &self,
        ctx: &SearchContext<'_>,
        pattern: &RoutePattern,
        tolerance: &ToleranceLevel,
    ) -> Vec<RouteCandidate>;
}

/// The strategy implementing `shape`.
pub fn strategy_for(shape: RouteShape) -> Box<dyn RouteStrategy> {
    match shape {
        RouteShape::OutAndBack => Box::new(OutAndBackStrategy),
        RouteShape::Loop => Box::new(LoopStrategy),
        RouteShape::Lollipop => Box::new(LollipopStrategy),
        RouteShape::PointToPoint => Box::new(PointToPointStrategy),
    }
}

/// Run `search` for every item and concatenate the results in item order.
/// Items are searched in parallel when the `parallel` feature is on.
pub(crate) fn fan_out<T, F>(items: &[T], search: F) -> Vec<RouteCandidate>
where
    T: Sync,
    F: Fn(&T) -> Vec<RouteCandidate> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        items
            .par_iter()
            .map(|item| search(item))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.iter().flat_map(|item| search(item)).collect()
    }
}

/// A path walked there and back along the same edges.
pub(crate) fn mirrored(path: &Path) -> Vec<crate::oracle::PathStep> {
    let mut steps = path.steps.clone();
    steps.extend(path.reversed().steps);
    steps
}
