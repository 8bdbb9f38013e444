use hashbrown::HashSet;

use super::dijkstra::{RoutePath, shortest_path};
use crate::{
    Error, NodeId,
    model::{EdgeKey, EdgeView, RoadNetwork},
};

/// Length a flooded edge is never weighed below, in metres
pub const MIN_FLOODED_LENGTH_M: f64 = 1.0;

/// Searches for a path that avoids `flooded` edges.
///
/// Flooded edges are not removed, their length is multiplied by `penalty`,
/// so any dry alternative is preferred while a route that can only pass
/// through water is still found. A flooded edge with no recorded length is
/// weighed as [`MIN_FLOODED_LENGTH_M`] before the penalty applies. Flooded
/// edges are identified structurally by `(u, v, key)`, which keeps parallel
/// edges apart.
///
/// Returns `Ok(None)` when there is nothing to avoid or no path exists.
///
/// # Errors
///
/// Returns `UnknownNode` if either endpoint is not in the network
pub fn compute_detour(
    network: &RoadNetwork,
    origin: NodeId,
    destination: NodeId,
    flooded: &HashSet<EdgeKey>,
    penalty: f64,
) -> Result<Option<RoutePath>, Error> {
    if flooded.is_empty() {
        return Ok(None);
    }

    shortest_path(network, origin, destination, |view| {
        penalized_weight(view, flooded, penalty)
    })
}

pub(crate) fn penalized_weight(view: &EdgeView<'_>, flooded: &HashSet<EdgeKey>, penalty: f64) -> f64 {
    let length = view.edge.length_or_zero();
    if flooded.contains(&view.id) {
        length.max(MIN_FLOODED_LENGTH_M) * penalty
    } else {
        length
    }
}
