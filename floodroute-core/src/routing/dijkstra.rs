use std::{cmp::Ordering, collections::BinaryHeap};

use fixedbitset::FixedBitSet;
use log::trace;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::{
    Error, NodeId,
    model::{EdgeKey, EdgeView, RoadNetwork},
};

/// Node path through the network together with the edges actually traversed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePath {
    pub nodes: Vec<NodeId>,
    /// One edge per consecutive node pair; resolves parallel edges
    pub edges: Vec<EdgeKey>,
    /// Total weight under the weight function that produced the path
    pub cost: f64,
}

impl RoutePath {
    /// First node, `None` for an empty path
    pub fn origin(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

#[derive(Copy, Clone)]
struct State {
    cost: f64,
    node_id: NodeId,
    node: NodeIndex,
}

// Min-heap by cost, equal costs pop in ascending node id order
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

/// Length-weighted edge cost. Missing lengths count as zero.
pub fn length_weight(view: &EdgeView<'_>) -> f64 {
    view.edge.length_or_zero()
}

/// Dijkstra shortest path from `origin` to `destination` under `weight`.
///
/// Among equal-cost alternatives the edge with the smallest `(u, v, key)`
/// identity wins, so identical inputs always produce identical paths.
/// Edges whose weight is negative or not finite are not traversed.
///
/// Returns `Ok(None)` when the destination is unreachable.
///
/// # Errors
///
/// Returns `UnknownNode` if either endpoint is not in the network
pub fn shortest_path<W>(
    network: &RoadNetwork,
    origin: NodeId,
    destination: NodeId,
    weight: W,
) -> Result<Option<RoutePath>, Error>
where
    W: Fn(&EdgeView<'_>) -> f64,
{
    let start = network.node_index(origin)?;
    let target = network.node_index(destination)?;

    if start == target {
        return Ok(Some(RoutePath {
            nodes: vec![origin],
            edges: Vec::new(),
            cost: 0.0,
        }));
    }

    let node_count = network.node_count();
    let mut distances = vec![f64::INFINITY; node_count];
    let mut predecessors: Vec<Option<(NodeIndex, EdgeKey)>> = vec![None; node_count];
    let mut settled = FixedBitSet::with_capacity(node_count);
    let mut heap = BinaryHeap::new();

    distances[start.index()] = 0.0;
    heap.push(State {
        cost: 0.0,
        node_id: origin,
        node: start,
    });

    while let Some(State { cost, node, .. }) = heap.pop() {
        if settled.put(node.index()) {
            continue;
        }
        if node == target {
            break;
        }

        for (next, view) in network.outgoing(node) {
            if settled.contains(next.index()) {
                continue;
            }
            let edge_weight = weight(&view);
            if !edge_weight.is_finite() || edge_weight < 0.0 {
                trace!("Skipping edge {} with weight {edge_weight}", view.id);
                continue;
            }

            let next_cost = cost + edge_weight;
            let current = distances[next.index()];
            let improves = next_cost < current
                || (next_cost == current
                    && predecessors[next.index()].is_some_and(|(_, best)| view.id < best));

            if improves {
                distances[next.index()] = next_cost;
                predecessors[next.index()] = Some((node, view.id));
                heap.push(State {
                    cost: next_cost,
                    node_id: network.node_at(next).id,
                    node: next,
                });
            }
        }
    }

    if !settled.contains(target.index()) {
        return Ok(None);
    }

    let mut nodes = vec![destination];
    let mut edges = Vec::new();
    let mut current = target;
    while let Some((prev, edge)) = predecessors[current.index()] {
        edges.push(edge);
        nodes.push(network.node_at(prev).id);
        current = prev;
    }
    nodes.reverse();
    edges.reverse();

    Ok(Some(RoutePath {
        nodes,
        edges,
        cost: distances[target.index()],
    }))
}
