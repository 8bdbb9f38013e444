use geo::Point;
use hashbrown::HashMap;
use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};

use super::{
    components::{EdgeKey, RoadEdge, RoadNode},
    graph::RoadNetwork,
};
use crate::{Error, NodeId};

/// One-time builder for a [`RoadNetwork`].
///
/// Construction happens once, single-threaded, before any query; the built
/// network exposes only read operations.
#[derive(Debug, Default)]
pub struct RoadNetworkBuilder {
    graph: DiGraph<RoadNode, RoadEdge>,
    node_lookup: HashMap<NodeId, NodeIndex>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node at (longitude, latitude)
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already present or the coordinate is not finite
    pub fn add_node(&mut self, id: NodeId, lon: f64, lat: f64) -> Result<NodeId, Error> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(Error::InvalidData(format!(
                "Node {id} has a non-finite coordinate ({lon}, {lat})"
            )));
        }
        if self.node_lookup.contains_key(&id) {
            return Err(Error::InvalidData(format!("Duplicate node id {id}")));
        }

        let idx = self.graph.add_node(RoadNode {
            id,
            geometry: Point::new(lon, lat),
        });
        self.node_lookup.insert(id, idx);
        Ok(id)
    }

    /// Adds a directed edge from `u` to `v`
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is unknown, the `(u, v, key)`
    /// identity is already taken, or the length is negative or not finite
    pub fn add_edge(&mut self, u: NodeId, v: NodeId, edge: RoadEdge) -> Result<EdgeKey, Error> {
        let source = *self.node_lookup.get(&u).ok_or(Error::UnknownNode(u))?;
        let target = *self.node_lookup.get(&v).ok_or(Error::UnknownNode(v))?;

        if let Some(length) = edge.length
            && (!length.is_finite() || length < 0.0)
        {
            return Err(Error::InvalidData(format!(
                "Edge ({u}, {v}, {}) has invalid length {length}",
                edge.key
            )));
        }

        if self
            .graph
            .edges_connecting(source, target)
            .any(|existing| existing.weight().key == edge.key)
        {
            return Err(Error::InvalidData(format!(
                "Duplicate edge ({u}, {v}, {})",
                edge.key
            )));
        }

        let id = EdgeKey::new(u, v, edge.key);
        self.graph.add_edge(source, target, edge);
        Ok(id)
    }

    /// Adds `edge` from `u` to `v` and a reciprocal copy from `v` to `u`
    /// with the geometry reversed.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RoadNetworkBuilder::add_edge`]
    pub fn add_road(
        &mut self,
        u: NodeId,
        v: NodeId,
        edge: RoadEdge,
    ) -> Result<(EdgeKey, EdgeKey), Error> {
        let mut reverse = edge.clone();
        if let Some(line) = reverse.geometry.as_mut() {
            line.0.reverse();
        }
        let forward = self.add_edge(u, v, edge)?;
        let backward = self.add_edge(v, u, reverse)?;
        Ok((forward, backward))
    }

    pub fn build(self) -> RoadNetwork {
        debug!(
            "Building road network with {} nodes and {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        RoadNetwork::from_parts(self.graph, self.node_lookup)
    }
}
