//! Read-only road graph with spatial indices for nodes and edges

use std::borrow::Cow;

use geo::{Coord, LineString, Point, Rect};
use hashbrown::HashMap;
use petgraph::{
    Direction,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};
use rstar::{AABB, RTree, primitives::GeomWithData};

use super::components::{EdgeKey, RoadEdge, RoadNode};
use crate::{Error, NodeId};

pub type IndexedPoint = GeomWithData<Point<f64>, NodeIndex>;
pub type IndexedEdge = GeomWithData<LineString<f64>, EdgeIndex>;

/// Directed road network. Parallel edges between the same ordered node pair
/// are allowed and told apart by their key.
///
/// The network is immutable once built (see [`super::RoadNetworkBuilder`]),
/// so it can be shared between concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    pub(crate) graph: DiGraph<RoadNode, RoadEdge>,
    pub(crate) node_lookup: HashMap<NodeId, NodeIndex>,
    node_rtree: RTree<IndexedPoint>,
    edge_rtree: RTree<IndexedEdge>,
}

/// Borrowed view of a single edge together with its identity
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'a> {
    pub id: EdgeKey,
    pub edge: &'a RoadEdge,
    pub(crate) index: EdgeIndex,
}

impl RoadNetwork {
    pub(crate) fn from_parts(
        graph: DiGraph<RoadNode, RoadEdge>,
        node_lookup: HashMap<NodeId, NodeIndex>,
    ) -> Self {
        let node_rtree = RTree::bulk_load(
            graph
                .node_indices()
                .map(|idx| GeomWithData::new(graph[idx].geometry, idx))
                .collect(),
        );

        let edge_rtree = RTree::bulk_load(
            graph
                .edge_references()
                .map(|edge| {
                    let line = edge.weight().geometry.clone().unwrap_or_else(|| {
                        straight_line(&graph[edge.source()], &graph[edge.target()])
                    });
                    GeomWithData::new(line, edge.id())
                })
                .collect(),
        );

        Self {
            graph,
            node_lookup,
            node_rtree,
            edge_rtree,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_lookup.contains_key(&id)
    }

    pub(crate) fn node_index(&self, id: NodeId) -> Result<NodeIndex, Error> {
        self.node_lookup
            .get(&id)
            .copied()
            .ok_or(Error::UnknownNode(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&RoadNode> {
        self.node_lookup.get(&id).map(|&idx| &self.graph[idx])
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> &RoadNode {
        &self.graph[idx]
    }

    /// Node coordinate as (longitude, latitude)
    pub fn node_coord(&self, id: NodeId) -> Option<Coord<f64>> {
        self.node(id).map(|node| node.geometry.into())
    }

    pub(crate) fn view(&self, index: EdgeIndex) -> EdgeView<'_> {
        let (source, target) = self.graph.edge_endpoints(index).unwrap_or_else(|| {
            unreachable!("edge index {index:?} comes from this graph and edges are never removed")
        });
        let edge = &self.graph[index];
        EdgeView {
            id: EdgeKey::new(self.graph[source].id, self.graph[target].id, edge.key),
            edge,
            index,
        }
    }

    /// Edge lookup by structural identity
    pub fn edge(&self, id: EdgeKey) -> Option<EdgeView<'_>> {
        self.parallel_edges(id.u, id.v).find(|view| view.id.key == id.key)
    }

    /// All edges from `u` to `v`, in ascending key order
    pub fn parallel_edges(&self, u: NodeId, v: NodeId) -> impl Iterator<Item = EdgeView<'_>> {
        let mut views: Vec<EdgeView<'_>> = match (self.node_lookup.get(&u), self.node_lookup.get(&v)) {
            (Some(&a), Some(&b)) => self
                .graph
                .edges_connecting(a, b)
                .map(|edge| self.view(edge.id()))
                .collect(),
            _ => Vec::new(),
        };
        views.sort_by_key(|view| view.id.key);
        views.into_iter()
    }

    /// Outgoing edges of a node
    pub(crate) fn outgoing(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, EdgeView<'_>)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.target(), self.view(edge.id())))
    }

    /// Iteration over every edge of the network
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> {
        self.graph.edge_indices().map(|idx| self.view(idx))
    }

    /// Geometry of an edge: the explicit polyline if present, otherwise the
    /// straight segment between its endpoints.
    pub fn edge_geometry<'a>(&'a self, view: &EdgeView<'a>) -> Cow<'a, LineString<f64>> {
        match &view.edge.geometry {
            Some(line) => Cow::Borrowed(line),
            None => {
                let (source, target) = self
                    .graph
                    .edge_endpoints(view.index)
                    .unwrap_or_else(|| unreachable!("edge views always point into this graph"));
                Cow::Owned(straight_line(&self.graph[source], &self.graph[target]))
            }
        }
    }

    /// Nearest node to a point, by planar distance in coordinate units
    pub fn nearest_node(&self, point: &Point<f64>) -> Option<NodeId> {
        self.node_rtree
            .nearest_neighbor(point)
            .map(|entry| self.graph[entry.data].id)
    }

    /// Nearest edge to a point, by planar distance in coordinate units
    pub fn nearest_edge(&self, point: &Point<f64>) -> Option<EdgeView<'_>> {
        self.edge_rtree
            .nearest_neighbor(point)
            .map(|entry| self.view(entry.data))
    }

    /// Edges whose bounding boxes intersect `rect`. Callers refine with an
    /// exact geometric test.
    pub fn edges_in_envelope(&self, rect: &Rect<f64>) -> impl Iterator<Item = EdgeView<'_>> {
        let envelope = AABB::from_corners(Point::from(rect.min()), Point::from(rect.max()));
        self.edge_rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| self.view(entry.data))
    }
}

fn straight_line(from: &RoadNode, to: &RoadNode) -> LineString<f64> {
    LineString::new(vec![from.geometry.into(), to.geometry.into()])
}
