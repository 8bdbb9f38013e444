//! Road network components - nodes, edges and edge identities

use std::fmt;

use geo::{LineString, Point};
use serde::{Deserialize, Serialize};

use crate::{Meters, NodeId};

/// Road graph node
#[derive(Debug, Clone)]
pub struct RoadNode {
    /// Graph-provided identifier of the node
    pub id: NodeId,
    /// Node coordinates, x = longitude, y = latitude
    pub geometry: Point<f64>,
}

/// Structural identity of a directed edge: the ordered node pair plus a key
/// distinguishing parallel edges between the same pair.
///
/// Ordering is lexicographic over `(u, v, key)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub u: NodeId,
    pub v: NodeId,
    pub key: u32,
}

impl EdgeKey {
    pub fn new(u: NodeId, v: NodeId, key: u32) -> Self {
        Self { u, v, key }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.u, self.v, self.key)
    }
}

/// Road name attribute. OSM ways merged during simplification may carry
/// several names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoadName {
    Single(String),
    Multiple(Vec<String>),
}

impl RoadName {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names: &[String] = match self {
            RoadName::Single(name) => std::slice::from_ref(name),
            RoadName::Multiple(names) => names,
        };
        names.iter().map(String::as_str)
    }

    /// Case-insensitive exact comparison against any of the names
    pub fn matches_exact(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.names().any(|name| name.to_lowercase() == query)
    }

    /// Case-insensitive substring search over any of the names
    pub fn contains(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.names().any(|name| name.to_lowercase().contains(&query))
    }
}

impl fmt::Display for RoadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoadName::Single(name) => f.write_str(name),
            RoadName::Multiple(names) => f.write_str(&names.join(", ")),
        }
    }
}

/// Road graph edge (road segment)
#[derive(Debug, Clone)]
pub struct RoadEdge {
    /// Disambiguates parallel edges between the same node pair
    pub key: u32,
    /// Segment length in meters, `None` when the source data lacks it
    pub length: Option<Meters>,
    pub name: Option<RoadName>,
    /// Road class tag (OSM `highway`)
    pub highway: Option<String>,
    /// Explicit polyline, x = longitude, y = latitude. When absent the edge
    /// is the straight segment between its endpoints.
    pub geometry: Option<LineString<f64>>,
}

impl RoadEdge {
    pub fn new(key: u32, length: Meters) -> Self {
        Self {
            key,
            length: Some(length),
            name: None,
            highway: None,
            geometry: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(RoadName::Single(name.into()));
        self
    }

    #[must_use]
    pub fn with_highway(mut self, highway: impl Into<String>) -> Self {
        self.highway = Some(highway.into());
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: LineString<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    #[must_use]
    pub fn without_length(mut self) -> Self {
        self.length = None;
        self
    }

    /// Length used for weighting and accumulation. Missing length counts as zero.
    pub fn length_or_zero(&self) -> Meters {
        self.length.unwrap_or(0.0)
    }

    pub fn road_name(&self) -> Option<String> {
        self.name.as_ref().map(ToString::to_string)
    }
}
