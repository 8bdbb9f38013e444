//! Road network snapshot reader.
//!
//! The snapshot is a JSON document exported from the routing graph:
//!
//! ```json
//! {
//!   "nodes": [{"id": 1, "x": 103.85, "y": 1.29}],
//!   "edges": [{"u": 1, "v": 2, "key": 0, "length": 52.1, "name": "Orchard Road",
//!              "highway": "primary", "geometry": "LINESTRING(103.85 1.29, 103.86 1.29)"}]
//! }
//! ```
//!
//! `x`/`y` are longitude/latitude. `name` may be a string or a list of
//! strings; `length` and `geometry` are optional.

use std::{fs::File, io::BufReader, path::Path};

use floodroute_core::{
    Error, NodeId,
    model::{RoadEdge, RoadName, RoadNetwork, RoadNetworkBuilder},
};
use geo::LineString;
use serde::Deserialize;
use wkt::TryFromWkt;

#[derive(Debug, Deserialize)]
struct Snapshot {
    nodes: Vec<SnapshotNode>,
    edges: Vec<SnapshotEdge>,
}

#[derive(Debug, Deserialize)]
struct SnapshotNode {
    id: NodeId,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct SnapshotEdge {
    u: NodeId,
    v: NodeId,
    #[serde(default)]
    key: u32,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    name: Option<RoadName>,
    #[serde(default)]
    highway: Option<String>,
    #[serde(default)]
    geometry: Option<String>,
}

/// # Errors
///
/// Returns `ArtifactNotFound` for a missing file and `InvalidData` for a
/// malformed snapshot, duplicate identities or unparseable edge geometry
pub fn read_network_json(path: &Path) -> Result<RoadNetwork, Error> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::ArtifactNotFound(path.to_path_buf()),
        _ => Error::IoError(e),
    })?;
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::InvalidData(format!("{}: {e}", path.display())))?;
    build_network(snapshot)
}

/// # Errors
///
/// Same as [`read_network_json`], for an in-memory document
pub fn parse_network_json(text: &str) -> Result<RoadNetwork, Error> {
    let snapshot: Snapshot =
        serde_json::from_str(text).map_err(|e| Error::InvalidData(e.to_string()))?;
    build_network(snapshot)
}

fn build_network(snapshot: Snapshot) -> Result<RoadNetwork, Error> {
    let mut builder = RoadNetworkBuilder::new();
    for node in snapshot.nodes {
        builder.add_node(node.id, node.x, node.y)?;
    }
    for edge in snapshot.edges {
        let geometry = edge
            .geometry
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| {
                LineString::<f64>::try_from_wkt_str(text).map_err(|e| {
                    Error::InvalidData(format!(
                        "Edge ({}, {}, {}) has invalid geometry: {e}",
                        edge.u, edge.v, edge.key
                    ))
                })
            })
            .transpose()?;
        builder.add_edge(
            edge.u,
            edge.v,
            RoadEdge {
                key: edge.key,
                length: edge.length,
                name: edge.name,
                highway: edge.highway,
                geometry,
            },
        )?;
    }
    let network = builder.build();
    tracing::info!(
        nodes = network.node_count(),
        edges = network.edge_count(),
        "road network loaded"
    );
    Ok(network)
}

#[cfg(test)]
mod tests {
    use floodroute_core::EdgeKey;

    use super::*;

    #[test]
    fn parses_snapshot_with_optional_fields() {
        let network = parse_network_json(
            r#"{
                "nodes": [{"id": 1, "x": 0.0, "y": 0.0}, {"id": 2, "x": 0.001, "y": 0.0}],
                "edges": [
                    {"u": 1, "v": 2, "key": 0, "length": 111.0, "name": ["Orchard Road", "Orchard Rd"],
                     "highway": "primary", "geometry": "LINESTRING(0 0, 0.0005 0.0001, 0.001 0)"},
                    {"u": 2, "v": 1}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(network.node_count(), 2);
        let forward = network.edge(EdgeKey::new(1, 2, 0)).unwrap();
        assert_eq!(forward.edge.road_name().as_deref(), Some("Orchard Road, Orchard Rd"));
        assert_eq!(forward.edge.geometry.as_ref().map(|g| g.0.len()), Some(3));

        let backward = network.edge(EdgeKey::new(2, 1, 0)).unwrap();
        assert_eq!(backward.edge.length, None);
        assert!(backward.edge.geometry.is_none());
    }

    #[test]
    fn rejects_bad_geometry_and_unknown_nodes() {
        let err = parse_network_json(
            r#"{"nodes": [{"id": 1, "x": 0, "y": 0}, {"id": 2, "x": 1, "y": 0}],
                "edges": [{"u": 1, "v": 2, "geometry": "LINESTRING(0 0"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let err = parse_network_json(
            r#"{"nodes": [{"id": 1, "x": 0, "y": 0}], "edges": [{"u": 1, "v": 9}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(9)));
    }
}
