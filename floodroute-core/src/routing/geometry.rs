//! Conversion of routed paths into drawable coordinate sequences.
//!
//! Rendering output uses `[latitude, longitude]` pairs, while every
//! geometric test inside the crate works on `geo` types with
//! x = longitude, y = latitude. The swap happens only here and in
//! [`lat_lon_to_line`].

use geo::{Coord, LineString};

use super::dijkstra::RoutePath;
use crate::model::RoadNetwork;

/// `[latitude, longitude]` pair for map rendering
pub type LatLon = [f64; 2];

fn to_lat_lon(coord: Coord<f64>) -> LatLon {
    [coord.y, coord.x]
}

fn push_distinct(coords: &mut Vec<LatLon>, point: LatLon) {
    if coords.last() != Some(&point) {
        coords.push(point);
    }
}

/// Continuous, de-duplicated `[lat, lon]` sequence following the path's
/// edges. Explicit edge polylines contribute every point but their last (the
/// next edge starts there), edges without geometry contribute their start
/// node, and the destination node closes the sequence.
pub fn route_geometry(network: &RoadNetwork, path: &RoutePath) -> Vec<LatLon> {
    let mut coords: Vec<LatLon> = Vec::with_capacity(path.nodes.len() + 1);

    for (edge_id, &start) in path.edges.iter().zip(&path.nodes) {
        let polyline = network.edge(*edge_id).and_then(|view| view.edge.geometry.as_ref());

        match polyline {
            Some(line) if !line.0.is_empty() => {
                for &coord in &line.0[..line.0.len() - 1] {
                    push_distinct(&mut coords, to_lat_lon(coord));
                }
            }
            _ => {
                if let Some(coord) = network.node_coord(start) {
                    push_distinct(&mut coords, to_lat_lon(coord));
                }
            }
        }
    }

    if let Some(coord) = path.destination().and_then(|node| network.node_coord(node)) {
        push_distinct(&mut coords, to_lat_lon(coord));
    }

    coords
}

/// Turns a rendering sequence back into a `geo` line (x = lon, y = lat)
pub fn lat_lon_to_line(coords: &[LatLon]) -> LineString<f64> {
    coords
        .iter()
        .map(|&[lat, lon]| Coord { x: lon, y: lat })
        .collect()
}
