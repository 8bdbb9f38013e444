use geo::Point;
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use serde_json::json;

use super::{
    RouteResult,
    geometry::{LatLon, lat_lon_to_line},
};
use crate::{Error, routing::FloodedSegment};

impl RouteResult {
    /// Converts the analysed route to a `GeoJSON` `FeatureCollection`: the
    /// route line, one feature per flooded segment, then the detour line if
    /// one was found.
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let mut features = Vec::with_capacity(self.flooded_segments.len() + 2);

        let route = line_geometry(&self.route_geometry);
        features.push(json_feature(json!({
            "type": "Feature",
            "geometry": route,
            "properties": {
                "kind": "route",
                "status": self.status,
                "origin": self.path.origin(),
                "destination": self.path.destination(),
                "length_m": self.route_length_m,
                "normal_travel_time": self.normal_travel_time,
                "total_delay": self.total_delay,
            }
        }))?);

        for segment in &self.flooded_segments {
            features.push(segment_feature(segment)?);
        }

        if let Some(detour) = self.detour_result() {
            features.push(json_feature(json!({
                "type": "Feature",
                "geometry": line_geometry(&detour.geometry),
                "properties": {
                    "kind": "detour",
                    "length_m": detour.length_m,
                    "travel_time": detour.travel_time,
                    "comparison": detour.comparison,
                    "flooded_edges_on_detour": detour.flooded_edges_on_detour,
                }
            }))?);
        }

        Ok(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }

    pub fn to_geojson_string(&self) -> Result<String, Error> {
        serde_json::to_string(&self.to_geojson()?).map_err(|e| Error::GeoJsonError(e.to_string()))
    }
}

fn segment_feature(segment: &FloodedSegment) -> Result<Feature, Error> {
    let geometry = Geometry::new(GeoJsonValue::from(&segment.geometry));
    json_feature(json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "kind": "flooded_segment",
            "edge": segment.edge,
            "road_name": segment.road_name,
            "length_m": segment.length_m,
            "timings": segment.timings,
            "hazard_ids": segment.hazard_ids,
        }
    }))
}

/// A single-node route renders as a point rather than a degenerate line
fn line_geometry(coords: &[LatLon]) -> Geometry {
    match coords {
        [[lat, lon]] => Geometry::new(GeoJsonValue::from(&Point::new(*lon, *lat))),
        _ => Geometry::new(GeoJsonValue::from(&lat_lon_to_line(coords))),
    }
}

pub(crate) fn json_feature(value: serde_json::Value) -> Result<Feature, Error> {
    serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}
