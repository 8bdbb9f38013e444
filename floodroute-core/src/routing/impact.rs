//! Flood impact of a routed path: which edges cross a hazard buffer and how
//! much slower the route becomes under each assumed speed.

use geo::LineString;
use serde::Serialize;
use wkt::ToWkt;

use super::dijkstra::RoutePath;
use crate::{
    Meters, Seconds,
    model::{EdgeKey, RoadNetwork, SpeedProfileSet},
    spatial::HazardIndex,
};

pub(crate) const UNNAMED_ROAD: &str = "Unnamed Road";

/// Seconds attributed to one speed profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSeconds {
    pub profile: String,
    pub seconds: Seconds,
}

/// Traversal time of one segment under one speed profile, and its delay
/// relative to the baseline profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileTiming {
    pub profile: String,
    pub travel_time_s: Seconds,
    pub delay_s: Seconds,
}

/// Route edge whose geometry intersects a hazard buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloodedSegment {
    pub edge: EdgeKey,
    pub road_name: String,
    /// Edge geometry as WKT (x = longitude, y = latitude)
    pub geometry_wkt: String,
    #[serde(skip)]
    pub geometry: LineString<f64>,
    /// `None` when the edge has no length attribute; such segments carry no timings
    pub length_m: Option<Meters>,
    pub timings: Vec<ProfileTiming>,
    /// Hazards whose buffers the edge crosses, by id
    pub hazard_ids: Vec<i64>,
}

impl FloodedSegment {
    pub fn timing(&self, profile: &str) -> Option<&ProfileTiming> {
        self.timings.iter().find(|t| t.profile == profile)
    }
}

/// Locally recovered data problem met while analysing a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "edge", rename_all = "snake_case")]
pub enum DataIssue {
    /// Edge has no length; it adds nothing to lengths, times or delays
    MissingLength(EdgeKey),
    /// Edge has no polyline; the straight segment between its nodes was used
    SynthesizedGeometry(EdgeKey),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImpactReport {
    pub flooded_segments: Vec<FloodedSegment>,
    pub total_delay: Vec<ProfileSeconds>,
    pub route_length_m: Meters,
    pub issues: Vec<DataIssue>,
}

/// Per-profile traversal times and delays for a segment of `length` meters.
/// The baseline's delay is exactly zero since it subtracts its own time.
pub(crate) fn profile_timings(profiles: &SpeedProfileSet, length: Meters) -> Vec<ProfileTiming> {
    let baseline_time = profiles.baseline().travel_time(length);
    profiles
        .iter()
        .map(|profile| {
            let travel_time_s = profile.travel_time(length);
            ProfileTiming {
                profile: profile.label.clone(),
                travel_time_s,
                delay_s: travel_time_s - baseline_time,
            }
        })
        .collect()
}

/// Per-profile travel time over `length` meters
pub(crate) fn travel_times(profiles: &SpeedProfileSet, length: Meters) -> Vec<ProfileSeconds> {
    profiles
        .iter()
        .map(|profile| ProfileSeconds {
            profile: profile.label.clone(),
            seconds: profile.travel_time(length),
        })
        .collect()
}

/// Tests every edge of `path` against the hazard index and accumulates the
/// per-profile delay over the flagged ones. Pure function of its inputs.
pub(crate) fn analyze_impact(
    network: &RoadNetwork,
    index: &HazardIndex,
    profiles: &SpeedProfileSet,
    path: &RoutePath,
) -> ImpactReport {
    let mut flooded_segments = Vec::new();
    let mut issues = Vec::new();
    let mut route_length_m = 0.0;
    let mut total_delay: Vec<ProfileSeconds> = profiles
        .iter()
        .map(|profile| ProfileSeconds {
            profile: profile.label.clone(),
            seconds: 0.0,
        })
        .collect();

    for edge_id in &path.edges {
        let Some(view) = network.edge(*edge_id) else {
            continue;
        };

        match view.edge.length {
            Some(length) => route_length_m += length,
            None => issues.push(DataIssue::MissingLength(view.id)),
        }
        if view.edge.geometry.is_none() {
            issues.push(DataIssue::SynthesizedGeometry(view.id));
        }

        let geometry = network.edge_geometry(&view);
        let hazards = index.intersecting(&geometry);
        if hazards.is_empty() {
            continue;
        }

        let timings = view
            .edge
            .length
            .map(|length| profile_timings(profiles, length))
            .unwrap_or_default();
        for (total, timing) in total_delay.iter_mut().zip(&timings) {
            total.seconds += timing.delay_s;
        }

        flooded_segments.push(FloodedSegment {
            edge: view.id,
            road_name: view
                .edge
                .road_name()
                .unwrap_or_else(|| UNNAMED_ROAD.to_string()),
            geometry_wkt: geometry.to_wkt().to_string(),
            geometry: geometry.into_owned(),
            length_m: view.edge.length,
            timings,
            hazard_ids: hazards.iter().map(|zone| zone.id).collect(),
        });
    }

    log::debug!(
        "Route {:?} -> {:?}: {} of {} edges flooded",
        path.origin(),
        path.destination(),
        flooded_segments.len(),
        path.edges.len()
    );

    ImpactReport {
        flooded_segments,
        total_delay,
        route_length_m,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{HazardMeta, HazardRecord, RawGeometry, RoadEdge, RoadNetworkBuilder},
        routing::dijkstra::{length_weight, shortest_path},
    };

    fn hazard_at(id: i64, lon: f64, lat: f64) -> HazardRecord {
        HazardRecord {
            id,
            geometry: RawGeometry::Point { lon, lat },
            meta: HazardMeta::default(),
        }
    }

    /// 1 --(1000 m)--> 2 --(no length)--> 3 --(0 m)--> 4, along y = 0
    fn line_network() -> RoadNetwork {
        let mut b = RoadNetworkBuilder::new();
        b.add_node(1, 0.0, 0.0).unwrap();
        b.add_node(2, 0.01, 0.0).unwrap();
        b.add_node(3, 0.02, 0.0).unwrap();
        b.add_node(4, 0.03, 0.0).unwrap();
        b.add_edge(1, 2, RoadEdge::new(0, 1000.0).with_name("First Street"))
            .unwrap();
        b.add_edge(2, 3, RoadEdge::new(0, 0.0).without_length()).unwrap();
        b.add_edge(3, 4, RoadEdge::new(0, 0.0)).unwrap();
        b.build()
    }

    fn analyze(hazards: &[HazardRecord]) -> ImpactReport {
        let network = line_network();
        let index = HazardIndex::build(hazards, 0.0009).unwrap().index;
        let path = shortest_path(&network, 1, 4, length_weight).unwrap().unwrap();
        analyze_impact(&network, &index, &SpeedProfileSet::car(), &path)
    }

    #[test]
    fn clear_route_has_no_delay() {
        let report = analyze(&[hazard_at(1, 5.0, 5.0)]);
        assert!(report.flooded_segments.is_empty());
        assert!(report.total_delay.iter().all(|d| d.seconds == 0.0));
        assert_eq!(report.route_length_m, 1000.0);
    }

    #[test]
    fn delay_is_profile_time_minus_baseline_time() {
        let report = analyze(&[hazard_at(9, 0.005, 0.0005)]);
        assert_eq!(report.flooded_segments.len(), 1);
        let segment = &report.flooded_segments[0];
        assert_eq!(segment.edge, EdgeKey::new(1, 2, 0));
        assert_eq!(segment.road_name, "First Street");
        assert_eq!(segment.hazard_ids, vec![9]);
        assert!(segment.geometry_wkt.starts_with("LINESTRING"));

        let baseline = segment.timing("90kph").unwrap();
        assert_eq!(baseline.delay_s, 0.0);
        assert_eq!(baseline.travel_time_s, 40.0);

        let crawl = segment.timing("10kph").unwrap();
        assert!((crawl.travel_time_s - 360.0).abs() < 1e-9);
        assert!((crawl.delay_s - 320.0).abs() < 1e-9);

        let total = report.total_delay.iter().find(|d| d.profile == "10kph").unwrap();
        assert!((total.seconds - 320.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_edges_add_zero_delay() {
        let report = analyze(&[hazard_at(3, 0.03, 0.0)]);
        let segment = report
            .flooded_segments
            .iter()
            .find(|s| s.edge == EdgeKey::new(3, 4, 0))
            .unwrap();
        assert!(segment.timings.iter().all(|t| t.delay_s == 0.0 && t.travel_time_s == 0.0));
    }

    #[test]
    fn missing_length_is_flagged_but_not_accumulated() {
        let report = analyze(&[hazard_at(4, 0.015, 0.0)]);
        let segment = report
            .flooded_segments
            .iter()
            .find(|s| s.edge == EdgeKey::new(2, 3, 0))
            .unwrap();
        assert_eq!(segment.length_m, None);
        assert!(segment.timings.is_empty());
        assert!(report.total_delay.iter().all(|d| d.seconds == 0.0));
        assert!(report.issues.contains(&DataIssue::MissingLength(EdgeKey::new(2, 3, 0))));
        assert!(report
            .issues
            .contains(&DataIssue::SynthesizedGeometry(EdgeKey::new(1, 2, 0))));
    }
}
