//! Per-hazard reports: the road each hazard sits on, listings by date and
//! location, critical segments and transit stops around a hazard.

use chrono::NaiveDate;
use geo::{Bearing, Closest, ClosestPoint, Coord, Destination, Distance, Haversine, LineString, Point};
use hashbrown::HashMap;
use log::warn;
use serde::Serialize;
use wkt::ToWkt;

use super::critical::{RankedSegments, rank_edges, validate_limit};
use crate::{
    Error, Meters,
    model::{
        CentralityMetric, CentralityStore, EdgeKey, HazardZone, RoadNetwork, SpeedProfileSet,
        TransitStop,
    },
    routing::{ProfileTiming, UNNAMED_ROAD, profile_timings},
};

/// Default number of segments returned around a hazard
pub const DEFAULT_NEAR_HAZARD_LIMIT: usize = 10;

/// Default search radius for segments around a hazard, in metres
pub const DEFAULT_NEAR_HAZARD_BUFFER_M: Meters = 50.0;

/// How far the hazard's road edge is stretched at each end before stops are
/// matched against it, in metres
pub const STOP_SEARCH_EXTENSION_M: Meters = 100.0;

/// Road edge nearest to a hazard and its traversal times under each profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardEdgeImpact {
    pub hazard_id: i64,
    pub edge: EdgeKey,
    pub road_name: String,
    pub road_type: Option<String>,
    pub length_m: Option<Meters>,
    pub timings: Vec<ProfileTiming>,
    pub geometry_wkt: String,
    #[serde(skip)]
    pub geometry: LineString<f64>,
}

impl HazardEdgeImpact {
    /// Largest delay over all profiles, i.e. the slowest profile against the
    /// baseline
    pub fn max_delay_s(&self) -> f64 {
        self.timings
            .iter()
            .map(|t| t.delay_s)
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFrequency {
    pub location: String,
    pub count: usize,
    /// Hazard the coordinate and impact are taken from: the first listed
    /// with this location
    pub hazard_id: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub impact: Option<HazardEdgeImpact>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyStop {
    pub code: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Great-circle distance to the hazard's road edge
    pub distance_m: Meters,
}

/// Impact of one hazard on the road edge closest to it. `None` for an empty
/// network.
pub fn hazard_edge_impact(
    network: &RoadNetwork,
    zone: &HazardZone,
    profiles: &SpeedProfileSet,
) -> Option<HazardEdgeImpact> {
    let view = network.nearest_edge(&zone.geometry.anchor())?;
    let geometry = network.edge_geometry(&view);

    Some(HazardEdgeImpact {
        hazard_id: zone.id,
        edge: view.id,
        road_name: view
            .edge
            .road_name()
            .unwrap_or_else(|| UNNAMED_ROAD.to_string()),
        road_type: view.edge.highway.clone(),
        length_m: view.edge.length,
        timings: profile_timings(profiles, view.edge.length_or_zero()),
        geometry_wkt: geometry.to_wkt().to_string(),
        geometry: geometry.into_owned(),
    })
}

/// Impact of each hazard on its nearest road edge. Hazards that cannot be
/// matched to an edge are logged and left out.
pub fn hazard_edge_impacts<'a>(
    network: &RoadNetwork,
    zones: impl IntoIterator<Item = &'a HazardZone>,
    profiles: &SpeedProfileSet,
) -> Vec<HazardEdgeImpact> {
    zones
        .into_iter()
        .filter_map(|zone| {
            let impact = hazard_edge_impact(network, zone, profiles);
            if impact.is_none() {
                warn!("Hazard {} skipped: no road edge near it", zone.id);
            }
            impact
        })
        .collect()
}

/// Hazards dated within `start..=end`. Undated hazards never match.
///
/// # Errors
///
/// Returns `InvalidInput` if `start` is after `end`
pub fn zones_in_date_range(
    zones: &[HazardZone],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<&HazardZone>, Error> {
    if start > end {
        return Err(Error::InvalidInput(
            "start_date cannot be after end_date".to_string(),
        ));
    }
    Ok(zones
        .iter()
        .filter(|zone| zone.meta.date.is_some_and(|date| start <= date && date <= end))
        .collect())
}

/// How often each location label occurs, most frequent first. Equal counts
/// keep the order in which their labels first appear. Blank and missing
/// labels are ignored.
pub fn location_frequencies(
    network: &RoadNetwork,
    zones: &[HazardZone],
    profiles: &SpeedProfileSet,
) -> Vec<LocationFrequency> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize, &HazardZone)> = Vec::new();
    for zone in zones {
        let Some(location) = zone.meta.location.as_deref().map(str::trim) else {
            continue;
        };
        if location.is_empty() {
            continue;
        }
        let slot = *slots.entry(location).or_insert_with(|| {
            counts.push((location, 0, zone));
            counts.len() - 1
        });
        counts[slot].1 += 1;
    }

    let mut frequencies: Vec<LocationFrequency> = counts
        .into_iter()
        .map(|(location, count, zone)| {
            let anchor = zone.geometry.anchor();
            LocationFrequency {
                location: location.to_string(),
                count,
                hazard_id: zone.id,
                longitude: anchor.x(),
                latitude: anchor.y(),
                impact: hazard_edge_impact(network, zone, profiles),
            }
        })
        .collect();

    // stable, so ties stay in first-seen order
    frequencies.sort_by(|a, b| b.count.cmp(&a.count));
    frequencies
}

/// Edges within `radius_m` metres of a hazard, ranked by centrality
///
/// # Errors
///
/// Returns `InvalidInput` for a negative or non-finite radius or a zero
/// limit, and `DataUnavailable` if the metric is not loaded
pub fn critical_segments_near_hazard(
    network: &RoadNetwork,
    store: &CentralityStore,
    metric: CentralityMetric,
    zone: &HazardZone,
    radius_m: Meters,
    limit: usize,
) -> Result<RankedSegments, Error> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(Error::InvalidInput(format!(
            "buffer_m must be a non-negative number, got {radius_m}"
        )));
    }
    let limit = validate_limit(limit)?;
    let scores = store.get(metric)?;

    let envelope = zone.geometry.buffered_rect_m(radius_m);
    let candidates = network.edges_in_envelope(&envelope).filter(|view| {
        zone.geometry.distance_to_line_m(&network.edge_geometry(view)) <= radius_m
    });

    Ok(RankedSegments {
        metric,
        segments: rank_edges(network, scores, candidates, limit),
    })
}

/// Transit stops within `radius_m` metres of the road edge nearest to the
/// hazard, closest first. The edge is stretched by
/// [`STOP_SEARCH_EXTENSION_M`] at both ends so stops just past a junction
/// still count.
///
/// # Errors
///
/// Returns `InvalidInput` for a negative or non-finite radius
pub fn stops_near_hazard(
    network: &RoadNetwork,
    stops: &[TransitStop],
    zone: &HazardZone,
    radius_m: Meters,
) -> Result<Vec<NearbyStop>, Error> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(Error::InvalidInput(format!(
            "radius_m must be a non-negative number, got {radius_m}"
        )));
    }
    let Some(view) = network.nearest_edge(&zone.geometry.anchor()) else {
        return Ok(Vec::new());
    };
    let line = extend_line(&network.edge_geometry(&view), STOP_SEARCH_EXTENSION_M);

    let mut nearby: Vec<NearbyStop> = stops
        .iter()
        .filter_map(|stop| {
            let distance_m = haversine_to_line(&line, stop.geometry)?;
            (distance_m <= radius_m).then(|| NearbyStop {
                code: stop.code.clone(),
                name: stop.name.clone(),
                longitude: stop.geometry.x(),
                latitude: stop.geometry.y(),
                distance_m,
            })
        })
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then_with(|| a.code.cmp(&b.code))
    });
    Ok(nearby)
}

/// Moves both end points of `line` outwards by `extension_m` metres along the
/// bearing of their end segment. Lines with fewer than two points are
/// returned as they are.
fn extend_line(line: &LineString<f64>, extension_m: Meters) -> LineString<f64> {
    let coords = &line.0;
    let n = coords.len();
    if n < 2 {
        return line.clone();
    }
    let mut extended = coords.clone();
    extended[0] = push_out(coords[1], coords[0], extension_m);
    extended[n - 1] = push_out(coords[n - 2], coords[n - 1], extension_m);
    LineString::new(extended)
}

/// `end` moved `distance_m` further along the direction `from -> end`
fn push_out(from: Coord<f64>, end: Coord<f64>, distance_m: Meters) -> Coord<f64> {
    if from == end {
        return end;
    }
    let bearing = Haversine.bearing(Point::from(from), Point::from(end));
    Haversine.destination(Point::from(end), bearing, distance_m).0
}

/// Great-circle distance from `point` to the closest point of `line`. The
/// closest point itself is found in the plane, which is accurate at the
/// scale of a single road edge.
fn haversine_to_line(line: &LineString<f64>, point: Point<f64>) -> Option<Meters> {
    match line.closest_point(&point) {
        Closest::Intersection(closest) | Closest::SinglePoint(closest) => {
            Some(Haversine.distance(closest, point))
        }
        Closest::Indeterminate => None,
    }
}
