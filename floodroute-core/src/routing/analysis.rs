use hashbrown::HashSet;
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    detour::compute_detour,
    dijkstra::{RoutePath, length_weight, shortest_path},
    geometry::{LatLon, route_geometry},
    impact::{DataIssue, FloodedSegment, ProfileSeconds, analyze_impact, travel_times},
};
use crate::{
    DEFAULT_DETOUR_PENALTY, Error, Meters, NodeId, Seconds,
    model::{EdgeKey, EdgeView, RoadNetwork, SpeedProfileSet},
    spatial::HazardIndex,
};

/// How an edge is chosen for a node pair joined by several parallel edges
/// when the caller supplies a bare node path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelEdgePolicy {
    /// Shortest parallel edge, lowest key among equal lengths. Matches the
    /// edge the path search itself traverses.
    #[default]
    #[serde(alias = "shortest")]
    ShortestLength,
    /// Always the lowest key, regardless of length
    LowestKey,
}

/// Tunables of a route analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Weight multiplier for flooded edges during the detour search
    pub detour_penalty: f64,
    pub parallel_edge_policy: ParallelEdgePolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            detour_penalty: DEFAULT_DETOUR_PENALTY,
            parallel_edge_policy: ParallelEdgePolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// # Errors
    ///
    /// Returns `InvalidInput` if the penalty is not a finite number of at least 1
    pub fn validate(&self) -> Result<(), Error> {
        if !self.detour_penalty.is_finite() || self.detour_penalty < 1.0 {
            return Err(Error::InvalidInput(format!(
                "Detour penalty must be a finite number >= 1, got {}",
                self.detour_penalty
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Clear,
    Flooded,
}

/// Flooded route against detour, for one speed profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileComparison {
    pub profile: String,
    pub flooded_route_time_s: Seconds,
    pub detour_time_s: Seconds,
    /// Detour minus flooded route; negative when the detour is faster
    pub difference_s: Seconds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetourResult {
    pub path: RoutePath,
    pub geometry: Vec<LatLon>,
    pub length_m: Meters,
    pub travel_time: Vec<ProfileSeconds>,
    pub comparison: Vec<ProfileComparison>,
    /// Edges of the detour that still cross a hazard buffer
    pub flooded_edges_on_detour: usize,
}

/// Outcome of the detour search. Distinguishes a clear route from a flooded
/// route without any alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetourStatus {
    /// The route is clear, no search was made
    NotNeeded,
    /// The route is flooded but no path could be found
    Unavailable,
    Found(Box<DetourResult>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub path: RoutePath,
    pub route_geometry: Vec<LatLon>,
    pub status: RouteStatus,
    pub flooded_segments: Vec<FloodedSegment>,
    pub route_length_m: Meters,
    pub total_delay: Vec<ProfileSeconds>,
    pub normal_travel_time: Vec<ProfileSeconds>,
    pub detour: DetourStatus,
    pub issues: Vec<DataIssue>,
}

impl RouteResult {
    pub fn has_detour(&self) -> bool {
        matches!(self.detour, DetourStatus::Found(_))
    }

    pub fn detour_result(&self) -> Option<&DetourResult> {
        match &self.detour {
            DetourStatus::Found(detour) => Some(detour),
            _ => None,
        }
    }

    pub fn total_delay_for(&self, profile: &str) -> Option<Seconds> {
        self.total_delay
            .iter()
            .find(|d| d.profile == profile)
            .map(|d| d.seconds)
    }
}

/// Shortest route by length from `origin` to `destination`, tested against
/// the hazard index, with a detour when any edge is flooded.
///
/// Returns `Ok(None)` when the destination is unreachable.
///
/// # Errors
///
/// Returns `UnknownNode` for endpoints missing from the network and
/// `InvalidInput` for an invalid configuration
pub fn analyze_route(
    network: &RoadNetwork,
    index: &HazardIndex,
    profiles: &SpeedProfileSet,
    config: &AnalysisConfig,
    origin: NodeId,
    destination: NodeId,
) -> Result<Option<RouteResult>, Error> {
    config.validate()?;

    let Some(path) = shortest_path(network, origin, destination, length_weight)? else {
        debug!("No route from {origin} to {destination}");
        return Ok(None);
    };

    assemble(network, index, profiles, config, path).map(Some)
}

/// Analyses a caller-supplied node path instead of searching one. Parallel
/// edges are resolved with the configured [`ParallelEdgePolicy`].
///
/// # Errors
///
/// Returns `InvalidInput` for an empty path or consecutive nodes with no
/// connecting edge, and `UnknownNode` for nodes missing from the network
pub fn analyze_node_path(
    network: &RoadNetwork,
    index: &HazardIndex,
    profiles: &SpeedProfileSet,
    config: &AnalysisConfig,
    nodes: &[NodeId],
) -> Result<RouteResult, Error> {
    config.validate()?;

    if nodes.is_empty() {
        return Err(Error::InvalidInput("Node path is empty".to_string()));
    }
    if let Some(&missing) = nodes.iter().find(|&&id| !network.contains_node(id)) {
        return Err(Error::UnknownNode(missing));
    }

    let edges = nodes
        .iter()
        .tuple_windows()
        .map(|(&u, &v)| {
            resolve_edge(network, u, v, config.parallel_edge_policy)
                .map(|view| view.id)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("Nodes {u} and {v} are not connected by an edge"))
                })
        })
        .collect::<Result<Vec<EdgeKey>, Error>>()?;

    let cost = edges
        .iter()
        .filter_map(|id| network.edge(*id))
        .map(|view| view.edge.length_or_zero())
        .sum();

    let path = RoutePath {
        nodes: nodes.to_vec(),
        edges,
        cost,
    };
    assemble(network, index, profiles, config, path)
}

/// Analyses many origin-destination pairs in parallel. Each pair is
/// independent and reports its own outcome.
pub fn analyze_routes(
    network: &RoadNetwork,
    index: &HazardIndex,
    profiles: &SpeedProfileSet,
    config: &AnalysisConfig,
    pairs: &[(NodeId, NodeId)],
) -> Vec<Result<Option<RouteResult>, Error>> {
    pairs
        .par_iter()
        .map(|&(origin, destination)| {
            analyze_route(network, index, profiles, config, origin, destination)
        })
        .collect()
}

/// Picks one of the parallel edges from `u` to `v`
pub fn resolve_edge(
    network: &RoadNetwork,
    u: NodeId,
    v: NodeId,
    policy: ParallelEdgePolicy,
) -> Option<EdgeView<'_>> {
    let mut candidates = network.parallel_edges(u, v);
    match policy {
        ParallelEdgePolicy::LowestKey => candidates.next(),
        ParallelEdgePolicy::ShortestLength => candidates.min_by(|a, b| {
            a.edge
                .length_or_zero()
                .total_cmp(&b.edge.length_or_zero())
                .then(a.id.key.cmp(&b.id.key))
        }),
    }
}

fn assemble(
    network: &RoadNetwork,
    index: &HazardIndex,
    profiles: &SpeedProfileSet,
    config: &AnalysisConfig,
    path: RoutePath,
) -> Result<RouteResult, Error> {
    let route_geometry = route_geometry(network, &path);
    let impact = analyze_impact(network, index, profiles, &path);
    let normal_travel_time = travel_times(profiles, impact.route_length_m);

    let status = if impact.flooded_segments.is_empty() {
        RouteStatus::Clear
    } else {
        RouteStatus::Flooded
    };

    let detour = match status {
        RouteStatus::Clear => DetourStatus::NotNeeded,
        RouteStatus::Flooded => {
            let flooded: HashSet<EdgeKey> =
                impact.flooded_segments.iter().map(|s| s.edge).collect();
            let detour_path = match (path.origin(), path.destination()) {
                (Some(origin), Some(destination)) => compute_detour(
                    network,
                    origin,
                    destination,
                    &flooded,
                    config.detour_penalty,
                )?,
                _ => None,
            };
            match detour_path {
                Some(detour_path) => DetourStatus::Found(Box::new(describe_detour(
                    network,
                    index,
                    profiles,
                    detour_path,
                    &normal_travel_time,
                    &impact.total_delay,
                ))),
                None => DetourStatus::Unavailable,
            }
        }
    };

    Ok(RouteResult {
        path,
        route_geometry,
        status,
        flooded_segments: impact.flooded_segments,
        route_length_m: impact.route_length_m,
        total_delay: impact.total_delay,
        normal_travel_time,
        detour,
        issues: impact.issues,
    })
}

fn describe_detour(
    network: &RoadNetwork,
    index: &HazardIndex,
    profiles: &SpeedProfileSet,
    path: RoutePath,
    normal_travel_time: &[ProfileSeconds],
    total_delay: &[ProfileSeconds],
) -> DetourResult {
    let views: Vec<EdgeView<'_>> = path.edges.iter().filter_map(|id| network.edge(*id)).collect();
    let length_m: Meters = views.iter().map(|view| view.edge.length_or_zero()).sum();
    let flooded_edges_on_detour = views
        .iter()
        .filter(|view| index.intersects_any(&network.edge_geometry(view)))
        .count();

    let travel_time = travel_times(profiles, length_m);
    let comparison = travel_time
        .iter()
        .zip(normal_travel_time.iter().zip(total_delay))
        .map(|(detour, (normal, delay))| {
            let flooded_route_time_s = normal.seconds + delay.seconds;
            ProfileComparison {
                profile: detour.profile.clone(),
                flooded_route_time_s,
                detour_time_s: detour.seconds,
                difference_s: detour.seconds - flooded_route_time_s,
            }
        })
        .collect();

    DetourResult {
        geometry: route_geometry(network, &path),
        path,
        length_m,
        travel_time,
        comparison,
        flooded_edges_on_detour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HazardMeta, HazardRecord, RawGeometry, RoadEdge, RoadNetworkBuilder};

    fn hazard_at(id: i64, lon: f64, lat: f64) -> HazardRecord {
        HazardRecord {
            id,
            geometry: RawGeometry::Point { lon, lat },
            meta: HazardMeta::default(),
        }
    }

    /// Direct road 1 -> 2 -> 3 (2 x 1000 m) along y = 0 and a bypass
    /// 1 -> 4 -> 3 (2 x 1500 m) through (0.01, 0.01).
    fn network() -> RoadNetwork {
        let mut b = RoadNetworkBuilder::new();
        b.add_node(1, 0.0, 0.0).unwrap();
        b.add_node(2, 0.01, 0.0).unwrap();
        b.add_node(3, 0.02, 0.0).unwrap();
        b.add_node(4, 0.01, 0.01).unwrap();
        b.add_edge(1, 2, RoadEdge::new(0, 1000.0).with_name("Low Road"))
            .unwrap();
        b.add_edge(2, 3, RoadEdge::new(0, 1000.0)).unwrap();
        b.add_edge(2, 3, RoadEdge::new(1, 900.0)).unwrap();
        b.add_edge(1, 4, RoadEdge::new(0, 1500.0)).unwrap();
        b.add_edge(4, 3, RoadEdge::new(0, 1500.0)).unwrap();
        b.build()
    }

    fn run(hazards: &[HazardRecord]) -> RouteResult {
        let network = network();
        let index = HazardIndex::build(hazards, 0.0009).unwrap().index;
        analyze_route(
            &network,
            &index,
            &SpeedProfileSet::car(),
            &AnalysisConfig::default(),
            1,
            3,
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn clear_route_needs_no_detour() {
        let result = run(&[]);
        assert_eq!(result.status, RouteStatus::Clear);
        assert!(result.flooded_segments.is_empty());
        assert!(result.total_delay.iter().all(|d| d.seconds == 0.0));
        assert_eq!(result.detour, DetourStatus::NotNeeded);
        assert!(!result.has_detour());
        assert_eq!(result.path.nodes, vec![1, 2, 3]);
        assert_eq!(result.route_length_m, 1900.0);
    }

    #[test]
    fn flooded_route_gets_dry_detour() {
        let result = run(&[hazard_at(7, 0.005, 0.0)]);
        assert_eq!(result.status, RouteStatus::Flooded);
        assert_eq!(result.flooded_segments.len(), 1);
        assert_eq!(result.flooded_segments[0].edge, EdgeKey::new(1, 2, 0));

        let detour = result.detour_result().unwrap();
        assert_eq!(detour.path.nodes, vec![1, 4, 3]);
        assert_eq!(detour.length_m, 3000.0);
        assert_eq!(detour.flooded_edges_on_detour, 0);

        let baseline = detour
            .comparison
            .iter()
            .find(|c| c.profile == "90kph")
            .unwrap();
        assert!((baseline.flooded_route_time_s - 76.0).abs() < 1e-9);
        assert!((baseline.detour_time_s - 120.0).abs() < 1e-9);
        assert!((baseline.difference_s - 44.0).abs() < 1e-9);
    }

    #[test]
    fn flooded_time_is_normal_time_plus_delay() {
        let result = run(&[hazard_at(7, 0.005, 0.0)]);
        let detour = result.detour_result().unwrap();
        for cmp in &detour.comparison {
            let normal = result
                .normal_travel_time
                .iter()
                .find(|t| t.profile == cmp.profile)
                .unwrap()
                .seconds;
            let delay = result.total_delay_for(&cmp.profile).unwrap();
            assert!((cmp.flooded_route_time_s - (normal + delay)).abs() < 1e-9);
        }
    }

    #[test]
    fn only_route_stays_traversable_when_flooded() {
        let mut b = RoadNetworkBuilder::new();
        b.add_node(1, 0.0, 0.0).unwrap();
        b.add_node(2, 0.01, 0.0).unwrap();
        b.add_edge(1, 2, RoadEdge::new(0, 1000.0)).unwrap();
        let network = b.build();
        let index = HazardIndex::build(&[hazard_at(1, 0.005, 0.0)], 0.0009)
            .unwrap()
            .index;

        let result = analyze_route(
            &network,
            &index,
            &SpeedProfileSet::car(),
            &AnalysisConfig::default(),
            1,
            2,
        )
        .unwrap()
        .unwrap();
        let detour = result.detour_result().unwrap();
        assert_eq!(detour.path.nodes, vec![1, 2]);
        assert_eq!(detour.flooded_edges_on_detour, 1);
    }

    #[test]
    fn unreachable_destination_is_none() {
        let network = network();
        let index = HazardIndex::build(&[], 0.0009).unwrap().index;
        let result = analyze_route(
            &network,
            &index,
            &SpeedProfileSet::car(),
            &AnalysisConfig::default(),
            3,
            1,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unknown_node_is_an_error() {
        let network = network();
        let index = HazardIndex::build(&[], 0.0009).unwrap().index;
        let err = analyze_route(
            &network,
            &index,
            &SpeedProfileSet::car(),
            &AnalysisConfig::default(),
            1,
            99,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(99)));
    }

    #[test]
    fn node_path_resolves_parallel_edges_by_policy() {
        let network = network();
        let index = HazardIndex::build(&[], 0.0009).unwrap().index;
        let profiles = SpeedProfileSet::car();

        let shortest = analyze_node_path(
            &network,
            &index,
            &profiles,
            &AnalysisConfig::default(),
            &[1, 2, 3],
        )
        .unwrap();
        assert_eq!(shortest.path.edges[1], EdgeKey::new(2, 3, 1));

        let config = AnalysisConfig {
            parallel_edge_policy: ParallelEdgePolicy::LowestKey,
            ..AnalysisConfig::default()
        };
        let lowest = analyze_node_path(&network, &index, &profiles, &config, &[1, 2, 3]).unwrap();
        assert_eq!(lowest.path.edges[1], EdgeKey::new(2, 3, 0));
        assert_eq!(lowest.route_length_m, 2000.0);
    }

    #[test]
    fn node_path_rejects_gaps_and_empty_input() {
        let network = network();
        let index = HazardIndex::build(&[], 0.0009).unwrap().index;
        let profiles = SpeedProfileSet::car();
        let config = AnalysisConfig::default();

        let err = analyze_node_path(&network, &index, &profiles, &config, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = analyze_node_path(&network, &index, &profiles, &config, &[1, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = analyze_node_path(&network, &index, &profiles, &config, &[1, 42]).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(42)));
    }

    #[test]
    fn invalid_penalty_is_rejected() {
        let config = AnalysisConfig {
            detour_penalty: 0.5,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn bulk_analysis_keeps_pair_order() {
        let network = network();
        let index = HazardIndex::build(&[hazard_at(7, 0.005, 0.0)], 0.0009)
            .unwrap()
            .index;
        let results = analyze_routes(
            &network,
            &index,
            &SpeedProfileSet::car(),
            &AnalysisConfig::default(),
            &[(1, 3), (3, 1), (1, 99)],
        );
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().as_ref().unwrap().has_detour());
        assert!(results[1].as_ref().unwrap().is_none());
        assert!(results[2].is_err());
    }
}
