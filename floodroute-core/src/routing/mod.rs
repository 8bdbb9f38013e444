mod analysis;
mod detour;
pub mod dijkstra;
mod geometry;
mod impact;
mod to_geojson;

pub use analysis::{
    AnalysisConfig, DetourResult, DetourStatus, ParallelEdgePolicy, ProfileComparison,
    RouteResult, RouteStatus, analyze_node_path, analyze_route, analyze_routes, resolve_edge,
};
pub use detour::{MIN_FLOODED_LENGTH_M, compute_detour};
pub use dijkstra::{RoutePath, length_weight, shortest_path};
pub use geometry::{LatLon, lat_lon_to_line, route_geometry};
pub use impact::{DataIssue, FloodedSegment, ProfileSeconds, ProfileTiming};

pub(crate) use impact::{UNNAMED_ROAD, profile_timings};
pub(crate) use to_geojson::json_feature;
