pub use crate::{
    DEFAULT_DETOUR_PENALTY, DEFAULT_HAZARD_BUFFER, MAX_RANK_LIMIT, Meters, NodeId, Seconds,
};
pub use crate::{Error, ErrorKind};

// Network, hazards and reference data
pub use crate::model::{
    BoundingBox, CentralityMap, CentralityMetric, CentralityStore, EdgeKey, HazardGeometry,
    HazardMeta, HazardRecord, HazardZone, RawGeometry, RoadEdge, RoadName, RoadNetwork,
    RoadNetworkBuilder, RoadNode, SpeedProfile, SpeedProfileSet, TransitStop,
};
pub use crate::spatial::{HazardIndex, HazardIndexBuild, SkipReason, SkippedRecord};

// Route analysis
pub use crate::routing::{
    AnalysisConfig, DataIssue, DetourResult, DetourStatus, FloodedSegment, ParallelEdgePolicy,
    ProfileComparison, ProfileSeconds, ProfileTiming, RoutePath, RouteResult, RouteStatus,
    analyze_node_path, analyze_route, analyze_routes, compute_detour, route_geometry,
    shortest_path,
};

// Ranking and hazard reports
pub use crate::algo::critical::{
    MatchMode, NameFilter, RankQuery, RankedSegment, RankedSegments, rank_critical_segments,
};
pub use crate::algo::hazard_report::{
    DEFAULT_NEAR_HAZARD_BUFFER_M, HazardEdgeImpact, LocationFrequency, NearbyStop, critical_segments_near_hazard,
    hazard_edge_impacts, location_frequencies, stops_near_hazard, zones_in_date_range,
};
