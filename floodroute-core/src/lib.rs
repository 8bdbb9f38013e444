//! Flood-aware route analysis over a road network.
//!
//! The crate answers two questions against an immutable, already-built road
//! network: how a given origin-destination route is affected by a set of
//! hazard zones (and which alternative avoids them), and which road segments
//! are structurally most important according to precomputed centrality
//! scores.

pub mod algo;
pub mod error;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod routing;
pub mod spatial;

pub use error::{Error, ErrorKind};
pub use model::{
    CentralityMap, CentralityMetric, CentralityStore, EdgeKey, HazardZone, RoadNetwork,
    SpeedProfile, SpeedProfileSet,
};
pub use routing::{AnalysisConfig, ParallelEdgePolicy, RouteResult, analyze_route};
pub use spatial::HazardIndex;

/// Graph-provided node identifier (OSM node id for OSM-derived networks)
pub type NodeId = i64;
/// Length in meters
pub type Meters = f64;
/// Duration in seconds
pub type Seconds = f64;

/// Hazard buffer radius in native (WGS84 degree) units, roughly 100 m at the equator
pub const DEFAULT_HAZARD_BUFFER: f64 = 0.0009;
/// Weight multiplier applied to flooded edges during detour search
pub const DEFAULT_DETOUR_PENALTY: f64 = 1000.0;
/// Upper bound on the number of ranked segments returned by one query
pub const MAX_RANK_LIMIT: usize = 1000;
