//! Data model for flood-aware route analysis
//!
//! Contains the road network, hazard zones, speed profiles and the
//! precomputed reference data (centrality, transit stops) the engine reads.

pub mod bbox;
pub mod centrality;
pub mod hazard;
pub mod network;
pub mod speed;
pub mod stops;

pub use bbox::BoundingBox;
pub use centrality::{CentralityMap, CentralityMetric, CentralityStore};
pub use hazard::{HazardGeometry, HazardMeta, HazardRecord, HazardZone, RawGeometry, SkipReason};
pub use network::{EdgeKey, EdgeView, RoadEdge, RoadName, RoadNetwork, RoadNetworkBuilder, RoadNode};
pub use speed::{SpeedProfile, SpeedProfileSet};
pub use stops::TransitStop;
