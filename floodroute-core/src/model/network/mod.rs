//! Road network model

pub mod builder;
pub mod components;
pub mod graph;

pub use builder::RoadNetworkBuilder;
pub use components::{EdgeKey, RoadEdge, RoadName, RoadNode};
pub use graph::{EdgeView, IndexedEdge, IndexedPoint, RoadNetwork};
