//! Spatial index over buffered hazard zones

mod hazard_index;

pub use crate::model::hazard::SkipReason;
pub use hazard_index::{HazardIndex, HazardIndexBuild, SkippedRecord};
