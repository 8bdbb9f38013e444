//! Analyses that work directly on the network and reference data rather
//! than on a single route

pub mod critical;
pub mod hazard_report;
