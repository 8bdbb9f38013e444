#![allow(dead_code)]

use floodroute_core::prelude::*;

/// Square grid of `size` x `size` nodes spaced `step` degrees apart, with
/// two-way roads of `length` metres between horizontal and vertical
/// neighbours. Node ids are `row * size + col`.
pub fn grid(size: i64, step: f64, length: f64) -> RoadNetwork {
    let mut builder = RoadNetworkBuilder::new();
    for row in 0..size {
        for col in 0..size {
            builder
                .add_node(row * size + col, col as f64 * step, row as f64 * step)
                .unwrap();
        }
    }
    for row in 0..size {
        for col in 0..size {
            let id = row * size + col;
            if col + 1 < size {
                builder
                    .add_road(id, id + 1, RoadEdge::new(0, length).with_name(format!("Row {row}")))
                    .unwrap();
            }
            if row + 1 < size {
                builder
                    .add_road(id, id + size, RoadEdge::new(0, length).with_name(format!("Col {col}")))
                    .unwrap();
            }
        }
    }
    builder.build()
}

pub fn point_hazard(id: i64, lon: f64, lat: f64) -> HazardRecord {
    HazardRecord {
        id,
        geometry: RawGeometry::Point { lon, lat },
        meta: HazardMeta::default(),
    }
}

pub fn index(records: &[HazardRecord]) -> HazardIndex {
    HazardIndex::build(records, DEFAULT_HAZARD_BUFFER).unwrap().index
}
