use geo::{BoundingRect, Distance, Euclidean, LineString, Point};
use hashbrown::HashMap;
use log::{info, warn};
use rayon::prelude::*;
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::{
    Error,
    model::{HazardGeometry, HazardRecord, HazardZone, SkipReason},
};

/// Hazard record rejected while building the index
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub id: i64,
    pub reason: SkipReason,
}

/// Outcome of an index build: the index over every usable record plus the
/// records that were skipped and why
#[derive(Debug, Clone)]
pub struct HazardIndexBuild {
    pub index: HazardIndex,
    pub skipped: Vec<SkippedRecord>,
}

impl HazardIndexBuild {
    /// True when at least one record had to be skipped
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// R-tree entry: a hazard geometry and the envelope of its buffer
#[derive(Debug, Clone)]
struct BufferedHazard {
    zone: usize,
    geometry: HazardGeometry,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BufferedHazard {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for BufferedHazard {
    /// Squared planar distance to the unbuffered geometry
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let point = Point::new(point[0], point[1]);
        let distance = match &self.geometry {
            HazardGeometry::Point(hazard) => Euclidean.distance(hazard, &point),
            HazardGeometry::Polygon(polygon) => Euclidean.distance(&point, polygon),
        };
        distance * distance
    }
}

/// Immutable spatial index over hazard zones expanded by a fixed buffer
/// radius (in coordinate units).
///
/// A geometry intersects a hazard buffer when its distance to the hazard
/// geometry is at most the radius, which is exactly the intersection test
/// against the round-joined buffer polygon.
#[derive(Debug, Clone)]
pub struct HazardIndex {
    zones: Vec<HazardZone>,
    by_id: HashMap<i64, usize>,
    tree: RTree<BufferedHazard>,
    radius: f64,
}

impl HazardIndex {
    /// Parses hazard records and indexes their buffers. Malformed records
    /// are skipped with a diagnostic and never abort the build.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the radius is negative or not finite
    pub fn build(records: &[HazardRecord], radius: f64) -> Result<HazardIndexBuild, Error> {
        let parsed: Vec<Result<HazardZone, SkippedRecord>> = records
            .par_iter()
            .map(|record| {
                HazardGeometry::parse(&record.geometry)
                    .map(|geometry| HazardZone {
                        id: record.id,
                        geometry,
                        meta: record.meta.clone(),
                    })
                    .map_err(|reason| SkippedRecord {
                        id: record.id,
                        reason,
                    })
            })
            .collect();

        let mut zones = Vec::with_capacity(parsed.len());
        let mut skipped = Vec::new();
        for outcome in parsed {
            match outcome {
                Ok(zone) => zones.push(zone),
                Err(skip) => {
                    warn!("Skipping hazard record {}: {}", skip.id, skip.reason);
                    skipped.push(skip);
                }
            }
        }

        let (index, duplicates) = Self::index_zones(zones, radius)?;
        skipped.extend(duplicates);

        info!(
            "Indexed {} hazard zones with buffer {} ({} records skipped)",
            index.len(),
            radius,
            skipped.len()
        );

        Ok(HazardIndexBuild { index, skipped })
    }

    fn index_zones(
        zones: Vec<HazardZone>,
        radius: f64,
    ) -> Result<(Self, Vec<SkippedRecord>), Error> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Hazard buffer radius must be a non-negative number, got {radius}"
            )));
        }

        let mut kept = Vec::with_capacity(zones.len());
        let mut by_id = HashMap::with_capacity(zones.len());
        let mut skipped = Vec::new();
        for zone in zones {
            if by_id.contains_key(&zone.id) {
                warn!("Skipping hazard record {}: {}", zone.id, SkipReason::DuplicateId);
                skipped.push(SkippedRecord {
                    id: zone.id,
                    reason: SkipReason::DuplicateId,
                });
                continue;
            }
            by_id.insert(zone.id, kept.len());
            kept.push(zone);
        }

        let entries = kept
            .iter()
            .enumerate()
            .map(|(idx, zone)| BufferedHazard {
                zone: idx,
                geometry: zone.geometry.clone(),
                envelope: buffered_envelope(&zone.geometry, radius),
            })
            .collect();

        Ok((
            Self {
                zones: kept,
                by_id,
                tree: RTree::bulk_load(entries),
                radius,
            },
            skipped,
        ))
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones(&self) -> &[HazardZone] {
        &self.zones
    }

    pub fn zone(&self, id: i64) -> Option<&HazardZone> {
        self.by_id.get(&id).map(|&idx| &self.zones[idx])
    }

    /// Does `line` intersect any hazard buffer?
    pub fn intersects_any(&self, line: &LineString<f64>) -> bool {
        self.candidates(line)
            .into_iter()
            .any(|entry| self.hits(entry, line))
    }

    /// Hazards whose buffers `line` intersects, ordered by id
    pub fn intersecting(&self, line: &LineString<f64>) -> Vec<&HazardZone> {
        let mut zones: Vec<&HazardZone> = self
            .candidates(line)
            .into_iter()
            .filter(|entry| self.hits(entry, line))
            .map(|entry| &self.zones[entry.zone])
            .collect();
        zones.sort_by_key(|zone| zone.id);
        zones
    }

    /// Hazard closest to `point`, measured to the unbuffered geometry
    pub fn nearest(&self, point: &Point<f64>) -> Option<&HazardZone> {
        self.tree
            .nearest_neighbor(&[point.x(), point.y()])
            .map(|entry| &self.zones[entry.zone])
    }

    fn candidates(&self, line: &LineString<f64>) -> Vec<&BufferedHazard> {
        let Some(rect) = line.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.tree.locate_in_envelope_intersecting(&envelope).collect()
    }

    fn hits(&self, entry: &BufferedHazard, line: &LineString<f64>) -> bool {
        entry.geometry.distance_to_line(line) <= self.radius
    }
}

fn buffered_envelope(geometry: &HazardGeometry, radius: f64) -> AABB<[f64; 2]> {
    let rect = geometry.buffered_rect(radius);
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}
