//! Critical segment ranking by precomputed centrality

use std::{fmt, str::FromStr};

use geo::LineString;
use geojson::{FeatureCollection, Geometry, Value as GeoJsonValue};
use log::debug;
use serde::Serialize;
use serde_json::json;

use crate::{
    Error, MAX_RANK_LIMIT, Meters,
    model::{BoundingBox, CentralityMap, CentralityMetric, CentralityStore, EdgeKey, EdgeView, RoadNetwork},
    routing::json_feature,
};

/// Label used for segments without a road name
pub const UNNAMED_SEGMENT: &str = "(unnamed)";

/// How a road-name query is compared against edge names. Both modes are
/// case-insensitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    #[default]
    Contains,
}

impl FromStr for MatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "contains" => Ok(MatchMode::Contains),
            other => Err(Error::InvalidInput(format!(
                "match must be 'exact' or 'contains', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => f.write_str("exact"),
            MatchMode::Contains => f.write_str("contains"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    pub query: String,
    pub mode: MatchMode,
}

impl NameFilter {
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank query
    pub fn new(query: impl Into<String>, mode: MatchMode) -> Result<Self, Error> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("road_name must not be empty".to_string()));
        }
        Ok(Self { query, mode })
    }

    /// Unnamed edges never match
    pub fn matches(&self, view: &EdgeView<'_>) -> bool {
        let Some(name) = &view.edge.name else {
            return false;
        };
        match self.mode {
            MatchMode::Exact => name.matches_exact(&self.query),
            MatchMode::Contains => name.contains(&self.query),
        }
    }
}

/// Parameters of one ranking request
#[derive(Debug, Clone, PartialEq)]
pub struct RankQuery {
    pub metric: CentralityMetric,
    /// Number of segments to return; 0 is rejected and values above
    /// [`MAX_RANK_LIMIT`] are clamped
    pub limit: usize,
    pub bbox: Option<BoundingBox>,
    pub name: Option<NameFilter>,
}

impl RankQuery {
    pub fn new(metric: CentralityMetric, limit: usize) -> Self {
        Self {
            metric,
            limit,
            bbox: None,
            name: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_name(mut self, name: NameFilter) -> Self {
        self.name = Some(name);
        self
    }

    /// Validated and clamped limit
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero limit
    pub fn effective_limit(&self) -> Result<usize, Error> {
        validate_limit(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSegment {
    pub rank: usize,
    pub edge: EdgeKey,
    pub road_name: String,
    pub road_type: Option<String>,
    pub length_m: Option<Meters>,
    pub score: f64,
    /// Score divided by the highest score in the same result set
    pub norm_score: f64,
    #[serde(skip)]
    pub geometry: LineString<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSegments {
    pub metric: CentralityMetric,
    pub segments: Vec<RankedSegment>,
}

impl RankedSegments {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Ranked segments as a `GeoJSON` `FeatureCollection` of lines
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let features = self
            .segments
            .iter()
            .map(|segment| {
                let geometry = Geometry::new(GeoJsonValue::from(&segment.geometry));
                json_feature(json!({
                    "type": "Feature",
                    "geometry": geometry,
                    "properties": {
                        "rank": segment.rank,
                        "u": segment.edge.u,
                        "v": segment.edge.v,
                        "key": segment.edge.key,
                        "road_name": segment.road_name,
                        "road_type": segment.road_type,
                        "length_m": segment.length_m,
                        "metric": self.metric,
                        "score": segment.score,
                        "norm_score": segment.norm_score,
                    }
                }))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }
}

/// Ranks network edges by the centrality score of `query.metric`.
///
/// Edges are clipped by the bounding box (partial overlap counts), then
/// filtered by road name, scored (edges absent from the map score 0), sorted
/// by descending score with `(u, v, key)` ascending as tie-break, truncated
/// and normalised against the best returned score.
///
/// # Errors
///
/// Returns `InvalidInput` for a zero limit and `DataUnavailable` if no
/// centrality map is loaded for the metric
pub fn rank_critical_segments(
    network: &RoadNetwork,
    store: &CentralityStore,
    query: &RankQuery,
) -> Result<RankedSegments, Error> {
    let limit = query.effective_limit()?;
    let scores = store.get(query.metric)?;

    let segments = match &query.bbox {
        Some(bbox) if bbox.is_degenerate() => Vec::new(),
        Some(bbox) => rank_edges(
            network,
            scores,
            network
                .edges_in_envelope(&bbox.to_rect())
                .filter(|view| bbox.intersects(&network.edge_geometry(view)))
                .filter(|view| name_matches(query.name.as_ref(), view)),
            limit,
        ),
        None => rank_edges(
            network,
            scores,
            network
                .edges()
                .filter(|view| name_matches(query.name.as_ref(), view)),
            limit,
        ),
    };

    debug!(
        "Ranked {} segments by {} (limit {limit})",
        segments.len(),
        query.metric
    );

    Ok(RankedSegments {
        metric: query.metric,
        segments,
    })
}

pub(crate) fn validate_limit(limit: usize) -> Result<usize, Error> {
    if limit == 0 {
        return Err(Error::InvalidInput(
            "limit must be a positive integer".to_string(),
        ));
    }
    Ok(limit.min(MAX_RANK_LIMIT))
}

fn name_matches(filter: Option<&NameFilter>, view: &EdgeView<'_>) -> bool {
    filter.is_none_or(|filter| filter.matches(view))
}

/// Scores, sorts, truncates and normalises a set of candidate edges
pub(crate) fn rank_edges<'a>(
    network: &'a RoadNetwork,
    scores: &CentralityMap,
    candidates: impl Iterator<Item = EdgeView<'a>>,
    limit: usize,
) -> Vec<RankedSegment> {
    let mut scored: Vec<(f64, EdgeView<'a>)> = candidates
        .map(|view| (scores.score(&view.id), view))
        .collect();

    scored.sort_by(|(a_score, a), (b_score, b)| b_score.total_cmp(a_score).then(a.id.cmp(&b.id)));
    scored.truncate(limit);

    let max_score = scored.first().map_or(0.0, |(score, _)| *score);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, view))| RankedSegment {
            rank: i + 1,
            edge: view.id,
            road_name: view
                .edge
                .road_name()
                .unwrap_or_else(|| UNNAMED_SEGMENT.to_string()),
            road_type: view.edge.highway.clone(),
            length_m: view.edge.length,
            score,
            norm_score: if max_score > 0.0 { score / max_score } else { 0.0 },
            geometry: network.edge_geometry(&view).into_owned(),
        })
        .collect()
}
