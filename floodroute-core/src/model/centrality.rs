//! Precomputed edge centrality scores

use std::{fmt, str::FromStr};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::network::EdgeKey;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentralityMetric {
    Betweenness,
    Closeness,
}

impl CentralityMetric {
    pub const ALL: [CentralityMetric; 2] = [CentralityMetric::Betweenness, CentralityMetric::Closeness];

    pub fn as_str(self) -> &'static str {
        match self {
            CentralityMetric::Betweenness => "betweenness",
            CentralityMetric::Closeness => "closeness",
        }
    }
}

impl fmt::Display for CentralityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CentralityMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "betweenness" => Ok(CentralityMetric::Betweenness),
            "closeness" => Ok(CentralityMetric::Closeness),
            other => Err(Error::InvalidInput(format!(
                "metric must be 'betweenness' or 'closeness', got '{other}'"
            ))),
        }
    }
}

/// Read-only score lookup keyed by edge identity. Edges absent from the
/// map score 0.0.
#[derive(Debug, Clone, Default)]
pub struct CentralityMap {
    scores: HashMap<EdgeKey, f64>,
}

impl CentralityMap {
    pub fn score(&self, edge: &EdgeKey) -> f64 {
        self.scores.get(edge).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(EdgeKey, f64)> for CentralityMap {
    fn from_iter<T: IntoIterator<Item = (EdgeKey, f64)>>(iter: T) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

/// Centrality maps loaded at startup, one per available metric
#[derive(Debug, Clone, Default)]
pub struct CentralityStore {
    maps: HashMap<CentralityMetric, CentralityMap>,
}

impl CentralityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: CentralityMetric, map: CentralityMap) {
        self.maps.insert(metric, map);
    }

    /// # Errors
    ///
    /// Returns `DataUnavailable` if no map was loaded for `metric`. Another
    /// metric is never substituted.
    pub fn get(&self, metric: CentralityMetric) -> Result<&CentralityMap, Error> {
        self.maps.get(&metric).ok_or(Error::DataUnavailable(metric))
    }

    pub fn available(&self) -> Vec<CentralityMetric> {
        CentralityMetric::ALL
            .into_iter()
            .filter(|metric| self.maps.contains_key(metric))
            .collect()
    }
}
