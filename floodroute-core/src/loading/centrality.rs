use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use super::open_csv;
use crate::{
    Error, NodeId,
    model::{CentralityMap, CentralityMetric, CentralityStore, EdgeKey},
};

#[derive(Debug, Deserialize)]
struct ScoreRow {
    u: NodeId,
    v: NodeId,
    key: u32,
    score: f64,
}

/// Reads a precomputed edge centrality artifact: a CSV file with columns
/// `u`, `v`, `key` and `score`. Rows with a non-finite score are dropped.
///
/// # Errors
///
/// Returns `ArtifactNotFound` if the file does not exist and a CSV error for
/// a malformed row
pub fn read_centrality_csv(path: &Path) -> Result<CentralityMap, Error> {
    let mut reader = open_csv(path)?;
    let mut scores = Vec::new();
    for row in reader.deserialize::<ScoreRow>() {
        let row = row?;
        if !row.score.is_finite() {
            warn!(
                "Dropping non-finite centrality score for edge ({}, {}, {})",
                row.u, row.v, row.key
            );
            continue;
        }
        scores.push((EdgeKey::new(row.u, row.v, row.key), row.score));
    }

    let map: CentralityMap = scores.into_iter().collect();
    info!("Loaded {} centrality scores from {}", map.len(), path.display());
    Ok(map)
}

/// Loads one artifact per metric. A missing artifact leaves its metric
/// unavailable instead of failing the load.
///
/// # Errors
///
/// Returns the first error other than a missing file
pub fn load_centrality_store<'a>(
    artifacts: impl IntoIterator<Item = (CentralityMetric, &'a Path)>,
) -> Result<CentralityStore, Error> {
    let mut store = CentralityStore::new();
    for (metric, path) in artifacts {
        match read_centrality_csv(path) {
            Ok(map) => store.insert(metric, map),
            Err(Error::ArtifactNotFound(missing)) => {
                warn!(
                    "No {metric} centrality artifact at {}; the metric will be unavailable",
                    missing.display()
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn artifact(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_scores_by_edge_identity() {
        let file = artifact("u,v,key,score\n1,2,0,0.5\n1,2,1,0.25\n2,3,0,NaN\n");
        let map = read_centrality_csv(file.path()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.score(&EdgeKey::new(1, 2, 1)), 0.25);
        assert_eq!(map.score(&EdgeKey::new(2, 3, 0)), 0.0);
    }

    #[test]
    fn malformed_artifact_is_an_error() {
        let file = artifact("u,v,key,score\n1,2,zero,0.5\n");
        assert!(matches!(read_centrality_csv(file.path()), Err(Error::CsvError(_))));
    }

    #[test]
    fn missing_artifact_leaves_metric_unavailable() {
        let file = artifact("u,v,key,score\n1,2,0,0.5\n");
        let store = load_centrality_store([
            (CentralityMetric::Betweenness, file.path()),
            (CentralityMetric::Closeness, Path::new("/nonexistent/closeness.csv")),
        ])
        .unwrap();

        assert_eq!(store.available(), vec![CentralityMetric::Betweenness]);
        assert!(matches!(
            store.get(CentralityMetric::Closeness),
            Err(Error::DataUnavailable(CentralityMetric::Closeness))
        ));
    }
}
