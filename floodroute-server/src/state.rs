use std::{sync::Arc, time::Duration};

use floodroute_core::{
    AnalysisConfig, CentralityMetric, CentralityStore, HazardIndex, RoadNetwork,
    loading::{load_centrality_store, read_hazard_csv, read_stops_csv},
    model::TransitStop,
};
use tracing::{info, warn};

use crate::{
    arrivals::{ArrivalSource, LtaArrivalClient},
    config::ServerConfig,
    error::StartupError,
    loader::read_network_json,
};

/// Arrival service handle and its fan-out limits
#[derive(Clone)]
pub struct ArrivalSettings {
    pub source: Arc<dyn ArrivalSource>,
    pub max_concurrency: usize,
    pub call_timeout: Duration,
}

/// Everything the handlers read. Built once at startup and never mutated.
pub struct AppState {
    pub network: RoadNetwork,
    pub hazards: HazardIndex,
    pub stops: Vec<TransitStop>,
    pub centrality: CentralityStore,
    pub analysis: AnalysisConfig,
    pub arrivals: Option<ArrivalSettings>,
}

impl AppState {
    /// Loads every input named by the configuration. Blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the network or hazards cannot be loaded; missing
    /// stops or centrality artifacts only disable the features using them
    pub fn load(config: &ServerConfig) -> Result<Self, StartupError> {
        let network = read_network_json(&config.network_path).map_err(|source| {
            StartupError::Load {
                what: "road network",
                source,
            }
        })?;

        let records = read_hazard_csv(&config.hazards_path).map_err(|source| StartupError::Load {
            what: "hazards",
            source,
        })?;
        let build = HazardIndex::build(&records, config.analysis.hazard_buffer)
            .map_err(|source| StartupError::Load {
                what: "hazard index",
                source,
            })?;
        if build.is_partial() {
            warn!(
                skipped = build.skipped.len(),
                indexed = build.index.len(),
                "some hazard records were skipped"
            );
        }

        let stops = match &config.stops_path {
            Some(path) => match read_stops_csv(path) {
                Ok(stops) => stops,
                Err(e) => {
                    warn!(error = %e, "stops unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let artifacts = [
            (CentralityMetric::Betweenness, config.centrality.betweenness.as_deref()),
            (CentralityMetric::Closeness, config.centrality.closeness.as_deref()),
        ];
        let centrality = load_centrality_store(
            artifacts
                .into_iter()
                .filter_map(|(metric, path)| path.map(|path| (metric, path))),
        )
        .map_err(|source| StartupError::Load {
            what: "centrality",
            source,
        })?;

        let arrivals = config.arrivals.as_ref().and_then(|section| {
            LtaArrivalClient::from_config(section).map(|client| ArrivalSettings {
                source: Arc::new(client),
                max_concurrency: section.max_concurrency,
                call_timeout: Duration::from_secs(section.timeout_secs),
            })
        });

        let analysis = AnalysisConfig {
            detour_penalty: config.analysis.detour_penalty,
            parallel_edge_policy: config.analysis.parallel_edge_policy,
        };

        info!(
            hazards = build.index.len(),
            stops = stops.len(),
            centrality = ?centrality.available(),
            arrivals = arrivals.is_some(),
            "application state ready"
        );

        Ok(Self {
            network,
            hazards: build.index,
            stops,
            centrality,
            analysis,
            arrivals,
        })
    }
}
