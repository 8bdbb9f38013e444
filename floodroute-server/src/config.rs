use std::{fs, net::SocketAddr, path::{Path, PathBuf}};

use floodroute_core::{
    DEFAULT_DETOUR_PENALTY, DEFAULT_HAZARD_BUFFER, routing::ParallelEdgePolicy,
};
use serde::Deserialize;

use crate::error::StartupError;

/// Server configuration, read from a TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Road network snapshot (JSON)
    pub network_path: PathBuf,
    /// Hazard records (CSV)
    pub hazards_path: PathBuf,
    /// GTFS `stops.txt`; stop lookups are disabled without it
    #[serde(default)]
    pub stops_path: Option<PathBuf>,
    #[serde(default)]
    pub centrality: CentralityPaths,
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub arrivals: Option<ArrivalsSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CentralityPaths {
    pub betweenness: Option<PathBuf>,
    pub closeness: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    /// Hazard buffer radius in coordinate units
    pub hazard_buffer: f64,
    pub detour_penalty: f64,
    pub parallel_edge_policy: ParallelEdgePolicy,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            hazard_buffer: DEFAULT_HAZARD_BUFFER,
            detour_penalty: DEFAULT_DETOUR_PENALTY,
            parallel_edge_policy: ParallelEdgePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsSection {
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_concurrent_requests: 64,
        }
    }
}

/// External bus arrival service used to list services at affected stops
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrivalsSection {
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_arrival_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_arrival_timeout")]
    pub timeout_secs: u64,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_api_key_env() -> String {
    "LTA_API_KEY".to_string()
}

fn default_arrival_concurrency() -> usize {
    10
}

fn default_arrival_timeout() -> u64 {
    5
}

impl ServerConfig {
    /// Reads and validates a TOML configuration file. Relative data paths
    /// are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a value is
    /// out of range
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let text = fs::read_to_string(path)
            .map_err(|e| StartupError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration
    pub fn from_toml(text: &str) -> Result<Self, StartupError> {
        let config: Self = toml::from_str(text).map_err(|e| StartupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), StartupError> {
        let analysis = &self.analysis;
        if !analysis.hazard_buffer.is_finite() || analysis.hazard_buffer < 0.0 {
            return Err(StartupError::Config(format!(
                "analysis.hazard_buffer must be a non-negative number, got {}",
                analysis.hazard_buffer
            )));
        }
        if !analysis.detour_penalty.is_finite() || analysis.detour_penalty < 1.0 {
            return Err(StartupError::Config(format!(
                "analysis.detour_penalty must be >= 1, got {}",
                analysis.detour_penalty
            )));
        }
        if self.limits.request_timeout_secs == 0 || self.limits.max_concurrent_requests == 0 {
            return Err(StartupError::Config(
                "limits must be positive".to_string(),
            ));
        }
        if let Some(arrivals) = &self.arrivals
            && (arrivals.max_concurrency == 0 || arrivals.timeout_secs == 0)
        {
            return Err(StartupError::Config(
                "arrivals.max_concurrency and arrivals.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.network_path);
        resolve(&mut self.hazards_path);
        for path in [
            self.stops_path.as_mut(),
            self.centrality.betweenness.as_mut(),
            self.centrality.closeness.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }
}
