//! Bus services serving a set of stops, looked up against an external
//! arrival service with bounded concurrency.

use std::{collections::BTreeSet, future::Future, pin::Pin, sync::Arc, time::Duration};

use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};
use tracing::{debug, warn};

use crate::config::ArrivalsSection;

#[derive(Debug, thiserror::Error)]
pub enum ArrivalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {0}")]
    Status(reqwest::StatusCode),
}

pub type ArrivalFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, ArrivalError>> + Send + 'a>>;

/// Source of the service numbers currently calling at a stop
pub trait ArrivalSource: Send + Sync {
    fn services<'a>(&'a self, stop_code: &'a str) -> ArrivalFuture<'a>;
}

/// Client for an LTA DataMall style `BusArrival` endpoint
#[derive(Debug, Clone)]
pub struct LtaArrivalClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArrivalResponse {
    #[serde(default)]
    services: Vec<ArrivalService>,
}

#[derive(Debug, Deserialize)]
struct ArrivalService {
    #[serde(rename = "ServiceNo", default)]
    service_no: Option<String>,
}

impl LtaArrivalClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, call_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(call_timeout)
            .timeout(call_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Client from configuration, or `None` when the API key variable is
    /// not set
    pub fn from_config(section: &ArrivalsSection) -> Option<Self> {
        let Ok(api_key) = std::env::var(&section.api_key_env) else {
            warn!(
                env = %section.api_key_env,
                "arrival service API key not set; affected-service lookups disabled"
            );
            return None;
        };
        match Self::new(&section.base_url, api_key, Duration::from_secs(section.timeout_secs)) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "cannot build arrival service client");
                None
            }
        }
    }
}

impl ArrivalSource for LtaArrivalClient {
    fn services<'a>(&'a self, stop_code: &'a str) -> ArrivalFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.base_url)
                .query(&[("BusStopCode", stop_code)])
                .header("AccountKey", &self.api_key)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(ArrivalError::Status(response.status()));
            }
            let body: ArrivalResponse = response.json().await?;
            Ok(body
                .services
                .into_iter()
                .filter_map(|service| service.service_no)
                .filter(|number| !number.is_empty())
                .collect())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopFailure {
    pub stop_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AffectedServices {
    /// Sorted, without duplicates
    pub services: Vec<String>,
    pub failed_stops: Vec<StopFailure>,
}

/// Queries `source` for every stop with at most `max_concurrency` calls in
/// flight, each bounded by `call_timeout`. A failing stop is logged and
/// listed, the others still contribute.
pub async fn fetch_affected_services(
    source: Arc<dyn ArrivalSource>,
    stop_codes: Vec<String>,
    max_concurrency: usize,
    call_timeout: Duration,
) -> AffectedServices {
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for code in stop_codes {
        let source = Arc::clone(&source);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => match timeout(call_timeout, source.services(&code)).await {
                    Ok(Ok(services)) => Ok(services),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {call_timeout:?}")),
                },
                Err(e) => Err(e.to_string()),
            };
            (code, outcome)
        });
    }

    let mut services = BTreeSet::new();
    let mut failed_stops = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((code, Ok(found))) => {
                debug!(stop = %code, count = found.len(), "arrival lookup done");
                services.extend(found);
            }
            Ok((code, Err(reason))) => {
                warn!(stop = %code, %reason, "arrival lookup failed");
                failed_stops.push(StopFailure {
                    stop_code: code,
                    reason,
                });
            }
            Err(e) => warn!(error = %e, "arrival lookup task panicked"),
        }
    }
    failed_stops.sort_by(|a, b| a.stop_code.cmp(&b.stop_code));

    AffectedServices {
        services: services.into_iter().collect(),
        failed_stops,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Serves canned answers; stop "slow" never answers in time and stop
    /// "down" fails. Tracks the highest number of calls in flight.
    struct FakeSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ArrivalSource for FakeSource {
        fn services<'a>(&'a self, stop_code: &'a str) -> ArrivalFuture<'a> {
            Box::pin(async move {
                let _guard = InFlight::enter(&self.in_flight, &self.peak);
                let delay = if stop_code == "slow" { 500 } else { 10 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                match stop_code {
                    "down" => Err(ArrivalError::Status(reqwest::StatusCode::BAD_GATEWAY)),
                    "a" => Ok(vec!["12".into(), "7".into()]),
                    _ => Ok(vec!["7".into(), "190".into()]),
                }
            })
        }
    }

    /// Counts a call as in flight until dropped, including when a timeout
    /// cancels it
    struct InFlight<'a>(&'a AtomicUsize);

    impl<'a> InFlight<'a> {
        fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
            let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            Self(counter)
        }
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let source = Arc::new(FakeSource {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let codes = ["a", "b", "down", "slow", "c", "d"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let result = fetch_affected_services(
            source.clone(),
            codes,
            2,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result.services, vec!["12", "190", "7"]);
        let failed: Vec<&str> = result.failed_stops.iter().map(|f| f.stop_code.as_str()).collect();
        assert_eq!(failed, vec!["down", "slow"]);
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }
}
