use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    error_handling::HandleErrorLayer,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::NaiveDate;
use floodroute_core::{
    NodeId, RouteResult, SpeedProfileSet, analyze_route,
    algo::{
        critical::{MatchMode, NameFilter, RankQuery, rank_critical_segments},
        hazard_report::{
            DEFAULT_NEAR_HAZARD_BUFFER_M, DEFAULT_NEAR_HAZARD_LIMIT, HazardEdgeImpact, LocationFrequency, NearbyStop,
            critical_segments_near_hazard, hazard_edge_impact, location_frequencies,
            stops_near_hazard, zones_in_date_range,
        },
    },
    model::{BoundingBox, CentralityMetric, HazardZone},
    routing::{DetourStatus, ProfileSeconds, ProfileTiming},
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use tower::{ServiceBuilder, limit::GlobalConcurrencyLimitLayer, timeout::TimeoutLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    arrivals::{StopFailure, fetch_affected_services},
    config::LimitsSection,
    error::{ApiError, handle_middleware_error},
    state::AppState,
};

type SharedState = Arc<AppState>;

const DEFAULT_RANK_LIMIT: i64 = 50;
const DEFAULT_ROAD_LIMIT: i64 = 100;
const DEFAULT_STOP_RADIUS_M: f64 = 20.0;

/// Builds the HTTP router. The concurrency limit is shared by all endpoints.
pub fn build_router(state: SharedState, limits: &LimitsSection) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_middleware_error))
        .layer(GlobalConcurrencyLimitLayer::new(limits.max_concurrent_requests.max(1)))
        .layer(TimeoutLayer::new(Duration::from_secs(limits.request_timeout_secs)));

    Router::new()
        .route("/health", get(health))
        .route("/routes/car", get(car_route))
        .route("/routes/bus", get(bus_route))
        .route("/critical-segments", get(critical_segments))
        .route("/road-criticality", get(road_criticality))
        .route("/hazards", get(hazards))
        .route("/hazards/locations", get(hazard_locations))
        .route("/hazards/{id}/impact", get(hazard_impact))
        .route("/hazards/{id}/critical-segments", get(hazard_critical_segments))
        .route("/hazards/{id}/affected-services", get(affected_services))
        .layer(middleware)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    nodes: usize,
    edges: usize,
    hazards: usize,
    stops: usize,
    centrality: Vec<CentralityMetric>,
    arrivals: bool,
}

async fn health(State(state): State<SharedState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        nodes: state.network.node_count(),
        edges: state.network.edge_count(),
        hazards: state.hazards.len(),
        stops: state.stops.len(),
        centrality: state.centrality.available(),
        arrivals: state.arrivals.is_some(),
    })
}

// Routes

#[derive(Debug, Deserialize)]
struct RouteParams {
    origin: Option<String>,
    destination: Option<String>,
}

async fn car_route(
    State(state): State<SharedState>,
    Query(params): Query<RouteParams>,
) -> Result<Json<RouteResult>, ApiError> {
    route_with(state, params, SpeedProfileSet::car()).await
}

async fn bus_route(
    State(state): State<SharedState>,
    Query(params): Query<RouteParams>,
) -> Result<Json<RouteResult>, ApiError> {
    route_with(state, params, SpeedProfileSet::bus()).await
}

async fn route_with(
    state: SharedState,
    params: RouteParams,
    profiles: SpeedProfileSet,
) -> Result<Json<RouteResult>, ApiError> {
    let origin = node_param(params.origin.as_deref(), "origin")?;
    let destination = node_param(params.destination.as_deref(), "destination")?;

    let result = tokio::task::spawn_blocking(move || {
        analyze_route(
            &state.network,
            &state.hazards,
            &profiles,
            &state.analysis,
            origin,
            destination,
        )
    })
    .await??;

    let mut result = result.ok_or_else(|| {
        ApiError::NotFound(format!("No route found between {origin} and {destination}"))
    })?;
    round_route(&mut result);
    Ok(Json(result))
}

// Critical segments

#[derive(Debug, Deserialize)]
struct CriticalParams {
    metric: Option<String>,
    limit: Option<String>,
    bbox: Option<String>,
}

async fn critical_segments(
    State(state): State<SharedState>,
    Query(params): Query<CriticalParams>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let metric = match non_blank(params.metric.as_deref()) {
        Some(metric) => metric.parse::<CentralityMetric>()?,
        None => CentralityMetric::Betweenness,
    };
    let mut query = RankQuery::new(metric, limit_param(params.limit.as_deref(), DEFAULT_RANK_LIMIT)?);
    if let Some(bbox) = non_blank(params.bbox.as_deref()) {
        query = query.with_bbox(bbox.parse::<BoundingBox>()?);
    }
    rank(state, query).await
}

#[derive(Debug, Deserialize)]
struct RoadParams {
    road_name: Option<String>,
    #[serde(rename = "match")]
    match_mode: Option<String>,
    limit: Option<String>,
    bbox: Option<String>,
}

async fn road_criticality(
    State(state): State<SharedState>,
    Query(params): Query<RoadParams>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let name = non_blank(params.road_name.as_deref())
        .ok_or_else(|| ApiError::BadRequest("road_name is required".to_string()))?;
    let mode = match non_blank(params.match_mode.as_deref()) {
        Some(mode) => mode.parse::<MatchMode>()?,
        None => MatchMode::default(),
    };

    let mut query = RankQuery::new(
        CentralityMetric::Betweenness,
        limit_param(params.limit.as_deref(), DEFAULT_ROAD_LIMIT)?,
    )
    .with_name(NameFilter::new(name, mode)?);
    if let Some(bbox) = non_blank(params.bbox.as_deref()) {
        query = query.with_bbox(bbox.parse::<BoundingBox>()?);
    }
    rank(state, query).await
}

async fn rank(state: SharedState, query: RankQuery) -> Result<Json<FeatureCollection>, ApiError> {
    let ranked = tokio::task::spawn_blocking(move || {
        rank_critical_segments(&state.network, &state.centrality, &query)
    })
    .await??;
    Ok(Json(ranked.to_geojson()?))
}

// Hazards

#[derive(Debug, Deserialize)]
struct DateParams {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct HazardSummary {
    id: i64,
    date: Option<NaiveDate>,
    rainfall_mm: Option<f64>,
    location: Option<String>,
    longitude: f64,
    latitude: f64,
    impact: Option<HazardEdgeImpact>,
}

#[derive(Debug, Serialize)]
struct HazardList {
    start_date: NaiveDate,
    end_date: NaiveDate,
    count: usize,
    hazards: Vec<HazardSummary>,
}

async fn hazards(
    State(state): State<SharedState>,
    Query(params): Query<DateParams>,
) -> Result<Json<HazardList>, ApiError> {
    let start_date = date_param(params.start_date.as_deref(), "start_date")?;
    let end_date = date_param(params.end_date.as_deref(), "end_date")?;

    let hazards = tokio::task::spawn_blocking(move || {
        let profiles = SpeedProfileSet::flood_event();
        zones_in_date_range(state.hazards.zones(), start_date, end_date).map(|zones| {
            zones
                .into_iter()
                .map(|zone| summarize(&state, zone, &profiles))
                .collect::<Vec<_>>()
        })
    })
    .await??;

    Ok(Json(HazardList {
        start_date,
        end_date,
        count: hazards.len(),
        hazards,
    }))
}

fn summarize(state: &AppState, zone: &HazardZone, profiles: &SpeedProfileSet) -> HazardSummary {
    let anchor = zone.geometry.anchor();
    HazardSummary {
        id: zone.id,
        date: zone.meta.date,
        rainfall_mm: zone.meta.rainfall_mm,
        location: zone.meta.location.clone(),
        longitude: anchor.x(),
        latitude: anchor.y(),
        impact: hazard_edge_impact(&state.network, zone, profiles).map(rounded_impact),
    }
}

async fn hazard_locations(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LocationFrequency>>, ApiError> {
    let frequencies = tokio::task::spawn_blocking(move || {
        location_frequencies(
            &state.network,
            state.hazards.zones(),
            &SpeedProfileSet::flood_event(),
        )
    })
    .await?;

    Ok(Json(
        frequencies
            .into_iter()
            .map(|mut frequency| {
                frequency.impact = frequency.impact.map(rounded_impact);
                frequency
            })
            .collect(),
    ))
}

async fn hazard_impact(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<HazardEdgeImpact>, ApiError> {
    let id = hazard_id(&id)?;
    let impact = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let zone = find_zone(&state, id)?;
        hazard_edge_impact(&state.network, zone, &SpeedProfileSet::flood_event())
            .ok_or_else(|| ApiError::NotFound(format!("No road edge near hazard {id}")))
    })
    .await??;
    Ok(Json(rounded_impact(impact)))
}

#[derive(Debug, Deserialize)]
struct NearHazardParams {
    buffer_m: Option<String>,
    metric: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct NearHazardSegments {
    hazard_id: i64,
    metric: CentralityMetric,
    buffer_m: f64,
    count: usize,
    segments: FeatureCollection,
}

async fn hazard_critical_segments(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<NearHazardParams>,
) -> Result<Json<NearHazardSegments>, ApiError> {
    let id = hazard_id(&id)?;
    let buffer_m = match non_blank(params.buffer_m.as_deref()) {
        Some(buffer) => buffer.parse::<f64>().map_err(|_| {
            ApiError::BadRequest(format!("buffer_m must be a number, got '{buffer}'"))
        })?,
        None => DEFAULT_NEAR_HAZARD_BUFFER_M,
    };
    let metric = match non_blank(params.metric.as_deref()) {
        Some(metric) => metric.parse::<CentralityMetric>()?,
        None => CentralityMetric::Closeness,
    };
    let limit = limit_param(params.limit.as_deref(), DEFAULT_NEAR_HAZARD_LIMIT as i64)?;

    let ranked = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let zone = find_zone(&state, id)?;
        critical_segments_near_hazard(&state.network, &state.centrality, metric, zone, buffer_m, limit)
            .map_err(ApiError::from)
    })
    .await??;

    Ok(Json(NearHazardSegments {
        hazard_id: id,
        metric,
        buffer_m,
        count: ranked.len(),
        segments: ranked.to_geojson()?,
    }))
}

#[derive(Debug, Deserialize)]
struct StopParams {
    radius_m: Option<String>,
}

#[derive(Debug, Serialize)]
struct AffectedServicesReport {
    hazard_id: i64,
    radius_m: f64,
    stops: Vec<NearbyStop>,
    /// `None` when no arrival service is configured
    affected_bus_services: Option<Vec<String>>,
    failed_stops: Vec<StopFailure>,
}

async fn affected_services(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<StopParams>,
) -> Result<Json<AffectedServicesReport>, ApiError> {
    let id = hazard_id(&id)?;
    let radius_m = match non_blank(params.radius_m.as_deref()) {
        Some(radius) => radius
            .parse::<f64>()
            .map_err(|_| ApiError::BadRequest(format!("radius_m must be a number, got '{radius}'")))?,
        None => DEFAULT_STOP_RADIUS_M,
    };

    let lookup = Arc::clone(&state);
    let stops = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let zone = find_zone(&lookup, id)?;
        stops_near_hazard(&lookup.network, &lookup.stops, zone, radius_m).map_err(ApiError::from)
    })
    .await??;

    let (affected_bus_services, failed_stops) = match &state.arrivals {
        Some(arrivals) if !stops.is_empty() => {
            let codes = stops.iter().map(|stop| stop.code.clone()).collect();
            let found = fetch_affected_services(
                Arc::clone(&arrivals.source),
                codes,
                arrivals.max_concurrency,
                arrivals.call_timeout,
            )
            .await;
            (Some(found.services), found.failed_stops)
        }
        Some(_) => (Some(Vec::new()), Vec::new()),
        None => (None, Vec::new()),
    };

    Ok(Json(AffectedServicesReport {
        hazard_id: id,
        radius_m,
        stops: stops
            .into_iter()
            .map(|mut stop| {
                stop.distance_m = round2(stop.distance_m);
                stop
            })
            .collect(),
        affected_bus_services,
        failed_stops,
    }))
}

// Parameter parsing

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn node_param(value: Option<&str>, name: &str) -> Result<NodeId, ApiError> {
    let value =
        non_blank(value).ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))?;
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{name} must be a node id, got '{value}'")))
}

fn limit_param(value: Option<&str>, default: i64) -> Result<usize, ApiError> {
    let limit = match non_blank(value) {
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| ApiError::BadRequest("limit must be an integer".to_string()))?,
        None => default,
    };
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be a positive integer".to_string()));
    }
    usize::try_from(limit).map_err(|_| ApiError::BadRequest("limit is too large".to_string()))
}

fn date_param(value: Option<&str>, name: &str) -> Result<NaiveDate, ApiError> {
    let value =
        non_blank(value).ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("Invalid date format. Use YYYY-MM-DD".to_string()))
}

fn hazard_id(value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("hazard id must be an integer, got '{value}'")))
}

fn find_zone(state: &AppState, id: i64) -> Result<&HazardZone, ApiError> {
    state
        .hazards
        .zone(id)
        .ok_or_else(|| ApiError::NotFound(format!("Hazard {id} not found")))
}

// Rounding happens only here, on the way out

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round_seconds(values: &mut [ProfileSeconds]) {
    for value in values {
        value.seconds = round2(value.seconds);
    }
}

fn round_timings(timings: &mut [ProfileTiming]) {
    for timing in timings {
        timing.travel_time_s = round2(timing.travel_time_s);
        timing.delay_s = round2(timing.delay_s);
    }
}

fn round_route(result: &mut RouteResult) {
    result.path.cost = round2(result.path.cost);
    result.route_length_m = round2(result.route_length_m);
    round_seconds(&mut result.total_delay);
    round_seconds(&mut result.normal_travel_time);
    for segment in &mut result.flooded_segments {
        segment.length_m = segment.length_m.map(round2);
        round_timings(&mut segment.timings);
    }
    if let DetourStatus::Found(detour) = &mut result.detour {
        detour.path.cost = round2(detour.path.cost);
        detour.length_m = round2(detour.length_m);
        round_seconds(&mut detour.travel_time);
        for comparison in &mut detour.comparison {
            comparison.flooded_route_time_s = round2(comparison.flooded_route_time_s);
            comparison.detour_time_s = round2(comparison.detour_time_s);
            comparison.difference_s = round2(comparison.difference_s);
        }
    }
}

fn rounded_impact(mut impact: HazardEdgeImpact) -> HazardEdgeImpact {
    impact.length_m = impact.length_m.map(round2);
    round_timings(&mut impact.timings);
    impact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_must_be_positive() {
        assert_eq!(limit_param(None, 50).unwrap(), 50);
        assert_eq!(limit_param(Some(" 7 "), 50).unwrap(), 7);
        assert!(matches!(limit_param(Some("0"), 50), Err(ApiError::BadRequest(_))));
        assert!(matches!(limit_param(Some("-3"), 50), Err(ApiError::BadRequest(_))));
        assert!(matches!(limit_param(Some("ten"), 50), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn dates_use_iso_format() {
        assert_eq!(
            date_param(Some("2024-01-31"), "start_date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        let err = date_param(Some("31/01/2024"), "start_date").unwrap_err();
        assert_eq!(err.to_string(), "Invalid date format. Use YYYY-MM-DD");
        assert!(date_param(None, "end_date").is_err());
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(12.345_678), 12.35);
        assert_eq!(round2(-0.126), -0.13);
        assert_eq!(round2(3.0), 3.0);
    }
}
