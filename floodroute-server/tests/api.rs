use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use floodroute_core::prelude::*;
use floodroute_server::{AppState, build_router, config::LimitsSection};
use geo::Point;
use serde_json::Value;
use tower::ServiceExt;

// 1 -- 2 -- 3 along the equator, with a longer bypass 1 -- 4 -- 3.
// A hazard sits on the middle of 1 -- 2.
fn app() -> Router {
    let mut builder = RoadNetworkBuilder::new();
    builder.add_node(1, 0.0, 0.0).unwrap();
    builder.add_node(2, 0.01, 0.0).unwrap();
    builder.add_node(3, 0.02, 0.0).unwrap();
    builder.add_node(4, 0.01, 0.01).unwrap();
    for (u, v, length, name) in [
        (1, 2, 1000.0, "Main Road"),
        (2, 3, 1000.0, "Main Road"),
        (1, 4, 1500.0, "Side Street"),
        (4, 3, 1500.0, "Side Street"),
    ] {
        builder
            .add_road(u, v, RoadEdge::new(0, length).with_name(name).with_highway("primary"))
            .unwrap();
    }
    let network = builder.build();

    let hazards = HazardIndex::build(
        &[HazardRecord {
            id: 7,
            geometry: RawGeometry::Point { lon: 0.005, lat: 0.0 },
            meta: HazardMeta {
                date: NaiveDate::from_ymd_opt(2024, 1, 15),
                rainfall_mm: Some(88.5),
                location: Some("Orchard Road".to_string()),
            },
        }],
        DEFAULT_HAZARD_BUFFER,
    )
    .unwrap()
    .index;

    let mut centrality = CentralityStore::new();
    centrality.insert(
        CentralityMetric::Betweenness,
        [
            (EdgeKey::new(1, 2, 0), 0.8),
            (EdgeKey::new(2, 3, 0), 0.4),
            (EdgeKey::new(1, 4, 0), 0.2),
        ]
        .into_iter()
        .collect(),
    );

    let stops = vec![
        TransitStop {
            code: "01012".to_string(),
            name: "Near the water".to_string(),
            geometry: Point::new(0.005, 0.0001),
        },
        TransitStop {
            code: "09999".to_string(),
            name: "Far away".to_string(),
            geometry: Point::new(0.01, 0.01),
        },
    ];

    let state = AppState {
        network,
        hazards,
        stops,
        centrality,
        analysis: AnalysisConfig::default(),
        arrivals: None,
    };
    build_router(Arc::new(state), &LimitsSection::default())
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_loaded_data() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["nodes"], 4);
    assert_eq!(body["hazards"], 1);
    assert_eq!(body["centrality"], serde_json::json!(["betweenness"]));
    assert_eq!(body["arrivals"], false);
}

#[tokio::test]
async fn flooded_car_route_carries_a_detour() {
    let (status, body) = get("/routes/car?origin=1&destination=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "flooded");
    assert_eq!(body["path"]["nodes"], serde_json::json!([1, 2, 3]));
    assert_eq!(body["route_length_m"], 2000.0);
    assert_eq!(body["flooded_segments"][0]["road_name"], "Main Road");

    let detour = &body["detour"];
    assert_eq!(detour["status"], "found");
    assert_eq!(detour["path"]["nodes"], serde_json::json!([1, 4, 3]));
    assert_eq!(detour["length_m"], 3000.0);
}

#[tokio::test]
async fn bus_route_uses_bus_profiles() {
    let (status, body) = get("/routes/bus?origin=3&destination=1").await;
    assert_eq!(status, StatusCode::OK);
    let profiles: Vec<&str> = body["normal_travel_time"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["profile"].as_str().unwrap())
        .collect();
    assert!(profiles.contains(&"non_flooded"));
    // 50 km/h over 2 km
    let baseline = body["normal_travel_time"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["profile"] == "non_flooded")
        .unwrap();
    assert_eq!(baseline["seconds"], 144.0);
}

#[tokio::test]
async fn route_parameters_are_validated() {
    let (status, body) = get("/routes/car?destination=3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "origin is required");

    let (status, _) = get("/routes/car?origin=abc&destination=3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get("/routes/car?origin=1&destination=42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn critical_segments_rank_by_score() {
    let (status, body) = get("/critical-segments?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["properties"]["rank"], 1);
    assert_eq!(features[0]["properties"]["u"], 1);
    assert_eq!(features[0]["properties"]["v"], 2);
    assert_eq!(features[0]["properties"]["norm_score"], 1.0);
    assert_eq!(features[1]["properties"]["norm_score"], 0.5);
}

#[tokio::test]
async fn critical_segment_errors_are_distinguishable() {
    let (status, _) = get("/critical-segments?metric=pagerank").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get("/critical-segments?metric=closeness").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("closeness"));

    let (status, _) = get("/critical-segments?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get("/critical-segments?bbox=1,2,3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn degenerate_bbox_selects_nothing() {
    let (status, body) = get("/critical-segments?bbox=0,0,0,1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["features"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn road_criticality_filters_by_name() {
    let (status, body) = get("/road-criticality?road_name=side&match=contains").await;
    assert_eq!(status, StatusCode::OK);
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 4);
    assert!(
        features
            .iter()
            .all(|f| f["properties"]["road_name"] == "Side Street")
    );
    assert_eq!(features[0]["properties"]["u"], 1);
    assert_eq!(features[0]["properties"]["v"], 4);

    let (status, body) = get("/road-criticality?road_name=side&match=exact").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["features"].as_array().unwrap().is_empty());

    let (status, _) = get("/road-criticality").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hazards_are_listed_by_date_range() {
    let (status, body) = get("/hazards?start_date=2024-01-01&end_date=2024-01-31").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let hazard = &body["hazards"][0];
    assert_eq!(hazard["id"], 7);
    assert_eq!(hazard["location"], "Orchard Road");
    assert_eq!(hazard["impact"]["road_name"], "Main Road");

    let (_, body) = get("/hazards?start_date=2024-02-01&end_date=2024-02-28").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn hazard_dates_are_validated() {
    let (status, body) = get("/hazards?start_date=15-01-2024&end_date=2024-01-31").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid date format. Use YYYY-MM-DD");

    let (status, body) = get("/hazards?start_date=2024-02-01&end_date=2024-01-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("start_date cannot be after end_date"));
}

#[tokio::test]
async fn hazard_locations_are_counted() {
    let (status, body) = get("/hazards/locations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["location"], "Orchard Road");
    assert_eq!(body[0]["count"], 1);
}

#[tokio::test]
async fn hazard_impact_uses_the_nearest_road() {
    let (status, body) = get("/hazards/7/impact").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["road_name"], "Main Road");
    assert_eq!(body["length_m"], 1000.0);
    // 1 km at 20 km/h against 50 km/h
    let slow = body["timings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["profile"] == "20kmh")
        .unwrap();
    assert_eq!(slow["travel_time_s"], 180.0);
    assert_eq!(slow["delay_s"], 108.0);

    let (status, _) = get("/hazards/99/impact").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get("/hazards/seven/impact").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn critical_segments_near_a_hazard() {
    let (status, body) = get("/hazards/7/critical-segments?metric=betweenness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hazard_id"], 7);
    assert_eq!(body["buffer_m"], DEFAULT_NEAR_HAZARD_BUFFER_M);
    // only 1 -> 2 and its reverse run past the hazard
    assert_eq!(body["count"], 2);
    assert_eq!(body["segments"]["features"][0]["properties"]["u"], 1);

    // Side Street passes ~390 m from the hazard, 2 -> 3 starts ~560 m away
    let (status, body) = get("/hazards/7/critical-segments?metric=betweenness&buffer_m=500").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["buffer_m"], 500.0);
    assert_eq!(body["count"], 4);

    let (status, _) = get("/hazards/7/critical-segments?metric=betweenness&buffer_m=wide").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // closeness is the default metric and is not loaded here
    let (status, _) = get("/hazards/7/critical-segments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nearby_stops_without_arrival_service() {
    let (status, body) = get("/hazards/7/affected-services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["radius_m"], 20.0);
    let stops = body["stops"].as_array().unwrap();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0]["code"], "01012");
    assert!(body["affected_bus_services"].is_null());

    let (status, _) = get("/hazards/7/affected-services?radius_m=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
