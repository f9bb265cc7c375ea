//! Drives `POST /predict` over a real socket.

use fouling_core::{FeatureRecord, PrimaryInputs, FEATURE_NAMES};
use prediction_service::{router, AppState, LoadedModel, PredictResponse, PredictionConfig};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

async fn spawn_service(model: Value) -> SocketAddr {
    let bytes = serde_json::to_vec(&json!({ "format_version": 1, "feature_names": FEATURE_NAMES, "model": model })).unwrap();
    let state = Arc::new(AppState::new(LoadedModel::from_slice(&bytes).unwrap()).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router(state)).await.unwrap(); });
    addr
}

fn record_json(inputs: PrimaryInputs) -> Value {
    serde_json::to_value(FeatureRecord::derive(inputs)).unwrap()
}

#[tokio::test]
async fn valid_record_returns_fouling_factor() {
    let addr = spawn_service(json!({"kind": "constant", "value": 0.002})).await;
    let resp = Client::new().post(format!("http://{addr}/predict")).json(&record_json(PrimaryInputs::default())).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: PredictResponse = resp.json().await.unwrap();
    assert_eq!(body, PredictResponse { fouling_factor: 0.002 });
}

#[tokio::test]
async fn any_numeric_record_is_accepted() {
    let addr = spawn_service(json!({"kind": "linear", "intercept": 0.001, "coefficients": [0.0, 0.0, 0.0, 0.0, 0.0001, 0.000001]})).await;
    let client = Client::new();
    let samples = [
        PrimaryInputs::default(),
        PrimaryInputs { inlet_temperature: 50.0, outlet_temperature: 50.0, flow_rate: 0.0, specific_heat_capacity: 4.18 },
        PrimaryInputs { inlet_temperature: -10.0, outlet_temperature: 35.5, flow_rate: -3.0, specific_heat_capacity: 1.2 },
        PrimaryInputs { inlet_temperature: 1e6, outlet_temperature: 0.0, flow_rate: 250.0, specific_heat_capacity: 0.5 },
    ];
    for inputs in samples {
        let resp = client.post(format!("http://{addr}/predict")).json(&record_json(inputs)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "inputs {inputs:?}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["fouling_factor"].is_number(), "body {body}");
    }
}

#[tokio::test]
async fn integer_fields_are_numeric() {
    let addr = spawn_service(json!({"kind": "constant", "value": 1.5})).await;
    let body = json!({"inlet_temperature": 60, "outlet_temperature": 50, "flow_rate": 10,
        "specific_heat_capacity": 4.18, "temp_diff": 10, "heat_duty": 418.0});
    let resp = Client::new().post(format!("http://{addr}/predict")).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_field_is_a_server_error_and_service_survives() {
    let addr = spawn_service(json!({"kind": "constant", "value": 0.002})).await;
    let client = Client::new();
    for name in FEATURE_NAMES {
        let mut body = record_json(PrimaryInputs::default());
        body.as_object_mut().unwrap().remove(name);
        let resp = client.post(format!("http://{addr}/predict")).json(&body).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "without {name}");
        let err: Value = resp.json().await.unwrap();
        assert!(err["error"].as_str().unwrap().contains(name), "error {err}");
    }
    let resp = client.post(format!("http://{addr}/predict")).json(&record_json(PrimaryInputs::default())).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_numeric_field_is_a_server_error() {
    let addr = spawn_service(json!({"kind": "constant", "value": 0.002})).await;
    let mut body = record_json(PrimaryInputs::default());
    body["flow_rate"] = json!("fast");
    let resp = Client::new().post(format!("http://{addr}/predict")).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn malformed_bodies_are_client_errors() {
    let addr = spawn_service(json!({"kind": "constant", "value": 0.002})).await;
    let client = Client::new();
    let url = format!("http://{addr}/predict");

    let resp = client.post(&url).header("content-type", "application/json").body("{\"inlet_temperature\": 60,").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.post(&url).json(&json!([1, 2, 3])).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.post(&url).body("{}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn startup_fails_without_model_artifact() {
    let cfg = PredictionConfig {
        model_path: std::env::temp_dir().join("prediction-service-absent-model.json"),
        port: 0,
        health_port: None,
        ..Default::default()
    };
    let err = prediction_service::run(cfg).await.unwrap_err();
    assert!(format!("{err:#}").contains("loading model artifact"), "{err:#}");
}

#[tokio::test]
async fn startup_fails_on_corrupt_artifact() {
    let path = std::env::temp_dir().join(format!("prediction-service-corrupt-{}.json", std::process::id()));
    std::fs::write(&path, b"not a model").unwrap();
    let cfg = PredictionConfig { model_path: path.clone(), port: 0, health_port: None, ..Default::default() };
    let res = prediction_service::run(cfg).await;
    let _ = std::fs::remove_file(&path);
    assert!(res.is_err());
}
