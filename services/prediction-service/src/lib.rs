//! Fouling factor prediction service: one `POST /predict` route backed by a model
//! artifact loaded at startup.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use fouling_core::{clear_ready, mark_ready, start_health_server, FEATURE_NAMES};
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub mod model;

pub use model::{InferenceError, LoadedModel, ModelError};

pub const SERVICE: &str = "prediction-service";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub service_name: String,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub model_path: PathBuf,
    pub model_sha256: Option<String>,
    pub health_port: Option<u16>,
    pub log_level: String,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE.into(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5001,
            model_path: PathBuf::from("models/fouling_model.json"),
            model_sha256: None,
            health_port: Some(9101),
            log_level: "info".into(),
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    requests: IntCounter,
    failures: IntCounterVec,
    latency: Histogram,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let requests = IntCounter::new("fouling_predict_requests_total", "Total POST /predict requests")?;
        let failures = IntCounterVec::new(Opts::new("fouling_predict_failures_total", "Failed predictions by reason"), &["reason"])?;
        let latency = Histogram::with_opts(HistogramOpts::new("fouling_predict_latency_seconds", "Time spent answering POST /predict"))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        Ok(Self { registry, requests, failures, latency })
    }
}

/// Router state. The model is read-only after startup and shared without locking.
pub struct AppState {
    pub model: LoadedModel,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(model: LoadedModel) -> prometheus::Result<Self> {
        Ok(Self { model, metrics: Metrics::new()? })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub fouling_factor: f64,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => *status,
            ApiError::NotAnObject(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ApiError::Rejected { .. } | ApiError::NotAnObject(_) => "bad_request",
            ApiError::Inference(InferenceError::MissingFeature(_)) => "missing_feature",
            ApiError::Inference(InferenceError::NonNumeric { .. }) => "non_numeric",
            ApiError::Inference(InferenceError::NonFinite(_)) => "non_finite",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected { status: rejection.status(), message: rejection.body_text() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() { error!(error = %self, "predict failed"); } else { warn!(error = %self, "predict rejected"); }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[instrument(skip_all)]
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    state.metrics.requests.inc();
    let result = payload.map_err(ApiError::from).and_then(|Json(body)| match body {
        Value::Object(record) => Ok(state.model.predict(&record)?),
        other => Err(ApiError::NotAnObject(json_kind(&other))),
    });
    state.metrics.latency.observe(start.elapsed().as_secs_f64());
    match result {
        Ok(fouling_factor) => {
            tracing::debug!(fouling_factor, "prediction served");
            Ok(Json(PredictResponse { fouling_factor }))
        }
        Err(e) => {
            state.metrics.failures.with_label_values(&[e.reason()]).inc();
            Err(e)
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/predict", post(predict)).with_state(state)
}

/// Loads the model, then serves until ctrl-c. Any model loading failure is
/// returned before the listener is bound.
pub async fn run(cfg: PredictionConfig) -> Result<()> {
    let model = LoadedModel::load(&cfg.model_path, cfg.model_sha256.as_deref())
        .with_context(|| format!("loading model artifact {}", cfg.model_path.display()))?;
    info!(path = %cfg.model_path.display(), kind = model.kind(), sha256 = model.sha256(), features = ?model.feature_names(), "model loaded");
    if model.feature_names().iter().map(String::as_str).ne(FEATURE_NAMES) {
        warn!(expected = ?FEATURE_NAMES, got = ?model.feature_names(), "model columns differ from the dashboard feature record");
    }
    let state = Arc::new(AppState::new(model)?);

    if let Some(port) = cfg.health_port {
        start_health_server(SERVICE, SocketAddr::new(cfg.bind_addr, port), state.metrics.registry.clone()).await?;
    }

    let listener = tokio::net::TcpListener::bind(SocketAddr::new(cfg.bind_addr, cfg.port)).await?;
    info!(addr = %listener.local_addr()?, "prediction service listening");
    mark_ready();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async { let _ = tokio::signal::ctrl_c().await; })
        .await?;
    clear_ready();
    info!("shutdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_deployment() {
        let cfg = PredictionConfig::default();
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(ApiError::NotAnObject("an array").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(InferenceError::MissingFeature("flow_rate".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::from(InferenceError::NonFinite(f64::NAN)).reason(), "non_finite");
    }
}
