//! Browser dashboard for the fouling prediction service.

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fouling_core::{clear_ready, mark_ready, start_health_server};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub mod client;
pub mod view;

pub use client::{HttpPredictionClient, Prediction, PredictionClient};
pub use view::{plan, render, BarChart, DashboardView, FormValues, Plan, Trigger, UpdateEvent, PLACEHOLDER};

pub const SERVICE: &str = "dashboard";
const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub service_name: String,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub prediction_url: String,
    pub request_timeout_ms: Option<u64>,
    pub health_port: Option<u16>,
    pub log_level: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE.into(),
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8050,
            prediction_url: "http://127.0.0.1:5001/predict".into(),
            request_timeout_ms: None,
            health_port: Some(9102),
            log_level: "info".into(),
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    updates: IntCounterVec,
    downstream_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let updates = IntCounterVec::new(Opts::new("dashboard_updates_total", "Update events received by trigger"), &["trigger"])?;
        let downstream_errors = IntCounter::new("dashboard_downstream_errors_total", "Prediction requests that failed")?;
        registry.register(Box::new(updates.clone()))?;
        registry.register(Box::new(downstream_errors.clone()))?;
        Ok(Self { registry, updates, downstream_errors })
    }
}

pub struct AppState {
    client: Arc<dyn PredictionClient>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(client: Arc<dyn PredictionClient>) -> prometheus::Result<Self> {
        Ok(Self { client, metrics: Metrics::new()? })
    }

    /// `None` means the displayed state stays as it is.
    pub async fn handle_event(&self, event: &UpdateEvent) -> Option<DashboardView> {
        self.metrics.updates.with_label_values(&[event.trigger.as_str()]).inc();
        match plan(event) {
            Plan::Idle => Some(DashboardView::idle()),
            Plan::Keep => None,
            Plan::Invalid(msg) => Some(DashboardView { prediction_text: format!("Error: {msg}"), chart: None }),
            Plan::Request(record) => {
                let outcome = self.client.predict(&record).await;
                if let Err(e) = &outcome {
                    self.metrics.downstream_errors.inc();
                    warn!(error = %format!("{e:#}"), "prediction request failed");
                }
                Some(render(&record, &outcome))
            }
        }
    }
}

async fn index() -> Html<&'static str> { Html(INDEX_HTML) }

#[instrument(skip_all, fields(trigger = event.trigger.as_str(), n_clicks = event.n_clicks))]
async fn update(State(state): State<Arc<AppState>>, Json(event): Json<UpdateEvent>) -> Response {
    match state.handle_event(&event).await {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/update", post(update))
        .with_state(state)
}

pub async fn run(cfg: DashboardConfig) -> Result<()> {
    let client = HttpPredictionClient::new(cfg.prediction_url.clone(), cfg.request_timeout_ms.map(Duration::from_millis))?;
    info!(url = client.url(), "prediction endpoint configured");
    let state = Arc::new(AppState::new(Arc::new(client))?);

    if let Some(port) = cfg.health_port {
        start_health_server(SERVICE, SocketAddr::new(cfg.bind_addr, port), state.metrics.registry.clone()).await?;
    }

    let listener = tokio::net::TcpListener::bind(SocketAddr::new(cfg.bind_addr, cfg.port)).await?;
    info!(addr = %listener.local_addr()?, "dashboard listening");
    mark_ready();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async { let _ = tokio::signal::ctrl_c().await; })
        .await?;
    clear_ready();
    info!("shutdown");
    Ok(())
}
