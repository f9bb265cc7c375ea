//! Outbound calls to the prediction service.

use anyhow::Result;
use async_trait::async_trait;
use fouling_core::FeatureRecord;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// What came back in the `fouling_factor` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Value(f64),
    /// Strings and other non-numeric payloads are shown verbatim; a missing field
    /// reads `N/A`. Booleans count as 1 / 0.
    Text(String),
}

impl Prediction {
    pub fn from_response(body: &Value) -> Self {
        match body.get("fouling_factor") {
            Some(Value::Number(n)) => n.as_f64().map(Prediction::Value).unwrap_or_else(|| Prediction::Text(n.to_string())),
            Some(Value::Bool(b)) => Prediction::Value(if *b { 1.0 } else { 0.0 }),
            Some(Value::String(s)) => Prediction::Text(s.clone()),
            Some(other) => Prediction::Text(other.to_string()),
            None => Prediction::Text("N/A".into()),
        }
    }
}

#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, record: &FeatureRecord) -> Result<Prediction>;
}

pub struct HttpPredictionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictionClient {
    /// No timeout unless one is given.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout { builder = builder.timeout(t); }
        Ok(Self { client: builder.build()?, url: url.into() })
    }

    pub fn url(&self) -> &str { &self.url }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, record: &FeatureRecord) -> Result<Prediction> {
        let resp = self.client.post(&self.url).json(record).send().await?.error_for_status()?;
        let body: Value = resp.json().await?;
        debug!(%body, "prediction response");
        Ok(Prediction::from_response(&body))
    }
}
