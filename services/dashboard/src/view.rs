//! Update events and what the page shows for them.
//!
//! The page posts an [`UpdateEvent`] for every interaction. [`plan`] decides what
//! the event means; [`render`] turns a record plus the prediction outcome into the
//! displayed text and chart. Neither touches the network.

use crate::client::Prediction;
use fouling_core::{FeatureRecord, PrimaryInputs};
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER: &str = "Enter values and click 'Predict Fouling Factor'";
pub const CHART_TITLE: &str = "Heat Duty of Heat Exchanger";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Load,
    PredictButton,
    FieldEdit,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Load => "load",
            Trigger::PredictButton => "predict_button",
            Trigger::FieldEdit => "field_edit",
        }
    }
}

/// Raw form state; an emptied number input arrives as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FormValues {
    pub inlet_temperature: Option<f64>,
    pub outlet_temperature: Option<f64>,
    pub flow_rate: Option<f64>,
    pub specific_heat_capacity: Option<f64>,
}

impl FormValues {
    pub fn primary(&self) -> Result<PrimaryInputs, String> {
        let get = |v: Option<f64>, name: &str| v.ok_or_else(|| format!("{name} is empty"));
        Ok(PrimaryInputs {
            inlet_temperature: get(self.inlet_temperature, "inlet_temperature")?,
            outlet_temperature: get(self.outlet_temperature, "outlet_temperature")?,
            flow_rate: get(self.flow_rate, "flow_rate")?,
            specific_heat_capacity: get(self.specific_heat_capacity, "specific_heat_capacity")?,
        })
    }
}

impl From<PrimaryInputs> for FormValues {
    fn from(p: PrimaryInputs) -> Self {
        Self {
            inlet_temperature: Some(p.inlet_temperature),
            outlet_temperature: Some(p.outlet_temperature),
            flow_rate: Some(p.flow_rate),
            specific_heat_capacity: Some(p.specific_heat_capacity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub trigger: Trigger,
    #[serde(default)]
    pub n_clicks: u64,
    pub values: FormValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn heat_duty(value: f64) -> Self {
        Self {
            title: CHART_TITLE.into(),
            x_label: "Parameter".into(),
            y_label: "Value".into(),
            bars: vec![Bar { label: "Heat Duty".into(), value, color: "blue".into() }],
        }
    }
}

/// `chart` is `None` until the first fired update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub prediction_text: String,
    pub chart: Option<BarChart>,
}

impl DashboardView {
    pub fn idle() -> Self { Self { prediction_text: PLACEHOLDER.into(), chart: None } }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Nothing clicked yet.
    Idle,
    /// Leave whatever is displayed.
    Keep,
    Request(FeatureRecord),
    Invalid(String),
}

/// Only a button press after at least one click fires a request. Field edits never
/// refresh the result on their own.
pub fn plan(event: &UpdateEvent) -> Plan {
    if event.n_clicks == 0 { return Plan::Idle; }
    match event.trigger {
        Trigger::Load => Plan::Idle,
        Trigger::FieldEdit => Plan::Keep,
        Trigger::PredictButton => match event.values.primary() {
            Ok(inputs) => Plan::Request(FeatureRecord::derive(inputs)),
            Err(msg) => Plan::Invalid(msg),
        },
    }
}

pub fn prediction_text(outcome: &anyhow::Result<Prediction>) -> String {
    match outcome {
        Ok(Prediction::Value(v)) => format!("Predicted Fouling Factor: {v:.2}"),
        Ok(Prediction::Text(s)) => s.clone(),
        Err(e) => format!("Error: {e:#}"),
    }
}

/// The chart is drawn from the local record even when the request failed.
pub fn render(record: &FeatureRecord, outcome: &anyhow::Result<Prediction>) -> DashboardView {
    DashboardView { prediction_text: prediction_text(outcome), chart: Some(BarChart::heat_duty(record.heat_duty)) }
}
