//! The six-field feature record shared by the dashboard and the prediction service.

use serde::{Deserialize, Serialize};

/// Column order the model was trained on.
pub const FEATURE_NAMES: [&str; 6] = [
    "inlet_temperature",
    "outlet_temperature",
    "flow_rate",
    "specific_heat_capacity",
    "temp_diff",
    "heat_duty",
];

/// The four user-editable measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryInputs {
    pub inlet_temperature: f64,
    pub outlet_temperature: f64,
    pub flow_rate: f64,
    pub specific_heat_capacity: f64,
}

impl Default for PrimaryInputs {
    fn default() -> Self {
        Self { inlet_temperature: 60.0, outlet_temperature: 50.0, flow_rate: 10.0, specific_heat_capacity: 4.18 }
    }
}

/// Full model input. Field order matches [`FEATURE_NAMES`], so the serialized
/// JSON object lists columns in training order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub inlet_temperature: f64,
    pub outlet_temperature: f64,
    pub flow_rate: f64,
    pub specific_heat_capacity: f64,
    pub temp_diff: f64,
    pub heat_duty: f64,
}

impl FeatureRecord {
    /// Derives `temp_diff` and `heat_duty` from the primary inputs. No range checks:
    /// negative flow or a zero temperature difference pass through unchanged.
    /// Overflow to infinity is not caught either; a non-finite field serializes as
    /// `null`, which the prediction service rejects as non-numeric.
    pub fn derive(inputs: PrimaryInputs) -> Self {
        let temp_diff = inputs.inlet_temperature - inputs.outlet_temperature;
        let heat_duty = inputs.flow_rate * inputs.specific_heat_capacity * temp_diff;
        Self {
            inlet_temperature: inputs.inlet_temperature,
            outlet_temperature: inputs.outlet_temperature,
            flow_rate: inputs.flow_rate,
            specific_heat_capacity: inputs.specific_heat_capacity,
            temp_diff,
            heat_duty,
        }
    }
}
