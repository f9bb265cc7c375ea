//! Regression model artifact: loading, validation and single-row inference.
//!
//! Artifacts are JSON documents:
//!
//! ```text
//! { "format_version": 1,
//!   "feature_names": ["inlet_temperature", ...],
//!   "model": { "kind": "random_forest", "trees": [ ... ] } }
//! ```
//!
//! Trees use the flat array layout of fitted CART regressors: node `i` is a leaf
//! when `children_left[i] == -1`, otherwise a row goes left when
//! `row[feature[i]] <= threshold[i]`.

use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
const LEAF: i64 = -1;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read model artifact {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("model artifact could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("model artifact format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("model hash mismatch expected={expected} got={got}")]
    HashMismatch { expected: String, got: String },
    #[error("invalid model: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("missing feature `{0}`")]
    MissingFeature(String),
    #[error("feature `{name}` is not numeric: {value}")]
    NonNumeric { name: String, value: String },
    #[error("model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    format_version: u32,
    feature_names: Vec<String>,
    model: Regressor,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    Constant { value: f64 },
    Linear { intercept: f64, coefficients: Vec<f64> },
    RandomForest { trees: Vec<RegressionTree> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<f64>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.value.len();
        if n == 0 { return Err("tree has no nodes".into()); }
        if [self.children_left.len(), self.children_right.len(), self.feature.len(), self.threshold.len()].iter().any(|&l| l != n) {
            return Err("tree arrays differ in length".into());
        }
        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l == LEAF {
                if r != LEAF { return Err(format!("node {i} has a right child but no left child")); }
                continue;
            }
            // children always follow their parent, which also rules out cycles
            for child in [l, r] {
                if child <= i as i64 || child >= n as i64 { return Err(format!("node {i} has out-of-range child {child}")); }
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= n_features { return Err(format!("node {i} splits on unknown feature {f}")); }
        }
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let x = row[self.feature[node] as usize];
            let next = if x <= self.threshold[node] { self.children_left[node] } else { self.children_right[node] };
            node = next as usize;
        }
        self.value[node]
    }
}

impl Regressor {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            Regressor::Constant { .. } => Ok(()),
            Regressor::Linear { coefficients, .. } => {
                if coefficients.len() != n_features {
                    return Err(format!("linear model has {} coefficients for {n_features} features", coefficients.len()));
                }
                Ok(())
            }
            Regressor::RandomForest { trees } => {
                if trees.is_empty() { return Err("random forest has no trees".into()); }
                trees.iter().enumerate().try_for_each(|(i, t)| t.validate(n_features).map_err(|e| format!("tree {i}: {e}")))
            }
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            Regressor::Constant { value } => *value,
            Regressor::Linear { intercept, coefficients } => intercept + coefficients.iter().zip(row).map(|(c, x)| c * x).sum::<f64>(),
            Regressor::RandomForest { trees } => trees.iter().map(|t| t.predict(row)).sum::<f64>() / trees.len() as f64,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Constant { .. } => "constant",
            Regressor::Linear { .. } => "linear",
            Regressor::RandomForest { .. } => "random_forest",
        }
    }
}

/// Immutable predictor, loaded once at startup.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    feature_names: Vec<String>,
    regressor: Regressor,
    sha256: String,
}

impl LoadedModel {
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io { path: path.to_path_buf(), source })?;
        let model = Self::from_slice(&bytes)?;
        if let Some(expect) = expected_sha256.filter(|e| !e.is_empty()) {
            if !expect.eq_ignore_ascii_case(&model.sha256) {
                return Err(ModelError::HashMismatch { expected: expect.to_string(), got: model.sha256 });
            }
        }
        Ok(model)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion { found: artifact.format_version, expected: ARTIFACT_FORMAT_VERSION });
        }
        if artifact.feature_names.is_empty() { return Err(ModelError::Invalid("no feature names".into())); }
        let mut seen = HashSet::new();
        if let Some(dup) = artifact.feature_names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(ModelError::Invalid(format!("duplicate feature name `{dup}`")));
        }
        artifact.model.validate(artifact.feature_names.len()).map_err(ModelError::Invalid)?;
        Ok(Self { feature_names: artifact.feature_names, regressor: artifact.model, sha256: hex::encode(Sha256::digest(bytes)) })
    }

    pub fn feature_names(&self) -> &[String] { &self.feature_names }
    pub fn kind(&self) -> &'static str { self.regressor.kind() }
    pub fn sha256(&self) -> &str { &self.sha256 }

    /// Orders a JSON record into a row following the artifact's columns.
    /// Unknown keys are ignored.
    pub fn row_from_record(&self, record: &Map<String, Value>) -> Result<Vec<f64>, InferenceError> {
        self.feature_names.iter().map(|name| {
            let value = record.get(name).ok_or_else(|| InferenceError::MissingFeature(name.clone()))?;
            value.as_f64().ok_or_else(|| InferenceError::NonNumeric { name: name.clone(), value: value.to_string() })
        }).collect()
    }

    pub fn predict(&self, record: &Map<String, Value>) -> Result<f64, InferenceError> {
        let row = self.row_from_record(record)?;
        let out = self.regressor.predict_row(&row);
        if !out.is_finite() { return Err(InferenceError::NonFinite(out)); }
        Ok(out)
    }
}
