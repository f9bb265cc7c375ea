//! Layered service configuration: struct defaults, then an optional file named by
//! `FOULING_CONFIG_FILE`, then `FOULING__*` environment variables.
//!
//! Every service reads only its own table, so one file can hold both services and
//! an override for one never moves the other:
//!
//! ```text
//! prediction_service:        FOULING__PREDICTION_SERVICE__PORT=5002
//!   port: 5002               FOULING__DASHBOARD__PREDICTION_URL=http://...
//! dashboard:
//!   port: 8051
//! ```

use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_ENV: &str = "FOULING_CONFIG_FILE";
pub const ENV_PREFIX: &str = "FOULING";

/// Table holding `service`'s keys, e.g. `prediction-service` -> `prediction_service`.
pub fn config_table(service: &str) -> String {
    service.to_ascii_lowercase().replace('-', "_")
}

/// Loads `T` for `service`. Fields absent from every source keep the values of
/// `T`'s own `#[serde(default)]`.
pub fn load_config<T: DeserializeOwned>(service: &str) -> Result<T> {
    let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
    load_config_from(service, file.as_deref())
}

pub fn load_config_from<T: DeserializeOwned>(service: &str, file: Option<&Path>) -> Result<T> {
    let table = config_table(service);
    let mut builder = config::Config::builder().set_default(format!("{table}.service_name"), service)?;
    if let Some(path) = file {
        debug!(path = %path.display(), %table, "adding config file source");
        builder = builder.add_source(config::File::from(path).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    let cfg = builder.build()?;
    Ok(cfg.get::<T>(&table)?)
}
