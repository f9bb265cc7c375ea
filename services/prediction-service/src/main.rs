use anyhow::Result;
use fouling_core::{init_tracing, load_config};
use prediction_service::{PredictionConfig, SERVICE};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg: PredictionConfig = load_config(SERVICE)?;
    init_tracing(SERVICE, &cfg.log_level)?;
    info!(?cfg, "config loaded");

    if let Err(e) = prediction_service::run(cfg).await {
        error!(error = %format!("{e:#}"), "prediction service stopped");
        return Err(e);
    }
    Ok(())
}
