use anyhow::Result;
use dashboard::{DashboardConfig, SERVICE};
use fouling_core::{init_tracing, load_config};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg: DashboardConfig = load_config(SERVICE)?;
    init_tracing(SERVICE, &cfg.log_level)?;
    info!(?cfg, "config loaded");

    if let Err(e) = dashboard::run(cfg).await {
        error!(error = %format!("{e:#}"), "dashboard stopped");
        return Err(e);
    }
    Ok(())
}
