use anyhow::Context;
use tracing_subscriber::fmt::init;

use quizforge_api::{config::Config, services::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load().context("Failed to load configuration")?;
    let app_state = AppState::connect(config)
        .await
        .context("Failed to initialize app state")?;

    tracing::info!("Analytics worker started");
    app_state.analytics_worker().run().await?;

    Ok(())
}
