use std::sync::Arc;

use clinical_differential::api::start_server;
use clinical_differential::config;
use clinical_differential::core_state::CoreState;
use clinical_differential::pipeline_config::PipelineConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    clinical_differential::init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = PipelineConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let core = Arc::new(CoreState::from_config(config)?);

    let server = start_server(core, &bind_addr).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.stop().await;

    Ok(())
}
