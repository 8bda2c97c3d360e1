use photogate_api::{setup, telemetry};
use photogate_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration first so RUST_LOG from .env is honoured
    let config = Config::from_env()?;

    telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    config.validate()?;

    let router = setup::initialize_app(&config).await?;

    setup::server::start_server(&config, router).await?;

    Ok(())
}
