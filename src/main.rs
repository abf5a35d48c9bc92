use api_save::config::AppConfig;
use api_save::runner::{build_orchestrators, run_requests};
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();

    log::info!(
        "Configuration loaded: {} endpoint(s), collections: {}",
        config.endpoints.len(),
        config.collection_names().join(", ")
    );

    let registry = Arc::new(config.build_registry());
    let orchestrators = build_orchestrators(&config, registry)?;

    log::info!("Reading save requests from stdin");
    run_requests(
        &orchestrators,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    Ok(())
}
