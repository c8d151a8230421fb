use std::error::Error;

use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // `.env` is optional; deployments usually pass plain environment variables.
    let dotenv = dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,rag_store=info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(model_service::telemetry::layer())
        .try_init()?;

    if let Some(path) = dotenv {
        info!("loaded environment from {}", path.display());
    }
    api::start().await?;
    Ok(())
}
