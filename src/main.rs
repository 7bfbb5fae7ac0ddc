// src/main.rs
use packfit::api;
use packfit::config::AppConfig;
use packfit::recommend::RecommendationClient;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env first so RUST_LOG from it reaches the filter.
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!(error = %err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();
    let recommender = match RecommendationClient::new(app_config.recommender.clone()) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "could not build recommendation client");
            std::process::exit(1);
        }
    };

    info!("packfit service starting");
    if let Err(err) = api::start_api_server(app_config.api, app_config.optimizer, recommender).await {
        error!(error = %err, "API server terminated with an error");
        std::process::exit(1);
    }
}
