use character_hub::configuration::Context;
use character_hub::core::HttpServer;
use character_hub::AppError;
use dotenvy::dotenv;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    let context =
        Context::new("config.json").map_err(|e| AppError::ConfigError(e.to_string()))?;

    let log_level = Level::from_str(&context.config.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(log_level.to_string()))
        .init();
    tracing::info!("Starting Character Hub");

    HttpServer::start(context)
        .await
        .map_err(|e| AppError::ServerError(e.to_string()))
}
