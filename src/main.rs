mod app;
mod config;
mod models;
mod providers;
mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use app::App;
use config::AppConfig;
use providers::HttpAssistant;
use services::{PreviewRegistry, Session};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        "Using assistant service at {} ({})",
        config.api_base_url,
        config.environment
    );

    let assistant = HttpAssistant::new(config).context("Failed to set up the HTTP client")?;
    let session = Session::init(PreviewRegistry::new());

    App::new(session, Arc::new(assistant)).run().await
}
