mod bootstrap;
mod health;
pub mod web;

use std::sync::Arc;

use anyhow::Result;
use tower_http::services::ServeDir;

use smeta_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use smeta_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let web_state = web::WebState {
        catalog: app.catalog.clone(),
        documents: app.documents.clone(),
        form_templates: Arc::new(web::form_templates()?),
    };
    let router = web::router(web_state)
        .merge(health::router(app.catalog.clone(), app.documents.clone()))
        .nest_service("/assets", ServeDir::new(&app.config.documents.asset_dir));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(bind_address = %address, "web intake started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(error = %error, "web server terminated unexpectedly");
        }
    });

    tracing::info!("smeta-server started");

    // The poll loop runs until its retries are exhausted or the process is
    // interrupted, whichever comes first.
    tokio::select! {
        result = app.telegram_runner.start() => result?,
        _ = wait_for_shutdown() => {}
    }

    tracing::info!("smeta-server stopping");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
