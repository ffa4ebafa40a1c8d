mod api;
mod bootstrap;
mod cors;
mod error;
mod health;
mod mailbox;
mod quotes;
mod state;

use anyhow::Result;
use mailquote_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use mailquote_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_env_filter(filter).with_target(false).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_env_filter(filter).with_target(true).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "mailquote-server listening"
    );
    axum::serve(listener, api::router(app.state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "mailquote-server stopping"
    );

    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
