use std::sync::Arc;

use mailquote_core::config::{AppConfig, ConfigError, LoadOptions};
use mailquote_db::{
    connect_from_config, migrations, DbPool, SqlAuditEventRepository,
    SqlProcessedEmailRepository,
};
use mailquote_graph::GraphError;
use thiserror::Error;
use tracing::info;

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mailbox client setup failed: {0}")]
    Graph(#[source] GraphError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Missing mailbox credentials do not stop startup: `test-connection` has to
/// be able to report them.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        credentials_complete = config.graph.credential_presence().all_present(),
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let state = AppState::from_config(
        &config,
        Arc::new(SqlProcessedEmailRepository::new(db_pool.clone())),
        Arc::new(SqlAuditEventRepository::new(db_pool.clone())),
    )
    .map_err(BootstrapError::Graph)?;

    Ok(Application { config, db_pool, state })
}
