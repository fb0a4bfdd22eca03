use std::sync::Arc;

use mabar_agent::{build_client, Coordinator, LlmError};
use mabar_baas::{BaasClient, BaasError, BaasStore};
use mabar_core::config::{AppConfig, ConfigError, LoadOptions};
use mabar_db::{connect_with_settings, migrations, DbPool, SqlSessionStateRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub coordinator: Arc<Coordinator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("match store client failed: {0}")]
    Store(#[from] BaasError),
    #[error("llm client failed: {0}")]
    Llm(#[from] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let store = Arc::new(BaasStore::new(BaasClient::from_config(&config.baas)?));
    let llm = build_client(&config.llm)?;
    let repository = Arc::new(SqlSessionStateRepository::new(db_pool.clone()));

    let coordinator = Arc::new(Coordinator::new(
        llm,
        store,
        Some(repository),
        &config.assistant,
    ));
    info!(
        event_name = "system.bootstrap.coordinator_ready",
        correlation_id = "bootstrap",
        "assistant pipeline assembled"
    );

    Ok(Application { config, db_pool, coordinator })
}

#[cfg(test)]
mod tests {
    use mabar_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                baas_app_id: Some("app-test".to_string()),
                baas_api_key: Some("rest-test".to_string()),
                llm_api_key: Some("llm-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_store_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_api_key: Some("llm-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("baas.app_id"));
    }

    #[tokio::test]
    async fn bootstrap_prepares_database_and_pipeline() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'conversation_sessions'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("session table should exist after bootstrap");
        assert_eq!(table_count, 1);

        let (history, accumulated) =
            app.coordinator.conversation_state("bootstrap-smoke").await;
        assert!(history.is_empty());
        assert!(accumulated.is_empty());

        app.db_pool.close().await;
    }
}
