//! PostgreSQL 持久化

mod gateway;
mod migrations;

pub use gateway::{PgRecord, PostgresGateway, SqlValue};
pub use migrations::migrations;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::{info, warn};
use warden_adapter_postgres::{MigrationManager, PostgresConfig, check_connection, create_pool};
use warden_config::DatabaseConfig;
use warden_errors::{AppError, AppResult};

/// 创建连接池并检查连通性
pub async fn connect(config: &DatabaseConfig) -> AppResult<PgPool> {
    let pg_config = PostgresConfig::new(config.url.expose_secret().as_str())
        .with_max_connections(config.max_connections);

    let pool = create_pool(&pg_config).await?;
    check_connection(&pool).await?;

    info!(max_connections = config.max_connections, "Database connected");
    Ok(pool)
}

/// 应用迁移；`reset` 为真时先回滚全部迁移
pub async fn prepare_schema(pool: &PgPool, reset: bool) -> AppResult<()> {
    let manager = MigrationManager::new(pool.clone());
    let migrations = migrations();

    if reset {
        let reverted = manager.rollback_to(0, &migrations).await?;
        warn!(reverted, "Schema reset");
    }

    let result = manager.migrate(&migrations).await?;
    if let Some(error) = result.errors.first() {
        return Err(AppError::database(format!(
            "Migration {} ({}) failed: {}",
            error.version, error.name, error.error
        )));
    }

    info!(
        applied = result.applied_count(),
        skipped = result.skipped.len(),
        "Schema ready"
    );
    Ok(())
}
