//! PostgreSQL 迁移管理模块

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};
use warden_errors::{AppError, AppResult};

/// 已应用的迁移记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
    pub checksum: String,
}

/// 迁移定义
///
/// `up_sql` 与 `down_sql` 各自只能包含一条语句（预编译语句限制）。
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub up_sql: String,
    pub down_sql: Option<String>,
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        let up_sql = up_sql.into();
        let checksum = Self::calculate_checksum(&up_sql);
        Self {
            version,
            name: name.into(),
            up_sql,
            down_sql: None,
            checksum,
        }
    }

    /// 设置降级 SQL
    pub fn with_down(mut self, down_sql: impl Into<String>) -> Self {
        self.down_sql = Some(down_sql.into());
        self
    }

    /// SHA-256 十六进制摘要
    fn calculate_checksum(sql: &str) -> String {
        hex::encode(Sha256::digest(sql.as_bytes()))
    }
}

/// 迁移管理器
pub struct MigrationManager {
    pool: PgPool,
    table_name: String,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: "_warden_migrations".to_string(),
        }
    }

    /// 初始化迁移表
    pub async fn init(&self) -> AppResult<()> {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
            self.table_name
        );

        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create migration table: {}", e)))?;

        Ok(())
    }

    /// 获取已应用的迁移
    pub async fn applied(&self) -> AppResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT version, name, applied_at, checksum FROM {} ORDER BY version ASC",
            self.table_name
        );

        sqlx::query_as::<_, MigrationRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get migrations: {}", e)))
    }

    /// 在单个事务中应用迁移并记录
    async fn apply(&self, migration: &Migration) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(&migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::database(format!(
                    "Failed to apply migration {}: {}",
                    migration.version, e
                ))
            })?;

        let insert_sql = format!(
            "INSERT INTO {} (version, name, checksum) VALUES ($1, $2, $3)",
            self.table_name
        );
        sqlx::query(&insert_sql)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit migration: {}", e)))?;

        info!(version = migration.version, name = %migration.name, "Migration applied");
        Ok(())
    }

    /// 在单个事务中回滚迁移并删除记录
    async fn revert(&self, migration: &Migration) -> AppResult<()> {
        let down_sql = migration.down_sql.as_ref().ok_or_else(|| {
            AppError::internal(format!(
                "Migration {} does not have down SQL",
                migration.version
            ))
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(down_sql).execute(&mut *tx).await.map_err(|e| {
            AppError::database(format!(
                "Failed to rollback migration {}: {}",
                migration.version, e
            ))
        })?;

        let delete_sql = format!("DELETE FROM {} WHERE version = $1", self.table_name);
        sqlx::query(&delete_sql)
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete migration record: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit rollback: {}", e)))?;

        info!(version = migration.version, name = %migration.name, "Migration rolled back");
        Ok(())
    }

    /// 按版本顺序应用所有待处理的迁移，遇到第一个错误即停止
    pub async fn migrate(&self, migrations: &[Migration]) -> AppResult<MigrationResult> {
        self.init().await?;

        let applied: HashMap<i64, String> = self
            .applied()
            .await?
            .into_iter()
            .map(|record| (record.version, record.checksum))
            .collect();

        let mut result = MigrationResult::default();
        let mut pending: Vec<&Migration> = migrations.iter().collect();
        pending.sort_by_key(|m| m.version);

        for migration in pending {
            match applied.get(&migration.version) {
                Some(checksum) if *checksum != migration.checksum => {
                    warn!(version = migration.version, "Migration checksum mismatch");
                    result.errors.push(MigrationError {
                        version: migration.version,
                        name: migration.name.clone(),
                        error: "Checksum mismatch - migration has been modified".to_string(),
                    });
                }
                Some(_) => result.skipped.push(migration.version),
                None => match self.apply(migration).await {
                    Ok(()) => result.applied.push(migration.version),
                    Err(e) => {
                        result.errors.push(MigrationError {
                            version: migration.version,
                            name: migration.name.clone(),
                            error: e.to_string(),
                        });
                        break;
                    }
                },
            }
        }

        Ok(result)
    }

    /// 回滚到指定版本（不含），按版本降序执行
    pub async fn rollback_to(&self, target_version: i64, migrations: &[Migration]) -> AppResult<u32> {
        self.init().await?;

        let mut to_rollback: Vec<MigrationRecord> = self
            .applied()
            .await?
            .into_iter()
            .filter(|record| record.version > target_version)
            .collect();
        to_rollback.sort_by(|a, b| b.version.cmp(&a.version));

        let mut rolled_back = 0;
        for record in to_rollback {
            let migration = migrations
                .iter()
                .find(|m| m.version == record.version)
                .ok_or_else(|| {
                    AppError::internal(format!(
                        "Migration {} not found in provided migrations",
                        record.version
                    ))
                })?;

            self.revert(migration).await?;
            rolled_back += 1;
        }

        Ok(rolled_back)
    }
}

/// 迁移结果
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub applied: Vec<i64>,
    pub skipped: Vec<i64>,
    pub errors: Vec<MigrationError>,
}

impl MigrationResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// 迁移错误
#[derive(Debug, Clone)]
pub struct MigrationError {
    pub version: i64,
    pub name: String,
    pub error: String,
}
