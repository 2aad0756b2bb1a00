//! authz-relation 服务入口
//!
//! 加载配置，初始化遥测与存储，把种子关系写入存储后重新加载为共享关系。

use std::sync::Arc;

use authz_relation::AuthorizationService;
use authz_relation::config::ServiceConfig;
use authz_relation::infrastructure::{Gateways, persistence};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = ServiceConfig::load("config")?;
    let app = &config.app;

    warden_telemetry::init(
        &app.telemetry.log_level,
        app.telemetry.json || app.is_production(),
    );
    let metrics = if app.telemetry.metrics {
        Some(warden_telemetry::init_metrics()?)
    } else {
        None
    };

    info!(
        app_name = %app.app_name,
        app_env = %app.app_env,
        bulk_mode = ?config.relation.bulk_mode,
        "Runtime initialized"
    );

    let gateways = match &app.database {
        Some(database) => {
            let pool = persistence::connect(database).await?;
            persistence::prepare_schema(&pool, database.reset_on_start).await?;
            Gateways::postgres(pool)
        }
        None => {
            warn!("No database configured, using in-memory storage");
            Gateways::in_memory()
        }
    };

    let seeded = config.relation.build_store()?;
    let service = AuthorizationService::new(gateways, Arc::new(RwLock::new(seeded.clone())));

    service.sync_relation(seeded.relation()).await?;
    let roles = service.load_relation().await?;

    let store = service.store();
    let store = store.read().await;
    for (role, permissions) in store.relation() {
        info!(role = %role, permissions = permissions.len(), "Role loaded");
    }
    info!(roles, "Authorization relation ready");

    if let Some(handle) = metrics {
        debug!(snapshot = %handle.render(), "Metrics");
    }
    Ok(())
}
