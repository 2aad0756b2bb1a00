//! 基础设施层

pub mod memory;
pub mod persistence;

use std::sync::Arc;

use sqlx::PgPool;
use warden_ports::RecordGateway;

use crate::domain::records::{PermissionRecord, PrincipalRoleLink, RolePermissionLink, RoleRecord};
use memory::InMemoryGateway;
use persistence::PostgresGateway;

/// 四类记录的网关集合
#[derive(Clone)]
pub struct Gateways {
    pub roles: Arc<dyn RecordGateway<RoleRecord>>,
    pub permissions: Arc<dyn RecordGateway<PermissionRecord>>,
    pub role_permissions: Arc<dyn RecordGateway<RolePermissionLink>>,
    pub principal_roles: Arc<dyn RecordGateway<PrincipalRoleLink>>,
}

impl Gateways {
    pub fn in_memory() -> Self {
        Self {
            roles: Arc::new(InMemoryGateway::<RoleRecord>::new()),
            permissions: Arc::new(InMemoryGateway::<PermissionRecord>::new()),
            role_permissions: Arc::new(InMemoryGateway::<RolePermissionLink>::new()),
            principal_roles: Arc::new(InMemoryGateway::<PrincipalRoleLink>::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            roles: Arc::new(PostgresGateway::<RoleRecord>::new(pool.clone())),
            permissions: Arc::new(PostgresGateway::<PermissionRecord>::new(pool.clone())),
            role_permissions: Arc::new(PostgresGateway::<RolePermissionLink>::new(pool.clone())),
            principal_roles: Arc::new(PostgresGateway::<PrincipalRoleLink>::new(pool)),
        }
    }
}
