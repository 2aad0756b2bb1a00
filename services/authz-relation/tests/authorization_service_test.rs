//! 授权服务测试（内存存储）

use std::sync::Arc;

use async_trait::async_trait;
use authz_relation::domain::records::{NewRole, RoleFilter, RolePatch, RoleRecord};
use authz_relation::infrastructure::Gateways;
use authz_relation::{AuthorizationService, RelationError, RelationStore};
use mockall::mock;
use tokio::sync::RwLock;
use warden_common::PrincipalId;
use warden_errors::{AppError, AppResult};
use warden_ports::RecordGateway;

fn service_with(gateways: Gateways) -> AuthorizationService {
    AuthorizationService::new(gateways, Arc::new(RwLock::new(RelationStore::new())))
}

fn service() -> AuthorizationService {
    service_with(Gateways::in_memory())
}

async fn seeded_service() -> AuthorizationService {
    let service = service();
    let relation = RelationStore::with_relation(vec![
        ("admin", vec!["read", "write", "delete"]),
        ("user", vec!["read"]),
    ])
    .unwrap();
    service.sync_relation(relation.relation()).await.unwrap();
    service
}

// ============ 角色与权限 ============

#[tokio::test]
async fn test_read_roles_on_empty_storage() {
    let service = service();
    assert!(service.read_roles().await.unwrap().is_empty());
    assert!(service.read_permissions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_and_delete_roles() {
    let service = service();
    service.create_roles(&["admin", "user"]).await.unwrap();

    assert!(service.is_role_exist("admin").await.unwrap());
    let roles: Vec<String> = service
        .read_roles()
        .await
        .unwrap()
        .into_iter()
        .map(|role| role.name)
        .collect();
    assert_eq!(roles, vec!["admin", "user"]);

    service.delete_role("admin").await.unwrap();
    assert!(!service.is_role_exist("admin").await.unwrap());
    assert!(matches!(
        service.delete_role("admin").await,
        Err(RelationError::RoleNotFound(ref role)) if role == "admin"
    ));
}

#[tokio::test]
async fn test_create_roles_stops_at_first_duplicate() {
    let service = service();
    service.create_role("b").await.unwrap();

    let err = service.create_roles(&["a", "b", "c"]).await.unwrap_err();

    assert!(matches!(err, RelationError::RoleAlreadyExists(ref role) if role == "b"));
    assert!(service.is_role_exist("a").await.unwrap());
    assert!(!service.is_role_exist("c").await.unwrap());
}

#[tokio::test]
async fn test_empty_role_name_is_rejected() {
    let service = service();
    assert!(matches!(
        service.create_role("").await,
        Err(RelationError::InvalidIdentifier(_))
    ));
    assert!(service.read_roles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_permission_registry() {
    let service = service();
    service.create_permissions(&["read", "write"]).await.unwrap();

    assert!(matches!(
        service.create_permission("read").await,
        Err(RelationError::PermissionAlreadyRegistered(_))
    ));

    service.delete_permissions(&["read"]).await.unwrap();
    assert!(matches!(
        service.delete_permission("read").await,
        Err(RelationError::PermissionNotRegistered(_))
    ));

    let permissions = service.read_permissions().await.unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].name, "write");
}

// ============ 关联 ============

#[tokio::test]
async fn test_link_role_with_permissions() {
    let service = service();
    service.create_role("admin").await.unwrap();
    service.create_permissions(&["read", "write"]).await.unwrap();

    let linked = service
        .link_role_with_permissions("admin", &["read", "write"])
        .await
        .unwrap();

    assert_eq!(linked, 2);
    assert_eq!(
        service.linked_permissions("admin").await.unwrap(),
        vec!["read", "write"]
    );
}

#[tokio::test]
async fn test_link_skips_unregistered_permissions() {
    let service = service();
    service.create_role("admin").await.unwrap();
    service.create_permission("read").await.unwrap();

    let linked = service
        .link_role_with_permissions("admin", &["read", "publish"])
        .await
        .unwrap();

    assert_eq!(linked, 1);
}

#[tokio::test]
async fn test_link_fails_when_nothing_resolves() {
    let service = service();
    service.create_permission("read").await.unwrap();

    let err = service
        .link_role_with_permissions("ghost", &["read"])
        .await
        .unwrap_err();
    assert!(matches!(err, RelationError::Storage(AppError::NotFound(_))));

    service.create_role("admin").await.unwrap();
    let err = service
        .link_role_with_permissions("admin", &["publish"])
        .await
        .unwrap_err();
    assert!(matches!(err, RelationError::Storage(AppError::NotFound(_))));

    let none: [&str; 0] = [];
    assert_eq!(service.link_role_with_permissions("admin", &none).await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_link_is_a_conflict() {
    let service = seeded_service().await;

    let err = service
        .link_role_with_permissions("user", &["read"])
        .await
        .unwrap_err();
    assert!(err.is_uniqueness_violation());
}

#[tokio::test]
async fn test_sync_relation_is_idempotent() {
    let service = seeded_service().await;
    let relation = RelationStore::with_relation(vec![
        ("admin", vec!["read", "write", "delete"]),
        ("user", vec!["read", "write"]),
    ])
    .unwrap();

    service.sync_relation(relation.relation()).await.unwrap();
    service.sync_relation(relation.relation()).await.unwrap();

    assert_eq!(service.read_roles().await.unwrap().len(), 2);
    assert_eq!(service.read_permissions().await.unwrap().len(), 3);
    assert_eq!(
        service.linked_permissions("user").await.unwrap(),
        vec!["read", "write"]
    );
}

// ============ 主体 ============

#[tokio::test]
async fn test_principal_roles() {
    let service = seeded_service().await;
    let principal = PrincipalId::new();

    assert!(service.principal_roles(&principal).await.unwrap().is_empty());

    service.assign_role_to_principal(&principal, "user").await.unwrap();
    service.assign_role_to_principal(&principal, "admin").await.unwrap();

    let mut roles = service.principal_roles(&principal).await.unwrap();
    roles.sort();
    assert_eq!(roles, vec!["admin", "user"]);

    assert!(matches!(
        service.assign_role_to_principal(&principal, "ghost").await,
        Err(RelationError::RoleNotFound(_))
    ));
    assert!(
        service
            .assign_role_to_principal(&principal, "user")
            .await
            .unwrap_err()
            .is_uniqueness_violation()
    );
    assert!(service.principal_roles(&PrincipalId::new()).await.unwrap().is_empty());
}

// ============ 镜像加载与检查 ============

#[tokio::test]
async fn test_load_relation_rebuilds_shared_store() {
    let service = seeded_service().await;
    service.create_role("auditor").await.unwrap();
    service
        .store()
        .write()
        .await
        .add_role("stale")
        .unwrap();

    let count = service.load_relation().await.unwrap();

    assert_eq!(count, 3);
    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.roles(), vec!["admin", "user", "auditor"]);
    let admin: Vec<&str> = store
        .permissions("admin")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(admin, vec!["read", "write", "delete"]);
    assert!(store.permissions("auditor").unwrap().is_empty());
}

#[tokio::test]
async fn test_load_relation_keeps_role_order() {
    let service = service();
    let relation = RelationStore::with_relation(vec![
        ("admin", vec!["read"]),
        ("guest", vec![]),
        ("user", vec!["read"]),
    ])
    .unwrap();
    service.sync_relation(relation.relation()).await.unwrap();

    service.load_relation().await.unwrap();

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.roles(), vec!["admin", "guest", "user"]);
    assert!(store.permissions("guest").unwrap().is_empty());
}

#[tokio::test]
async fn test_load_relation_skips_links_of_deleted_roles() {
    let service = seeded_service().await;
    service.delete_role("admin").await.unwrap();

    service.load_relation().await.unwrap();

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.roles(), vec!["user"]);
}

#[tokio::test]
async fn test_checks_after_load() {
    let service = service();
    service.create_role("admin").await.unwrap();
    service.create_permissions(&["read", "write"]).await.unwrap();
    service
        .link_role_with_permissions("admin", &["read", "write"])
        .await
        .unwrap();
    service.load_relation().await.unwrap();

    assert!(service.check_any(&["write", "delete"]).await.is_ok());
    assert!(matches!(
        service.check_all(&["write", "delete"]).await,
        Err(RelationError::PermissionDenied)
    ));
    assert!(service.check_all(&["read", "write"]).await.is_ok());
}

// ============ 存储错误透传 ============

mock! {
    pub RoleGateway {}

    #[async_trait]
    impl RecordGateway<RoleRecord> for RoleGateway {
        async fn create(&self, records: &[NewRole]) -> AppResult<()>;
        async fn get_all(&self) -> AppResult<Vec<RoleRecord>>;
        async fn get(&self, filters: &[RoleFilter]) -> AppResult<Vec<RoleRecord>>;
        async fn count(&self, filter: &RoleFilter) -> AppResult<u64>;
        async fn update(&self, patch: &RolePatch, filter: &RoleFilter) -> AppResult<u64>;
        async fn delete(&self, filter: &RoleFilter) -> AppResult<u64>;
    }
}

#[tokio::test]
async fn test_storage_errors_propagate_unchanged() {
    let mut roles = MockRoleGateway::new();
    roles
        .expect_count()
        .returning(|_| Err(AppError::database("connection reset")));
    roles.expect_create().never();

    let gateways = Gateways {
        roles: Arc::new(roles),
        ..Gateways::in_memory()
    };
    let service = service_with(gateways);

    let err = service.create_role("admin").await.unwrap_err();
    assert!(matches!(
        err,
        RelationError::Storage(AppError::Database(ref msg)) if msg == "connection reset"
    ));
}

#[tokio::test]
async fn test_sync_relation_counts_each_role_once() {
    let mut roles = MockRoleGateway::new();
    roles.expect_count().times(1).returning(|_| Ok(0));
    roles.expect_create().times(1).returning(|_| Ok(()));
    roles.expect_get().times(1).returning(|_| {
        Ok(vec![RoleRecord {
            id: 1,
            name: "admin".into(),
            timestamps: Default::default(),
        }])
    });

    let gateways = Gateways {
        roles: Arc::new(roles),
        ..Gateways::in_memory()
    };
    let service = service_with(gateways);
    let relation = RelationStore::with_relation(vec![("admin", Vec::<&str>::new())]).unwrap();

    service.sync_relation(relation.relation()).await.unwrap();
}

#[tokio::test]
async fn test_sync_relation_creates_missing_permissions() {
    let gateways = Gateways::in_memory();
    let service = service_with(gateways.clone());
    let relation = RelationStore::with_relation(vec![("admin", vec!["read", "write"])]).unwrap();

    service.sync_relation(relation.relation()).await.unwrap();

    let permissions = gateways.permissions.get_all().await.unwrap();
    assert_eq!(permissions.len(), 2);
    assert_eq!(service.linked_permissions("admin").await.unwrap(), vec!["read", "write"]);
}

#[tokio::test]
async fn test_link_with_repeated_names_links_once() {
    let service = service();
    service.create_role("admin").await.unwrap();
    service.create_permission("read").await.unwrap();

    let linked = service
        .link_role_with_permissions("admin", &["read", "read"])
        .await
        .unwrap();

    assert_eq!(linked, 1);
}

#[tokio::test]
async fn test_role_gateway_errors_reach_load() {
    let mut roles = MockRoleGateway::new();
    roles
        .expect_get_all()
        .times(1)
        .returning(|| Err(AppError::database("down")));

    let gateways = Gateways {
        roles: Arc::new(roles),
        ..Gateways::in_memory()
    };
    let service = service_with(gateways);

    assert!(matches!(
        service.load_relation().await,
        Err(RelationError::Storage(AppError::Database(_)))
    ));
}

#[tokio::test]
async fn test_link_records_are_visible_through_gateway() {
    let gateways = Gateways::in_memory();
    let service = service_with(gateways.clone());
    service.create_role("admin").await.unwrap();
    service.create_permission("read").await.unwrap();
    service
        .link_role_with_permissions("admin", &["read"])
        .await
        .unwrap();

    let links = gateways.role_permissions.get_all().await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!((links[0].role_id, links[0].permission_id), (1, 1));
}
