//! 内存记录网关
//!
//! 未配置数据库时使用，进程重启后数据丢失。
//! 错误语义与 PostgreSQL 实现一致，包括唯一约束冲突；不模拟外键级联。

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use warden_errors::{AppError, AppResult};
use warden_ports::{Record, RecordGateway};

use crate::domain::records::{
    PermissionFilter, PermissionPatch, PermissionRecord, PrincipalRoleFilter, PrincipalRoleLink,
    PrincipalRolePatch, RoleFilter, RolePatch, RolePermissionFilter, RolePermissionLink,
    RolePermissionPatch, RoleRecord,
};

/// 可存放在内存表中的记录
pub trait InMemoryRecord: Record {
    /// 以分配的 id 生成完整记录
    fn materialize(id: i64, new: &Self::New) -> Self;

    fn matches(&self, filter: &Self::Filter) -> bool;

    fn apply(&mut self, patch: &Self::Patch);

    /// 两条记录是否违反唯一约束
    fn conflicts_with(&self, other: &Self) -> bool;
}

fn field_matches<T: PartialEq>(expected: &Option<T>, actual: &T) -> bool {
    expected.as_ref().is_none_or(|expected| expected == actual)
}

#[derive(Debug)]
struct Table<R> {
    rows: Vec<R>,
    next_id: i64,
}

/// 内存记录网关
#[derive(Debug)]
pub struct InMemoryGateway<R> {
    table: Mutex<Table<R>>,
}

impl<R> InMemoryGateway<R> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl<R> Default for InMemoryGateway<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict<R: Record>() -> AppError {
    AppError::conflict(format!("Duplicate entry violates unique constraint on {}", R::TABLE))
}

fn nothing_matched<R: Record>() -> AppError {
    AppError::not_found(format!("No matching record in {}", R::TABLE))
}

#[async_trait]
impl<R: InMemoryRecord> RecordGateway<R> for InMemoryGateway<R> {
    async fn create(&self, records: &[R::New]) -> AppResult<()> {
        if records.is_empty() {
            return Err(AppError::internal("record not created"));
        }

        let mut table = self.table.lock().await;
        let mut next_id = table.next_id;
        let mut staged: Vec<R> = Vec::with_capacity(records.len());
        for new in records {
            let record = R::materialize(next_id, new);
            if table
                .rows
                .iter()
                .chain(staged.iter())
                .any(|existing| existing.conflicts_with(&record))
            {
                return Err(conflict::<R>());
            }
            staged.push(record);
            next_id += 1;
        }

        table.rows.extend(staged);
        table.next_id = next_id;
        debug!(table = R::TABLE, count = records.len(), "Records created");
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<R>> {
        let table = self.table.lock().await;
        if table.rows.is_empty() {
            return Err(AppError::not_found(format!("No records in {}", R::TABLE)));
        }
        Ok(table.rows.clone())
    }

    async fn get(&self, filters: &[R::Filter]) -> AppResult<Vec<R>> {
        if filters.is_empty() {
            return self.get_all().await;
        }

        let table = self.table.lock().await;
        let found: Vec<R> = table
            .rows
            .iter()
            .filter(|row| filters.iter().any(|filter| row.matches(filter)))
            .cloned()
            .collect();

        if found.is_empty() {
            return Err(nothing_matched::<R>());
        }
        Ok(found)
    }

    async fn count(&self, filter: &R::Filter) -> AppResult<u64> {
        let table = self.table.lock().await;
        Ok(table.rows.iter().filter(|row| row.matches(filter)).count() as u64)
    }

    async fn update(&self, patch: &R::Patch, filter: &R::Filter) -> AppResult<u64> {
        let mut table = self.table.lock().await;

        let mut updated = table.rows.clone();
        let mut affected = 0u64;
        for row in updated.iter_mut().filter(|row| row.matches(filter)) {
            row.apply(patch);
            affected += 1;
        }
        if affected == 0 {
            return Err(nothing_matched::<R>());
        }

        for (i, row) in updated.iter().enumerate() {
            if updated[i + 1..].iter().any(|other| row.conflicts_with(other)) {
                return Err(conflict::<R>());
            }
        }

        table.rows = updated;
        debug!(table = R::TABLE, affected, "Records updated");
        Ok(affected)
    }

    async fn delete(&self, filter: &R::Filter) -> AppResult<u64> {
        let mut table = self.table.lock().await;

        let before = table.rows.len();
        table.rows.retain(|row| !row.matches(filter));
        let removed = (before - table.rows.len()) as u64;
        if removed == 0 {
            return Err(nothing_matched::<R>());
        }

        debug!(table = R::TABLE, removed, "Records deleted");
        Ok(removed)
    }
}

// ============ 记录实现 ============

impl InMemoryRecord for RoleRecord {
    fn materialize(id: i64, new: &Self::New) -> Self {
        Self {
            id,
            name: new.name.clone(),
            timestamps: Default::default(),
        }
    }

    fn matches(&self, filter: &RoleFilter) -> bool {
        field_matches(&filter.id, &self.id) && field_matches(&filter.name, &self.name)
    }

    fn apply(&mut self, patch: &RolePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        self.timestamps.touch();
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl InMemoryRecord for PermissionRecord {
    fn materialize(id: i64, new: &Self::New) -> Self {
        Self {
            id,
            name: new.name.clone(),
            timestamps: Default::default(),
        }
    }

    fn matches(&self, filter: &PermissionFilter) -> bool {
        field_matches(&filter.id, &self.id) && field_matches(&filter.name, &self.name)
    }

    fn apply(&mut self, patch: &PermissionPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        self.timestamps.touch();
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl InMemoryRecord for RolePermissionLink {
    fn materialize(id: i64, new: &Self::New) -> Self {
        Self {
            id,
            role_id: new.role_id,
            permission_id: new.permission_id,
        }
    }

    fn matches(&self, filter: &RolePermissionFilter) -> bool {
        field_matches(&filter.id, &self.id)
            && field_matches(&filter.role_id, &self.role_id)
            && field_matches(&filter.permission_id, &self.permission_id)
    }

    fn apply(&mut self, patch: &RolePermissionPatch) {
        if let Some(role_id) = patch.role_id {
            self.role_id = role_id;
        }
        if let Some(permission_id) = patch.permission_id {
            self.permission_id = permission_id;
        }
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.role_id == other.role_id && self.permission_id == other.permission_id
    }
}

impl InMemoryRecord for PrincipalRoleLink {
    fn materialize(id: i64, new: &Self::New) -> Self {
        Self {
            id,
            principal_id: new.principal_id,
            role_id: new.role_id,
        }
    }

    fn matches(&self, filter: &PrincipalRoleFilter) -> bool {
        field_matches(&filter.id, &self.id)
            && field_matches(&filter.principal_id, &self.principal_id)
            && field_matches(&filter.role_id, &self.role_id)
    }

    fn apply(&mut self, patch: &PrincipalRolePatch) {
        if let Some(role_id) = patch.role_id {
            self.role_id = role_id;
        }
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.principal_id == other.principal_id && self.role_id == other.role_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::{NewPermission, NewRole, NewRolePermissionLink};

    async fn seeded_roles(names: &[&str]) -> InMemoryGateway<RoleRecord> {
        let gateway = InMemoryGateway::new();
        let records: Vec<NewRole> = names.iter().map(|name| NewRole::new(*name)).collect();
        gateway.create(&records).await.unwrap();
        gateway
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let gateway = seeded_roles(&["admin", "user"]).await;
        let roles = gateway.get_all().await.unwrap();

        let ids: Vec<i64> = roles.iter().map(|role| role.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(roles[1].name, "user");
    }

    #[tokio::test]
    async fn test_create_nothing_is_an_error() {
        let gateway = InMemoryGateway::<RoleRecord>::new();
        let err = gateway.create(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(ref msg) if msg == "record not created"));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_atomically() {
        let gateway = seeded_roles(&["admin"]).await;
        let err = gateway
            .create(&[NewRole::new("user"), NewRole::new("admin")])
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(gateway.count(&RoleFilter::default()).await.unwrap(), 1);

        let err = gateway
            .create(&[NewRole::new("guest"), NewRole::new("guest")])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_get_all_on_empty_table() {
        let gateway = InMemoryGateway::<PermissionRecord>::new();
        assert!(gateway.get_all().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_filters_are_or_fields_are_and() {
        let gateway = seeded_roles(&["admin", "user", "guest"]).await;

        let found = gateway
            .get(&[RoleFilter::by_name("admin"), RoleFilter::by_id(3)])
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|role| role.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "guest"]);

        let both = RoleFilter {
            id: Some(2),
            name: Some("admin".into()),
        };
        assert!(gateway.get(&[both]).await.unwrap_err().is_not_found());

        assert_eq!(gateway.get(&[]).await.unwrap().len(), 3);
        assert_eq!(gateway.count(&RoleFilter::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_touches_and_checks_uniqueness() {
        let gateway = seeded_roles(&["admin", "user"]).await;

        let affected = gateway
            .update(&RolePatch::rename("owner"), &RoleFilter::by_name("admin"))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let owner = gateway.get(&[RoleFilter::by_id(1)]).await.unwrap();
        assert_eq!(owner[0].name, "owner");
        assert!(owner[0].timestamps.updated_at >= owner[0].timestamps.created_at);

        let err = gateway
            .update(&RolePatch::rename("user"), &RoleFilter::by_id(1))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = gateway
            .update(&RolePatch::rename("x"), &RoleFilter::by_name("ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete() {
        let gateway = InMemoryGateway::<PermissionRecord>::new();
        gateway
            .create(&[NewPermission::new("read"), NewPermission::new("write")])
            .await
            .unwrap();

        let removed = gateway
            .delete(&PermissionFilter::by_name("read"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(
            gateway
                .delete(&PermissionFilter::by_name("read"))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_links_are_unique_per_pair() {
        let gateway = InMemoryGateway::<RolePermissionLink>::new();
        let link = NewRolePermissionLink {
            role_id: 1,
            permission_id: 2,
        };
        gateway.create(&[link]).await.unwrap();

        assert!(gateway.create(&[link]).await.unwrap_err().is_conflict());
        assert_eq!(
            gateway
                .count(&RolePermissionFilter::by_role(1))
                .await
                .unwrap(),
            1
        );
    }
}
