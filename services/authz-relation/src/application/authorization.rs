//! 授权应用服务
//!
//! 角色、权限及其关联持久化在网关中，内存中的关系存储是它们的镜像，
//! 权限检查只读镜像。

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};
use warden_common::PrincipalId;
use warden_errors::AppResult;

use crate::domain::records::{
    NewPermission, NewPrincipalRoleLink, NewRole, NewRolePermissionLink, PermissionFilter,
    PermissionRecord, PrincipalRoleFilter, RoleFilter, RolePermissionFilter, RoleRecord,
};
use crate::domain::relation::{Relation, RelationStore, SharedRelationStore, check_identifier};
use crate::error::{IdentifierKind, RelationError, RelationResult};
use crate::infrastructure::Gateways;

/// 查询结果为空时返回空列表
fn or_empty<T>(result: AppResult<Vec<T>>) -> AppResult<Vec<T>> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// 请求中未能解析的权限名称（去重，保持请求顺序）
fn unresolved_permissions<'a, S: AsRef<str>>(
    requested: &'a [S],
    resolved: &[PermissionRecord],
) -> Vec<&'a str> {
    let found: HashSet<&str> = resolved.iter().map(|permission| permission.name.as_str()).collect();
    let mut seen = HashSet::new();
    requested
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| !found.contains(name) && seen.insert(*name))
        .collect()
}

pub struct AuthorizationService {
    gateways: Gateways,
    store: SharedRelationStore,
}

impl AuthorizationService {
    pub fn new(gateways: Gateways, store: SharedRelationStore) -> Self {
        Self { gateways, store }
    }

    /// 共享的关系存储
    pub fn store(&self) -> SharedRelationStore {
        self.store.clone()
    }

    // ============ 角色 ============

    pub async fn is_role_exist(&self, role: &str) -> RelationResult<bool> {
        Ok(self.gateways.roles.count(&RoleFilter::by_name(role)).await? > 0)
    }

    pub async fn create_role(&self, role: &str) -> RelationResult<()> {
        check_identifier(IdentifierKind::Role, role)?;
        if self.is_role_exist(role).await? {
            return Err(RelationError::RoleAlreadyExists(role.to_string()));
        }

        self.gateways.roles.create(&[NewRole::new(role)]).await?;
        info!(role, "Role created");
        Ok(())
    }

    /// 按顺序创建，遇到第一个失败即返回，此前已创建的保留
    pub async fn create_roles<S: AsRef<str>>(&self, roles: &[S]) -> RelationResult<()> {
        for role in roles {
            self.create_role(role.as_ref()).await?;
        }
        Ok(())
    }

    pub async fn read_roles(&self) -> RelationResult<Vec<RoleRecord>> {
        Ok(or_empty(self.gateways.roles.get_all().await)?)
    }

    /// 删除角色，关联记录由外键级联删除
    pub async fn delete_role(&self, role: &str) -> RelationResult<()> {
        if !self.is_role_exist(role).await? {
            return Err(RelationError::RoleNotFound(role.to_string()));
        }

        self.gateways.roles.delete(&RoleFilter::by_name(role)).await?;
        info!(role, "Role deleted");
        Ok(())
    }

    pub async fn delete_roles<S: AsRef<str>>(&self, roles: &[S]) -> RelationResult<()> {
        for role in roles {
            self.delete_role(role.as_ref()).await?;
        }
        Ok(())
    }

    async fn role_id(&self, role: &str) -> RelationResult<i64> {
        let found = match self.gateways.roles.get(&[RoleFilter::by_name(role)]).await {
            Err(e) if e.is_not_found() => Vec::new(),
            other => other?,
        };
        found
            .first()
            .map(|record| record.id)
            .ok_or_else(|| RelationError::RoleNotFound(role.to_string()))
    }

    // ============ 权限 ============

    pub async fn is_permission_exist(&self, permission: &str) -> RelationResult<bool> {
        Ok(self
            .gateways
            .permissions
            .count(&PermissionFilter::by_name(permission))
            .await?
            > 0)
    }

    pub async fn create_permission(&self, permission: &str) -> RelationResult<()> {
        check_identifier(IdentifierKind::Permission, permission)?;
        if self.is_permission_exist(permission).await? {
            return Err(RelationError::PermissionAlreadyRegistered(permission.to_string()));
        }

        self.gateways
            .permissions
            .create(&[NewPermission::new(permission)])
            .await?;
        info!(permission, "Permission created");
        Ok(())
    }

    pub async fn create_permissions<S: AsRef<str>>(&self, permissions: &[S]) -> RelationResult<()> {
        for permission in permissions {
            self.create_permission(permission.as_ref()).await?;
        }
        Ok(())
    }

    pub async fn read_permissions(&self) -> RelationResult<Vec<PermissionRecord>> {
        Ok(or_empty(self.gateways.permissions.get_all().await)?)
    }

    pub async fn delete_permission(&self, permission: &str) -> RelationResult<()> {
        if !self.is_permission_exist(permission).await? {
            return Err(RelationError::PermissionNotRegistered(permission.to_string()));
        }

        self.gateways
            .permissions
            .delete(&PermissionFilter::by_name(permission))
            .await?;
        info!(permission, "Permission deleted");
        Ok(())
    }

    pub async fn delete_permissions<S: AsRef<str>>(&self, permissions: &[S]) -> RelationResult<()> {
        for permission in permissions {
            self.delete_permission(permission.as_ref()).await?;
        }
        Ok(())
    }

    // ============ 关联 ============

    /// 为角色关联权限，返回新建的关联数
    ///
    /// 角色或全部权限都无法按名称解析时返回存储层的 `NotFound`；
    /// 部分权限无法解析时只关联已解析的部分。
    pub async fn link_role_with_permissions<S: AsRef<str>>(
        &self,
        role: &str,
        permissions: &[S],
    ) -> RelationResult<usize> {
        if permissions.is_empty() {
            return Ok(0);
        }

        let roles = self.gateways.roles.get(&[RoleFilter::by_name(role)]).await?;
        let Some(role_record) = roles.first() else {
            return Err(RelationError::RoleNotFound(role.to_string()));
        };

        let filters: Vec<PermissionFilter> = permissions
            .iter()
            .map(|permission| PermissionFilter::by_name(permission.as_ref()))
            .collect();
        let resolved = self.gateways.permissions.get(&filters).await?;
        let unresolved = unresolved_permissions(permissions, &resolved);
        if !unresolved.is_empty() {
            warn!(role, ?unresolved, "Some permissions are not registered");
        }

        let links: Vec<NewRolePermissionLink> = resolved
            .iter()
            .map(|permission| NewRolePermissionLink {
                role_id: role_record.id,
                permission_id: permission.id,
            })
            .collect();
        self.gateways.role_permissions.create(&links).await?;

        info!(role, linked = links.len(), "Role linked with permissions");
        Ok(links.len())
    }

    /// 角色已关联的权限名称
    pub async fn linked_permissions(&self, role: &str) -> RelationResult<Vec<String>> {
        let role_id = self.role_id(role).await?;
        let links = or_empty(
            self.gateways
                .role_permissions
                .get(&[RolePermissionFilter::by_role(role_id)])
                .await,
        )?;
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let filters: Vec<PermissionFilter> = links
            .iter()
            .map(|link| PermissionFilter::by_id(link.permission_id))
            .collect();
        let permissions = or_empty(self.gateways.permissions.get(&filters).await)?;
        Ok(permissions.into_iter().map(|permission| permission.name).collect())
    }

    /// 将关系写入存储：补齐缺失的角色、权限和关联，已有记录保持不变
    pub async fn sync_relation(&self, relation: &Relation) -> RelationResult<()> {
        for (role, permissions) in relation {
            if !self.is_role_exist(role).await? {
                self.gateways.roles.create(&[NewRole::new(role)]).await?;
                info!(role, "Role created");
            }
            for permission in permissions {
                if !self.is_permission_exist(permission).await? {
                    self.gateways
                        .permissions
                        .create(&[NewPermission::new(permission)])
                        .await?;
                    info!(permission, "Permission created");
                }
            }

            let linked: HashSet<String> = self.linked_permissions(role).await?.into_iter().collect();
            let missing: Vec<&str> = permissions
                .iter()
                .map(String::as_str)
                .filter(|permission| !linked.contains(*permission))
                .collect();
            self.link_role_with_permissions(role, &missing).await?;
        }
        Ok(())
    }

    // ============ 主体 ============

    pub async fn assign_role_to_principal(
        &self,
        principal_id: &PrincipalId,
        role: &str,
    ) -> RelationResult<()> {
        let role_id = self.role_id(role).await?;
        self.gateways
            .principal_roles
            .create(&[NewPrincipalRoleLink {
                principal_id: *principal_id,
                role_id,
            }])
            .await?;

        info!(principal_id = %principal_id, role, "Role assigned");
        Ok(())
    }

    /// 主体持有的角色名称
    pub async fn principal_roles(&self, principal_id: &PrincipalId) -> RelationResult<Vec<String>> {
        let links = or_empty(
            self.gateways
                .principal_roles
                .get(&[PrincipalRoleFilter::by_principal(*principal_id)])
                .await,
        )?;
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let filters: Vec<RoleFilter> = links.iter().map(|link| RoleFilter::by_id(link.role_id)).collect();
        let roles = or_empty(self.gateways.roles.get(&filters).await)?;
        Ok(roles.into_iter().map(|role| role.name).collect())
    }

    // ============ 镜像 ============

    /// 从存储重建关系并替换共享存储中的内容，返回角色数
    ///
    /// 角色按 id 顺序加入，每个角色的权限按关联 id 顺序排列。
    pub async fn load_relation(&self) -> RelationResult<usize> {
        let mut roles = or_empty(self.gateways.roles.get_all().await)?;
        roles.sort_by_key(|role| role.id);
        let permissions = or_empty(self.gateways.permissions.get_all().await)?;
        let mut links = or_empty(self.gateways.role_permissions.get_all().await)?;
        links.sort_by_key(|link| (link.role_id, link.id));

        let role_ids: HashSet<i64> = roles.iter().map(|role| role.id).collect();
        let permission_names: HashMap<i64, &str> = permissions
            .iter()
            .map(|permission| (permission.id, permission.name.as_str()))
            .collect();

        let mut grouped: HashMap<i64, Vec<&str>> = HashMap::new();
        let mut linked = 0usize;
        for link in &links {
            match permission_names.get(&link.permission_id) {
                Some(permission) if role_ids.contains(&link.role_id) => {
                    grouped.entry(link.role_id).or_default().push(*permission);
                    linked += 1;
                }
                _ => warn!(link_id = link.id, "Skipping dangling role-permission link"),
            }
        }

        let bulk_mode = self.store.read().await.bulk_mode();
        let mut fresh = RelationStore::new().with_bulk_mode(bulk_mode);
        for role in &roles {
            let permissions = grouped.get(&role.id).map(Vec::as_slice).unwrap_or_default();
            fresh.add_role_with_permissions(&role.name, permissions)?;
        }

        let count = fresh.len();
        self.store.write().await.replace_relation(fresh.into_relation())?;
        info!(roles = count, links = linked, "Relation loaded");
        Ok(count)
    }

    // ============ 检查 ============

    pub async fn check_any<S: AsRef<str>>(&self, candidates: &[S]) -> RelationResult<()> {
        self.store.read().await.check_contain_one_of_permissions(candidates)
    }

    pub async fn check_all<S: AsRef<str>>(&self, candidates: &[S]) -> RelationResult<()> {
        self.store.read().await.check_contain_all_of_permissions(candidates)
    }
}
