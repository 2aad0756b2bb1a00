//! 角色-权限关系存储

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use metrics::counter;
use tokio::sync::RwLock;
use tracing::debug;

use super::bulk::BulkMode;
use super::pair::RolePermissionPair;
use crate::error::{IdentifierKind, RelationError, RelationResult};

/// 单个角色的权限集合（去重，保持首次插入顺序）
pub type PermissionSet = IndexSet<String>;

/// 角色 → 权限集合（保持角色插入顺序）
pub type Relation = IndexMap<String, PermissionSet>;

/// 多任务共享的关系存储：检查可并发读，变更串行写
pub type SharedRelationStore = Arc<RwLock<RelationStore>>;

pub(crate) fn check_identifier(kind: IdentifierKind, value: &str) -> RelationResult<()> {
    if value.is_empty() {
        return Err(RelationError::InvalidIdentifier(kind));
    }
    Ok(())
}

fn collect_permissions<I, S>(permissions: I) -> RelationResult<PermissionSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    permissions
        .into_iter()
        .map(|permission| {
            let permission = permission.as_ref();
            check_identifier(IdentifierKind::Permission, permission)?;
            Ok(permission.to_string())
        })
        .collect()
}

fn record_check(mode: &'static str, granted: bool) {
    let outcome = if granted { "granted" } else { "denied" };
    counter!("authz_permission_checks_total", "mode" => mode, "outcome" => outcome).increment(1);
}

/// 角色-权限关系存储
///
/// 关系只能通过这里的操作变更，每次变更都会校验唯一性与存在性。
/// 存储本身不加锁，跨任务共享时使用 [`SharedRelationStore`]。
#[derive(Debug, Clone, Default)]
pub struct RelationStore {
    relation: Relation,
    bulk_mode: BulkMode,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定映射初始化，校验规则同 [`RelationStore::replace_relation`]
    pub fn with_relation<M, K, P, S>(mapping: M) -> RelationResult<Self>
    where
        M: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        store.replace_relation(mapping)?;
        Ok(store)
    }

    pub fn with_bulk_mode(mut self, mode: BulkMode) -> Self {
        self.bulk_mode = mode;
        self
    }

    pub fn bulk_mode(&self) -> BulkMode {
        self.bulk_mode
    }

    // ============ 变更 ============

    /// 添加一个没有权限的角色
    pub fn add_role(&mut self, role: &str) -> RelationResult<()> {
        self.add_role_with_permissions(role, std::iter::empty::<&str>())
    }

    /// 添加角色及其初始权限（初始权限自动去重）
    pub fn add_role_with_permissions<I, S>(&mut self, role: &str, permissions: I) -> RelationResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        check_identifier(IdentifierKind::Role, role)?;
        if self.relation.contains_key(role) {
            return Err(RelationError::RoleAlreadyExists(role.to_string()));
        }
        let permissions = collect_permissions(permissions)?;

        debug!(role, permissions = permissions.len(), "Role added");
        self.relation.insert(role.to_string(), permissions);
        Ok(())
    }

    /// 按顺序添加多个角色
    ///
    /// 遇到第一个已存在的角色时返回 `RoleAlreadyExists`；
    /// `PartialSuccess` 模式下此前已添加的角色保留。
    pub fn add_roles<I, S>(&mut self, roles: I) -> RelationResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles: Vec<S> = roles.into_iter().collect();

        if self.bulk_mode.is_all_or_nothing() {
            let mut batch = HashSet::new();
            for role in &roles {
                let role = role.as_ref();
                check_identifier(IdentifierKind::Role, role)?;
                if self.relation.contains_key(role) || !batch.insert(role) {
                    return Err(RelationError::RoleAlreadyExists(role.to_string()));
                }
            }
        }

        for role in &roles {
            self.add_role(role.as_ref())?;
        }
        Ok(())
    }

    /// 为角色添加权限，先检查角色存在，再检查权限重复
    pub fn add_permission(&mut self, role: &str, permission: &str) -> RelationResult<()> {
        check_identifier(IdentifierKind::Permission, permission)?;
        let permissions = self.permission_set_mut(role)?;
        if permissions.contains(permission) {
            return Err(RelationError::permission_exists(role, permission));
        }

        permissions.insert(permission.to_string());
        debug!(role, permission, "Permission added");
        Ok(())
    }

    /// 为角色按顺序添加多个权限
    ///
    /// 角色只在开始时检查一次。批内重复也视为重复。
    pub fn add_permissions<I, S>(&mut self, role: &str, permissions: I) -> RelationResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates: Vec<S> = permissions.into_iter().collect();
        let all_or_nothing = self.bulk_mode.is_all_or_nothing();
        let permissions = self.permission_set_mut(role)?;

        if all_or_nothing {
            let mut batch = HashSet::new();
            for permission in &candidates {
                let permission = permission.as_ref();
                check_identifier(IdentifierKind::Permission, permission)?;
                if permissions.contains(permission) || !batch.insert(permission) {
                    return Err(RelationError::permission_exists(role, permission));
                }
            }
        }

        for permission in &candidates {
            let permission = permission.as_ref();
            check_identifier(IdentifierKind::Permission, permission)?;
            if !permissions.insert(permission.to_string()) {
                return Err(RelationError::permission_exists(role, permission));
            }
        }

        debug!(role, added = candidates.len(), "Permissions added");
        Ok(())
    }

    /// 删除角色及其全部权限
    pub fn remove_role(&mut self, role: &str) -> RelationResult<()> {
        match self.relation.shift_remove(role) {
            Some(permissions) => {
                debug!(role, permissions = permissions.len(), "Role removed");
                Ok(())
            }
            None => Err(RelationError::RoleNotFound(role.to_string())),
        }
    }

    /// 按顺序删除多个角色，遇到第一个不存在的角色时返回 `RoleNotFound`
    pub fn remove_roles<I, S>(&mut self, roles: I) -> RelationResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles: Vec<S> = roles.into_iter().collect();

        if self.bulk_mode.is_all_or_nothing() {
            let mut batch = HashSet::new();
            for role in &roles {
                let role = role.as_ref();
                if !self.relation.contains_key(role) || !batch.insert(role) {
                    return Err(RelationError::RoleNotFound(role.to_string()));
                }
            }
        }

        for role in &roles {
            self.remove_role(role.as_ref())?;
        }
        Ok(())
    }

    /// 删除角色下的单个权限
    ///
    /// 角色不存在返回 `RoleNotFound`，角色存在但没有该权限返回 `PermissionNotFound`。
    pub fn remove_permission(&mut self, role: &str, permission: &str) -> RelationResult<()> {
        let permissions = self.permission_set_mut(role)?;
        if !permissions.shift_remove(permission) {
            return Err(RelationError::permission_missing(role, permission));
        }

        debug!(role, permission, "Permission removed");
        Ok(())
    }

    /// 按顺序删除角色下的多个权限，角色只在开始时检查一次
    pub fn remove_permissions<I, S>(&mut self, role: &str, permissions: I) -> RelationResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates: Vec<S> = permissions.into_iter().collect();
        let all_or_nothing = self.bulk_mode.is_all_or_nothing();
        let permissions = self.permission_set_mut(role)?;

        if all_or_nothing {
            let mut batch = HashSet::new();
            for permission in &candidates {
                let permission = permission.as_ref();
                if !permissions.contains(permission) || !batch.insert(permission) {
                    return Err(RelationError::permission_missing(role, permission));
                }
            }
        }

        for permission in &candidates {
            let permission = permission.as_ref();
            if !permissions.shift_remove(permission) {
                return Err(RelationError::permission_missing(role, permission));
            }
        }

        debug!(role, removed = candidates.len(), "Permissions removed");
        Ok(())
    }

    /// 整体替换关系
    ///
    /// 不做存在性/唯一性检查；输入的权限集合会被去重，同名角色的权限会合并。
    /// 任一标识符为空时返回 `InvalidIdentifier`，原关系保持不变。
    pub fn replace_relation<M, K, P, S>(&mut self, mapping: M) -> RelationResult<()>
    where
        M: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut relation = Relation::new();
        for (role, permissions) in mapping {
            let role = role.into();
            check_identifier(IdentifierKind::Role, &role)?;
            let permissions = collect_permissions(permissions)?;
            relation.entry(role).or_default().extend(permissions);
        }

        debug!(roles = relation.len(), "Relation replaced");
        self.relation = relation;
        Ok(())
    }

    /// 由扁平的 (角色, 权限) 对分组重建
    ///
    /// 角色按首次出现顺序处理；每个角色的权限为与其配对的全部权限（去重，保持首次出现顺序）。
    /// 遇到已存在的角色返回 `RoleAlreadyExists`，`PartialSuccess` 模式下排在它之前的角色已插入。
    pub fn group_role_with_permissions(&mut self, pairs: &[RolePermissionPair]) -> RelationResult<()> {
        let mut grouped: IndexMap<&str, PermissionSet> = IndexMap::new();
        for pair in pairs {
            check_identifier(IdentifierKind::Role, &pair.role)?;
            check_identifier(IdentifierKind::Permission, &pair.permission)?;
            grouped
                .entry(pair.role.as_str())
                .or_default()
                .insert(pair.permission.clone());
        }

        if self.bulk_mode.is_all_or_nothing() {
            if let Some(role) = grouped.keys().find(|role| self.relation.contains_key(**role)) {
                return Err(RelationError::RoleAlreadyExists(role.to_string()));
            }
        }

        for (role, permissions) in grouped {
            if self.relation.contains_key(role) {
                return Err(RelationError::RoleAlreadyExists(role.to_string()));
            }
            debug!(role, permissions = permissions.len(), "Role grouped");
            self.relation.insert(role.to_string(), permissions);
        }
        Ok(())
    }

    // ============ 查询 ============

    /// 按插入顺序返回全部角色
    pub fn roles(&self) -> Vec<&str> {
        self.relation.keys().map(String::as_str).collect()
    }

    pub fn permissions(&self, role: &str) -> RelationResult<&PermissionSet> {
        self.relation
            .get(role)
            .ok_or_else(|| RelationError::RoleNotFound(role.to_string()))
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn into_relation(self) -> Relation {
        self.relation
    }

    pub fn contains_role(&self, role: &str) -> bool {
        self.relation.contains_key(role)
    }

    /// 指定角色是否拥有某权限
    pub fn has_permission(&self, role: &str, permission: &str) -> bool {
        self.relation
            .get(role)
            .is_some_and(|permissions| permissions.contains(permission))
    }

    pub fn len(&self) -> usize {
        self.relation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }

    // ============ 权限满足检查 ============

    /// 至少一个候选权限出现在任意角色中则通过
    ///
    /// 不区分角色；需要按角色检查时使用 [`RelationStore::has_permission`]。
    pub fn check_contain_one_of_permissions<S: AsRef<str>>(&self, candidates: &[S]) -> RelationResult<()> {
        let granted = candidates
            .iter()
            .any(|candidate| self.is_granted(candidate.as_ref()));
        record_check("one_of", granted);

        if granted {
            Ok(())
        } else {
            debug!(candidates = candidates.len(), "None of the permissions is granted");
            Err(RelationError::PermissionDenied)
        }
    }

    /// 每个候选权限都至少出现在某个角色中才通过（不要求是同一个角色）
    pub fn check_contain_all_of_permissions<S: AsRef<str>>(&self, candidates: &[S]) -> RelationResult<()> {
        let missing = candidates
            .iter()
            .map(|candidate| candidate.as_ref())
            .find(|candidate| !self.is_granted(candidate));
        record_check("all_of", missing.is_none());

        match missing {
            Some(permission) => {
                debug!(permission, "Permission is not granted by any role");
                Err(RelationError::PermissionDenied)
            }
            None => Ok(()),
        }
    }

    fn is_granted(&self, permission: &str) -> bool {
        self.relation
            .values()
            .any(|permissions| permissions.contains(permission))
    }

    fn permission_set_mut(&mut self, role: &str) -> RelationResult<&mut PermissionSet> {
        self.relation
            .get_mut(role)
            .ok_or_else(|| RelationError::RoleNotFound(role.to_string()))
    }
}
