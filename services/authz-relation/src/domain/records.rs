//! 持久化记录
//!
//! 四类记录：角色、权限、角色-权限关联、主体-角色关联。

use warden_common::{PrincipalId, Timestamps};
use warden_ports::Record;

// ============ 角色 ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFilter {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl RoleFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePatch {
    pub name: Option<String>,
}

impl RolePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Record for RoleRecord {
    type New = NewRole;
    type Filter = RoleFilter;
    type Patch = RolePatch;

    const TABLE: &'static str = "role";
}

// ============ 权限 ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    pub id: i64,
    pub name: String,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
}

impl NewPermission {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionFilter {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl PermissionFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPatch {
    pub name: Option<String>,
}

impl Record for PermissionRecord {
    type New = NewPermission;
    type Filter = PermissionFilter;
    type Patch = PermissionPatch;

    const TABLE: &'static str = "permission";
}

// ============ 角色-权限关联 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePermissionLink {
    pub id: i64,
    pub role_id: i64,
    pub permission_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRolePermissionLink {
    pub role_id: i64,
    pub permission_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePermissionFilter {
    pub id: Option<i64>,
    pub role_id: Option<i64>,
    pub permission_id: Option<i64>,
}

impl RolePermissionFilter {
    pub fn by_role(role_id: i64) -> Self {
        Self {
            role_id: Some(role_id),
            ..Default::default()
        }
    }

    pub fn by_permission(permission_id: i64) -> Self {
        Self {
            permission_id: Some(permission_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePermissionPatch {
    pub role_id: Option<i64>,
    pub permission_id: Option<i64>,
}

impl Record for RolePermissionLink {
    type New = NewRolePermissionLink;
    type Filter = RolePermissionFilter;
    type Patch = RolePermissionPatch;

    const TABLE: &'static str = "role_permission";
}

// ============ 主体-角色关联 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalRoleLink {
    pub id: i64,
    pub principal_id: PrincipalId,
    pub role_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPrincipalRoleLink {
    pub principal_id: PrincipalId,
    pub role_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalRoleFilter {
    pub id: Option<i64>,
    pub principal_id: Option<PrincipalId>,
    pub role_id: Option<i64>,
}

impl PrincipalRoleFilter {
    pub fn by_principal(principal_id: PrincipalId) -> Self {
        Self {
            principal_id: Some(principal_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalRolePatch {
    pub role_id: Option<i64>,
}

impl Record for PrincipalRoleLink {
    type New = NewPrincipalRoleLink;
    type Filter = PrincipalRoleFilter;
    type Patch = PrincipalRolePatch;

    const TABLE: &'static str = "principal_role";
}
