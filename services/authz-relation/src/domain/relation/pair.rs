use serde::{Deserialize, Serialize};

/// 扁平的 (角色, 权限) 对，用于分组重建关系
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermissionPair {
    pub role: String,
    pub permission: String,
}

impl RolePermissionPair {
    pub fn new(role: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            permission: permission.into(),
        }
    }
}

impl<R: Into<String>, P: Into<String>> From<(R, P)> for RolePermissionPair {
    fn from((role, permission): (R, P)) -> Self {
        Self::new(role, permission)
    }
}
