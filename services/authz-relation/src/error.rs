use std::fmt;

use thiserror::Error;
use warden_errors::AppError;

/// 标识符种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Role,
    Permission,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Role => write!(f, "Role"),
            IdentifierKind::Permission => write!(f, "Permission"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("Role {0} already exists")]
    RoleAlreadyExists(String),
    #[error("Role {0} does not exist")]
    RoleNotFound(String),
    #[error("Permission {permission} already exists in role {role}")]
    PermissionAlreadyExists { role: String, permission: String },
    #[error("Permission {permission} does not exist in role {role}")]
    PermissionNotFound { role: String, permission: String },
    #[error("Permission {0} is already registered")]
    PermissionAlreadyRegistered(String),
    #[error("Permission {0} is not registered")]
    PermissionNotRegistered(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("{0} identifier cannot be empty")]
    InvalidIdentifier(IdentifierKind),
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl RelationError {
    pub(crate) fn permission_exists(role: &str, permission: &str) -> Self {
        Self::PermissionAlreadyExists {
            role: role.to_string(),
            permission: permission.to_string(),
        }
    }

    pub(crate) fn permission_missing(role: &str, permission: &str) -> Self {
        Self::PermissionNotFound {
            role: role.to_string(),
            permission: permission.to_string(),
        }
    }

    /// 是否为唯一性冲突（包括存储层的唯一约束）
    pub fn is_uniqueness_violation(&self) -> bool {
        match self {
            RelationError::RoleAlreadyExists(_)
            | RelationError::PermissionAlreadyExists { .. }
            | RelationError::PermissionAlreadyRegistered(_) => true,
            RelationError::Storage(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<RelationError> for AppError {
    fn from(error: RelationError) -> Self {
        match error {
            RelationError::RoleNotFound(_)
            | RelationError::PermissionNotFound { .. }
            | RelationError::PermissionNotRegistered(_) => AppError::NotFound(error.to_string()),
            RelationError::RoleAlreadyExists(_)
            | RelationError::PermissionAlreadyExists { .. }
            | RelationError::PermissionAlreadyRegistered(_) => {
                AppError::Conflict(error.to_string())
            }
            RelationError::PermissionDenied => AppError::Forbidden(error.to_string()),
            RelationError::InvalidIdentifier(_) => AppError::Validation(error.to_string()),
            RelationError::Storage(e) => e,
        }
    }
}

pub type RelationResult<T> = Result<T, RelationError>;
