//! authz-relation - 角色-权限授权关系服务
//!
//! 维护角色到权限集合的映射，并据此判断一组权限是否满足。

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::AuthorizationService;
pub use domain::relation::{BulkMode, Relation, RelationStore, RolePermissionPair, SharedRelationStore};
pub use error::{RelationError, RelationResult};
