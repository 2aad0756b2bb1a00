//! 角色-权限关系领域模块

mod bulk;
mod pair;
mod store;


pub use bulk::BulkMode;
pub use pair::RolePermissionPair;
pub use store::{PermissionSet, Relation, RelationStore, SharedRelationStore};
pub(crate) use store::check_identifier;
