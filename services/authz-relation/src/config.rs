//! 服务配置

use serde::Deserialize;
use warden_config::{AppConfig, ConfigError};

use crate::domain::relation::{BulkMode, RelationStore};
use crate::error::RelationResult;

/// 启动时写入的角色及其权限
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeedRole {
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// `[relation]` 配置段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationConfig {
    #[serde(default)]
    pub bulk_mode: BulkMode,
    /// 按声明顺序写入
    #[serde(default)]
    pub seed: Vec<SeedRole>,
}

impl RelationConfig {
    /// 由种子数据构建关系存储，重复的角色报 `RoleAlreadyExists`
    pub fn build_store(&self) -> RelationResult<RelationStore> {
        let mut store = RelationStore::new().with_bulk_mode(self.bulk_mode);
        for seed in &self.seed {
            store.add_role_with_permissions(&seed.role, &seed.permissions)?;
        }
        Ok(store)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(flatten)]
    pub app: AppConfig,
    #[serde(default)]
    pub relation: RelationConfig,
}

impl ServiceConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        warden_config::load(config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    use crate::error::RelationError;

    #[test]
    fn test_relation_section_is_optional() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_ENV", "development");

            let config = ServiceConfig::load(".").map_err(|e| e.to_string())?;
            assert_eq!(config.relation.bulk_mode, BulkMode::PartialSuccess);
            assert!(config.relation.seed.is_empty());
            assert!(config.app.database.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_seed_keeps_declaration_order() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_ENV", "development");
            jail.create_file(
                "default.toml",
                r#"
                app_name = "authz"

                [relation]
                bulk_mode = "all_or_nothing"

                [[relation.seed]]
                role = "user"
                permissions = ["read"]

                [[relation.seed]]
                role = "admin"
                permissions = ["read", "write", "read"]

                [[relation.seed]]
                role = "guest"
                "#,
            )?;

            let config = ServiceConfig::load(".").map_err(|e| e.to_string())?;
            assert_eq!(config.app.app_name, "authz");
            assert_eq!(config.relation.bulk_mode, BulkMode::AllOrNothing);

            let store = config.relation.build_store().map_err(|e| e.to_string())?;
            assert_eq!(store.roles(), vec!["user", "admin", "guest"]);
            assert_eq!(store.permissions("admin").map_err(|e| e.to_string())?.len(), 2);
            assert_eq!(store.bulk_mode(), BulkMode::AllOrNothing);
            Ok(())
        });
    }

    #[test]
    fn test_duplicate_seed_role() {
        let config = RelationConfig {
            bulk_mode: BulkMode::PartialSuccess,
            seed: vec![
                SeedRole {
                    role: "admin".into(),
                    permissions: vec![],
                },
                SeedRole {
                    role: "admin".into(),
                    permissions: vec!["read".into()],
                },
            ],
        };

        assert!(matches!(
            config.build_store(),
            Err(RelationError::RoleAlreadyExists(ref role)) if role == "admin"
        ));
    }
}
