//! 数据库迁移

use warden_adapter_postgres::Migration;

/// 按版本排列的全部迁移
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_role",
            r#"
            CREATE TABLE IF NOT EXISTS role (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(16) NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .with_down("DROP TABLE IF EXISTS role"),
        Migration::new(
            2,
            "create_permission",
            r#"
            CREATE TABLE IF NOT EXISTS permission (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(32) NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .with_down("DROP TABLE IF EXISTS permission"),
        Migration::new(
            3,
            "create_role_permission",
            r#"
            CREATE TABLE IF NOT EXISTS role_permission (
                id BIGSERIAL PRIMARY KEY,
                role_id BIGINT NOT NULL REFERENCES role (id) ON DELETE CASCADE,
                permission_id BIGINT NOT NULL REFERENCES permission (id) ON DELETE CASCADE,
                UNIQUE (role_id, permission_id)
            )
            "#,
        )
        .with_down("DROP TABLE IF EXISTS role_permission"),
        Migration::new(
            4,
            "create_principal_role",
            r#"
            CREATE TABLE IF NOT EXISTS principal_role (
                id BIGSERIAL PRIMARY KEY,
                principal_id UUID NOT NULL,
                role_id BIGINT NOT NULL REFERENCES role (id) ON DELETE CASCADE,
                UNIQUE (principal_id, role_id)
            )
            "#,
        )
        .with_down("DROP TABLE IF EXISTS principal_role"),
    ]
}
