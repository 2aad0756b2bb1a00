//! PostgreSQL 记录网关
//!
//! 过滤条件用 `QueryBuilder` 拼接：条件之间为 OR，条件内字段为 AND。

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use warden_adapter_postgres::{QueryTimer, map_sqlx_error};
use warden_common::{PrincipalId, Timestamps};
use warden_errors::{AppError, AppResult};
use warden_ports::{Record, RecordGateway};

use crate::domain::records::{
    NewPermission, NewPrincipalRoleLink, NewRole, NewRolePermissionLink, PermissionFilter,
    PermissionPatch, PermissionRecord, PrincipalRoleFilter, PrincipalRoleLink,
    PrincipalRolePatch, RoleFilter, RolePatch, RolePermissionFilter, RolePermissionLink,
    RolePermissionPatch, RoleRecord,
};

/// 绑定参数
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    BigInt(i64),
    Text(String),
    Uuid(Uuid),
}

/// 记录与表结构的映射
pub trait PgRecord: Record {
    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin + Into<Self>;

    /// SELECT 列
    const COLUMNS: &'static str;
    /// INSERT 列，顺序与 `insert_values` 一致
    const INSERT_COLUMNS: &'static [&'static str];
    /// 更新时是否刷新 `updated_at`
    const TOUCHES_UPDATED_AT: bool = false;

    fn insert_values(new: &Self::New) -> Vec<SqlValue>;

    /// 过滤条件中已设置的字段；为空表示匹配全部
    fn filter_values(filter: &Self::Filter) -> Vec<(&'static str, SqlValue)>;

    fn patch_values(patch: &Self::Patch) -> Vec<(&'static str, SqlValue)>;
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
    match value {
        SqlValue::BigInt(v) => builder.push_bind(v),
        SqlValue::Text(v) => builder.push_bind(v),
        SqlValue::Uuid(v) => builder.push_bind(v),
    };
}

fn push_where<R: PgRecord>(builder: &mut QueryBuilder<'_, Postgres>, filters: &[R::Filter]) {
    let clauses: Vec<Vec<(&'static str, SqlValue)>> = filters.iter().map(R::filter_values).collect();
    // 任一空条件匹配全部记录
    if clauses.is_empty() || clauses.iter().any(Vec::is_empty) {
        return;
    }

    builder.push(" WHERE ");
    for (i, clause) in clauses.into_iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push("(");
        for (j, (column, value)) in clause.into_iter().enumerate() {
            if j > 0 {
                builder.push(" AND ");
            }
            builder.push(column).push(" = ");
            push_value(builder, value);
        }
        builder.push(")");
    }
}

fn insert_query<R: PgRecord>(records: &[R::New]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES ",
        R::TABLE,
        R::INSERT_COLUMNS.join(", ")
    ));

    for (i, new) in records.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push("(");
        for (j, value) in R::insert_values(new).into_iter().enumerate() {
            if j > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(")");
    }
    builder
}

fn select_query<R: PgRecord>(filters: &[R::Filter]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {} FROM {}", R::COLUMNS, R::TABLE));
    push_where::<R>(&mut builder, filters);
    builder.push(" ORDER BY id");
    builder
}

fn count_query<R: PgRecord>(filter: &R::Filter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", R::TABLE));
    push_where::<R>(&mut builder, std::slice::from_ref(filter));
    builder
}

fn update_query<R: PgRecord>(
    patch: &R::Patch,
    filter: &R::Filter,
) -> AppResult<QueryBuilder<'static, Postgres>> {
    let assignments = R::patch_values(patch);
    if assignments.is_empty() && !R::TOUCHES_UPDATED_AT {
        return Err(AppError::validation(format!("Nothing to update in {}", R::TABLE)));
    }

    let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", R::TABLE));
    let mut separated = false;
    for (column, value) in assignments {
        if separated {
            builder.push(", ");
        }
        builder.push(column).push(" = ");
        push_value(&mut builder, value);
        separated = true;
    }
    if R::TOUCHES_UPDATED_AT {
        if separated {
            builder.push(", ");
        }
        builder.push("updated_at = NOW()");
    }
    push_where::<R>(&mut builder, std::slice::from_ref(filter));
    Ok(builder)
}

fn delete_query<R: PgRecord>(filter: &R::Filter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("DELETE FROM {}", R::TABLE));
    push_where::<R>(&mut builder, std::slice::from_ref(filter));
    builder
}

/// PostgreSQL 记录网关
pub struct PostgresGateway<R> {
    pool: PgPool,
    _record: PhantomData<fn() -> R>,
}

impl<R> PostgresGateway<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: PgRecord> RecordGateway<R> for PostgresGateway<R> {
    async fn create(&self, records: &[R::New]) -> AppResult<()> {
        if records.is_empty() {
            return Err(AppError::internal("record not created"));
        }

        let mut builder = insert_query::<R>(records);
        let result = builder.build().execute(&self.pool).await;
        let done = QueryTimer::new(R::TABLE, "insert")
            .observe(result)
            .map_err(map_sqlx_error)?;

        if done.rows_affected() == 0 {
            return Err(AppError::internal("record not created"));
        }
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<R>> {
        self.get(&[]).await
    }

    async fn get(&self, filters: &[R::Filter]) -> AppResult<Vec<R>> {
        let mut builder = select_query::<R>(filters);
        let result = builder
            .build_query_as::<R::Row>()
            .fetch_all(&self.pool)
            .await;
        let rows = QueryTimer::new(R::TABLE, "select")
            .observe(result)
            .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Err(AppError::not_found(format!("No matching record in {}", R::TABLE)));
        }
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, filter: &R::Filter) -> AppResult<u64> {
        let mut builder = count_query::<R>(filter);
        let result = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await;
        let count = QueryTimer::new(R::TABLE, "count")
            .observe(result)
            .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn update(&self, patch: &R::Patch, filter: &R::Filter) -> AppResult<u64> {
        let mut builder = update_query::<R>(patch, filter)?;
        let result = builder.build().execute(&self.pool).await;
        let done = QueryTimer::new(R::TABLE, "update")
            .observe(result)
            .map_err(map_sqlx_error)?;

        match done.rows_affected() {
            0 => Err(AppError::not_found(format!("No matching record in {}", R::TABLE))),
            affected => Ok(affected),
        }
    }

    async fn delete(&self, filter: &R::Filter) -> AppResult<u64> {
        let mut builder = delete_query::<R>(filter);
        let result = builder.build().execute(&self.pool).await;
        let done = QueryTimer::new(R::TABLE, "delete")
            .observe(result)
            .map_err(map_sqlx_error)?;

        match done.rows_affected() {
            0 => Err(AppError::not_found(format!("No matching record in {}", R::TABLE))),
            affected => Ok(affected),
        }
    }
}

// ============ 行映射 ============

#[derive(Debug, FromRow)]
pub struct NamedRow {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NamedRow {
    fn timestamps(&self) -> Timestamps {
        Timestamps {
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<NamedRow> for RoleRecord {
    fn from(row: NamedRow) -> Self {
        let timestamps = row.timestamps();
        Self {
            id: row.id,
            name: row.name,
            timestamps,
        }
    }
}

impl From<NamedRow> for PermissionRecord {
    fn from(row: NamedRow) -> Self {
        let timestamps = row.timestamps();
        Self {
            id: row.id,
            name: row.name,
            timestamps,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RolePermissionRow {
    id: i64,
    role_id: i64,
    permission_id: i64,
}

impl From<RolePermissionRow> for RolePermissionLink {
    fn from(row: RolePermissionRow) -> Self {
        Self {
            id: row.id,
            role_id: row.role_id,
            permission_id: row.permission_id,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PrincipalRoleRow {
    id: i64,
    principal_id: Uuid,
    role_id: i64,
}

impl From<PrincipalRoleRow> for PrincipalRoleLink {
    fn from(row: PrincipalRoleRow) -> Self {
        Self {
            id: row.id,
            principal_id: PrincipalId::from_uuid(row.principal_id),
            role_id: row.role_id,
        }
    }
}

// ============ 表映射 ============

const NAMED_COLUMNS: &str = "id, name, created_at, updated_at";

fn named_filter(id: Option<i64>, name: &Option<String>) -> Vec<(&'static str, SqlValue)> {
    let mut values = Vec::new();
    if let Some(id) = id {
        values.push(("id", SqlValue::BigInt(id)));
    }
    if let Some(name) = name {
        values.push(("name", SqlValue::Text(name.clone())));
    }
    values
}

impl PgRecord for RoleRecord {
    type Row = NamedRow;

    const COLUMNS: &'static str = NAMED_COLUMNS;
    const INSERT_COLUMNS: &'static [&'static str] = &["name"];
    const TOUCHES_UPDATED_AT: bool = true;

    fn insert_values(new: &NewRole) -> Vec<SqlValue> {
        vec![SqlValue::Text(new.name.clone())]
    }

    fn filter_values(filter: &RoleFilter) -> Vec<(&'static str, SqlValue)> {
        named_filter(filter.id, &filter.name)
    }

    fn patch_values(patch: &RolePatch) -> Vec<(&'static str, SqlValue)> {
        patch
            .name
            .iter()
            .map(|name| ("name", SqlValue::Text(name.clone())))
            .collect()
    }
}

impl PgRecord for PermissionRecord {
    type Row = NamedRow;

    const COLUMNS: &'static str = NAMED_COLUMNS;
    const INSERT_COLUMNS: &'static [&'static str] = &["name"];
    const TOUCHES_UPDATED_AT: bool = true;

    fn insert_values(new: &NewPermission) -> Vec<SqlValue> {
        vec![SqlValue::Text(new.name.clone())]
    }

    fn filter_values(filter: &PermissionFilter) -> Vec<(&'static str, SqlValue)> {
        named_filter(filter.id, &filter.name)
    }

    fn patch_values(patch: &PermissionPatch) -> Vec<(&'static str, SqlValue)> {
        patch
            .name
            .iter()
            .map(|name| ("name", SqlValue::Text(name.clone())))
            .collect()
    }
}

impl PgRecord for RolePermissionLink {
    type Row = RolePermissionRow;

    const COLUMNS: &'static str = "id, role_id, permission_id";
    const INSERT_COLUMNS: &'static [&'static str] = &["role_id", "permission_id"];

    fn insert_values(new: &NewRolePermissionLink) -> Vec<SqlValue> {
        vec![
            SqlValue::BigInt(new.role_id),
            SqlValue::BigInt(new.permission_id),
        ]
    }

    fn filter_values(filter: &RolePermissionFilter) -> Vec<(&'static str, SqlValue)> {
        [
            ("id", filter.id),
            ("role_id", filter.role_id),
            ("permission_id", filter.permission_id),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, SqlValue::BigInt(v))))
        .collect()
    }

    fn patch_values(patch: &RolePermissionPatch) -> Vec<(&'static str, SqlValue)> {
        [("role_id", patch.role_id), ("permission_id", patch.permission_id)]
            .into_iter()
            .filter_map(|(column, value)| value.map(|v| (column, SqlValue::BigInt(v))))
            .collect()
    }
}

impl PgRecord for PrincipalRoleLink {
    type Row = PrincipalRoleRow;

    const COLUMNS: &'static str = "id, principal_id, role_id";
    const INSERT_COLUMNS: &'static [&'static str] = &["principal_id", "role_id"];

    fn insert_values(new: &NewPrincipalRoleLink) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(new.principal_id.0),
            SqlValue::BigInt(new.role_id),
        ]
    }

    fn filter_values(filter: &PrincipalRoleFilter) -> Vec<(&'static str, SqlValue)> {
        let mut values = Vec::new();
        if let Some(id) = filter.id {
            values.push(("id", SqlValue::BigInt(id)));
        }
        if let Some(principal_id) = filter.principal_id {
            values.push(("principal_id", SqlValue::Uuid(principal_id.0)));
        }
        if let Some(role_id) = filter.role_id {
            values.push(("role_id", SqlValue::BigInt(role_id)));
        }
        values
    }

    fn patch_values(patch: &PrincipalRolePatch) -> Vec<(&'static str, SqlValue)> {
        patch
            .role_id
            .map(|role_id| ("role_id", SqlValue::BigInt(role_id)))
            .into_iter()
            .collect()
    }
}
