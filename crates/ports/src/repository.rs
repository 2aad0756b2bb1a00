//! 记录网关 trait 定义

use async_trait::async_trait;
use warden_errors::AppResult;

/// 持久化记录类型
///
/// 每种记录声明自己的新建载荷、过滤条件和更新补丁。
/// 过滤条件中的字段之间为 AND 关系，未设置的字段不参与匹配。
pub trait Record: Clone + Send + Sync + 'static {
    /// 新建记录时提交的字段
    type New: Clone + Send + Sync;
    /// 过滤条件
    type Filter: Clone + Default + Send + Sync;
    /// 更新补丁
    type Patch: Clone + Default + Send + Sync;

    /// 表名
    const TABLE: &'static str;
}

/// 通用记录网关
///
/// 影响零行的写操作视为失败：`create` 返回 `Internal`，`update`/`delete` 返回 `NotFound`；
/// `get`/`get_all` 查询结果为空时返回 `NotFound`。
#[async_trait]
pub trait RecordGateway<R: Record>: Send + Sync {
    /// 批量插入
    async fn create(&self, records: &[R::New]) -> AppResult<()>;

    /// 查询全部记录
    async fn get_all(&self) -> AppResult<Vec<R>>;

    /// 按条件查询，多个条件之间为 OR；条件列表为空时等同于 `get_all`
    async fn get(&self, filters: &[R::Filter]) -> AppResult<Vec<R>>;

    /// 统计匹配条件的记录数
    async fn count(&self, filter: &R::Filter) -> AppResult<u64>;

    /// 更新匹配条件的记录，返回受影响行数
    async fn update(&self, patch: &R::Patch, filter: &R::Filter) -> AppResult<u64>;

    /// 删除匹配条件的记录，返回受影响行数
    async fn delete(&self, filter: &R::Filter) -> AppResult<u64>;
}
