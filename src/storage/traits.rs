//! 存储接口
//!
//! 引擎只通过这些 trait 访问状态，具体实现在构造时注入。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    Ad, AdId, ExternalSyncId, ImpressionKey, RawImpression, VisitorId, VisitorProfile,
};
use crate::errors::Result;

/// 只读广告库存视图
#[async_trait]
pub trait AdInventory: Send + Sync {
    /// 指定尺寸下可投放的广告：active 且未删除，
    /// 按出价降序、id 升序排列
    async fn candidates(&self, size: &str) -> Result<Vec<Ad>>;

    /// 按 id 批量读取（包括已删除/停用的广告）
    async fn ads_by_ids(&self, ids: &[AdId]) -> Result<Vec<Ad>>;
}

/// 访客档案与逐广告计数
#[async_trait]
pub trait VisitorStore: Send + Sync {
    /// 读取档案，只包含当前周期内的计数
    async fn load_profile(&self, identity: &VisitorId) -> Result<Option<VisitorProfile>>;

    /// 不存在则以 `now` 为周期起点创建，然后返回当前存储中的档案
    async fn create_profile(&self, identity: &VisitorId, now: DateTime<Utc>)
    -> Result<VisitorProfile>;

    /// 周期翻转（CAS）：仅当存储中的起点仍为 `expected_start` 时才改为 `now`
    ///
    /// 返回是否由本次调用完成翻转。
    async fn roll_epoch(
        &self,
        identity: &VisitorId,
        expected_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// 未达上限时原子地把计数加一，返回是否成功
    ///
    /// `cap == 0` 表示不限次数。
    async fn try_increment_view(
        &self,
        identity: &VisitorId,
        ad_id: AdId,
        epoch_start: DateTime<Utc>,
        cap: u32,
    ) -> Result<bool>;

    async fn touch_ip(&self, identity: &VisitorId, ip: &str) -> Result<()>;
}

/// 外部 ID 与内部身份的映射
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn lookup(&self, external: &ExternalSyncId) -> Result<Option<VisitorId>>;

    /// 不存在时写入 `proposed`，返回最终生效的身份及是否由本次写入
    async fn insert_if_absent(
        &self,
        external: &ExternalSyncId,
        proposed: &VisitorId,
    ) -> Result<(VisitorId, bool)>;
}

/// 曝光遥测（只写）
#[async_trait]
pub trait ImpressionSink: Send + Sync {
    /// 天级汇总 upsert 并加一
    async fn record_aggregate(&self, key: &ImpressionKey) -> Result<()>;

    /// 逐条曝光日志
    async fn record_raw(&self, impression: &RawImpression) -> Result<()>;
}
