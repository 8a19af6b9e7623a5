//! 访客档案与逐广告计数
//!
//! 计数行带有 epoch_start_ms，只有与档案 day_start_ms 相等的行才属于当前周期。
//! 所有变更都是单条条件语句，不依赖应用层的读-改-写。

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, ExprTrait, QueryFilter,
    sea_query::{Expr, OnConflict},
};
use tracing::debug;

use super::converters::profile_epoch;
use super::{SeaOrmStorage, ignore_not_inserted};
use crate::errors::{Result, SupplyrError};
use crate::storage::models::{AdId, VisitorId, VisitorProfile};
use crate::storage::traits::VisitorStore;

use migration::entities::{visitor_ad_view, visitor_profile};

#[async_trait]
impl VisitorStore for SeaOrmStorage {
    async fn load_profile(&self, identity: &VisitorId) -> Result<Option<VisitorProfile>> {
        let db = &self.db;
        let key = identity.as_str();

        let Some(model) = self
            .retry
            .read("load_profile", || async {
                visitor_profile::Entity::find_by_id(key.to_string())
                    .one(db)
                    .await
            })
            .await?
        else {
            return Ok(None);
        };

        let (identity, day_start) = profile_epoch(&model)?;
        let epoch_ms = model.day_start_ms;

        let rows = self
            .retry
            .read("load_views", || async {
                visitor_ad_view::Entity::find()
                    .filter(visitor_ad_view::Column::Identity.eq(key))
                    .filter(visitor_ad_view::Column::EpochStartMs.eq(epoch_ms))
                    .all(db)
                    .await
            })
            .await?;

        let views = rows
            .into_iter()
            .map(|row| (AdId(row.ad_id), Ord::max(row.view_count, 0) as u32))
            .collect();

        Ok(Some(VisitorProfile {
            identity,
            day_start,
            views,
            last_known_ip: model.last_known_ip,
        }))
    }

    async fn create_profile(
        &self,
        identity: &VisitorId,
        now: DateTime<Utc>,
    ) -> Result<VisitorProfile> {
        let db = &self.db;
        let inserted = self
            .retry
            .write("create_profile", || async {
                let model = visitor_profile::ActiveModel {
                    identity: Set(identity.as_str().to_string()),
                    day_start_ms: Set(now.timestamp_millis()),
                    last_known_ip: Set(None),
                    created_at: Set(now),
                };
                ignore_not_inserted(
                    visitor_profile::Entity::insert(model)
                        .on_conflict(
                            OnConflict::column(visitor_profile::Column::Identity)
                                .do_nothing()
                                .to_owned(),
                        )
                        .exec_without_returning(db)
                        .await,
                )
            })
            .await?;

        if inserted == 0 {
            debug!("Visitor profile {} already existed", identity);
        }

        // 并发创建时以存储中的那一份为准
        self.load_profile(identity).await?.ok_or_else(|| {
            SupplyrError::database_operation(format!(
                "visitor profile {} vanished after insert",
                identity
            ))
        })
    }

    async fn roll_epoch(
        &self,
        identity: &VisitorId,
        expected_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = &self.db;
        let key = identity.as_str();
        let expected_ms = expected_start.timestamp_millis();
        let now_ms = now.timestamp_millis();

        let result = self
            .retry
            .write("roll_epoch", || async {
                visitor_profile::Entity::update_many()
                    .col_expr(visitor_profile::Column::DayStartMs, Expr::value(now_ms))
                    .filter(visitor_profile::Column::Identity.eq(key))
                    .filter(visitor_profile::Column::DayStartMs.eq(expected_ms))
                    .exec(db)
                    .await
            })
            .await?;

        // 计数行从不删除：旧周期的行原地保留，持有旧周期的请求只会看到真实计数
        Ok(result.rows_affected == 1)
    }

    async fn try_increment_view(
        &self,
        identity: &VisitorId,
        ad_id: AdId,
        epoch_start: DateTime<Utc>,
        cap: u32,
    ) -> Result<bool> {
        let db = &self.db;
        let key = identity.as_str();
        let epoch_ms = epoch_start.timestamp_millis();
        let cap = i32::try_from(cap).unwrap_or(i32::MAX);

        // 1. 确保计数行存在
        self.retry
            .write("ensure_view_row", || async {
                let model = visitor_ad_view::ActiveModel {
                    identity: Set(key.to_string()),
                    ad_id: Set(ad_id.0),
                    epoch_start_ms: Set(epoch_ms),
                    view_count: Set(0),
                };
                ignore_not_inserted(
                    visitor_ad_view::Entity::insert(model)
                        .on_conflict(
                            OnConflict::columns([
                                visitor_ad_view::Column::Identity,
                                visitor_ad_view::Column::AdId,
                            ])
                            .do_nothing()
                            .to_owned(),
                        )
                        .exec_without_returning(db)
                        .await,
                )
            })
            .await?;

        // 2. 旧周期的行归零；单调条件保证同一周期只会重置一次
        self.retry
            .write("reset_stale_view", || async {
                visitor_ad_view::Entity::update_many()
                    .col_expr(visitor_ad_view::Column::ViewCount, Expr::value(0))
                    .col_expr(visitor_ad_view::Column::EpochStartMs, Expr::value(epoch_ms))
                    .filter(visitor_ad_view::Column::Identity.eq(key))
                    .filter(visitor_ad_view::Column::AdId.eq(ad_id.0))
                    .filter(visitor_ad_view::Column::EpochStartMs.lt(epoch_ms))
                    .exec(db)
                    .await
            })
            .await?;

        // 3. 未达上限才加一
        let result = self
            .retry
            .write("increment_view", || async {
                let mut update = visitor_ad_view::Entity::update_many()
                    .col_expr(
                        visitor_ad_view::Column::ViewCount,
                        Expr::col(visitor_ad_view::Column::ViewCount).add(1),
                    )
                    .filter(visitor_ad_view::Column::Identity.eq(key))
                    .filter(visitor_ad_view::Column::AdId.eq(ad_id.0))
                    .filter(visitor_ad_view::Column::EpochStartMs.eq(epoch_ms));
                if cap > 0 {
                    update = update.filter(visitor_ad_view::Column::ViewCount.lt(cap));
                }
                update.exec(db).await
            })
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn touch_ip(&self, identity: &VisitorId, ip: &str) -> Result<()> {
        let ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| SupplyrError::validation(format!("invalid client ip: {}", ip)))?;
        let db = &self.db;
        let key = identity.as_str();
        self.retry
            .write("touch_ip", || async {
                visitor_profile::Entity::update_many()
                    .col_expr(
                        visitor_profile::Column::LastKnownIp,
                        Expr::value(ip.to_string()),
                    )
                    .filter(visitor_profile::Column::Identity.eq(key))
                    .exec(db)
                    .await
            })
            .await?;
        Ok(())
    }
}
