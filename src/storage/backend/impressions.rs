//! 曝光写入
//!
//! 天级汇总使用 upsert 累加，单条 SQL 完成，不做读后写。

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, ExprTrait,
    QueryFilter, QueryOrder,
    sea_query::{Expr, OnConflict},
};

use super::SeaOrmStorage;
use super::converters::{model_to_impression_total, raw_impression_to_active_model};
use crate::errors::Result;
use crate::storage::models::{AdId, ImpressionKey, ImpressionTotal, RawImpression};
use crate::storage::traits::ImpressionSink;

use migration::entities::{impression_daily, impression_log};

/// 冲突时的累加表达式
/// SQLite/PostgreSQL: view_count = view_count + excluded.view_count
/// MySQL: view_count = view_count + VALUES(view_count)
fn accumulate_on_conflict(backend: DatabaseBackend) -> OnConflict {
    let incoming = match backend {
        DatabaseBackend::MySql => Expr::cust("VALUES(view_count)"),
        _ => Expr::cust("excluded.view_count"),
    };

    OnConflict::columns([
        impression_daily::Column::AdId,
        impression_daily::Column::Country,
        impression_daily::Column::Day,
        impression_daily::Column::Placement,
    ])
    .value(
        impression_daily::Column::ViewCount,
        Expr::col((impression_daily::Entity, impression_daily::Column::ViewCount)).add(incoming),
    )
    .to_owned()
}

#[async_trait]
impl ImpressionSink for SeaOrmStorage {
    async fn record_aggregate(&self, key: &ImpressionKey) -> Result<()> {
        let db = &self.db;
        let backend = db.get_database_backend();

        self.retry
            .write("record_aggregate", || async {
                let model = impression_daily::ActiveModel {
                    ad_id: Set(key.ad_id.0),
                    country: Set(key.country.as_str().to_string()),
                    day: Set(key.day),
                    placement: Set(key.placement.as_ref().to_string()),
                    view_count: Set(1),
                    ..Default::default()
                };
                impression_daily::Entity::insert(model)
                    .on_conflict(accumulate_on_conflict(backend))
                    .exec_without_returning(db)
                    .await
            })
            .await?;
        Ok(())
    }

    async fn record_raw(&self, impression: &RawImpression) -> Result<()> {
        let db = &self.db;
        self.retry
            .write("record_raw", || async {
                impression_log::Entity::insert(raw_impression_to_active_model(impression))
                    .exec_without_returning(db)
                    .await
            })
            .await?;
        Ok(())
    }
}

impl SeaOrmStorage {
    /// 读取某广告的天级汇总（报表使用，引擎不读）
    pub async fn impression_totals(
        &self,
        ad_id: AdId,
        day: Option<NaiveDate>,
    ) -> Result<Vec<ImpressionTotal>> {
        let db = &self.db;
        let models = self
            .retry
            .read("impression_totals", || async {
                let mut query = impression_daily::Entity::find()
                    .filter(impression_daily::Column::AdId.eq(ad_id.0));
                if let Some(day) = day {
                    query = query.filter(impression_daily::Column::Day.eq(day));
                }
                query
                    .order_by_asc(impression_daily::Column::Day)
                    .order_by_asc(impression_daily::Column::Country)
                    .order_by_asc(impression_daily::Column::Placement)
                    .all(db)
                    .await
            })
            .await?;

        models.into_iter().map(model_to_impression_total).collect()
    }

    /// 逐条曝光日志条数
    pub async fn raw_impression_count(&self, ad_id: AdId) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let db = &self.db;
        let count = self
            .retry
            .read("raw_impression_count", || async {
                impression_log::Entity::find()
                    .filter(impression_log::Column::AdId.eq(ad_id.0))
                    .count(db)
                    .await
            })
            .await?;
        Ok(count)
    }
}
