//! 广告写操作
//!
//! 广告的增改删属于库存管理方；这里只提供它所需的最小写入口，
//! 同时供测试与基准准备数据。

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, sea_query::Expr};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::{model_to_ad, new_ad_to_active_model};
use crate::errors::{Result, SupplyrError};
use crate::storage::models::{Ad, AdId, AdState, NewAd};

use migration::entities::ad;

impl SeaOrmStorage {
    pub async fn insert_ad(&self, new_ad: NewAd) -> Result<Ad> {
        let db = &self.db;
        let active = new_ad_to_active_model(&new_ad, Utc::now())?;

        let model = self
            .retry
            .write("insert_ad", || {
                let active = active.clone();
                async move { ad::Entity::insert(active).exec_with_returning(db).await }
            })
            .await?;

        let ad = model_to_ad(model)?;
        info!("Ad {} created ({}, {})", ad.id, ad.size, ad.state.as_ref());
        Ok(ad)
    }

    pub async fn set_ad_state(&self, id: AdId, state: AdState) -> Result<()> {
        self.update_ad_column(id, "set_ad_state", ad::Column::State, state.as_ref().to_string())
            .await
    }

    /// 软删除：行保留，不再参与候选
    pub async fn soft_delete_ad(&self, id: AdId) -> Result<()> {
        self.update_ad_column(id, "soft_delete_ad", ad::Column::Deleted, true)
            .await?;
        info!("Ad {} soft-deleted", id);
        Ok(())
    }

    async fn update_ad_column<V>(&self, id: AdId, op: &str, column: ad::Column, value: V) -> Result<()>
    where
        V: Into<sea_orm::Value> + Clone + Send + Sync,
    {
        let db = &self.db;
        let result = self
            .retry
            .write(op, || async {
                ad::Entity::update_many()
                    .col_expr(column, Expr::value(value.clone()))
                    .filter(ad::Column::Id.eq(id.0))
                    .exec(db)
                    .await
            })
            .await?;

        if result.rows_affected == 0 {
            return Err(SupplyrError::validation(format!("ad {} does not exist", id)));
        }
        Ok(())
    }
}
