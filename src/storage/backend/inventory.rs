//! 广告库存读取

use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;

use super::SeaOrmStorage;
use super::converters::model_to_ad;
use crate::errors::Result;
use crate::storage::models::{Ad, AdId, AdState};
use crate::storage::traits::AdInventory;

use migration::entities::ad;

/// 转换失败的行记录警告后跳过，不影响其余候选
fn convert_rows(models: Vec<ad::Model>) -> Vec<Ad> {
    models
        .into_iter()
        .filter_map(|model| {
            let id = model.id;
            match model_to_ad(model) {
                Ok(ad) => Some(ad),
                Err(e) => {
                    warn!("Skipping malformed ad row {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl AdInventory for SeaOrmStorage {
    async fn candidates(&self, size: &str) -> Result<Vec<Ad>> {
        let db = &self.db;
        let models = self
            .retry
            .read("candidates", || async {
                ad::Entity::find()
                    .filter(ad::Column::Size.eq(size))
                    .filter(ad::Column::State.eq(AdState::Active.as_ref()))
                    .filter(ad::Column::Deleted.eq(false))
                    .order_by_desc(ad::Column::PriceMicros)
                    .order_by_asc(ad::Column::Id)
                    .all(db)
                    .await
            })
            .await?;

        Ok(convert_rows(models))
    }

    async fn ads_by_ids(&self, ids: &[AdId]) -> Result<Vec<Ad>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let db = &self.db;
        let models = self
            .retry
            .read("ads_by_ids", || async {
                ad::Entity::find()
                    .filter(ad::Column::Id.is_in(ids.iter().map(|id| id.0)))
                    .order_by_asc(ad::Column::Id)
                    .all(db)
                    .await
            })
            .await?;

        Ok(convert_rows(models))
    }
}
