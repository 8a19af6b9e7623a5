//! 外部 ID 映射

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveValue::Set, EntityTrait, sea_query::OnConflict};

use super::{SeaOrmStorage, ignore_not_inserted};
use crate::errors::{Result, SupplyrError};
use crate::storage::models::{ExternalSyncId, VisitorId};
use crate::storage::traits::SyncStore;

use migration::entities::sync_mapping;

fn mapped_identity(model: sync_mapping::Model) -> Result<VisitorId> {
    VisitorId::parse(&model.identity).ok_or_else(|| {
        SupplyrError::invalid_record(format!(
            "sync mapping '{}' has malformed identity '{}'",
            model.external_sync_id, model.identity
        ))
    })
}

#[async_trait]
impl SyncStore for SeaOrmStorage {
    async fn lookup(&self, external: &ExternalSyncId) -> Result<Option<VisitorId>> {
        let db = &self.db;
        let model = self
            .retry
            .read("lookup_mapping", || async {
                sync_mapping::Entity::find_by_id(external.as_str().to_string())
                    .one(db)
                    .await
            })
            .await?;

        model.map(mapped_identity).transpose()
    }

    async fn insert_if_absent(
        &self,
        external: &ExternalSyncId,
        proposed: &VisitorId,
    ) -> Result<(VisitorId, bool)> {
        let db = &self.db;
        self.retry
            .write("insert_mapping", || async {
                let model = sync_mapping::ActiveModel {
                    external_sync_id: Set(external.as_str().to_string()),
                    identity: Set(proposed.as_str().to_string()),
                    created_at: Set(Utc::now()),
                };
                ignore_not_inserted(
                    sync_mapping::Entity::insert(model)
                        .on_conflict(
                            OnConflict::column(sync_mapping::Column::ExternalSyncId)
                                .do_nothing()
                                .to_owned(),
                        )
                        .exec_without_returning(db)
                        .await,
                )
            })
            .await?;

        // 回读：并发的首次调用收敛到同一个身份
        let winner = self.lookup(external).await?.ok_or_else(|| {
            SupplyrError::database_operation(format!(
                "sync mapping '{}' vanished after insert",
                external
            ))
        })?;
        let created = &winner == proposed;
        Ok((winner, created))
    }
}
