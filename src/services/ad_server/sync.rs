//! 外部 ID 同步
//!
//! 映射一经建立就不会改写。两个身份后来被发现属于同一访客时不会合并计数。

use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::storage::{ExternalSyncId, SyncStore, VisitorId};

/// 浏览器端确认同步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfirmation {
    pub identity: VisitorId,
    /// 本次调用是否新建了映射
    pub created: bool,
}

#[derive(Clone)]
pub struct SyncMapper {
    store: Arc<dyn SyncStore>,
}

impl SyncMapper {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    pub async fn lookup_mapping(&self, external: &ExternalSyncId) -> Result<Option<VisitorId>> {
        self.store.lookup(external).await
    }

    /// 已有映射直接返回；否则以新身份建立映射
    ///
    /// 并发的首次调用收敛到同一个身份，只有胜出者的 `created` 为 true。
    pub async fn ensure_mapping(&self, external: &ExternalSyncId) -> Result<SyncConfirmation> {
        if let Some(identity) = self.lookup_mapping(external).await? {
            return Ok(SyncConfirmation {
                identity,
                created: false,
            });
        }
        self.create(external, VisitorId::generate()).await
    }

    /// 浏览器端确认：新映射沿用已有 cookie 身份，已有映射保持不变
    pub async fn confirm_from_browser(
        &self,
        external: &ExternalSyncId,
        cookie: Option<&VisitorId>,
    ) -> Result<SyncConfirmation> {
        if let Some(identity) = self.lookup_mapping(external).await? {
            return Ok(SyncConfirmation {
                identity,
                created: false,
            });
        }
        let proposed = cookie.cloned().unwrap_or_else(VisitorId::generate);
        self.create(external, proposed).await
    }

    async fn create(&self, external: &ExternalSyncId, proposed: VisitorId) -> Result<SyncConfirmation> {
        let (identity, created) = self.store.insert_if_absent(external, &proposed).await?;
        if created {
            info!("New sync mapping: {} -> {}", external, identity);
        }
        Ok(SyncConfirmation { identity, created })
    }
}
