//! 访客身份解析
//!
//! 外部 ID 优先于 cookie；两者都没有时生成新身份。
//! 解析总会得到一个身份，只有存储不可达时才失败。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::sync::SyncMapper;
use crate::errors::Result;
use crate::storage::{ExternalSyncId, VisitorId, VisitorProfile, VisitorStore};

/// 解析结果
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: VisitorId,
    pub profile: VisitorProfile,
    /// 需要把身份写回 cookie
    pub set_cookie: bool,
    /// 本次请求新建了外部 ID 映射（需要下发同步像素）
    pub first_sync: bool,
}

#[derive(Clone)]
pub struct IdentityResolver {
    visitors: Arc<dyn VisitorStore>,
    sync: SyncMapper,
}

impl IdentityResolver {
    pub fn new(visitors: Arc<dyn VisitorStore>, sync: SyncMapper) -> Self {
        Self { visitors, sync }
    }

    pub async fn resolve(
        &self,
        cookie: Option<&str>,
        external: Option<&ExternalSyncId>,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        let cookie_identity = cookie.and_then(VisitorId::parse);

        let (identity, first_sync) = match external {
            Some(external) => {
                let mapping = self.sync.ensure_mapping(external).await?;
                (mapping.identity, mapping.created)
            }
            None => match &cookie_identity {
                Some(identity) => (identity.clone(), false),
                None => {
                    let identity = VisitorId::generate();
                    info!("Minted new visitor identity {}", identity);
                    (identity, false)
                }
            },
        };

        let set_cookie = cookie_identity.as_ref() != Some(&identity);
        let profile = self.load_current_profile(&identity, now).await?;

        Ok(Resolution {
            identity,
            profile,
            set_cookie,
            first_sync,
        })
    }

    /// 读取档案并保证其周期未过期；不存在则创建
    pub async fn load_current_profile(
        &self,
        identity: &VisitorId,
        now: DateTime<Utc>,
    ) -> Result<VisitorProfile> {
        let profile = match self.visitors.load_profile(identity).await? {
            Some(profile) => profile,
            None => self.visitors.create_profile(identity, now).await?,
        };

        if !profile.epoch_expired(now) {
            return Ok(profile);
        }

        if self
            .visitors
            .roll_epoch(identity, profile.day_start, now)
            .await?
        {
            debug!("Rolled counter epoch for {}", identity);
            return Ok(VisitorProfile {
                day_start: now,
                views: Default::default(),
                ..profile
            });
        }

        // 并发请求已完成翻转，读取其结果
        debug!("Epoch for {} rolled concurrently, reloading", identity);
        match self.visitors.load_profile(identity).await? {
            Some(profile) => Ok(profile),
            None => self.visitors.create_profile(identity, now).await,
        }
    }
}
