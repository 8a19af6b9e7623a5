//! 广告投放决策引擎
//!
//! 请求 → 身份解析 → 候选排序与游标 → 逐个频次判定 → 条件自增占位 → 返回首个成功的广告。
//! 所有存储都在构造时注入。

mod frequency;
mod identity;
mod matcher;
mod recorder;
mod sync;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::{Result, SupplyrError};
use crate::services::geoip::CountryLookup;
use crate::storage::{
    AdId, AdInventory, ExternalSyncId, ImpressionSink, PlacementKind, SyncStore, VisitorId,
    VisitorStore,
};

pub use frequency::admits;
pub use identity::{IdentityResolver, Resolution};
pub use matcher::{CandidateMatcher, Cursor, rank_candidates, skip_past_marker};
pub use recorder::{Impression, ImpressionRecorder};
pub use sync::{SyncConfirmation, SyncMapper};

/// 引擎设置（来自 `[ad_server]`）
#[derive(Debug, Clone)]
pub struct AdServerSettings {
    pub sync_pixel_url: String,
    pub enable_impression_log: bool,
}

impl From<&crate::config::AdServerConfig> for AdServerSettings {
    fn from(config: &crate::config::AdServerConfig) -> Self {
        Self {
            sync_pixel_url: config.sync_pixel_url.clone(),
            enable_impression_log: config.enable_impression_log,
        }
    }
}

/// 注入引擎的存储集合
#[derive(Clone)]
pub struct EngineStores {
    pub inventory: Arc<dyn AdInventory>,
    pub visitors: Arc<dyn VisitorStore>,
    pub sync: Arc<dyn SyncStore>,
    pub impressions: Arc<dyn ImpressionSink>,
}

impl EngineStores {
    /// 一个实现同时承担全部存储角色
    pub fn from_single<S>(store: Arc<S>) -> Self
    where
        S: AdInventory + VisitorStore + SyncStore + ImpressionSink + 'static,
    {
        Self {
            inventory: store.clone(),
            visitors: store.clone(),
            sync: store.clone(),
            impressions: store,
        }
    }
}

/// 一次投放请求
#[derive(Debug, Clone)]
pub struct ServeRequest {
    pub size: String,
    pub marker: Option<String>,
    /// 请求携带的 `uuid` cookie 原值
    pub cookie: Option<String>,
    pub external_id: Option<ExternalSyncId>,
    pub client_ip: Option<String>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServedAd {
    pub ad_id: AdId,
    pub name: String,
    pub tag: String,
    pub tag_on_page: bool,
    pub placement: PlacementKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFillReason {
    /// 没有候选通过排序与频次过滤
    Exhausted,
    /// marker 无法解析或不在候选列表中
    InvalidCursor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    Served(ServedAd),
    NoFill(NoFillReason),
}

impl ServeOutcome {
    pub fn served(&self) -> Option<&ServedAd> {
        match self {
            ServeOutcome::Served(ad) => Some(ad),
            ServeOutcome::NoFill(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServeResponse {
    pub identity: VisitorId,
    pub outcome: ServeOutcome,
    /// 需要把 identity 写入 cookie
    pub set_cookie: bool,
    /// 首次见到外部 ID 时的同步像素地址
    pub sync_pixel: Option<String>,
}

/// 访客当前周期内的单个广告计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdViewCount {
    pub ad_id: AdId,
    pub name: Option<String>,
    pub views: u32,
    pub frequency_cap: Option<u32>,
}

/// `/cookie` 展示用的访客快照
#[derive(Debug, Clone, Serialize)]
pub struct VisitorSnapshot {
    pub identity: VisitorId,
    pub day_start: DateTime<Utc>,
    pub views: Vec<AdViewCount>,
}

#[derive(Clone)]
pub struct AdServer {
    resolver: IdentityResolver,
    matcher: CandidateMatcher,
    recorder: ImpressionRecorder,
    sync: SyncMapper,
    inventory: Arc<dyn AdInventory>,
    visitors: Arc<dyn VisitorStore>,
    settings: AdServerSettings,
}

impl AdServer {
    pub fn new(stores: EngineStores, geo: Arc<dyn CountryLookup>, settings: AdServerSettings) -> Self {
        let sync = SyncMapper::new(stores.sync);
        Self {
            resolver: IdentityResolver::new(stores.visitors.clone(), sync.clone()),
            matcher: CandidateMatcher::new(stores.inventory.clone()),
            recorder: ImpressionRecorder::new(
                stores.visitors.clone(),
                stores.impressions,
                geo,
                settings.enable_impression_log,
            ),
            sync,
            inventory: stores.inventory,
            visitors: stores.visitors,
            settings,
        }
    }

    /// 选出并记录一个广告
    ///
    /// 无结果是正常结果而非错误；只有参数错误和存储故障会返回 Err。
    pub async fn serve(&self, request: ServeRequest) -> Result<ServeResponse> {
        let size = request.size.trim();
        if size.is_empty() {
            return Err(SupplyrError::validation("size is required"));
        }

        self.serve_inner(size, &request)
            .await
            .inspect_err(|e| {
                if e.is_store_unavailable() {
                    error!("Serve for size {} aborted, store unavailable: {}", size, e)
                } else {
                    error!("Serve for size {} failed: {}", size, e)
                }
            })
    }

    async fn serve_inner(&self, size: &str, request: &ServeRequest) -> Result<ServeResponse> {
        let cursor = Cursor::from_marker(request.marker.as_deref());
        let tag_on_page = cursor.tag_on_page();

        let resolution = self
            .resolver
            .resolve(
                request.cookie.as_deref(),
                request.external_id.as_ref(),
                request.now,
            )
            .await?;

        let sync_pixel = match (&request.external_id, resolution.first_sync) {
            (Some(external), true) => Some(self.sync_pixel_url(external)),
            _ => None,
        };

        let ranked = self.matcher.candidates(size).await?;
        let outcome = match skip_past_marker(&ranked, cursor) {
            None => {
                debug!(
                    "Marker {:?} matches no candidate for size {}, no fill",
                    request.marker, size
                );
                ServeOutcome::NoFill(NoFillReason::InvalidCursor)
            }
            Some(remaining) => {
                self.walk(remaining, &resolution, request, tag_on_page)
                    .await?
            }
        };

        Ok(ServeResponse {
            identity: resolution.identity,
            outcome,
            set_cookie: resolution.set_cookie,
            sync_pixel,
        })
    }

    /// 依次尝试候选，第一个占位成功的即为结果
    async fn walk(
        &self,
        remaining: &[crate::storage::Ad],
        resolution: &Resolution,
        request: &ServeRequest,
        tag_on_page: bool,
    ) -> Result<ServeOutcome> {
        for ad in remaining {
            if !admits(ad, &resolution.profile) {
                debug!(
                    "Ad {} capped for {} ({}/{})",
                    ad.id,
                    resolution.identity,
                    resolution.profile.view_count(ad.id),
                    ad.frequency_cap
                );
                continue;
            }

            let claimed = self
                .recorder
                .record(Impression {
                    identity: &resolution.identity,
                    ad,
                    epoch_start: resolution.profile.day_start,
                    client_ip: request.client_ip.as_deref(),
                    tag_on_page,
                    now: request.now,
                })
                .await?;

            if claimed {
                debug!(
                    "Serving ad {} (price {:.2}) to {}",
                    ad.id,
                    ad.price(),
                    resolution.identity
                );
                return Ok(ServeOutcome::Served(ServedAd {
                    ad_id: ad.id,
                    name: ad.name.clone(),
                    tag: ad.tag.clone(),
                    tag_on_page,
                    placement: PlacementKind::from_tag_on_page(tag_on_page),
                }));
            }

            debug!(
                "Ad {} lost the last slot for {} to a concurrent request",
                ad.id, resolution.identity
            );
        }

        Ok(ServeOutcome::NoFill(NoFillReason::Exhausted))
    }

    fn sync_pixel_url(&self, external: &ExternalSyncId) -> String {
        let base = &self.settings.sync_pixel_url;
        let separator = if base.contains('?') { '&' } else { '?' };
        format!(
            "{}{}id={}",
            base,
            separator,
            urlencoding::encode(external.as_str())
        )
    }

    /// 浏览器端确认外部 ID 映射
    pub async fn confirm_sync(
        &self,
        external: &ExternalSyncId,
        cookie: Option<&str>,
    ) -> Result<SyncConfirmation> {
        let cookie_identity = cookie.and_then(VisitorId::parse);
        self.sync
            .confirm_from_browser(external, cookie_identity.as_ref())
            .await
    }

    /// 只读查看访客当前周期的计数；不创建档案，也不翻转周期
    pub async fn inspect_visitor(
        &self,
        cookie: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<VisitorSnapshot>> {
        let Some(identity) = cookie.and_then(VisitorId::parse) else {
            return Ok(None);
        };
        let Some(profile) = self.visitors.load_profile(&identity).await? else {
            return Ok(None);
        };

        let expired = profile.epoch_expired(now);
        let mut counts: Vec<(AdId, u32)> = if expired {
            Vec::new()
        } else {
            profile.views.iter().map(|(id, n)| (*id, *n)).collect()
        };
        counts.sort_by_key(|(id, _)| *id);

        let ids: Vec<AdId> = counts.iter().map(|(id, _)| *id).collect();
        let ads = self.inventory.ads_by_ids(&ids).await?;

        let views = counts
            .into_iter()
            .map(|(ad_id, views)| {
                let ad = ads.iter().find(|ad| ad.id == ad_id);
                AdViewCount {
                    ad_id,
                    name: ad.map(|ad| ad.name.clone()),
                    views,
                    frequency_cap: ad.map(|ad| ad.frequency_cap),
                }
            })
            .collect();

        Ok(Some(VisitorSnapshot {
            identity: profile.identity,
            day_start: if expired { now } else { profile.day_start },
            views,
        }))
    }
}
