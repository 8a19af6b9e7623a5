//! 曝光记录
//!
//! 计数自增决定是否真正投放，失败会中止请求；
//! IP 刷新、天级汇总、逐条日志都是尽力而为，失败只记录警告。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::errors::Result;
use crate::services::geoip::CountryLookup;
use crate::storage::{
    Ad, ImpressionKey, ImpressionSink, PlacementKind, RawImpression, VisitorId, VisitorStore,
};

/// 一次待记录的曝光
#[derive(Debug, Clone, Copy)]
pub struct Impression<'a> {
    pub identity: &'a VisitorId,
    pub ad: &'a Ad,
    pub epoch_start: DateTime<Utc>,
    pub client_ip: Option<&'a str>,
    pub tag_on_page: bool,
    pub now: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ImpressionRecorder {
    visitors: Arc<dyn VisitorStore>,
    sink: Arc<dyn ImpressionSink>,
    geo: Arc<dyn CountryLookup>,
    enable_raw_log: bool,
}

impl ImpressionRecorder {
    pub fn new(
        visitors: Arc<dyn VisitorStore>,
        sink: Arc<dyn ImpressionSink>,
        geo: Arc<dyn CountryLookup>,
        enable_raw_log: bool,
    ) -> Self {
        Self {
            visitors,
            sink,
            geo,
            enable_raw_log,
        }
    }

    /// 占用一次展示名额并写遥测
    ///
    /// 返回 false 表示名额已被并发请求用完，调用方应继续尝试下一个候选。
    pub async fn record(&self, impression: Impression<'_>) -> Result<bool> {
        let Impression {
            identity,
            ad,
            epoch_start,
            client_ip,
            tag_on_page,
            now,
        } = impression;

        if !self
            .visitors
            .try_increment_view(identity, ad.id, epoch_start, ad.frequency_cap)
            .await?
        {
            return Ok(false);
        }

        if let Some(ip) = client_ip
            && let Err(e) = self.visitors.touch_ip(identity, ip).await
        {
            warn!("Failed to refresh last_known_ip for {}: {}", identity, e);
        }

        let country = self.geo.country_of(client_ip).await;
        let placement = PlacementKind::from_tag_on_page(tag_on_page);

        let key = ImpressionKey {
            ad_id: ad.id,
            country: country.clone(),
            day: now.date_naive(),
            placement,
        };
        if let Err(e) = self.sink.record_aggregate(&key).await {
            warn!(
                "Failed to record impression aggregate for ad {} ({}, {}): {}",
                ad.id,
                key.country,
                placement.as_ref(),
                e
            );
        }

        if self.enable_raw_log {
            let raw = RawImpression {
                ad_id: ad.id,
                identity: identity.clone(),
                served_at: now,
                tag_on_page,
                country,
                placement,
            };
            if let Err(e) = self.sink.record_raw(&raw).await {
                warn!("Failed to write raw impression for ad {}: {}", ad.id, e);
            }
        }

        Ok(true)
    }
}
