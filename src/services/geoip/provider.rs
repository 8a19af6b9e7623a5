//! GeoIP Provider 抽象层
//!
//! 根据配置选择实现：
//! 1. `geoip.enabled = false` → 永远返回未知国家
//! 2. maxminddb_path 已配置且可读 → MaxMindProvider
//! 3. 否则 → ExternalApiProvider

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::external_api::ExternalApiProvider;
use super::maxmind::MaxMindProvider;
use crate::config::GeoIpConfig;
use crate::storage::CountryCode;
use crate::utils::ip::is_private_or_local;

/// IP → 国家代码
///
/// 查询失败、私有地址、无 IP 都返回 `ZZ`，调用方无需处理错误。
#[async_trait]
pub trait CountryLookup: Send + Sync {
    async fn country_of(&self, ip: Option<&str>) -> CountryCode;

    /// provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 具体实现只负责公网 IP 的查询
#[async_trait]
pub(super) trait CountrySource: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Option<CountryCode>;
    fn name(&self) -> &'static str;
}

/// 统一 GeoIP Provider
#[derive(Clone)]
pub struct GeoIpProvider {
    inner: Option<Arc<dyn CountrySource>>,
    timeout: Duration,
}

impl GeoIpProvider {
    pub fn new(config: &GeoIpConfig) -> Self {
        let timeout = Duration::from_millis(config.lookup_timeout_ms.max(1));

        if !config.enabled {
            info!("GeoIP: disabled, all impressions are attributed to {}", CountryCode::UNKNOWN);
            return Self {
                inner: None,
                timeout,
            };
        }

        let inner: Arc<dyn CountrySource> = match config.maxminddb_path.as_deref() {
            Some(path) if !path.is_empty() => match MaxMindProvider::new(path) {
                Ok(provider) => {
                    info!("GeoIP: Using MaxMind database at {}", path);
                    Arc::new(provider)
                }
                Err(e) => {
                    warn!(
                        "GeoIP: Failed to load MaxMind database at {}: {}, falling back to external API",
                        path, e
                    );
                    Arc::new(ExternalApiProvider::new(&config.api_url, timeout))
                }
            },
            _ => {
                debug!("GeoIP: No MaxMind database configured, using external API");
                Arc::new(ExternalApiProvider::new(&config.api_url, timeout))
            }
        };

        info!("GeoIP: Initialized with {} provider", inner.name());
        Self {
            inner: Some(inner),
            timeout,
        }
    }

    /// 关闭查询的 provider
    pub fn disabled() -> Self {
        Self {
            inner: None,
            timeout: Duration::from_millis(1),
        }
    }
}

#[async_trait]
impl CountryLookup for GeoIpProvider {
    async fn country_of(&self, ip: Option<&str>) -> CountryCode {
        let Some(inner) = &self.inner else {
            return CountryCode::unknown();
        };
        let Some(ip_addr) = ip.and_then(|ip| ip.trim().parse::<IpAddr>().ok()) else {
            return CountryCode::unknown();
        };
        if is_private_or_local(&ip_addr) {
            trace!("GeoIP: {} is private, skipping lookup", ip_addr);
            return CountryCode::unknown();
        }

        match tokio::time::timeout(self.timeout, inner.lookup(ip_addr)).await {
            Ok(Some(country)) => country,
            Ok(None) => CountryCode::unknown(),
            Err(_) => {
                warn!(
                    "GeoIP: {} lookup for {} timed out after {:?}",
                    inner.name(),
                    ip_addr,
                    self.timeout
                );
                CountryCode::unknown()
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.as_ref().map_or("Disabled", |inner| inner.name())
    }
}
