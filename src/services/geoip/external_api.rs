//! 外部 GeoIP API 实现
//!
//! 内置 moka 缓存（含负缓存）与 singleflight，同一 IP 的并发查询只发一次 HTTP。

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{trace, warn};
use ureq::Agent;

use super::provider::CountrySource;
use crate::storage::CountryCode;

/// 缓存 TTL（15 分钟）
const GEOIP_CACHE_TTL_SECS: u64 = 15 * 60;
/// 缓存最大容量
const GEOIP_CACHE_MAX_CAPACITY: u64 = 10_000;

pub struct ExternalApiProvider {
    api_url_template: String,
    agent: Agent,
    cache: Cache<IpAddr, Option<CountryCode>>,
}

impl ExternalApiProvider {
    /// `api_url_template` 使用 `{ip}` 作为占位符
    pub fn new(api_url_template: &str, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(GEOIP_CACHE_TTL_SECS))
            .max_capacity(GEOIP_CACHE_MAX_CAPACITY)
            .build();

        Self {
            api_url_template: api_url_template.to_string(),
            agent,
            cache,
        }
    }

    /// 同步 HTTP 请求，在 spawn_blocking 中调用
    fn fetch_sync(agent: Agent, url: String) -> Option<CountryCode> {
        let resp = match agent.get(&url).call() {
            Ok(r) => r,
            Err(e) => {
                warn!("GeoIP API request to \"{}\" failed: {}", url, e);
                return None;
            }
        };

        let json: serde_json::Value = match resp.into_body().read_json() {
            Ok(j) => j,
            Err(e) => {
                warn!("GeoIP API response from \"{}\" parse failed: {}", url, e);
                return None;
            }
        };

        parse_country(&json)
    }

    async fn fetch(&self, ip: IpAddr) -> Option<CountryCode> {
        let url = self.api_url_template.replace("{ip}", &ip.to_string());
        let agent = self.agent.clone();

        tokio::task::spawn_blocking(move || Self::fetch_sync(agent, url))
            .await
            .unwrap_or_else(|e| {
                warn!("GeoIP spawn_blocking failed: {}", e);
                None
            })
    }
}

/// 兼容 ip-api.com 的 `countryCode` 以及常见的 `country_code` / `country` 字段
fn parse_country(json: &serde_json::Value) -> Option<CountryCode> {
    if json["status"].as_str() == Some("fail") {
        trace!("External API returned fail status");
        return None;
    }

    json["countryCode"]
        .as_str()
        .or_else(|| json["country_code"].as_str())
        .or_else(|| json["country"].as_str())
        .map(CountryCode::normalize)
}

#[async_trait]
impl CountrySource for ExternalApiProvider {
    async fn lookup(&self, ip: IpAddr) -> Option<CountryCode> {
        self.cache
            .get_with(ip, async {
                trace!("GeoIP cache miss for {}, fetching from API", ip);
                self.fetch(ip).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ExternalAPI"
    }
}
