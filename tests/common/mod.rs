//! 集成测试公共部分：临时 SQLite 存储、固定国家、失败的曝光写入

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use supplyr::config::DatabaseConfig;
use supplyr::errors::{Result, SupplyrError};
use supplyr::services::{AdServer, AdServerSettings, CountryLookup, EngineStores, ServeRequest};
use supplyr::storage::{
    Ad, AdState, CountryCode, ImpressionKey, ImpressionSink, NewAd, RawImpression, SeaOrmStorage,
};

/// 创建临时 SQLite 数据库的存储实例（含迁移）
pub async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite", &DatabaseConfig::default())
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

/// 总是返回同一个国家
pub struct FixedCountry(pub &'static str);

#[async_trait]
impl CountryLookup for FixedCountry {
    async fn country_of(&self, _ip: Option<&str>) -> CountryCode {
        CountryCode::normalize(self.0)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// 所有写入都失败的曝光汇总
pub struct FailingSink;

#[async_trait]
impl ImpressionSink for FailingSink {
    async fn record_aggregate(&self, _key: &ImpressionKey) -> Result<()> {
        Err(SupplyrError::store_unavailable("aggregate store down"))
    }

    async fn record_raw(&self, _impression: &RawImpression) -> Result<()> {
        Err(SupplyrError::store_unavailable("log store down"))
    }
}

pub fn settings() -> AdServerSettings {
    AdServerSettings {
        sync_pixel_url: "/sync-ids".to_string(),
        enable_impression_log: true,
    }
}

pub fn build_server(storage: Arc<SeaOrmStorage>) -> AdServer {
    AdServer::new(
        EngineStores::from_single(storage),
        Arc::new(FixedCountry("US")),
        settings(),
    )
}

pub async fn insert_ad(
    storage: &SeaOrmStorage,
    name: &str,
    size: &str,
    price_micros: i64,
    frequency_cap: u32,
) -> Ad {
    storage
        .insert_ad(NewAd {
            name: name.to_string(),
            size: size.to_string(),
            state: AdState::Active,
            price_micros,
            frequency_cap,
            tag: format!("<div>{}</div>", name),
        })
        .await
        .expect("Failed to insert ad")
}

pub fn browser_request(size: &str, cookie: Option<&str>, now: DateTime<Utc>) -> ServeRequest {
    ServeRequest {
        size: size.to_string(),
        marker: None,
        cookie: cookie.map(str::to_string),
        external_id: None,
        client_ip: Some("203.0.113.7".to_string()),
        now,
    }
}
