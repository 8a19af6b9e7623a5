use crate::api::services::ApiSettings;
use crate::config::StaticConfig;
use crate::services::{AdServer, AdServerSettings, CountryLookup, EngineStores, GeoIpProvider};
use crate::storage::{SeaOrmStorage, StorageFactory};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub ad_server: AdServer,
    pub api_settings: ApiSettings,
}

/// 准备服务器启动的上下文
/// 包括存储（含迁移）、国家解析和投放引擎
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install rustls crypto provider: {:?}", e))?;

    let storage = StorageFactory::create(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let geo: Arc<dyn CountryLookup> = Arc::new(GeoIpProvider::new(&config.geoip));
    info!("Country lookup provider: {}", geo.name());

    let ad_server = AdServer::new(
        EngineStores::from_single(storage.clone()),
        geo,
        AdServerSettings::from(&config.ad_server),
    );

    if config.ad_server.enable_impression_log {
        info!("Raw impression log enabled");
    }

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        storage,
        ad_server,
        api_settings: ApiSettings::from_config(config),
    })
}
