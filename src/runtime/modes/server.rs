//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It configures and starts the HTTP server with all necessary routes.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders, from_fn},
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::middleware::request_context;
use crate::api::services::{AppStartTime, ad_routes, health_routes};
use crate::config::StaticConfig;
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// This function:
/// 1. Records startup time
/// 2. Prepares storage, geolocation and the ad server
/// 3. Configures and starts the HTTP server
/// 4. Listens for graceful shutdown signals
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let startup = lifetime::startup::prepare_server_startup(config)
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let storage = startup.storage.clone();
    let ad_server = web::Data::new(startup.ad_server);
    let api_settings = web::Data::new(startup.api_settings);

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    if config.server.trusted_proxies.is_empty() {
        warn!(
            "Client IP: no trusted proxies configured, forwarded headers are honoured from any peer. \
             Configure server.trusted_proxies when running behind a known proxy."
        );
    } else {
        warn!(
            "Client IP: trusted proxies configured: {:?}",
            config.server.trusted_proxies
        );
    }

    // Clone db reference before storage moves into HttpServer closure
    let db_for_shutdown = storage.get_db().clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(from_fn(request_context))
            .wrap(Compress::default())
            .app_data(web::Data::new(storage.clone()))
            .app_data(ad_server.clone())
            .app_data(api_settings.clone())
            .app_data(web::Data::new(app_start_time.clone()))
            .wrap(
                DefaultHeaders::new()
                    .add(("Connection", "keep-alive"))
                    .add(("Keep-Alive", "timeout=30, max=1000"))
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            // 空前缀的投放 scope 必须最后注册
            .service(health_routes())
            .service(ad_routes())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(&db_for_shutdown) => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}
