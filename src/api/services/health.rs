use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, trace};

use crate::storage::SeaOrmStorage;

const STORE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthStorageCheck {
    pub status: &'static str,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub storage: HealthStorageCheck,
    pub response_time_ms: u64,
}

pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        storage: web::Data<Arc<SeaOrmStorage>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let backend = storage.backend_name().to_string();
        let storage_check = match tokio::time::timeout(STORE_CHECK_TIMEOUT, storage.ping()).await {
            Ok(Ok(())) => HealthStorageCheck {
                status: "healthy",
                backend,
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                HealthStorageCheck {
                    status: "unhealthy",
                    backend,
                    error: Some(format!("database error: {}", e.message())),
                }
            }
            Err(_) => {
                error!("Storage health check timeout");
                HealthStorageCheck {
                    status: "unhealthy",
                    backend,
                    error: Some("timeout".to_string()),
                }
            }
        };

        let is_healthy = storage_check.error.is_none();
        let now = chrono::Utc::now();
        let body = HealthResponse {
            status: storage_check.status,
            timestamp: now.to_rfc3339(),
            uptime: (now - app_start_time.start_datetime).num_seconds().max(0) as u64,
            storage: storage_check,
            response_time_ms: start_time.elapsed().as_millis() as u64,
        };

        let status = if is_healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        HttpResponse::build(status).json(body)
    }
}
