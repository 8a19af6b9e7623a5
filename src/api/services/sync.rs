//! `/sync-ids`：浏览器端确认外部 ID 映射

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use tracing::debug;

use super::helpers::{ApiSettings, error_response, visitor_cookie};
use crate::api::constants::TRANSPARENT_GIF;
use crate::services::AdServer;
use crate::storage::ExternalSyncId;

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub id: Option<String>,
}

pub struct SyncService;

impl SyncService {
    /// 返回 1×1 透明 GIF，并把 cookie 设为映射后的身份
    pub async fn sync_ids(
        req: HttpRequest,
        query: web::Query<SyncQuery>,
        server: web::Data<AdServer>,
        settings: web::Data<ApiSettings>,
    ) -> HttpResponse {
        let external_id = match ExternalSyncId::parse(query.id.as_deref().unwrap_or_default()) {
            Ok(id) => id,
            Err(e) => return error_response(&e),
        };

        let cookie = visitor_cookie(&req);
        match server.confirm_sync(&external_id, cookie.as_deref()).await {
            Ok(confirmation) => {
                debug!(
                    "Sync pixel for {} resolved to {} (created: {})",
                    external_id, confirmation.identity, confirmation.created
                );
                HttpResponse::Ok()
                    .insert_header(("Content-Type", "image/gif"))
                    .cookie(settings.cookies.build(confirmation.identity.as_str()))
                    .body(TRANSPARENT_GIF)
            }
            Err(e) => error_response(&e),
        }
    }
}
