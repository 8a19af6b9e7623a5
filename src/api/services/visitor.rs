//! `/cookie` 与 `/reset`：排查用的访客接口

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde_json::json;

use super::helpers::{ApiSettings, error_response, visitor_cookie};
use crate::services::AdServer;

pub struct VisitorService;

impl VisitorService {
    /// 当前周期内的计数；没有有效 cookie 或档案时返回空视图
    pub async fn show_cookie(req: HttpRequest, server: web::Data<AdServer>) -> HttpResponse {
        let cookie = visitor_cookie(&req);
        match server.inspect_visitor(cookie.as_deref(), Utc::now()).await {
            Ok(Some(snapshot)) => HttpResponse::Ok().json(snapshot),
            Ok(None) => HttpResponse::Ok().json(json!({
                "identity": null,
                "day_start": null,
                "views": [],
            })),
            Err(e) => error_response(&e),
        }
    }

    pub async fn reset(settings: web::Data<ApiSettings>) -> HttpResponse {
        HttpResponse::Ok()
            .insert_header(("Content-Type", "text/plain; charset=utf-8"))
            .cookie(settings.cookies.build_expired())
            .body("cookie cleared")
    }
}
