//! 投放接口：`/iframe` 与 `/server-tag`

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use tracing::trace;

use super::helpers::{ApiSettings, error_response, visitor_cookie, wrap_tag};
use crate::services::{AdServer, ServeRequest, ServeResponse};
use crate::storage::ExternalSyncId;
use crate::utils::ip::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct IframeQuery {
    pub size: Option<String>,
    pub marker: Option<String>,
    /// 可选的外部同步 ID；已映射时沿用映射的身份
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerTagQuery {
    pub id: Option<String>,
    pub size: Option<String>,
    pub marker: Option<String>,
}

pub struct ServeService;

impl ServeService {
    /// 浏览器 iframe 投放，身份来自第一方 cookie，带 `id` 时以同步映射为准
    pub async fn iframe(
        req: HttpRequest,
        query: web::Query<IframeQuery>,
        server: web::Data<AdServer>,
        settings: web::Data<ApiSettings>,
    ) -> HttpResponse {
        let query = query.into_inner();
        trace!("iframe request: {:?}", query);

        let external_id = match query.id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(raw) => match ExternalSyncId::parse(raw) {
                Ok(id) => Some(id),
                Err(e) => return error_response(&e),
            },
            None => None,
        };

        let request = ServeRequest {
            size: query.size.unwrap_or_default(),
            marker: query.marker,
            cookie: visitor_cookie(&req),
            external_id,
            client_ip: extract_client_ip(&req, &settings.trusted_proxies),
            now: Utc::now(),
        };

        match server.serve(request).await {
            Ok(response) => {
                let mut builder = HttpResponse::Ok();
                builder.insert_header(("Content-Type", "text/html; charset=utf-8"));
                if response.set_cookie {
                    builder.cookie(settings.cookies.build(response.identity.as_str()));
                }
                builder.body(wrap_tag(served_tag(&response)))
            }
            Err(e) => error_response(&e),
        }
    }

    /// 服务端对服务端投放，身份来自外部同步 ID
    ///
    /// 调用方不是浏览器，因此不写 cookie；首次见到该 ID 时附带同步像素，
    /// 由浏览器访问 `/sync-ids` 完成确认。
    pub async fn server_tag(
        req: HttpRequest,
        query: web::Query<ServerTagQuery>,
        server: web::Data<AdServer>,
        settings: web::Data<ApiSettings>,
    ) -> HttpResponse {
        let query = query.into_inner();
        trace!("server-tag request: {:?}", query);

        let external_id = match ExternalSyncId::parse(query.id.as_deref().unwrap_or_default()) {
            Ok(id) => id,
            Err(e) => return error_response(&e),
        };

        let size = query
            .size
            .filter(|size| !size.trim().is_empty())
            .unwrap_or_else(|| settings.default_size.clone());

        let request = ServeRequest {
            size,
            marker: query.marker,
            cookie: None,
            external_id: Some(external_id),
            client_ip: extract_client_ip(&req, &settings.trusted_proxies),
            now: Utc::now(),
        };

        match server.serve(request).await {
            Ok(response) => {
                let mut body = served_tag(&response).to_string();
                if let Some(ref pixel) = response.sync_pixel {
                    body.push_str(&sync_pixel_tag(pixel));
                }
                HttpResponse::Ok()
                    .insert_header(("Content-Type", "text/html; charset=utf-8"))
                    .body(body)
            }
            Err(e) => error_response(&e),
        }
    }
}

fn served_tag(response: &ServeResponse) -> &str {
    response
        .outcome
        .served()
        .map(|ad| ad.tag.as_str())
        .unwrap_or_default()
}

fn sync_pixel_tag(url: &str) -> String {
    format!(
        r#"<img src="{}" width="1" height="1" style="display:none" alt="">"#,
        url.replace('"', "%22")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_pixel_tag() {
        assert_eq!(
            sync_pixel_tag("/sync-ids?id=abc"),
            r#"<img src="/sync-ids?id=abc" width="1" height="1" style="display:none" alt="">"#
        );
        assert!(!sync_pixel_tag("/x?id=\"><script>").contains("\">"));
    }
}
