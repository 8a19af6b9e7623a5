//! HTTP surface tests
//!
//! Drives the actix-web routes end to end against a temporary SQLite store.

mod common;

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::middleware::from_fn;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use serde_json::Value;

use common::{build_server, create_temp_storage, insert_ad};
use supplyr::api::constants::{REQUEST_ID_HEADER, TRANSPARENT_GIF, VISITOR_COOKIE_NAME};
use supplyr::api::middleware::request_context;
use supplyr::api::services::{ApiSettings, AppStartTime, ad_routes, health_routes};
use supplyr::config::StaticConfig;
use supplyr::storage::{SeaOrmStorage, VisitorId};

fn api_settings() -> ApiSettings {
    let mut config = StaticConfig::default();
    config.ad_server.default_size = "300x250".to_string();
    ApiSettings::from_config(&config)
}

/// 按生产环境的顺序组装路由；空前缀的投放 scope 放在最后
macro_rules! init_app {
    ($storage:expr) => {{
        let storage: Arc<SeaOrmStorage> = $storage;
        test::init_service(
            App::new()
                .wrap(from_fn(request_context))
                .app_data(web::Data::new(storage.clone()))
                .app_data(web::Data::new(build_server(storage)))
                .app_data(web::Data::new(api_settings()))
                .app_data(web::Data::new(AppStartTime {
                    start_datetime: chrono::Utc::now(),
                }))
                .service(health_routes())
                .service(ad_routes()),
        )
        .await
    }};
}

fn visitor_cookie_value<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.response()
        .cookies()
        .find(|c| c.name() == VISITOR_COOKIE_NAME)
        .map(|c| c.value().to_string())
}

async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
}

#[actix_rt::test]
async fn test_iframe_requires_size() {
    let (storage, _dir) = create_temp_storage().await;
    let app = init_app!(storage);

    let resp = test::call_service(&app, TestRequest::get().uri("/iframe").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));

    let resp =
        test::call_service(&app, TestRequest::get().uri("/iframe?size=").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_iframe_serves_tag_and_sets_cookie() {
    let (storage, _dir) = create_temp_storage().await;
    insert_ad(&storage, "hero", "300x250", 1_000_000, 0).await;
    let app = init_app!(storage);

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/iframe?size=300x250").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let identity = visitor_cookie_value(&resp).expect("identity cookie");
    assert!(VisitorId::parse(&identity).is_some());
    assert_eq!(
        body_string(resp).await,
        "<HTML><BODY><div>hero</div></BODY></HTML>"
    );

    // 已有 cookie 时不再下发
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/iframe?size=300x250")
            .cookie(Cookie::new(VISITOR_COOKIE_NAME, identity))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(visitor_cookie_value(&resp).is_none());
}

#[actix_rt::test]
async fn test_iframe_adopts_synced_identity() {
    let (storage, _dir) = create_temp_storage().await;
    insert_ad(&storage, "hero", "300x250", 1_000_000, 0).await;
    let app = init_app!(storage);

    // 浏览器先确认映射，得到映射的身份
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/sync-ids?id=partner-42").to_request(),
    )
    .await;
    let mapped = visitor_cookie_value(&resp).expect("mapped identity");

    // 另一份 cookie 带着同一个外部 ID 访问 iframe，改用映射的身份
    let other = VisitorId::generate();
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/iframe?size=300x250&id=partner-42")
            .cookie(Cookie::new(VISITOR_COOKIE_NAME, other.as_str().to_string()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(visitor_cookie_value(&resp), Some(mapped));

    // 空 id 等同于未提供
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/iframe?size=300x250&id=")
            .cookie(Cookie::new(VISITOR_COOKIE_NAME, other.as_str().to_string()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(visitor_cookie_value(&resp).is_none());
}

#[actix_rt::test]
async fn test_iframe_no_fill_is_empty_page() {
    let (storage, _dir) = create_temp_storage().await;
    insert_ad(&storage, "hero", "300x250", 1_000_000, 0).await;
    let app = init_app!(storage);

    for uri in ["/iframe?size=160x600", "/iframe?size=300x250&marker=31337"] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(body_string(resp).await, "<HTML><BODY></BODY></HTML>");
    }
}

#[actix_rt::test]
async fn test_server_tag_flow() {
    let (storage, _dir) = create_temp_storage().await;
    insert_ad(&storage, "s2s", "300x250", 1_000_000, 0).await;
    let app = init_app!(storage);

    let resp =
        test::call_service(&app, TestRequest::get().uri("/server-tag").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // size 缺省时使用 default_size
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/server-tag?id=abc123").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(visitor_cookie_value(&resp).is_none());
    let body = body_string(resp).await;
    assert!(body.starts_with("<div>s2s</div>"));
    assert!(body.contains(r#"<img src="/sync-ids?id=abc123""#));

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/server-tag?id=abc123").to_request(),
    )
    .await;
    assert_eq!(body_string(resp).await, "<div>s2s</div>");
}

#[actix_rt::test]
async fn test_sync_ids_returns_pixel_and_cookie() {
    let (storage, _dir) = create_temp_storage().await;
    let app = init_app!(storage);

    let resp = test::call_service(&app, TestRequest::get().uri("/sync-ids").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let existing = VisitorId::generate();
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/sync-ids?id=partner-1")
            .cookie(Cookie::new(VISITOR_COOKIE_NAME, existing.to_string()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/gif");
    assert_eq!(visitor_cookie_value(&resp), Some(existing.to_string()));
    assert_eq!(test::read_body(resp).await.as_ref(), TRANSPARENT_GIF);

    // 没有 cookie 的浏览器拿到已映射的身份
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/sync-ids?id=partner-1").to_request(),
    )
    .await;
    assert_eq!(visitor_cookie_value(&resp), Some(existing.to_string()));
}

#[actix_rt::test]
async fn test_cookie_view_and_reset() {
    let (storage, _dir) = create_temp_storage().await;
    let ad = insert_ad(&storage, "counted", "300x250", 1_000_000, 3).await;
    let app = init_app!(storage);

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/iframe?size=300x250").to_request(),
    )
    .await;
    let identity = visitor_cookie_value(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri("/cookie")
            .cookie(Cookie::new(VISITOR_COOKIE_NAME, identity.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(body["identity"], identity);
    assert_eq!(body["views"][0]["ad_id"], ad.id.0);
    assert_eq!(body["views"][0]["views"], 1);
    assert_eq!(body["views"][0]["frequency_cap"], 3);

    let body: Value =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/cookie").to_request()).await;
    assert!(body["identity"].is_null());

    let resp = test::call_service(&app, TestRequest::get().uri("/reset").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = resp
        .response()
        .cookies()
        .find(|c| c.name() == VISITOR_COOKIE_NAME)
        .unwrap();
    assert_eq!(cleared.value(), "");
    assert_eq!(
        cleared.max_age(),
        Some(actix_web::cookie::time::Duration::ZERO)
    );
}

#[actix_rt::test]
async fn test_health_check() {
    let (storage, _dir) = create_temp_storage().await;
    let app = init_app!(storage);

    let resp = test::call_service(&app, TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"]["backend"], "sqlite");
}
