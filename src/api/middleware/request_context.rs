//! Request context middleware
//!
//! 为每个请求生成唯一的 UUID，注入到 tracing span 中，并通过 `X-Request-ID` 回显。

use actix_web::{
    Error, HttpMessage,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{HeaderName, HeaderValue},
    middleware::Next,
};
use std::time::Instant;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::api::constants::REQUEST_ID_HEADER;

/// 请求 ID 类型，可从 request extensions 中提取
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// 配合 `actix_web::middleware::from_fn` 使用
pub async fn request_context(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.path(),
    );

    let started = Instant::now();
    let mut response = next.call(req).instrument(span.clone()).await?;

    span.in_scope(|| {
        debug!(
            "Completed with {} in {:?}",
            response.status(),
            started.elapsed()
        )
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, middleware::from_fn, test, web};

    #[actix_rt::test]
    async fn test_request_id_is_echoed() {
        let app = test::init_service(
            App::new()
                .wrap(from_fn(request_context))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let header = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("missing request id header");
        assert!(Uuid::parse_str(header.to_str().unwrap()).is_ok());
    }
}
