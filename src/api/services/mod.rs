pub mod health;
pub mod helpers;
pub mod serve;
pub mod sync;
pub mod visitor;

pub use health::{AppStartTime, HealthService};
pub use helpers::{ApiSettings, VisitorCookieBuilder};
pub use serve::ServeService;
pub use sync::SyncService;
pub use visitor::VisitorService;

/// 投放与访客相关路由
pub fn ad_routes() -> actix_web::Scope {
    use actix_web::web;

    web::scope("")
        .route("/iframe", web::get().to(ServeService::iframe))
        .route("/server-tag", web::get().to(ServeService::server_tag))
        .route("/sync-ids", web::get().to(SyncService::sync_ids))
        .route("/cookie", web::get().to(VisitorService::show_cookie))
        .route("/reset", web::get().to(VisitorService::reset))
}

pub fn health_routes() -> actix_web::Scope {
    use actix_web::web;

    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
}
