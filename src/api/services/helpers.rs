//! 处理器公共部分：设置、cookie、错误响应

use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{HttpRequest, HttpResponse};

use crate::api::constants::VISITOR_COOKIE_NAME;
use crate::config::{SameSitePolicy, StaticConfig};
use crate::errors::SupplyrError;

/// HTTP 层设置，启动时从静态配置生成一次
#[derive(Clone, Debug)]
pub struct ApiSettings {
    /// `/server-tag` 未指定 size 时使用
    pub default_size: String,
    pub trusted_proxies: Vec<String>,
    pub cookies: VisitorCookieBuilder,
}

impl ApiSettings {
    pub fn from_config(config: &StaticConfig) -> Self {
        Self {
            default_size: config.ad_server.default_size.clone(),
            trusted_proxies: config.server.trusted_proxies.clone(),
            cookies: VisitorCookieBuilder::from_config(config),
        }
    }
}

/// cookie 有效期上限（天），与浏览器对 Max-Age 的上限一致
pub const MAX_COOKIE_AGE_DAYS: i64 = 400;

/// 访客身份 cookie 构建器
#[derive(Clone, Debug)]
pub struct VisitorCookieBuilder {
    same_site: SameSite,
    secure: bool,
    domain: Option<String>,
    max_age_days: i64,
}

impl VisitorCookieBuilder {
    pub fn from_config(config: &StaticConfig) -> Self {
        let ad_server = &config.ad_server;
        let same_site = match ad_server.cookie_same_site {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::None => SameSite::None,
            SameSitePolicy::Lax => SameSite::Lax,
        };

        Self {
            same_site,
            // 浏览器会拒绝非 Secure 的 SameSite=None
            secure: ad_server.cookie_secure || same_site == SameSite::None,
            domain: ad_server.cookie_domain.clone(),
            max_age_days: ad_server.cookie_max_age_days.clamp(0, MAX_COOKIE_AGE_DAYS),
        }
    }

    fn build_base(&self, value: String, max_age: CookieDuration) -> Cookie<'static> {
        let mut cookie = Cookie::new(VISITOR_COOKIE_NAME, value);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(self.secure);
        cookie.set_same_site(self.same_site);
        cookie.set_max_age(max_age);
        if let Some(ref domain) = self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    pub fn build(&self, identity: &str) -> Cookie<'static> {
        self.build_base(
            identity.to_string(),
            CookieDuration::days(self.max_age_days),
        )
    }

    pub fn build_expired(&self) -> Cookie<'static> {
        self.build_base(String::new(), CookieDuration::ZERO)
    }
}

/// 请求携带的访客 cookie 原值（未校验）
pub fn visitor_cookie(req: &HttpRequest) -> Option<String> {
    req.cookie(VISITOR_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// 错误 → 简短纯文本响应
///
/// 只有参数错误会回显原因，存储错误只给出状态描述。
pub fn error_response(err: &SupplyrError) -> HttpResponse {
    let status = err.http_status();
    let body = match err {
        SupplyrError::Validation(msg) => msg.clone(),
        _ => status.canonical_reason().unwrap_or("Error").to_string(),
    };
    HttpResponse::build(status)
        .insert_header(("Content-Type", "text/plain; charset=utf-8"))
        .body(body)
}

/// iframe 包装；无广告时 body 为空
pub fn wrap_tag(tag: &str) -> String {
    format!("<HTML><BODY>{}</BODY></HTML>", tag)
}
