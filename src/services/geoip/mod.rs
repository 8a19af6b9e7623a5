//! GeoIP 服务模块
//!
//! IP → 国家代码，支持：
//! - MaxMind GeoLite2 本地数据库
//! - 外部 API fallback (ip-api.com)

mod external_api;
mod maxmind;
mod provider;

pub use provider::{CountryLookup, GeoIpProvider};
