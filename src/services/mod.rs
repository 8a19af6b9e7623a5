//! 业务服务层
//!
//! - `ad_server`: 投放决策引擎
//! - `geoip`: IP → 国家代码

pub mod ad_server;
pub mod geoip;

pub use ad_server::{
    AdServer, AdServerSettings, EngineStores, NoFillReason, ServeOutcome, ServeRequest,
    ServeResponse, ServedAd, VisitorSnapshot,
};
pub use geoip::{CountryLookup, GeoIpProvider};
