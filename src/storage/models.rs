//! 领域类型
//!
//! 存储行在进入引擎之前都会被转换为这里的强类型记录，
//! 未知状态、负数上限、非法身份令牌都会在边界处被拒绝。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::errors::{Result, SupplyrError};

/// 计数周期长度
pub const EPOCH_LENGTH: TimeDelta = TimeDelta::hours(24);

/// 外部同步 ID 的最大长度（与 sync_mappings 主键列一致）
pub const MAX_EXTERNAL_SYNC_ID_LEN: usize = 255;

/// 广告 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdId(pub i64);

impl fmt::Display for AdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AdId {
    type Err = SupplyrError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(AdId)
            .map_err(|_| SupplyrError::validation(format!("not an ad id: '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AdState {
    Active,
    Inactive,
}

/// 广告记录（只读视图）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ad {
    pub id: AdId,
    pub name: String,
    pub size: String,
    pub state: AdState,
    /// 出价（百万分之一单位），仅用于排序
    pub price_micros: i64,
    /// 每访客每周期最大展示次数，0 表示不限
    pub frequency_cap: u32,
    pub tag: String,
    pub deleted: bool,
}

impl Ad {
    pub fn price(&self) -> f64 {
        self.price_micros as f64 / 1_000_000.0
    }

    pub fn is_servable(&self) -> bool {
        self.state == AdState::Active && !self.deleted
    }
}

/// 新建广告的输入（由外部库存管理方使用）
#[derive(Debug, Clone, Deserialize)]
pub struct NewAd {
    pub name: String,
    pub size: String,
    pub state: AdState,
    pub price_micros: i64,
    pub frequency_cap: u32,
    pub tag: String,
}

/// 访客身份令牌（UUID v4 文本）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn generate() -> Self {
        VisitorId(uuid::Uuid::new_v4().to_string())
    }

    /// 解析 cookie 或存储中的身份令牌，格式不合法返回 None
    pub fn parse(raw: &str) -> Option<Self> {
        uuid::Uuid::parse_str(raw.trim())
            .ok()
            .map(|u| VisitorId(u.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 合作方的访客 ID（按合作方命名空间区分，原样保存）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExternalSyncId(String);

impl ExternalSyncId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SupplyrError::validation("id is required"));
        }
        if trimmed.len() > MAX_EXTERNAL_SYNC_ID_LEN {
            return Err(SupplyrError::validation(format!(
                "id exceeds {} characters",
                MAX_EXTERNAL_SYNC_ID_LEN
            )));
        }
        Ok(ExternalSyncId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalSyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 访客档案：当前计数周期及其内的逐广告计数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorProfile {
    pub identity: VisitorId,
    pub day_start: DateTime<Utc>,
    pub views: HashMap<AdId, u32>,
    pub last_known_ip: Option<String>,
}

impl VisitorProfile {
    pub fn fresh(identity: VisitorId, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            day_start: now,
            views: HashMap::new(),
            last_known_ip: None,
        }
    }

    /// 当前周期内某广告的展示次数，缺失视为 0
    pub fn view_count(&self, ad: AdId) -> u32 {
        self.views.get(&ad).copied().unwrap_or(0)
    }

    pub fn epoch_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.day_start > EPOCH_LENGTH
    }
}

/// ISO 3166-1 alpha-2 国家代码，未知为 `ZZ`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    pub const UNKNOWN: &'static str = "ZZ";

    pub fn unknown() -> Self {
        CountryCode(Self::UNKNOWN.to_string())
    }

    /// 规范化为两位大写字母，不合法时返回未知
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            CountryCode(trimmed.to_ascii_uppercase())
        } else {
            Self::unknown()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CountryCode {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 投放位置类型：无 marker 的首次直投，或带 marker 的回传续投
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlacementKind {
    Direct,
    Passback,
}

impl PlacementKind {
    pub fn from_tag_on_page(tag_on_page: bool) -> Self {
        if tag_on_page {
            PlacementKind::Direct
        } else {
            PlacementKind::Passback
        }
    }
}

/// 天级汇总的复合键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImpressionKey {
    pub ad_id: AdId,
    pub country: CountryCode,
    pub day: NaiveDate,
    pub placement: PlacementKind,
}

/// 天级汇总行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpressionTotal {
    pub key: ImpressionKey,
    pub view_count: i64,
}

/// 逐条曝光记录
#[derive(Debug, Clone)]
pub struct RawImpression {
    pub ad_id: AdId,
    pub identity: VisitorId,
    pub served_at: DateTime<Utc>,
    pub tag_on_page: bool,
    pub country: CountryCode,
    pub placement: PlacementKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_id_parse() {
        let id = VisitorId::generate();
        assert_eq!(VisitorId::parse(id.as_str()), Some(id.clone()));
        assert_eq!(
            VisitorId::parse(&id.as_str().to_uppercase()),
            Some(id),
            "uppercase tokens normalize to the stored form"
        );
        assert!(VisitorId::parse("").is_none());
        assert!(VisitorId::parse("not-a-token").is_none());
    }

    #[test]
    fn test_external_sync_id_validation() {
        assert!(ExternalSyncId::parse("   ").is_err());
        assert!(ExternalSyncId::parse(&"x".repeat(256)).is_err());
        assert_eq!(ExternalSyncId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_country_normalize() {
        assert_eq!(CountryCode::normalize("us").as_str(), "US");
        assert_eq!(CountryCode::normalize("").as_str(), "ZZ");
        assert_eq!(CountryCode::normalize("USA").as_str(), "ZZ");
        assert_eq!(CountryCode::normalize("1A").as_str(), "ZZ");
    }

    #[test]
    fn test_epoch_expiry_is_strictly_after_24h() {
        let start = Utc::now();
        let profile = VisitorProfile::fresh(VisitorId::generate(), start);
        assert!(!profile.epoch_expired(start + EPOCH_LENGTH));
        assert!(profile.epoch_expired(start + EPOCH_LENGTH + TimeDelta::milliseconds(1)));
    }

    #[test]
    fn test_ad_id_from_str() {
        assert_eq!("42".parse::<AdId>().unwrap(), AdId(42));
        assert!("abc".parse::<AdId>().is_err());
    }

    #[test]
    fn test_placement_kind() {
        assert_eq!(PlacementKind::from_tag_on_page(true).as_ref(), "direct");
        assert_eq!(PlacementKind::from_tag_on_page(false).as_ref(), "passback");
        assert_eq!("passback".parse::<PlacementKind>(), Ok(PlacementKind::Passback));
        assert_eq!("active".parse::<AdState>(), Ok(AdState::Active));
    }
}
