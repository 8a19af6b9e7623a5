use chrono::{DateTime, Utc};

use crate::errors::{Result, SupplyrError};
use crate::storage::models::{
    Ad, AdId, AdState, CountryCode, ImpressionKey, ImpressionTotal, NewAd, PlacementKind,
    RawImpression, VisitorId,
};
use migration::entities::{ad, impression_daily, impression_log, visitor_profile};

/// 将 ads 行转换为 Ad，拒绝未知状态与负数上限
pub fn model_to_ad(model: ad::Model) -> Result<Ad> {
    let state = model.state.parse::<AdState>().map_err(|_| {
        SupplyrError::invalid_record(format!(
            "ad {} has unknown state '{}'",
            model.id, model.state
        ))
    })?;

    let frequency_cap = u32::try_from(model.frequency_cap).map_err(|_| {
        SupplyrError::invalid_record(format!(
            "ad {} has negative frequency_cap {}",
            model.id, model.frequency_cap
        ))
    })?;

    Ok(Ad {
        id: AdId(model.id),
        name: model.name,
        size: model.size,
        state,
        price_micros: model.price_micros,
        frequency_cap,
        tag: model.tag,
        deleted: model.deleted,
    })
}

/// 将 NewAd 转换为 ActiveModel（id 由数据库分配）
pub fn new_ad_to_active_model(new_ad: &NewAd, created_at: DateTime<Utc>) -> Result<ad::ActiveModel> {
    use sea_orm::ActiveValue::*;

    if new_ad.size.trim().is_empty() {
        return Err(SupplyrError::validation("ad size is required"));
    }
    let frequency_cap = i32::try_from(new_ad.frequency_cap)
        .map_err(|_| SupplyrError::validation("frequency_cap is too large"))?;

    Ok(ad::ActiveModel {
        id: NotSet,
        name: Set(new_ad.name.clone()),
        size: Set(new_ad.size.trim().to_string()),
        state: Set(new_ad.state.as_ref().to_string()),
        price_micros: Set(new_ad.price_micros),
        frequency_cap: Set(frequency_cap),
        tag: Set(new_ad.tag.clone()),
        deleted: Set(false),
        created_at: Set(created_at),
    })
}

/// 档案行中的身份与周期起点
pub fn profile_epoch(model: &visitor_profile::Model) -> Result<(VisitorId, DateTime<Utc>)> {
    let identity = VisitorId::parse(&model.identity).ok_or_else(|| {
        SupplyrError::invalid_record(format!(
            "visitor profile has malformed identity '{}'",
            model.identity
        ))
    })?;
    let day_start = millis_to_datetime(model.day_start_ms)?;
    Ok((identity, day_start))
}

pub fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| SupplyrError::invalid_record(format!("timestamp out of range: {}", ms)))
}

pub fn model_to_impression_total(model: impression_daily::Model) -> Result<ImpressionTotal> {
    let placement = model.placement.parse::<PlacementKind>().map_err(|_| {
        SupplyrError::invalid_record(format!(
            "impression row {} has unknown placement '{}'",
            model.id, model.placement
        ))
    })?;

    Ok(ImpressionTotal {
        key: ImpressionKey {
            ad_id: AdId(model.ad_id),
            country: CountryCode::normalize(&model.country),
            day: model.day,
            placement,
        },
        view_count: model.view_count,
    })
}

pub fn raw_impression_to_active_model(raw: &RawImpression) -> impression_log::ActiveModel {
    use sea_orm::ActiveValue::*;

    impression_log::ActiveModel {
        id: NotSet,
        ad_id: Set(raw.ad_id.0),
        identity: Set(raw.identity.as_str().to_string()),
        served_at: Set(raw.served_at),
        tag_on_page: Set(raw.tag_on_page),
        country: Set(raw.country.as_str().to_string()),
        placement: Set(raw.placement.as_ref().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad_model(state: &str, cap: i32) -> ad::Model {
        ad::Model {
            id: 7,
            name: "banner".to_string(),
            size: "300x250".to_string(),
            state: state.to_string(),
            price_micros: 2_500_000,
            frequency_cap: cap,
            tag: "<b>ad</b>".to_string(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_model_to_ad() {
        let ad = model_to_ad(ad_model("active", 3)).unwrap();
        assert_eq!(ad.id, AdId(7));
        assert_eq!(ad.state, AdState::Active);
        assert_eq!(ad.frequency_cap, 3);
        assert_eq!(ad.price(), 2.5);
        assert!(ad.is_servable());
    }

    #[test]
    fn test_model_to_ad_rejects_malformed_rows() {
        let err = model_to_ad(ad_model("paused", 0)).unwrap_err();
        assert_eq!(err.code(), "E006");

        let err = model_to_ad(ad_model("active", -1)).unwrap_err();
        assert!(err.message().contains("negative frequency_cap"));
    }

    #[test]
    fn test_profile_epoch_rejects_bad_identity() {
        let model = visitor_profile::Model {
            identity: "garbage".to_string(),
            day_start_ms: 0,
            last_known_ip: None,
            created_at: Utc::now(),
        };
        assert!(profile_epoch(&model).is_err());
    }

    #[test]
    fn test_new_ad_requires_size() {
        let new_ad = NewAd {
            name: "x".to_string(),
            size: "  ".to_string(),
            state: AdState::Active,
            price_micros: 0,
            frequency_cap: 0,
            tag: String::new(),
        };
        assert!(new_ad_to_active_model(&new_ad, Utc::now()).is_err());
    }
}
