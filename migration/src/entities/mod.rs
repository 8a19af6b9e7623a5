pub mod ad;
pub mod impression_daily;
pub mod impression_log;
pub mod sync_mapping;
pub mod visitor_ad_view;
pub mod visitor_profile;

pub use ad::Entity as AdEntity;
pub use impression_daily::Entity as ImpressionDailyEntity;
pub use impression_log::Entity as ImpressionLogEntity;
pub use sync_mapping::Entity as SyncMappingEntity;
pub use visitor_ad_view::Entity as VisitorAdViewEntity;
pub use visitor_profile::Entity as VisitorProfileEntity;
