//! 频次上限判定

use crate::storage::{Ad, VisitorProfile};

/// 访客在当前周期内是否还能看到该广告
///
/// 上限为 0 表示不限；否则当前计数必须严格小于上限。
/// 这里只是预筛，真正的占位由存储端的条件自增完成。
pub fn admits(ad: &Ad, profile: &VisitorProfile) -> bool {
    ad.frequency_cap == 0 || profile.view_count(ad.id) < ad.frequency_cap
}
