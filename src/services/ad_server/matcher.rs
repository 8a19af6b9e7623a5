//! 候选排序与游标
//!
//! 排序：出价降序，同价按 id 升序（即写入顺序）。
//! 游标：跳过 marker 及其之前的所有候选；marker 不在列表中时不回到顶部，直接无结果。

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::storage::{Ad, AdId, AdInventory};

/// 续投游标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// 无 marker：从头开始，属于首次直投
    Top,
    /// 从指定广告之后继续
    After(AdId),
    /// 提供了 marker 但无法解析
    Invalid,
}

impl Cursor {
    /// 空字符串视为未提供
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(str::trim).filter(|m| !m.is_empty()) {
            None => Cursor::Top,
            Some(raw) => raw.parse::<AdId>().map_or(Cursor::Invalid, Cursor::After),
        }
    }

    /// 无 marker 的请求标记为 tag_on_page
    pub fn tag_on_page(&self) -> bool {
        matches!(self, Cursor::Top)
    }
}

fn rank_order(a: &Ad, b: &Ad) -> Ordering {
    b.price_micros
        .cmp(&a.price_micros)
        .then_with(|| a.id.cmp(&b.id))
}

/// 过滤出可投放且尺寸匹配的广告并排序
pub fn rank_candidates(mut ads: Vec<Ad>, size: &str) -> Vec<Ad> {
    ads.retain(|ad| ad.is_servable() && ad.size == size);
    ads.sort_by(rank_order);
    ads
}

/// 返回游标之后的候选；游标无效或未命中时返回 None
pub fn skip_past_marker<'a>(ranked: &'a [Ad], cursor: Cursor) -> Option<&'a [Ad]> {
    match cursor {
        Cursor::Top => Some(ranked),
        Cursor::After(marker) => ranked
            .iter()
            .position(|ad| ad.id == marker)
            .map(|idx| &ranked[idx + 1..]),
        Cursor::Invalid => None,
    }
}

/// 候选匹配器
#[derive(Clone)]
pub struct CandidateMatcher {
    inventory: Arc<dyn AdInventory>,
}

impl CandidateMatcher {
    pub fn new(inventory: Arc<dyn AdInventory>) -> Self {
        Self { inventory }
    }

    /// 指定尺寸下排好序的候选
    pub async fn candidates(&self, size: &str) -> Result<Vec<Ad>> {
        let ads = self.inventory.candidates(size).await?;
        let ranked = rank_candidates(ads, size);
        debug!("{} ranked candidates for size {}", ranked.len(), size);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AdState;

    fn ad(id: i64, price_micros: i64) -> Ad {
        Ad {
            id: AdId(id),
            name: format!("ad-{}", id),
            size: "300x250".to_string(),
            state: AdState::Active,
            price_micros,
            frequency_cap: 0,
            tag: String::new(),
            deleted: false,
        }
    }

    fn ids(ads: &[Ad]) -> Vec<i64> {
        ads.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn test_rank_by_price_then_id() {
        // A(5) B(10) C(10)
        let ranked = rank_candidates(vec![ad(1, 5), ad(3, 10), ad(2, 10)], "300x250");
        assert_eq!(ids(&ranked), vec![2, 3, 1]);
    }

    #[test]
    fn test_rank_drops_unservable_and_other_sizes() {
        let mut inactive = ad(4, 50);
        inactive.state = AdState::Inactive;
        let mut deleted = ad(5, 50);
        deleted.deleted = true;
        let mut other_size = ad(6, 50);
        other_size.size = "728x90".to_string();

        let ranked = rank_candidates(vec![ad(1, 1), inactive, deleted, other_size], "300x250");
        assert_eq!(ids(&ranked), vec![1]);
    }

    #[test]
    fn test_cursor_from_marker() {
        assert_eq!(Cursor::from_marker(None), Cursor::Top);
        assert_eq!(Cursor::from_marker(Some("")), Cursor::Top);
        assert_eq!(Cursor::from_marker(Some(" 12 ")), Cursor::After(AdId(12)));
        assert_eq!(Cursor::from_marker(Some("abc")), Cursor::Invalid);
        assert!(Cursor::Top.tag_on_page());
        assert!(!Cursor::After(AdId(1)).tag_on_page());
        assert!(!Cursor::Invalid.tag_on_page());
    }

    #[test]
    fn test_skip_past_marker() {
        let ranked = rank_candidates(vec![ad(1, 5), ad(2, 10), ad(3, 10)], "300x250");

        assert_eq!(ids(skip_past_marker(&ranked, Cursor::Top).unwrap()), vec![2, 3, 1]);
        assert_eq!(ids(skip_past_marker(&ranked, Cursor::After(AdId(2))).unwrap()), vec![3, 1]);
        assert_eq!(ids(skip_past_marker(&ranked, Cursor::After(AdId(3))).unwrap()), vec![1]);
        assert!(skip_past_marker(&ranked, Cursor::After(AdId(1))).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_marker_does_not_restart() {
        let ranked = rank_candidates(vec![ad(1, 5), ad(2, 10)], "300x250");
        assert!(skip_past_marker(&ranked, Cursor::After(AdId(99))).is_none());
        assert!(skip_past_marker(&ranked, Cursor::Invalid).is_none());
    }
}
