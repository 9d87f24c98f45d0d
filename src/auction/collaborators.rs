// src/auction/collaborators.rs

use crate::model::ad::{AdType, Os};
use crate::model::adapter::AdapterKey;
use crate::model::repository::{InventoryRepository, RepositoryError};
use crate::model::request::{AdCacheEntry, Segment};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 分群匹配（外部协作者）
#[async_trait]
pub trait SegmentMatcher: Send + Sync {
    async fn match_segment(&self, app_id: i64, requested: &Segment) -> Result<Segment, RepositoryError>;
}

/// 应用启用的需求方（外部协作者）
#[async_trait]
pub trait AdapterEnabler: Send + Sync {
    async fn filter_enabled(
        &self,
        app_id: i64,
        candidates: Vec<AdapterKey>,
    ) -> Result<Vec<AdapterKey>, RepositoryError>;
}

/// 客户端上报的 uid 对应应用下已启用的分群时采用，否则为空分群
pub struct InventorySegmentMatcher {
    repository: Arc<dyn InventoryRepository>,
}

impl InventorySegmentMatcher {
    pub fn new(repository: Arc<dyn InventoryRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl SegmentMatcher for InventorySegmentMatcher {
    async fn match_segment(&self, app_id: i64, requested: &Segment) -> Result<Segment, RepositoryError> {
        if requested.uid.is_empty() {
            return Ok(Segment::default());
        }
        let segments = self.repository.segments(app_id).await?;
        Ok(segments
            .into_iter()
            .find(|segment| segment.enabled && segment.uid == requested.uid)
            .map(|segment| Segment {
                id: segment.id.to_string(),
                uid: segment.uid,
                ext: requested.ext.clone(),
            })
            .unwrap_or_default())
    }
}

pub struct InventoryAdapterEnabler {
    repository: Arc<dyn InventoryRepository>,
}

impl InventoryAdapterEnabler {
    pub fn new(repository: Arc<dyn InventoryRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AdapterEnabler for InventoryAdapterEnabler {
    async fn filter_enabled(
        &self,
        app_id: i64,
        candidates: Vec<AdapterKey>,
    ) -> Result<Vec<AdapterKey>, RepositoryError> {
        let enabled: HashSet<AdapterKey> =
            self.repository.enabled_adapters(app_id).await?.into_iter().collect();
        Ok(candidates
            .into_iter()
            .filter(|key| enabled.contains(key))
            .collect())
    }
}

// 全屏广告依赖 SDK 预加载的素材，这些需求方只有在客户端 ad_cache 中已有内容时才参与
static AD_CACHE_POLICY: Lazy<HashMap<(Os, AdType), HashSet<AdapterKey>>> = Lazy::new(|| {
    let fullscreen = [
        AdapterKey::Meta,
        AdapterKey::Mintegral,
        AdapterKey::Bigoads,
    ];
    let mut policy = HashMap::new();
    for os in [Os::Ios, Os::Android] {
        for ad_type in [AdType::Interstitial, AdType::Rewarded] {
            policy.insert((os, ad_type), fullscreen.iter().copied().collect());
        }
    }
    policy
});

/// ad_cache 状态过滤：受限需求方只有在 ad_cache 中出现时保留，其余需求方总是保留
pub fn filter_by_ad_cache(
    os: Os,
    ad_type: AdType,
    candidates: Vec<AdapterKey>,
    ad_cache: &[AdCacheEntry],
) -> Vec<AdapterKey> {
    if ad_cache.is_empty() {
        return candidates;
    }
    let Some(restricted) = AD_CACHE_POLICY.get(&(os, ad_type)) else {
        return candidates;
    };

    let cached: HashSet<AdapterKey> = ad_cache
        .iter()
        .filter_map(|entry| entry.demand_id.as_deref())
        .filter_map(|demand_id| demand_id.parse().ok())
        .collect();

    candidates
        .into_iter()
        .filter(|key| !restricted.contains(key) || cached.contains(key))
        .collect()
}
