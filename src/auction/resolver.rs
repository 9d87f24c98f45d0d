// src/auction/resolver.rs

use crate::auction::error::AuctionError;
use crate::model::ad::AdType;
use crate::model::auction_config::AuctionConfig;
use crate::model::repository::InventoryRepository;
use moka::future::Cache;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const VERSION_V2: &str = "v2";

/// 按 (分群命中, is_default 降序, created_at 降序) 选出最优配置
pub fn select_config(
    configs: &[AuctionConfig],
    segment_id: Option<i64>,
    version: &str,
) -> Option<AuctionConfig> {
    let wants_v2 = version == VERSION_V2;
    configs
        .iter()
        .filter(|config| config.is_v2() == wants_v2)
        .filter(|config| match config.segment_id {
            None => true,
            Some(id) => segment_id == Some(id),
        })
        .min_by_key(|config| {
            (
                Reverse(config.segment_id.is_some()),
                Reverse(config.is_default),
                Reverse(config.created_at),
            )
        })
        .cloned()
}

/// **拍卖配置解析**：按应用/广告类型/分群匹配，或按公开 uid 查找（带缓存）
pub struct ConfigResolver {
    repository: Arc<dyn InventoryRepository>,
    cache: Cache<String, Option<AuctionConfig>>,
}

impl ConfigResolver {
    pub fn new(repository: Arc<dyn InventoryRepository>, ttl: Duration, capacity: u64) -> Self {
        Self {
            repository,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn match_config(
        &self,
        app_id: i64,
        ad_type: AdType,
        segment_id: Option<i64>,
        version: &str,
    ) -> Result<AuctionConfig, AuctionError> {
        let configs = self.repository.auction_configs(app_id, ad_type).await?;
        match select_config(&configs, segment_id, version) {
            Some(config) => {
                debug!(app_id, ad_type = %ad_type, config_id = config.id, "auction config matched");
                Ok(config)
            }
            None => {
                warn!(app_id, ad_type = %ad_type, ?segment_id, "no auction config matched");
                Err(AuctionError::NoAds)
            }
        }
    }

    /// 未找到的结果同样缓存
    pub async fn fetch_by_uid_cached(
        &self,
        app_id: i64,
        id: i64,
        uid: &str,
    ) -> Result<Option<AuctionConfig>, AuctionError> {
        let key = format!("{}:{}:{}", app_id, id, uid);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let config = self.repository.auction_config(app_id, id, uid).await?;
        self.cache.insert(key, config.clone()).await;
        Ok(config)
    }
}
