// src/bidding/bid_cache.rs

use crate::bidding::cache_store::{CacheError, CacheStore};
use crate::model::ad::AdType;
use crate::model::adapter::AdapterKey;
use crate::model::demand::{BidData, DemandResponse, TokenTiming};
use crate::model::request::AuctionRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 缓存中保存的出价，恢复时还原为 DemandResponse
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CachedBid {
    pub demand_id: AdapterKey,
    pub request_id: String,
    pub status: Option<u16>,
    pub tag_id: String,
    pub placement_id: String,
    pub slot_uuid: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub token: TokenTiming,
    pub bid: BidData,
}

impl CachedBid {
    pub fn from_response(response: &DemandResponse) -> Option<Self> {
        let bid = response.bid.clone()?;
        Some(Self {
            demand_id: response.demand_id,
            request_id: response.request_id.clone(),
            status: response.status,
            tag_id: response.tag_id.clone(),
            placement_id: response.placement_id.clone(),
            slot_uuid: response.slot_uuid.clone(),
            start_ts: response.start_ts,
            end_ts: response.end_ts,
            token: response.token,
            bid,
        })
    }

    pub fn into_response(self) -> DemandResponse {
        let mut response = DemandResponse::new(self.demand_id);
        response.request_id = self.request_id;
        response.status = self.status;
        response.tag_id = self.tag_id;
        response.placement_id = self.placement_id;
        response.slot_uuid = self.slot_uuid;
        response.start_ts = self.start_ts;
        response.end_ts = self.end_ts;
        response.token = self.token;
        response.bid = Some(self.bid);
        response
    }

    pub fn price(&self) -> f64 {
        self.bid.price
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BidCacheEntry {
    pub cached_bid: CachedBid,
    pub created_at: DateTime<Utc>,
    pub auction_id: String,
}

/// 同一 session + 广告类型下，每个需求方最多一条未使用的最高出价
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Cache {
    pub bids: BTreeMap<AdapterKey, BidCacheEntry>,
}

impl Cache {
    pub fn evict_expired(&mut self, now: DateTime<Utc>, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.bids.retain(|_, entry| now - entry.created_at <= ttl);
    }

    /// 价格严格更高才替换，相同价格保留旧条目
    pub fn offer(&mut self, bid: CachedBid, auction_id: &str, now: DateTime<Utc>) {
        let replace = match self.bids.get(&bid.demand_id) {
            Some(existing) => bid.price() > existing.cached_bid.price(),
            None => true,
        };
        if replace {
            self.bids.insert(
                bid.demand_id,
                BidCacheEntry {
                    cached_bid: bid,
                    created_at: now,
                    auction_id: auction_id.to_string(),
                },
            );
        }
    }

    pub fn pop_highest(&mut self) -> Option<BidCacheEntry> {
        let mut highest: Option<(AdapterKey, f64)> = None;
        for (key, entry) in &self.bids {
            let price = entry.cached_bid.price();
            match highest {
                Some((_, best)) if price <= best => {}
                _ => highest = Some((*key, price)),
            }
        }
        highest.and_then(|(key, _)| self.bids.remove(&key))
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bids.len()
    }
}

pub fn cache_key(session_id: &str, ad_type: AdType) -> String {
    format!("bidding:{}:{}", session_id, ad_type)
}

/// 拆分为 (直接返回的结果, 可缓存的出价)
pub fn split(bids: Vec<DemandResponse>) -> (Vec<DemandResponse>, Vec<DemandResponse>) {
    bids.into_iter()
        .partition(|bid| !(bid.cacheable && bid.is_bid()))
}

/// 跨请求复用未中标出价的缓存
pub struct BidCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl BidCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 请求未开启 bid_cache 时原样返回；存储不可用时也原样返回
    pub async fn apply(
        &self,
        request: &AuctionRequest,
        bids: Vec<DemandResponse>,
    ) -> Vec<DemandResponse> {
        if !request.normalized_ext().bid_cache {
            return bids;
        }

        let key = cache_key(&request.session.id, request.ad_type);
        match self.merge(&key, &request.ad_object.auction_id, bids.clone()).await {
            Ok(merged) => merged,
            Err(e) => {
                error!(key = %key, error = %e, "bid cache unavailable, skipping");
                bids
            }
        }
    }

    async fn merge(
        &self,
        key: &str,
        auction_id: &str,
        bids: Vec<DemandResponse>,
    ) -> Result<Vec<DemandResponse>, CacheError> {
        let mut cache = match self.store.get_del(key).await? {
            Some(bytes) => serde_json::from_slice::<Cache>(&bytes).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "dropping unreadable bid cache");
                Cache::default()
            }),
            None => Cache::default(),
        };

        let now = Utc::now();
        cache.evict_expired(now, self.ttl);

        let (mut to_response, to_cache) = split(bids);
        for response in &to_cache {
            if let Some(bid) = CachedBid::from_response(response) {
                cache.offer(bid, auction_id, now);
            }
        }

        if let Some(entry) = cache.pop_highest() {
            debug!(
                key = %key,
                demand_id = %entry.cached_bid.demand_id,
                price = entry.cached_bid.price(),
                "emitting cached bid"
            );
            to_response.push(entry.cached_bid.into_response());
        }

        if !cache.is_empty() {
            let bytes = serde_json::to_vec(&cache)?;
            self.store.set(key, bytes, self.ttl).await?;
        }
        Ok(to_response)
    }
}
