// src/bidding/cache_store.rs

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cannot encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 分布式键值存储的最小接口。`get_del` 必须是单次原子操作
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_del(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    ttl: Duration,
    expires_at: Instant,
}

/// 每次写入都以该条目自己的 TTL 重新计时
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// 进程内实现，基于 moka
pub struct MokaCacheStore {
    cache: Cache<String, StoredValue>,
}

impl MokaCacheStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn get_del(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        // 过期但尚未被驱逐的条目视为不存在
        Ok(self
            .cache
            .remove(key)
            .await
            .filter(|value| value.expires_at > Instant::now())
            .map(|value| value.bytes))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(
                key.to_string(),
                StoredValue {
                    bytes: value,
                    ttl,
                    expires_at: Instant::now() + ttl,
                },
            )
            .await;
        Ok(())
    }
}
