// src/config/settings.rs

use crate::model::adapter::AdapterKey;
use crate::model::auction_config::DEFAULT_AUCTION_TIMEOUT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 单个需求方的接入配置
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidderConfig {
    /// 可包含 `{dc}` 占位符，由数据中心路由表填充
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

/// 服务配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_auction_timeout_ms")]
    pub auction_timeout_ms: u64,
    #[serde(default = "default_bid_cache_ttl_secs")]
    pub bid_cache_ttl_secs: u64,
    #[serde(default = "default_bid_cache_capacity")]
    pub bid_cache_capacity: u64,
    #[serde(default = "default_config_cache_ttl_secs")]
    pub config_cache_ttl_secs: u64,
    #[serde(default = "default_config_cache_capacity")]
    pub config_cache_capacity: u64,
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    #[serde(default = "default_event_batch_size")]
    pub event_batch_size: usize,
    #[serde(default = "default_event_flush_interval_ms")]
    pub event_flush_interval_ms: u64,
    #[serde(default)]
    pub bidders: HashMap<AdapterKey, BidderConfig>,
}

fn default_auction_timeout_ms() -> u64 {
    DEFAULT_AUCTION_TIMEOUT
}

fn default_bid_cache_ttl_secs() -> u64 {
    300
}

fn default_bid_cache_capacity() -> u64 {
    100_000
}

fn default_config_cache_ttl_secs() -> u64 {
    600
}

fn default_config_cache_capacity() -> u64 {
    10_000
}

fn default_event_buffer_size() -> usize {
    10_000
}

fn default_event_batch_size() -> usize {
    100
}

fn default_event_flush_interval_ms() -> u64 {
    1000
}

impl Settings {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn bid_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.bid_cache_ttl_secs)
    }

    pub fn config_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config_cache_ttl_secs)
    }
}
