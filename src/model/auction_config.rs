// src/model/auction_config.rs

use crate::model::ad::AdType;
use crate::model::adapter::AdapterKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 未配置超时时使用的默认拍卖超时（毫秒）
pub const DEFAULT_AUCTION_TIMEOUT: u64 = 30_000;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigSettings {
    #[serde(default)]
    pub v2: bool,
}

/// 拍卖配置，每个版本不可变
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuctionConfig {
    pub id: i64,
    /// 对外公开的数字 uid（字符串形式）
    pub uid: String,
    pub app_id: i64,
    pub ad_type: AdType,
    #[serde(default)]
    pub segment_id: Option<i64>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub external_win_notifications: bool,
    #[serde(default)]
    pub price_floor: f64,
    /// 0 表示使用默认值
    #[serde(default)]
    pub timeout_ms: u64,
    /// CPM 需求方
    #[serde(default)]
    pub demands: Vec<AdapterKey>,
    /// RTB 需求方
    #[serde(default)]
    pub bidding: Vec<AdapterKey>,
    #[serde(default)]
    pub ad_unit_ids: Vec<i64>,
    #[serde(default)]
    pub settings: Option<ConfigSettings>,
    pub created_at: DateTime<Utc>,
}

impl AuctionConfig {
    pub fn effective_timeout_ms(&self) -> u64 {
        if self.timeout_ms == 0 {
            DEFAULT_AUCTION_TIMEOUT
        } else {
            self.timeout_ms
        }
    }

    pub fn is_v2(&self) -> bool {
        self.settings.as_ref().map(|s| s.v2).unwrap_or(false)
    }

    /// uid 解析为整数，失败时为 0
    pub fn uid_as_i64(&self) -> i64 {
        self.uid.parse().unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> AuctionConfig {
    AuctionConfig {
        id: 1,
        uid: "1701972528521547776".to_string(),
        app_id: 1,
        ad_type: AdType::Banner,
        segment_id: None,
        is_default: true,
        external_win_notifications: false,
        price_floor: 0.05,
        timeout_ms: 15_000,
        demands: vec![AdapterKey::Applovin],
        bidding: vec![AdapterKey::Bidmachine],
        ad_unit_ids: Vec::new(),
        settings: Some(ConfigSettings { v2: true }),
        created_at: Utc::now(),
    }
}
