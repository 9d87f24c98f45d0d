// src/model/ad_unit.rs

use crate::model::ad::{AdFormat, AdType, BidType};
use crate::model::adapter::AdapterKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 库存中存储的广告单元（line item）
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredAdUnit {
    pub id: i64,
    pub app_id: i64,
    pub ad_type: AdType,
    pub demand_id: String,
    pub uid: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub format: AdFormat,
    #[serde(default)]
    pub bid_floor: Option<f64>,
    #[serde(default)]
    pub is_bidding: bool,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl StoredAdUnit {
    pub fn bid_type(&self) -> BidType {
        if self.is_bidding {
            BidType::Rtb
        } else {
            BidType::Cpm
        }
    }
}

/// 返回给客户端的广告单元
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AdUnit {
    pub demand_id: String,
    pub uid: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_floor: Option<f64>,
    pub bid_type: BidType,
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    #[serde(rename = "ext", default)]
    pub extra: Map<String, Value>,
}

impl AdUnit {
    pub fn from_stored(stored: &StoredAdUnit) -> Self {
        let bid_type = stored.bid_type();
        Self {
            demand_id: stored.demand_id.clone(),
            uid: stored.uid.clone(),
            label: stored.label.clone(),
            price_floor: match bid_type {
                BidType::Cpm => stored.bid_floor,
                BidType::Rtb => None,
            },
            bid_type,
            timeout_ms: stored.timeout_ms,
            extra: stored.extra.clone(),
        }
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// 事件日志中使用的整数 uid，未知时为 0
    pub fn uid_as_i64(&self) -> i64 {
        self.uid.parse().unwrap_or(0)
    }
}

/// (需求方, 计价方式) → 广告单元列表，每个请求构建一次，之后只读
#[derive(Debug, Clone, Default)]
pub struct AdUnitsMap {
    units: HashMap<(AdapterKey, BidType), Vec<AdUnit>>,
}

impl AdUnitsMap {
    pub fn new(ad_units: &[AdUnit]) -> Self {
        let mut units: HashMap<(AdapterKey, BidType), Vec<AdUnit>> = HashMap::new();
        for unit in ad_units {
            if let Ok(key) = unit.demand_id.parse::<AdapterKey>() {
                units.entry((key, unit.bid_type)).or_default().push(unit.clone());
            }
        }
        Self { units }
    }

    pub fn get(&self, key: AdapterKey, bid_type: BidType) -> &[AdUnit] {
        self.units
            .get(&(key, bid_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
