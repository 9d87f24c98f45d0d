// src/model/request.rs

use crate::model::ad::{AdFormat, AdType, DeviceType, Os};
use crate::model::adapter::AdapterKey;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 客户端 SDK 发来的拍卖请求。
/// `ext` 是字符串化的 JSON，通过 `normalize` 解析一次并缓存为 `RequestExt`。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuctionRequest {
    pub ad_type: AdType,
    pub ad_object: AdObject,
    #[serde(default)]
    pub ad_cache: Vec<AdCacheEntry>,
    pub app: App,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub segment: Segment,
    #[serde(default)]
    pub user: Option<User>,
    /// SDK 已集成的 adapter（key → 版本信息）
    #[serde(default)]
    pub adapters: HashMap<String, AdapterInfo>,
    #[serde(default)]
    pub regulations: Option<Regulations>,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub ext: String,

    #[serde(skip)]
    ext_data: OnceCell<RequestExt>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AdObject {
    #[serde(default)]
    pub auction_id: String,
    #[serde(default)]
    pub price_floor: f64,
    #[serde(default)]
    pub auction_key: Option<String>,
    #[serde(default)]
    pub auction_configuration_id: Option<i64>,
    #[serde(default)]
    pub auction_configuration_uid: Option<String>,
    /// "PORTRAIT" / "LANDSCAPE"
    #[serde(default)]
    pub orientation: Option<String>,
    #[serde(default)]
    pub banner: Option<BannerAdObject>,
    #[serde(default)]
    pub interstitial: Option<Map<String, Value>>,
    #[serde(default)]
    pub rewarded: Option<Map<String, Value>>,
    /// 每个需求方的 bidding token
    #[serde(default)]
    pub demands: HashMap<String, DemandToken>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BannerAdObject {
    #[serde(default)]
    pub format: AdFormat,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DemandToken {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_start_ts: Option<i64>,
    #[serde(default)]
    pub token_finish_ts: Option<i64>,
    #[serde(default)]
    pub slot_uuid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AdCacheEntry {
    pub price: f64,
    #[serde(default)]
    pub demand_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct App {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub framework: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Device {
    #[serde(default)]
    pub os: Os,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub ua: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub geo: Option<Geo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Geo {
    /// ISO-3166 alpha-3
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Session {
    #[serde(default)]
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Segment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub ext: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct User {
    #[serde(default)]
    pub idfa: Option<String>,
    #[serde(default)]
    pub idg: Option<String>,
    #[serde(default)]
    pub tracking_authorization_status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AdapterInfo {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sdk_version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Regulations {
    #[serde(rename = "coppa", alias = "COPPA", default)]
    pub coppa: bool,
    #[serde(rename = "gdpr", alias = "GDPR", default)]
    pub gdpr: bool,
    #[serde(default)]
    pub us_privacy: Option<String>,
    #[serde(default)]
    pub eu_privacy: Option<String>,
}

/// `ext` 字符串中识别的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestExt {
    /// 已规范化（去空白、小写）
    pub mediator: String,
    pub previous_auction_price: Option<f64>,
    pub bid_cache: bool,
    pub ext: Map<String, Value>,
}

impl RequestExt {
    /// 畸形 JSON 视为空对象
    pub fn parse(raw: &str) -> Self {
        let object = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            _ => return Self::default(),
        };

        let mediator = object
            .get("mediator")
            .and_then(Value::as_str)
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let previous_auction_price = object.get("previous_auction_price").and_then(Value::as_f64);
        let bid_cache = object.get("bid_cache").and_then(Value::as_bool).unwrap_or(false);
        let ext = object
            .get("ext")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Self {
            mediator,
            previous_auction_price,
            bid_cache,
            ext,
        }
    }

    /// 只有 max / level_play 会让上一轮价格参与底价计算
    pub fn is_price_carrying_mediator(&self) -> bool {
        matches!(self.mediator.as_str(), "max" | "level_play")
    }

    /// 任何非空 mediator 都会注入 bidmachine 的 custom_parameters
    pub fn has_mediator(&self) -> bool {
        !self.mediator.is_empty()
    }
}

impl AuctionRequest {
    pub fn normalize(&mut self) {
        self.normalized_ext();
    }

    pub fn normalized_ext(&self) -> &RequestExt {
        self.ext_data.get_or_init(|| RequestExt::parse(&self.ext))
    }

    pub fn ad_format(&self) -> AdFormat {
        self.ad_object
            .banner
            .as_ref()
            .map(|banner| banner.format)
            .unwrap_or_default()
    }

    pub fn coppa(&self) -> bool {
        self.regulations.as_ref().map(|r| r.coppa).unwrap_or(false)
    }

    pub fn gdpr(&self) -> bool {
        self.regulations.as_ref().map(|r| r.gdpr).unwrap_or(false)
    }

    pub fn is_portrait(&self) -> bool {
        self.ad_object
            .orientation
            .as_deref()
            .map(|o| o.eq_ignore_ascii_case("portrait"))
            .unwrap_or(true)
    }

    /// 请求中 SDK 声明的 adapter，忽略未知 key
    pub fn adapter_keys(&self) -> Vec<AdapterKey> {
        let mut keys: Vec<AdapterKey> = self
            .adapters
            .keys()
            .filter_map(|key| key.parse().ok())
            .collect();
        keys.sort();
        keys
    }

    pub fn demand_token(&self, key: AdapterKey) -> Option<&DemandToken> {
        self.ad_object.demands.get(key.as_str())
    }

    pub fn adapter_info(&self, key: AdapterKey) -> Option<&AdapterInfo> {
        self.adapters.get(key.as_str())
    }
}

#[cfg(test)]
pub(crate) fn sample_request() -> AuctionRequest {
    let raw = serde_json::json!({
        "ad_type": "banner",
        "ad_object": {
            "auction_id": "auction-1",
            "price_floor": 0.01,
            "banner": {"format": "BANNER"},
            "demands": {"bidmachine": {"token": "bm-token", "token_start_ts": 1000, "token_finish_ts": 1010}}
        },
        "app": {"key": "app-key", "bundle": "com.example.app", "version": "1.0.0"},
        "device": {"os": "iOS", "type": "PHONE", "ua": "Mozilla/5.0", "geo": {"country": "DEU"}},
        "session": {"id": "session-1"},
        "adapters": {
            "bidmachine": {"version": "3.0.0", "sdk_version": "2.4.0"},
            "applovin": {"version": "1.0.0", "sdk_version": "11.0.0"}
        },
        "ext": "{}"
    });
    serde_json::from_value(raw).unwrap()
}
