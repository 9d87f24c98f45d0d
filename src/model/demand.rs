// src/model/demand.rs

use crate::bidding::adapter::AdapterError;
use crate::model::adapter::AdapterKey;
use serde::{Deserialize, Serialize};

/// 单个需求方的出价
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BidData {
    pub id: String,
    pub imp_id: String,
    pub price: f64,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub signaldata: String,
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub seat_id: String,
    #[serde(default)]
    pub lurl: String,
    #[serde(default)]
    pub nurl: String,
    #[serde(default)]
    pub burl: String,
    pub demand_id: AdapterKey,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenTiming {
    pub start_ts: i64,
    pub end_ts: i64,
}

/// 单个需求方在一次拍卖中的结果，只存活于请求内部
#[derive(Debug, Clone)]
pub struct DemandResponse {
    pub demand_id: AdapterKey,
    pub request_id: String,
    /// HTTP 状态码，超时或未发出请求时为 None
    pub status: Option<u16>,
    pub tag_id: String,
    pub placement_id: String,
    pub slot_uuid: String,
    pub timeout_url: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub token: TokenTiming,
    pub raw_request: String,
    pub raw_response: String,
    pub error: Option<AdapterError>,
    pub bid: Option<BidData>,
    /// 是否允许进入 bid cache
    pub cacheable: bool,
}

impl DemandResponse {
    pub fn new(demand_id: AdapterKey) -> Self {
        Self {
            demand_id,
            request_id: String::new(),
            status: None,
            tag_id: String::new(),
            placement_id: String::new(),
            slot_uuid: String::new(),
            timeout_url: String::new(),
            start_ts: 0,
            end_ts: 0,
            token: TokenTiming::default(),
            raw_request: String::new(),
            raw_response: String::new(),
            error: None,
            bid: None,
            cacheable: demand_id.is_bid_cacheable(),
        }
    }

    pub fn is_bid(&self) -> bool {
        self.error.is_none() && self.bid.as_ref().map(|b| b.price > 0.0).unwrap_or(false)
    }

    pub fn price(&self) -> f64 {
        self.bid.as_ref().map(|b| b.price).unwrap_or(0.0)
    }

    /// 事件日志中的状态字符串
    pub fn status_code(&self) -> &'static str {
        match &self.error {
            Some(error) => error.code(),
            None if self.is_bid() => "SUCCESS",
            None => "NO_BID",
        }
    }

    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn bid_response(demand_id: AdapterKey, price: f64) -> DemandResponse {
    let mut response = DemandResponse::new(demand_id);
    response.status = Some(200);
    response.bid = Some(BidData {
        id: format!("{}-bid", demand_id),
        imp_id: "imp-1".to_string(),
        price,
        payload: format!("{}-payload", demand_id),
        signaldata: String::new(),
        ad_id: String::new(),
        seat_id: String::new(),
        lurl: String::new(),
        nurl: String::new(),
        burl: String::new(),
        demand_id,
    });
    response
}
