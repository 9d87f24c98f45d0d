// src/bidding/adapter.rs

use crate::model::adapter::AdapterKey;
use crate::model::demand::{BidData, DemandResponse};
use crate::model::request::{AuctionRequest, RequestExt};
use crate::openrtb::request::BidRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

/// 单个需求方的错误，只记录在该需求方的 DemandResponse 上，不影响其他需求方
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    #[error("adapter misconfigured: {0}")]
    Misconfigured(String),
    #[error("cannot build bid request: {0}")]
    InvalidRequest(String),
    #[error("bidder rejected request with status {0}")]
    Unauthorized(u16),
    #[error("unexpected bidder status {0}")]
    UnexpectedStatus(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bidder did not respond before the auction deadline")]
    Timeout,
    #[error("cannot parse bid response: {0}")]
    Parse(String),
}

impl AdapterError {
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Misconfigured(_) => "MISCONFIGURED",
            AdapterError::InvalidRequest(_) => "INVALID_REQUEST",
            AdapterError::Unauthorized(_) => "UNAUTHORIZED",
            AdapterError::UnexpectedStatus(_) => "UNEXPECTED_STATUS",
            AdapterError::Transport(_) => "TRANSPORT_ERROR",
            AdapterError::Timeout => "TIMEOUT",
            AdapterError::Parse(_) => "PARSE_ERROR",
        }
    }
}

/// 需求方的三步能力：构建请求、发送请求、解析出价
#[async_trait]
pub trait Adapter: Send + Sync {
    fn key(&self) -> AdapterKey;

    /// 需求方自己的超时，未配置时只受拍卖超时约束
    fn timeout(&self) -> Option<Duration>;

    fn create_request(
        &self,
        base: &BidRequest,
        request: &AuctionRequest,
    ) -> Result<BidRequest, AdapterError>;

    /// 永远返回 DemandResponse，错误记录在 `error` 上
    async fn execute(&self, client: &Client, request: &BidRequest) -> DemandResponse;

    fn parse_bids(&self, response: &DemandResponse) -> Result<Option<BidData>, AdapterError>;
}

/// 按需求方生成广告单元 ext 中的出价相关字段
pub fn demand_ext(key: AdapterKey, bid: &BidData, ext: &RequestExt) -> Map<String, Value> {
    let mut extra = Map::new();
    match key {
        AdapterKey::Amazon => {}
        AdapterKey::Mobilefuse => {
            extra.insert("signaldata".to_string(), Value::from(bid.signaldata.clone()));
        }
        AdapterKey::Vkads => {
            extra.insert("bid_id".to_string(), Value::from(bid.id.clone()));
        }
        AdapterKey::Bidmachine => {
            extra.insert("payload".to_string(), Value::from(bid.payload.clone()));
            if ext.has_mediator() {
                extra.insert("custom_parameters".to_string(), mediator_parameters(ext));
            }
        }
        _ => {
            extra.insert("payload".to_string(), Value::from(bid.payload.clone()));
        }
    }
    extra
}

pub fn mediator_parameters(ext: &RequestExt) -> Value {
    json!({ "mediator": ext.mediator })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::demand::bid_response;

    fn bid(key: AdapterKey) -> BidData {
        let mut bid = bid_response(key, 1.5).bid.unwrap();
        bid.signaldata = "signal".to_string();
        bid
    }

    #[test]
    fn builds_adapter_specific_ext() {
        let ext = RequestExt::default();
        assert!(demand_ext(AdapterKey::Amazon, &bid(AdapterKey::Amazon), &ext).is_empty());
        assert_eq!(
            demand_ext(AdapterKey::Mobilefuse, &bid(AdapterKey::Mobilefuse), &ext)["signaldata"],
            "signal"
        );
        assert_eq!(
            demand_ext(AdapterKey::Vkads, &bid(AdapterKey::Vkads), &ext)["bid_id"],
            "vkads-bid"
        );
        assert_eq!(
            demand_ext(AdapterKey::Vungle, &bid(AdapterKey::Vungle), &ext)["payload"],
            "vungle-payload"
        );
        let bidmachine = demand_ext(AdapterKey::Bidmachine, &bid(AdapterKey::Bidmachine), &ext);
        assert!(bidmachine.get("custom_parameters").is_none());
    }

    #[test]
    fn bidmachine_carries_mediator() {
        let ext = RequestExt::parse(r#"{"mediator":"max"}"#);
        let extra = demand_ext(AdapterKey::Bidmachine, &bid(AdapterKey::Bidmachine), &ext);
        assert_eq!(extra["custom_parameters"]["mediator"], "max");
        assert_eq!(extra["payload"], "bidmachine-payload");
    }

    #[test]
    fn error_codes() {
        assert_eq!(AdapterError::Timeout.code(), "TIMEOUT");
        assert_eq!(AdapterError::Unauthorized(403).code(), "UNAUTHORIZED");
        assert_eq!(AdapterError::UnexpectedStatus(500).code(), "UNEXPECTED_STATUS");
    }
}
