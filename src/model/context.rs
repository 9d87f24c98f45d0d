// src/model/context.rs

use crate::model::ad::{AdFormat, AdType, DeviceType};
use crate::model::ad_unit::AdUnit;
use crate::model::adapter::AdapterKey;
use crate::model::auction_config::AuctionConfig;
use crate::model::demand::DemandResponse;
use crate::model::request::{AuctionRequest, Segment};

/// 单次请求内组装的构建参数
#[derive(Debug, Clone)]
pub struct BuildParams {
    pub app_id: i64,
    pub ad_type: AdType,
    pub ad_format: AdFormat,
    pub device_type: DeviceType,
    /// 已通过过滤的 adapter
    pub adapters: Vec<AdapterKey>,
    pub segment: Segment,
    pub price_floor: Option<f64>,
    pub auction_key: Option<String>,
    pub auction_configuration: AuctionConfig,
    pub auction_request: AuctionRequest,
}

#[derive(Debug, Clone, Default)]
pub struct BiddingAuctionResult {
    pub bids: Vec<DemandResponse>,
    pub start_ts: i64,
    pub end_ts: i64,
}

/// 拍卖内部结果
#[derive(Debug, Clone)]
pub struct AuctionResult {
    pub auction_configuration: AuctionConfig,
    pub cpm_ad_units: Vec<AdUnit>,
    pub ad_units: Vec<AdUnit>,
    pub bidding_auction_result: BiddingAuctionResult,
    pub duration_ms: i64,
}
