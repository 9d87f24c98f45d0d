// src/model/response.rs

use crate::model::ad_unit::AdUnit;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResponseSegment {
    pub id: String,
    pub uid: String,
}

/// 返回给 SDK 的拍卖结果
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuctionResponse {
    pub auction_configuration_id: i64,
    pub auction_configuration_uid: String,
    pub external_win_notifications: bool,
    pub ad_units: Vec<AdUnit>,
    pub no_bids: Vec<AdUnit>,
    pub segment: ResponseSegment,
    pub token: String,
    pub auction_pricefloor: f64,
    pub auction_timeout: u64,
    pub auction_id: String,
}
