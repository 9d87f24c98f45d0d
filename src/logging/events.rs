// src/logging/events.rs

use crate::auction::assembler::select_ad_unit;
use crate::model::ad_unit::AdUnitsMap;
use crate::model::context::AuctionResult;
use crate::model::demand::DemandResponse;
use crate::model::request::AuctionRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AuctionRequest,
    BidRequest,
    Bid,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub start_ts: i64,
    pub finish_ts: i64,
}

/// 各阶段耗时
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingMap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction: Option<Timing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<Timing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Timing>,
}

/// **拍卖事件**，每行一个 JSON
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AdEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventKind,
    pub ad_type: String,
    pub ad_format: String,
    pub auction_id: String,
    pub auction_configuration_id: i64,
    pub auction_configuration_uid: i64,
    pub demand_id: String,
    pub ad_unit_uid: i64,
    pub ad_unit_label: String,
    #[serde(rename = "ECPM")]
    pub ecpm: f64,
    pub price_floor: f64,
    pub status: String,
    pub timing_map: TimingMap,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_request: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_response: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    pub app_bundle: String,
    pub session_id: String,
    pub segment_uid: String,
}

fn base_event(kind: EventKind, request: &AuctionRequest, result: &AuctionResult) -> AdEvent {
    let config = &result.auction_configuration;
    AdEvent {
        timestamp: Utc::now(),
        event_type: kind,
        ad_type: request.ad_type.as_str().to_string(),
        ad_format: request.ad_format().as_str().to_string(),
        auction_id: request.ad_object.auction_id.clone(),
        auction_configuration_id: config.id,
        auction_configuration_uid: config.uid_as_i64(),
        demand_id: String::new(),
        ad_unit_uid: 0,
        ad_unit_label: String::new(),
        ecpm: 0.0,
        price_floor: request.ad_object.price_floor,
        status: String::new(),
        timing_map: TimingMap::default(),
        raw_request: String::new(),
        raw_response: String::new(),
        error_message: String::new(),
        app_bundle: request.app.bundle.clone(),
        session_id: request.session.id.clone(),
        segment_uid: request.segment.uid.clone(),
    }
}

fn bid_timing(bid: &DemandResponse) -> Timing {
    Timing {
        start_ts: bid.start_ts,
        finish_ts: bid.end_ts,
    }
}

fn bid_events(
    request: &AuctionRequest,
    result: &AuctionResult,
    ad_units_map: &AdUnitsMap,
    bid: &DemandResponse,
) -> Vec<AdEvent> {
    let unit = select_ad_unit(bid, ad_units_map);
    let mut bid_request = base_event(EventKind::BidRequest, request, result);
    bid_request.demand_id = bid.demand_id.as_str().to_string();
    bid_request.ad_unit_uid = unit.map(|u| u.uid_as_i64()).unwrap_or(0);
    bid_request.ad_unit_label = unit.map(|u| u.label.clone()).unwrap_or_default();
    bid_request.ecpm = bid.price();
    bid_request.status = bid.status_code().to_string();
    bid_request.timing_map = TimingMap {
        auction: None,
        bid: Some(bid_timing(bid)),
        token: Some(Timing {
            start_ts: bid.token.start_ts,
            finish_ts: bid.token.end_ts,
        }),
    };
    bid_request.raw_request = bid.raw_request.clone();
    bid_request.raw_response = bid.raw_response.clone();
    bid_request.error_message = bid.error_message();

    if !bid.is_bid() {
        return vec![bid_request];
    }

    let mut won = base_event(EventKind::Bid, request, result);
    won.demand_id = bid_request.demand_id.clone();
    won.ad_unit_uid = bid_request.ad_unit_uid;
    won.ad_unit_label = bid_request.ad_unit_label.clone();
    won.ecpm = bid.price();
    won.status = "SUCCESS".to_string();
    won.timing_map = TimingMap {
        bid: Some(bid_timing(bid)),
        ..Default::default()
    };
    vec![bid_request, won]
}

/// 按顺序生成：auction_request，随后每个出价的 bid_request（及 bid）
pub fn build_events(
    request: &AuctionRequest,
    result: &AuctionResult,
    ad_units_map: &AdUnitsMap,
) -> Vec<AdEvent> {
    let bidding = &result.bidding_auction_result;
    let mut auction = base_event(EventKind::AuctionRequest, request, result);
    auction.status = "SUCCESS".to_string();
    auction.ecpm = bidding
        .bids
        .iter()
        .filter(|bid| bid.is_bid())
        .map(DemandResponse::price)
        .fold(0.0, f64::max);
    auction.timing_map.auction = Some(Timing {
        start_ts: bidding.start_ts,
        finish_ts: bidding.end_ts,
    });

    let mut events = vec![auction];
    for bid in &bidding.bids {
        events.extend(bid_events(request, result, ad_units_map, bid));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidding::adapter::AdapterError;
    use crate::model::ad::BidType;
    use crate::model::ad_unit::AdUnit;
    use crate::model::adapter::AdapterKey;
    use crate::model::auction_config::sample_config;
    use crate::model::context::BiddingAuctionResult;
    use crate::model::demand::bid_response;
    use crate::model::request::sample_request;
    use serde_json::Map;

    fn result(bids: Vec<DemandResponse>) -> AuctionResult {
        AuctionResult {
            auction_configuration: sample_config(),
            cpm_ad_units: Vec::new(),
            ad_units: Vec::new(),
            bidding_auction_result: BiddingAuctionResult {
                bids,
                start_ts: 100,
                end_ts: 250,
            },
            duration_ms: 150,
        }
    }

    fn units() -> AdUnitsMap {
        AdUnitsMap::new(&[AdUnit {
            demand_id: "bidmachine".to_string(),
            uid: "1701972528521547777".to_string(),
            label: "bm-rtb".to_string(),
            price_floor: None,
            bid_type: BidType::Rtb,
            timeout_ms: 5000,
            extra: Map::new(),
        }])
    }

    #[test]
    fn emits_request_then_bid_events() {
        let mut bid = bid_response(AdapterKey::Bidmachine, 1.25);
        bid.start_ts = 110;
        bid.end_ts = 200;
        bid.raw_request = "{\"id\":\"r\"}".to_string();
        let mut timeout = DemandResponse::new(AdapterKey::Vungle);
        timeout.error = Some(AdapterError::Timeout);

        let events = build_events(&sample_request(), &result(vec![bid, timeout]), &units());
        let kinds: Vec<EventKind> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::AuctionRequest,
                EventKind::BidRequest,
                EventKind::Bid,
                EventKind::BidRequest
            ]
        );

        let auction = &events[0];
        assert_eq!(auction.auction_configuration_uid, 1701972528521547776);
        assert_eq!(auction.ecpm, 1.25);
        assert_eq!(auction.timing_map.auction, Some(Timing { start_ts: 100, finish_ts: 250 }));

        let bid_request = &events[1];
        assert_eq!(bid_request.status, "SUCCESS");
        assert_eq!(bid_request.ad_unit_uid, 1701972528521547777);
        assert_eq!(bid_request.ad_unit_label, "bm-rtb");
        assert_eq!(bid_request.timing_map.token, Some(Timing { start_ts: 0, finish_ts: 0 }));
        assert_eq!(bid_request.raw_request, "{\"id\":\"r\"}");

        let won = &events[2];
        assert_eq!(won.ecpm, 1.25);
        assert_eq!(won.timing_map.bid, Some(Timing { start_ts: 110, finish_ts: 200 }));
        assert!(won.timing_map.token.is_none());

        let failed = &events[3];
        assert_eq!(failed.status, "TIMEOUT");
        assert_eq!(failed.ad_unit_uid, 0);
        assert!(!failed.error_message.is_empty());
    }

    #[test]
    fn unparsable_config_uid_is_zero() {
        let mut result = result(Vec::new());
        result.auction_configuration.uid = "not-a-number".to_string();
        let events = build_events(&sample_request(), &result, &AdUnitsMap::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].auction_configuration_uid, 0);

        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["event_type"], "auction_request");
        assert!(json.get("ECPM").is_some());
        assert!(json.get("raw_request").is_none());
    }
}
