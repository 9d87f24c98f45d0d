// src/auction/assembler.rs

use crate::bidding::adapter::{demand_ext, mediator_parameters};
use crate::model::ad::BidType;
use crate::model::ad_unit::{AdUnit, AdUnitsMap};
use crate::model::adapter::AdapterKey;
use crate::model::context::AuctionResult;
use crate::model::demand::DemandResponse;
use crate::model::request::AuctionRequest;
use crate::model::response::{AuctionResponse, ResponseSegment};
use std::cmp::Ordering;
use tracing::warn;

/// 为 RTB 出价找到对应的广告单元，amazon 按 slot_uuid 匹配
pub fn select_ad_unit<'a>(bid: &DemandResponse, ad_units: &'a AdUnitsMap) -> Option<&'a AdUnit> {
    let units = ad_units.get(bid.demand_id, BidType::Rtb);
    match bid.demand_id {
        AdapterKey::Amazon => units
            .iter()
            .find(|unit| unit.extra_str("slot_uuid") == Some(bid.slot_uuid.as_str())),
        _ => units.first(),
    }
}

fn is_coppa_blocked(request: &AuctionRequest, demand_id: &str) -> bool {
    request.coppa()
        && demand_id
            .parse::<AdapterKey>()
            .map(|key| key.is_coppa_disabled())
            .unwrap_or(false)
}

fn bid_ad_unit(request: &AuctionRequest, bid: &DemandResponse, unit: &AdUnit) -> AdUnit {
    let mut extra = match &bid.bid {
        Some(data) => demand_ext(bid.demand_id, data, request.normalized_ext()),
        None => Default::default(),
    };
    for (key, value) in &unit.extra {
        extra.insert(key.clone(), value.clone());
    }
    AdUnit {
        demand_id: bid.demand_id.as_str().to_string(),
        uid: unit.uid.clone(),
        label: unit.label.clone(),
        price_floor: bid.bid.as_ref().map(|data| data.price),
        bid_type: BidType::Rtb,
        timeout_ms: unit.timeout_ms,
        extra,
    }
}

/// 按价格降序的稳定排序，同价保持原有顺序
pub fn sort_by_price(ad_units: &mut [AdUnit]) {
    ad_units.sort_by(|a, b| {
        let a = a.price_floor.unwrap_or(0.0);
        let b = b.price_floor.unwrap_or(0.0);
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });
}

/// 合并 CPM 单元与 RTB 出价，生成最终响应
pub fn build_response(
    request: &AuctionRequest,
    result: &AuctionResult,
    ad_units_map: &AdUnitsMap,
) -> AuctionResponse {
    let config = &result.auction_configuration;
    let ext = request.normalized_ext();
    let floor = request.ad_object.price_floor;

    let mut ad_units = Vec::new();
    let mut no_bids = Vec::new();

    for unit in &result.cpm_ad_units {
        if is_coppa_blocked(request, &unit.demand_id) {
            continue;
        }
        let mut unit = unit.clone();
        if unit.demand_id == AdapterKey::Bidmachine.as_str() && ext.has_mediator() {
            unit.extra
                .insert("custom_parameters".to_string(), mediator_parameters(ext));
        }
        ad_units.push(unit);
    }

    for bid in &result.bidding_auction_result.bids {
        if is_coppa_blocked(request, bid.demand_id.as_str()) {
            continue;
        }
        let Some(unit) = select_ad_unit(bid, ad_units_map) else {
            if bid.is_bid() {
                warn!(
                    demand_id = %bid.demand_id,
                    auction_id = %request.ad_object.auction_id,
                    price = bid.price(),
                    "bid dropped: no rtb ad unit for demand"
                );
            }
            continue;
        };
        let unit = bid_ad_unit(request, bid, unit);
        if bid.is_bid() && bid.price() > floor {
            ad_units.push(unit);
        } else {
            no_bids.push(unit);
        }
    }

    sort_by_price(&mut ad_units);

    AuctionResponse {
        auction_configuration_id: config.id,
        auction_configuration_uid: config.uid.clone(),
        external_win_notifications: config.external_win_notifications,
        ad_units,
        no_bids,
        segment: ResponseSegment {
            id: request.segment.id.clone(),
            uid: request.segment.uid.clone(),
        },
        token: "{}".to_string(),
        auction_pricefloor: floor,
        auction_timeout: config.effective_timeout_ms(),
        auction_id: request.ad_object.auction_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::auction_config::sample_config;
    use crate::model::context::BiddingAuctionResult;
    use crate::model::demand::bid_response;
    use crate::model::request::{sample_request, Regulations};
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    fn unit(demand_id: &str, uid: &str, bid_type: BidType, price: Option<f64>, extra: Value) -> AdUnit {
        AdUnit {
            demand_id: demand_id.to_string(),
            uid: uid.to_string(),
            label: format!("{}-{}", demand_id, uid),
            price_floor: price,
            bid_type,
            timeout_ms: 5000,
            extra: extra.as_object().cloned().unwrap_or_else(Map::new),
        }
    }

    fn result(cpm: Vec<AdUnit>, bids: Vec<DemandResponse>) -> AuctionResult {
        AuctionResult {
            auction_configuration: sample_config(),
            cpm_ad_units: cpm,
            ad_units: Vec::new(),
            bidding_auction_result: BiddingAuctionResult {
                bids,
                start_ts: 0,
                end_ts: 0,
            },
            duration_ms: 0,
        }
    }

    #[test]
    fn amazon_bid_selects_unit_by_slot() {
        let units = vec![
            unit("amazon", "1", BidType::Rtb, None, json!({"slot_uuid": "A"})),
            unit("amazon", "2", BidType::Rtb, None, json!({"slot_uuid": "B"})),
        ];
        let map = AdUnitsMap::new(&units);
        let mut bid = bid_response(AdapterKey::Amazon, 1.0);
        bid.slot_uuid = "B".to_string();
        assert_eq!(select_ad_unit(&bid, &map).map(|u| u.uid.as_str()), Some("2"));

        bid.slot_uuid = "C".to_string();
        assert!(select_ad_unit(&bid, &map).is_none());
    }

    #[test]
    fn bidmachine_carries_mediator_parameters() {
        let mut request = sample_request();
        request.ext = r#"{"mediator":"max"}"#.to_string();
        let units = vec![
            unit("bidmachine", "10", BidType::Rtb, None, json!({"placement_id": "p"})),
            unit("bidmachine", "11", BidType::Cpm, Some(0.3), json!({})),
        ];
        let map = AdUnitsMap::new(&units);
        let result = result(vec![units[1].clone()], vec![bid_response(AdapterKey::Bidmachine, 1.0)]);

        let response = build_response(&request, &result, &map);
        assert_eq!(response.ad_units.len(), 2);
        for unit in &response.ad_units {
            assert_eq!(unit.extra["custom_parameters"]["mediator"], "max");
        }
        let rtb = &response.ad_units[0];
        assert_eq!(rtb.bid_type, BidType::Rtb);
        assert_eq!(rtb.price_floor, Some(1.0));
        assert_eq!(rtb.extra["payload"], "bidmachine-payload");
        assert_eq!(rtb.extra["placement_id"], "p");
    }

    #[test]
    fn bids_at_or_below_floor_are_no_bids() {
        let mut request = sample_request();
        request.ad_object.price_floor = 1.0;
        let units = vec![
            unit("vungle", "1", BidType::Rtb, None, json!({})),
            unit("meta", "2", BidType::Rtb, None, json!({})),
            unit("vkads", "3", BidType::Rtb, None, json!({})),
        ];
        let map = AdUnitsMap::new(&units);
        let mut errored = DemandResponse::new(AdapterKey::Vkads);
        errored.error = Some(crate::bidding::adapter::AdapterError::Timeout);
        let result = result(
            Vec::new(),
            vec![
                bid_response(AdapterKey::Vungle, 1.0),
                bid_response(AdapterKey::Meta, 1.5),
                errored,
            ],
        );

        let response = build_response(&request, &result, &map);
        assert_eq!(response.ad_units.len(), 1);
        assert_eq!(response.ad_units[0].demand_id, "meta");
        assert_eq!(response.no_bids.len(), 2);
        assert_eq!(response.no_bids[1].price_floor, None);
    }

    #[test]
    fn bid_without_rtb_unit_is_dropped() {
        let units = vec![unit("vungle", "1", BidType::Rtb, None, json!({}))];
        let map = AdUnitsMap::new(&units);
        let result = result(
            Vec::new(),
            vec![
                bid_response(AdapterKey::Meta, 3.0),
                bid_response(AdapterKey::Vungle, 1.0),
            ],
        );

        let response = build_response(&sample_request(), &result, &map);
        let ids: Vec<&str> = response.ad_units.iter().map(|u| u.demand_id.as_str()).collect();
        assert_eq!(ids, vec!["vungle"]);
        assert!(response.no_bids.is_empty());
    }

    #[test]
    fn coppa_drops_disabled_adapters() {
        let mut request = sample_request();
        request.regulations = Some(Regulations {
            coppa: true,
            ..Default::default()
        });
        let units = vec![
            unit("meta", "1", BidType::Rtb, None, json!({})),
            unit("vungle", "2", BidType::Rtb, None, json!({})),
        ];
        let map = AdUnitsMap::new(&units);
        let cpm = vec![
            unit("mintegral", "3", BidType::Cpm, Some(0.5), json!({})),
            unit("applovin", "4", BidType::Cpm, Some(0.4), json!({})),
        ];
        let result = result(
            cpm,
            vec![
                bid_response(AdapterKey::Meta, 2.0),
                bid_response(AdapterKey::Vungle, 1.0),
            ],
        );

        let response = build_response(&request, &result, &map);
        let ids: Vec<&str> = response.ad_units.iter().map(|u| u.demand_id.as_str()).collect();
        assert_eq!(ids, vec!["vungle", "applovin"]);
    }

    #[test]
    fn skeleton_fields() {
        let mut request = sample_request();
        request.segment.id = "7".to_string();
        request.segment.uid = "seg-7".to_string();
        let response = build_response(&request, &result(Vec::new(), Vec::new()), &AdUnitsMap::default());
        assert_eq!(response.token, "{}");
        assert_eq!(response.auction_id, "auction-1");
        assert_eq!(response.auction_pricefloor, 0.01);
        assert_eq!(response.auction_timeout, 15_000);
        assert_eq!(response.auction_configuration_uid, "1701972528521547776");
        assert_eq!(response.segment.uid, "seg-7");
    }

    proptest! {
        #[test]
        fn sorted_descending_and_stable(prices in proptest::collection::vec(0u8..5, 0..20)) {
            let mut units: Vec<AdUnit> = prices
                .iter()
                .enumerate()
                .map(|(i, price)| {
                    unit("applovin", &i.to_string(), BidType::Cpm, Some(f64::from(*price)), json!({}))
                })
                .collect();
            sort_by_price(&mut units);
            for pair in units.windows(2) {
                let (a, b) = (pair[0].price_floor, pair[1].price_floor);
                prop_assert!(a >= b);
                if a == b {
                    let first: usize = pair[0].uid.parse().unwrap();
                    let second: usize = pair[1].uid.parse().unwrap();
                    prop_assert!(first < second);
                }
            }
        }
    }
}
