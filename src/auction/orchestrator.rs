// src/auction/orchestrator.rs

use crate::auction::assembler::build_response;
use crate::auction::collaborators::{filter_by_ad_cache, AdapterEnabler, SegmentMatcher};
use crate::auction::error::AuctionError;
use crate::auction::floor::calculate_price_floor;
use crate::auction::matcher::AdUnitMatcher;
use crate::auction::resolver::{ConfigResolver, VERSION_V2};
use crate::bidding::bid_cache::BidCache;
use crate::bidding::engine::BiddingEngine;
use crate::logging::event_logger::EventLogger;
use crate::logging::events::build_events;
use crate::model::ad::BidType;
use crate::model::ad_unit::AdUnitsMap;
use crate::model::adapter::AdapterKey;
use crate::model::auction_config::AuctionConfig;
use crate::model::context::{AuctionResult, BiddingAuctionResult, BuildParams};
use crate::model::repository::InventoryRepository;
use crate::model::request::AuctionRequest;
use crate::model::response::AuctionResponse;
use num::{BigUint, Num};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// auction_key 是 base-32 编码的大整数，解码为十进制 uid
pub fn parse_auction_key(key: &str) -> Option<String> {
    BigUint::from_str_radix(key.trim(), 32)
        .ok()
        .map(|value| value.to_str_radix(10))
}

fn has_demand(config: &AuctionConfig, adapters: &[AdapterKey]) -> bool {
    config
        .demands
        .iter()
        .chain(config.bidding.iter())
        .any(|key| adapters.contains(key))
}

/// 拍卖流程所需的全部协作者
pub struct AuctionService {
    repository: Arc<dyn InventoryRepository>,
    segments: Arc<dyn SegmentMatcher>,
    enabler: Arc<dyn AdapterEnabler>,
    resolver: ConfigResolver,
    matcher: AdUnitMatcher,
    engine: BiddingEngine,
    bid_cache: BidCache,
    events: EventLogger,
}

impl AuctionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn InventoryRepository>,
        segments: Arc<dyn SegmentMatcher>,
        enabler: Arc<dyn AdapterEnabler>,
        resolver: ConfigResolver,
        matcher: AdUnitMatcher,
        engine: BiddingEngine,
        bid_cache: BidCache,
        events: EventLogger,
    ) -> Self {
        Self {
            repository,
            segments,
            enabler,
            resolver,
            matcher,
            engine,
            bid_cache,
            events,
        }
    }

    /// **执行一次拍卖**：
    /// 分群 → adapter 过滤 → 配置 → 底价 → 广告单元 → 竞价 → bid cache → 组装响应 → 事件
    pub async fn run(&self, mut request: AuctionRequest) -> Result<AuctionResponse, AuctionError> {
        let started = Instant::now();
        request.normalize();

        let app = self
            .repository
            .find_app(&request.app.key, &request.app.bundle)
            .await?
            .ok_or(AuctionError::AppNotFound)?;

        request.segment = self.segments.match_segment(app.id, &request.segment).await?;

        let adapters = filter_by_ad_cache(
            request.device.os,
            request.ad_type,
            request.adapter_keys(),
            &request.ad_cache,
        );
        let adapters = self.enabler.filter_enabled(app.id, adapters).await?;

        let config = self.resolve_config(app.id, &request).await?;
        if !has_demand(&config, &adapters) {
            warn!(
                auction_id = %request.ad_object.auction_id,
                config_id = config.id,
                "no configured demand among available adapters"
            );
            return Err(AuctionError::NoAds);
        }

        let price_floor = calculate_price_floor(&request, &config);
        request.ad_object.auction_configuration_id = Some(config.id);
        request.ad_object.auction_configuration_uid = Some(config.uid.clone());
        request.ad_object.price_floor = price_floor;

        let params = BuildParams {
            app_id: app.id,
            ad_type: request.ad_type,
            ad_format: request.ad_format(),
            device_type: request.device.device_type,
            adapters,
            segment: request.segment.clone(),
            price_floor: Some(price_floor),
            auction_key: request.ad_object.auction_key.clone(),
            auction_configuration: config.clone(),
            auction_request: request.clone(),
        };

        let ad_units = self.matcher.match_ad_units(&params).await?;
        let ad_units_map = AdUnitsMap::new(&ad_units);
        let cpm_ad_units = ad_units
            .iter()
            .filter(|unit| unit.bid_type == BidType::Cpm)
            .filter(|unit| {
                unit.demand_id
                    .parse::<AdapterKey>()
                    .map(|key| config.demands.contains(&key))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let bidding = self.engine.hold_auction(&params, &ad_units_map).await?;
        let bids = self.bid_cache.apply(&request, bidding.bids).await;

        let result = AuctionResult {
            auction_configuration: config,
            cpm_ad_units,
            ad_units,
            bidding_auction_result: BiddingAuctionResult {
                bids,
                start_ts: bidding.start_ts,
                end_ts: bidding.end_ts,
            },
            duration_ms: started.elapsed().as_millis() as i64,
        };

        let response = build_response(&request, &result, &ad_units_map);

        let events = build_events(&request, &result, &ad_units_map);
        let logger = self.events.clone();
        tokio::spawn(async move { logger.log(&events) });

        info!(
            auction_id = %response.auction_id,
            config_id = response.auction_configuration_id,
            price_floor,
            matched_ad_units = result.ad_units.len(),
            ad_units = response.ad_units.len(),
            no_bids = response.no_bids.len(),
            duration_ms = result.duration_ms,
            "auction finished"
        );
        Ok(response)
    }

    async fn resolve_config(
        &self,
        app_id: i64,
        request: &AuctionRequest,
    ) -> Result<AuctionConfig, AuctionError> {
        match request.ad_object.auction_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => {
                let uid = parse_auction_key(key).ok_or(AuctionError::InvalidAuctionKey)?;
                self.resolver
                    .fetch_by_uid_cached(app_id, 0, &uid)
                    .await?
                    .ok_or(AuctionError::InvalidAuctionKey)
            }
            None => {
                let segment_id = request.segment.id.parse::<i64>().ok();
                self.resolver
                    .match_config(app_id, request.ad_type, segment_id, VERSION_V2)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::collaborators::{InventoryAdapterEnabler, InventorySegmentMatcher};
    use crate::auction::matcher::tests::stored_unit;
    use crate::bidding::cache_store::MokaCacheStore;
    use crate::bidding::registry::BidderRegistry;
    use crate::config::settings::BidderConfig;
    use crate::logging::event_logger::{tracing_error_sink, MemoryPublisher};
    use crate::logging::events::EventKind;
    use crate::model::ad::AdFormat;
    use crate::model::auction_config::sample_config;
    use crate::model::repository::{AppDemand, AppRecord, FileInventoryRepository, Inventory};
    use crate::model::request::sample_request;
    use axum::routing::post;
    use axum::{Json, Router};
    use reqwest::Client;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn inventory() -> Inventory {
        let mut rtb = stored_unit(2, "bidmachine", AdFormat::Banner, None, true);
        rtb.extra = json!({"placement_id": "bm-placement"}).as_object().cloned().unwrap();
        Inventory {
            apps: vec![AppRecord {
                id: 1,
                key: "app-key".to_string(),
                bundle: "com.example.app".to_string(),
            }],
            auction_configurations: vec![sample_config()],
            ad_units: vec![
                stored_unit(1, "applovin", AdFormat::Banner, Some(0.5), false),
                rtb,
                stored_unit(3, "applovin", AdFormat::Banner, Some(0.01), false),
            ],
            app_demands: vec![
                AppDemand { app_id: 1, demand: AdapterKey::Applovin, enabled: true },
                AppDemand { app_id: 1, demand: AdapterKey::Bidmachine, enabled: true },
            ],
            ..Default::default()
        }
    }

    fn service(
        registry: BidderRegistry,
        publisher: Arc<MemoryPublisher>,
    ) -> AuctionService {
        let repository: Arc<dyn InventoryRepository> =
            Arc::new(FileInventoryRepository::new(inventory()));
        AuctionService::new(
            repository.clone(),
            Arc::new(InventorySegmentMatcher::new(repository.clone())),
            Arc::new(InventoryAdapterEnabler::new(repository.clone())),
            ConfigResolver::new(repository.clone(), Duration::from_secs(600), 100),
            AdUnitMatcher::new(repository),
            BiddingEngine::new(Client::new(), Arc::new(registry)),
            BidCache::new(Arc::new(MokaCacheStore::new(100)), Duration::from_secs(300)),
            EventLogger::new(publisher, tracing_error_sink()),
        )
    }

    async fn spawn_bidder(price: f64) -> String {
        let app = Router::new().route(
            "/auction/prebid/bidon",
            post(move |Json(request): Json<Value>| async move {
                Json(json!({
                    "id": request["id"],
                    "seatbid": [{"bid": [{"id": "bid-1", "impid": request["imp"][0]["id"], "price": price, "adm": "markup"}]}]
                }))
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/auction/prebid/bidon", addr)
    }

    async fn wait_for_events(publisher: &MemoryPublisher, count: usize) -> Vec<EventKind> {
        for _ in 0..50 {
            let kinds: Vec<EventKind> = publisher
                .events
                .lock()
                .unwrap()
                .iter()
                .map(|event| event.event_type)
                .collect();
            if kinds.len() >= count {
                return kinds;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Vec::new()
    }

    #[test]
    fn decodes_base32_auction_key() {
        assert_eq!(parse_auction_key("1f7kuvt600400").as_deref(), Some("1701972528521547776"));
        assert_eq!(parse_auction_key("10").as_deref(), Some("32"));
        assert!(parse_auction_key("not a key!").is_none());
    }

    #[tokio::test]
    async fn runs_full_auction() {
        let endpoint = spawn_bidder(1.2).await;
        let mut bidders = HashMap::new();
        bidders.insert(
            AdapterKey::Bidmachine,
            BidderConfig {
                endpoint: Some(endpoint),
                seller_id: Some("seller".to_string()),
                ..Default::default()
            },
        );
        let publisher = Arc::new(MemoryPublisher::default());
        let service = service(BidderRegistry::new(bidders), publisher.clone());

        let mut request = sample_request();
        request.ext = r#"{"mediator":"max"}"#.to_string();
        let response = service.run(request).await.unwrap();

        assert_eq!(response.auction_configuration_id, 1);
        assert_eq!(response.auction_pricefloor, 0.05);
        assert_eq!(response.auction_timeout, 15_000);
        let units: Vec<(&str, Option<f64>)> = response
            .ad_units
            .iter()
            .map(|unit| (unit.demand_id.as_str(), unit.price_floor))
            .collect();
        assert_eq!(units, vec![("bidmachine", Some(1.2)), ("applovin", Some(0.5))]);
        let bidmachine = &response.ad_units[0];
        assert_eq!(bidmachine.extra["payload"], "markup");
        assert_eq!(bidmachine.extra["placement_id"], "bm-placement");
        assert_eq!(bidmachine.extra["custom_parameters"]["mediator"], "max");

        let kinds = wait_for_events(&publisher, 3).await;
        assert_eq!(
            kinds,
            vec![EventKind::AuctionRequest, EventKind::BidRequest, EventKind::Bid]
        );
    }

    #[tokio::test]
    async fn unknown_app_is_rejected() {
        let service = service(BidderRegistry::default(), Arc::new(MemoryPublisher::default()));
        let mut request = sample_request();
        request.app.bundle = "com.other.app".to_string();
        assert!(matches!(service.run(request).await, Err(AuctionError::AppNotFound)));
    }

    #[tokio::test]
    async fn auction_key_selects_config() {
        let service = service(BidderRegistry::default(), Arc::new(MemoryPublisher::default()));

        let mut request = sample_request();
        request.ad_object.auction_key = Some("1f7kuvt600400".to_string());
        let response = service.run(request).await.unwrap();
        assert_eq!(response.auction_configuration_uid, "1701972528521547776");

        let mut request = sample_request();
        request.ad_object.auction_key = Some("zzz".to_string());
        assert!(matches!(service.run(request).await, Err(AuctionError::InvalidAuctionKey)));

        let mut request = sample_request();
        request.ad_object.auction_key = Some("1".to_string());
        assert!(matches!(service.run(request).await, Err(AuctionError::InvalidAuctionKey)));
    }

    #[tokio::test]
    async fn no_demand_is_no_ads() {
        let service = service(BidderRegistry::default(), Arc::new(MemoryPublisher::default()));
        let mut request = sample_request();
        request.adapters.clear();
        assert!(matches!(service.run(request).await, Err(AuctionError::NoAds)));
    }

    #[tokio::test]
    async fn unregistered_bidder_leaves_cpm_units() {
        let service = service(BidderRegistry::default(), Arc::new(MemoryPublisher::default()));
        let response = service.run(sample_request()).await.unwrap();
        assert_eq!(response.ad_units.len(), 1);
        assert_eq!(response.ad_units[0].demand_id, "applovin");
        assert!(response.no_bids.is_empty());
    }
}
