// src/bidding/engine.rs

use crate::auction::error::AuctionError;
use crate::bidding::adapter::{Adapter, AdapterError};
use crate::bidding::registry::BidderRegistry;
use crate::model::ad::BidType;
use crate::model::ad_unit::AdUnitsMap;
use crate::model::adapter::AdapterKey;
use crate::model::context::{BiddingAuctionResult, BuildParams};
use crate::model::demand::{DemandResponse, TokenTiming};
use crate::model::request::AuctionRequest;
use crate::openrtb::request::{App, BidRequest, Device, Geo, Regs, RegsExt};
use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

/// 竞价引擎：并发请求所有选中的需求方，受拍卖截止时间约束
pub struct BiddingEngine {
    client: Client,
    registry: Arc<BidderRegistry>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 所有需求方共享的连接池，不设客户端级超时，由 adapter 截止时间约束
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder().build()
}

/// 单个需求方的截止时间：min(拍卖超时, 需求方超时)，至少 1ms
pub fn adapter_deadline(auction_timeout: Duration, adapter_timeout: Option<Duration>) -> Duration {
    let deadline = match adapter_timeout {
        Some(adapter_timeout) => auction_timeout.min(adapter_timeout),
        None => auction_timeout,
    };
    deadline.max(Duration::from_millis(1))
}

/// config.bidding ∩ 请求中可用的 adapter，保持配置顺序
pub fn select_bidders(params: &BuildParams) -> Vec<AdapterKey> {
    params
        .auction_configuration
        .bidding
        .iter()
        .filter(|key| params.adapters.contains(key))
        .copied()
        .collect()
}

/// 各需求方共享的 BidRequest 基础部分
pub fn build_base_request(request: &AuctionRequest, tmax: Duration) -> BidRequest {
    let device = &request.device;
    BidRequest {
        id: Uuid::new_v4().to_string(),
        imp: Vec::new(),
        app: Some(App {
            id: None,
            bundle: Some(request.app.bundle.clone()),
            ver: Some(request.app.version.clone()),
            publisher: None,
        }),
        device: Some(Device {
            ua: Some(device.ua.clone()),
            ip: device.ip.clone(),
            geo: device.geo.as_ref().map(|geo| Geo {
                country: geo.country.clone(),
                city: geo.city.clone(),
                lat: geo.lat,
                lon: geo.lon,
            }),
            devicetype: device.device_type.openrtb_code(),
            make: device.make.clone(),
            model: device.model.clone(),
            os: Some(device.os.as_str().to_string()),
            osv: device.os_version.clone(),
            language: device.language.clone(),
            ifa: request.user.as_ref().and_then(|user| user.idfa.clone()),
        }),
        user: None,
        regs: Some(Regs {
            coppa: u8::from(request.coppa()),
            ext: Some(RegsExt {
                gdpr: u8::from(request.gdpr()),
                us_privacy: request
                    .regulations
                    .as_ref()
                    .and_then(|regs| regs.us_privacy.clone()),
            }),
        }),
        test: request.test.then_some(1),
        at: Some(1),
        tmax: Some(tmax.as_millis() as u64),
        cur: vec!["USD".to_string()],
        ext: None,
    }
}

impl BiddingEngine {
    pub fn new(client: Client, registry: Arc<BidderRegistry>) -> Self {
        Self { client, registry }
    }

    pub async fn hold_auction(
        &self,
        params: &BuildParams,
        ad_units: &AdUnitsMap,
    ) -> Result<BiddingAuctionResult, AuctionError> {
        let start_ts = now_millis();
        let keys = select_bidders(params);
        if keys.is_empty() {
            return Ok(BiddingAuctionResult {
                bids: Vec::new(),
                start_ts,
                end_ts: start_ts,
            });
        }

        let adapters = self
            .registry
            .build_all(&keys)
            .map_err(AuctionError::AdapterMisconfigured)?;

        let auction_timeout =
            Duration::from_millis(params.auction_configuration.effective_timeout_ms());
        let base = build_base_request(&params.auction_request, auction_timeout);

        let tasks = adapters.iter().map(|adapter| {
            self.run_adapter(adapter.as_ref(), &base, params, ad_units, auction_timeout)
        });
        let bids = join_all(tasks).await;

        let end_ts = now_millis();
        info!(
            auction_id = %params.auction_request.ad_object.auction_id,
            segment_uid = %params.segment.uid,
            auction_key = params.auction_key.as_deref().unwrap_or_default(),
            bidders = bids.len(),
            bids = bids.iter().filter(|bid| bid.is_bid()).count(),
            elapsed_ms = end_ts - start_ts,
            "bidding round finished"
        );
        Ok(BiddingAuctionResult {
            bids,
            start_ts,
            end_ts,
        })
    }

    async fn run_adapter(
        &self,
        adapter: &dyn Adapter,
        base: &BidRequest,
        params: &BuildParams,
        ad_units: &AdUnitsMap,
        auction_timeout: Duration,
    ) -> DemandResponse {
        let key = adapter.key();
        let request = &params.auction_request;
        let deadline = adapter_deadline(auction_timeout, adapter.timeout());

        let mut response = match adapter.create_request(base, request) {
            Err(e) => {
                let mut response = DemandResponse::new(key);
                response.error = Some(e);
                response
            }
            Ok(bid_request) => {
                let start_ts = now_millis();
                // 超时后 future 被丢弃，进行中的 HTTP 请求随之取消
                match timeout(deadline, adapter.execute(&self.client, &bid_request)).await {
                    Ok(response) => response,
                    Err(_) => {
                        let mut response = DemandResponse::new(key);
                        response.request_id = bid_request.id.clone();
                        response.raw_request =
                            serde_json::to_string(&bid_request).unwrap_or_default();
                        response.start_ts = start_ts;
                        response.end_ts = now_millis();
                        response.error = Some(AdapterError::Timeout);
                        response
                    }
                }
            }
        };

        if response.error.is_none() {
            match adapter.parse_bids(&response) {
                Ok(bid) => response.bid = bid,
                Err(e) => response.error = Some(e),
            }
        }

        if let Some(token) = request.demand_token(key) {
            response.token = TokenTiming {
                start_ts: token.token_start_ts.unwrap_or_default(),
                end_ts: token.token_finish_ts.unwrap_or_default(),
            };
            if let Some(slot_uuid) = &token.slot_uuid {
                response.slot_uuid = slot_uuid.clone();
            }
        }
        if let Some(unit) = ad_units.get(key, BidType::Rtb).first() {
            response.placement_id = unit.extra_str("placement_id").unwrap_or_default().to_string();
            response.tag_id = unit.extra_str("tag_id").unwrap_or_default().to_string();
        }

        debug!(
            demand_id = %key,
            status = response.status_code(),
            price = response.price(),
            "bidder result"
        );
        response
    }
}
