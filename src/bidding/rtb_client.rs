// src/bidding/rtb_client.rs

use crate::bidding::adapter::{Adapter, AdapterError};
use crate::bidding::datacenter::resolve_endpoint;
use crate::config::settings::BidderConfig;
use crate::model::ad::{AdType, DeviceType};
use crate::model::adapter::AdapterKey;
use crate::model::demand::{BidData, DemandResponse};
use crate::model::request::AuctionRequest;
use crate::openrtb::request::{
    Banner, BidRequest, Imp, ImpExt, Publisher, Video, POSITION_ABOVE_FOLD, POSITION_FULLSCREEN,
};
use crate::openrtb::response::BidResponse;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const INTERSTITIAL_MIMES: [&str; 5] = [
    "video/mp4",
    "video/3gpp",
    "video/3gpp2",
    "video/x-m4v",
    "video/quicktime",
];

const REWARDED_MIMES: [&str; 5] = [
    "video/mp4",
    "video/x-m4v",
    "video/quicktime",
    "video/mpeg",
    "video/avi",
];

/// 用户可交互（可跳过）的创意属性，激励视频需屏蔽
const BATTR_USER_INTERACTIVE: u8 = 16;

/// 通用 OpenRTB 需求方客户端（bidmachine 风格）
#[derive(Debug, Clone)]
pub struct RtbClient {
    key: AdapterKey,
    endpoint: String,
    seller_id: String,
    timeout: Option<Duration>,
    credentials: Map<String, Value>,
}

impl RtbClient {
    /// endpoint 与 seller_id 为必填项
    pub fn new(key: AdapterKey, config: &BidderConfig) -> Result<Self, AdapterError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AdapterError::Misconfigured(format!("{}: missing endpoint", key)))?;
        let seller_id = config
            .seller_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::Misconfigured(format!("{}: missing seller_id", key)))?;

        Ok(Self {
            key,
            endpoint,
            seller_id,
            timeout: config.timeout_ms.map(Duration::from_millis),
            credentials: config.credentials.clone(),
        })
    }
}

/// 全屏广告尺寸，横屏时交换宽高
fn fullscreen_size(device_type: DeviceType, portrait: bool) -> (u32, u32) {
    let (w, h) = match device_type {
        DeviceType::Tablet => (768, 1024),
        _ => (320, 480),
    };
    if portrait {
        (w, h)
    } else {
        (h, w)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl Adapter for RtbClient {
    fn key(&self) -> AdapterKey {
        self.key
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn create_request(
        &self,
        base: &BidRequest,
        request: &AuctionRequest,
    ) -> Result<BidRequest, AdapterError> {
        let info = request.adapter_info(self.key).ok_or_else(|| {
            AdapterError::InvalidRequest(format!("{} is not reported by the sdk", self.key))
        })?;
        let token = request
            .demand_token(self.key)
            .and_then(|demand| demand.token.clone());

        let mut imp = Imp {
            id: Uuid::new_v4().to_string(),
            displaymanager: Some(self.key.as_str().to_string()),
            displaymanagerver: Some(info.sdk_version.clone()),
            secure: Some(1),
            bidfloor: request.ad_object.price_floor,
            bidfloorcur: Some("USD".to_string()),
            ext: Some(ImpExt {
                bid_token: token,
                ..Default::default()
            }),
            ..Default::default()
        };

        let device_type = request.device.device_type;
        match request.ad_type {
            AdType::Banner => {
                let format = request.ad_format();
                let (w, h) = format.size(device_type).ok_or_else(|| {
                    AdapterError::InvalidRequest(format!("unsupported banner format {:?}", format))
                })?;
                imp.banner = Some(Banner {
                    w,
                    h,
                    pos: Some(POSITION_ABOVE_FOLD),
                    battr: Vec::new(),
                });
                imp.instl = 0;
            }
            AdType::Interstitial | AdType::Rewarded => {
                let (w, h) = fullscreen_size(device_type, request.is_portrait());
                let rewarded = request.ad_type == AdType::Rewarded;
                let battr = if rewarded {
                    vec![BATTR_USER_INTERACTIVE]
                } else {
                    Vec::new()
                };
                let mimes = if rewarded {
                    REWARDED_MIMES.to_vec()
                } else {
                    INTERSTITIAL_MIMES.to_vec()
                };

                imp.banner = Some(Banner {
                    w,
                    h,
                    pos: Some(POSITION_FULLSCREEN),
                    battr: battr.clone(),
                });
                imp.video = Some(Video {
                    mimes: mimes.into_iter().map(String::from).collect(),
                    w,
                    h,
                    protocols: if rewarded { (1..=14).collect() } else { Vec::new() },
                    pos: Some(POSITION_FULLSCREEN),
                    linearity: Some(1),
                    battr,
                });
                imp.instl = 1;
                if rewarded {
                    if let Some(ext) = imp.ext.as_mut() {
                        ext.rewarded = Some(1);
                    }
                }
            }
        }

        let mut bid_request = base.clone();
        bid_request.imp = vec![imp];
        let app = bid_request.app.get_or_insert_with(Default::default);
        app.publisher = Some(Publisher {
            id: self.seller_id.clone(),
        });
        // 需求方要求的接入凭证放在 ext.credentials
        if !self.credentials.is_empty() {
            bid_request.ext.get_or_insert_with(Map::new).insert(
                "credentials".to_string(),
                Value::Object(self.credentials.clone()),
            );
        }
        Ok(bid_request)
    }

    async fn execute(&self, client: &Client, request: &BidRequest) -> DemandResponse {
        let mut response = DemandResponse::new(self.key);
        response.request_id = request.id.clone();
        response.start_ts = now_millis();

        let raw_request = match serde_json::to_string(request) {
            Ok(raw) => raw,
            Err(e) => {
                response.error = Some(AdapterError::InvalidRequest(e.to_string()));
                response.end_ts = now_millis();
                return response;
            }
        };
        response.raw_request = raw_request.clone();

        let country = request
            .device
            .as_ref()
            .and_then(|device| device.geo.as_ref())
            .and_then(|geo| geo.country.as_deref());
        let url = resolve_endpoint(&self.endpoint, country);

        match client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(raw_request)
            .send()
            .await
        {
            Ok(resp) => {
                response.status = Some(resp.status().as_u16());
                match resp.text().await {
                    Ok(body) => response.raw_response = body,
                    Err(e) => response.error = Some(AdapterError::Transport(e.to_string())),
                }
            }
            Err(e) => response.error = Some(AdapterError::Transport(e.to_string())),
        }
        response.end_ts = now_millis();

        debug!(
            demand_id = %self.key,
            url = %url,
            status = ?response.status,
            elapsed_ms = response.end_ts - response.start_ts,
            "bidder responded"
        );
        response
    }

    fn parse_bids(&self, response: &DemandResponse) -> Result<Option<BidData>, AdapterError> {
        match response.status {
            Some(204) => Ok(None),
            Some(400) | Some(401) | Some(403) | Some(503) => {
                Err(AdapterError::Unauthorized(response.status.unwrap_or_default()))
            }
            Some(200) => {
                let mut body = response.raw_response.clone().into_bytes();
                let bid_response: BidResponse = simd_json::serde::from_slice(&mut body)
                    .map_err(|e| AdapterError::Parse(e.to_string()))?;
                let seat_bid = bid_response
                    .seatbid
                    .first()
                    .ok_or_else(|| AdapterError::Parse("empty seatbid".to_string()))?;
                let bid = seat_bid
                    .bid
                    .first()
                    .ok_or_else(|| AdapterError::Parse("empty bid".to_string()))?;
                let ext = bid.ext.clone().unwrap_or_default();

                Ok(Some(BidData {
                    id: bid.id.clone(),
                    imp_id: bid.impid.clone(),
                    price: bid.price,
                    payload: bid.adm.clone().or(ext.payload).unwrap_or_default(),
                    signaldata: ext.signaldata.unwrap_or_default(),
                    ad_id: bid.adid.clone().unwrap_or_default(),
                    seat_id: seat_bid.seat.clone().unwrap_or_default(),
                    lurl: bid.lurl.clone().unwrap_or_default(),
                    nurl: bid.nurl.clone().unwrap_or_default(),
                    burl: bid.burl.clone().unwrap_or_default(),
                    demand_id: self.key,
                }))
            }
            Some(other) => Err(AdapterError::UnexpectedStatus(other)),
            None => Err(AdapterError::Transport("no response from bidder".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ad::AdFormat;
    use crate::model::request::{sample_request, BannerAdObject};
    use crate::openrtb::request::{App, Device, Geo};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    fn client(endpoint: &str) -> RtbClient {
        RtbClient::new(
            AdapterKey::Bidmachine,
            &BidderConfig {
                endpoint: Some(endpoint.to_string()),
                seller_id: Some("seller-1".to_string()),
                timeout_ms: Some(500),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn base() -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            app: Some(App {
                bundle: Some("com.example.app".to_string()),
                ..Default::default()
            }),
            device: Some(Device {
                geo: Some(Geo {
                    country: Some("USA".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn requires_endpoint_and_seller_id() {
        let missing_seller = BidderConfig {
            endpoint: Some("https://example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            RtbClient::new(AdapterKey::Bidmachine, &missing_seller),
            Err(AdapterError::Misconfigured(_))
        ));
        assert!(matches!(
            RtbClient::new(AdapterKey::Bidmachine, &BidderConfig::default()),
            Err(AdapterError::Misconfigured(_))
        ));
    }

    #[test]
    fn forwards_credentials_in_ext() {
        let adapter = RtbClient::new(
            AdapterKey::Bidmachine,
            &BidderConfig {
                endpoint: Some("http://localhost".to_string()),
                seller_id: Some("seller-1".to_string()),
                credentials: json!({"api_key": "secret"}).as_object().cloned().unwrap(),
                ..Default::default()
            },
        )
        .unwrap();
        let bid_request = adapter.create_request(&base(), &sample_request()).unwrap();
        assert_eq!(
            bid_request.ext.unwrap()["credentials"]["api_key"],
            Value::from("secret")
        );

        let plain = client("http://localhost")
            .create_request(&base(), &sample_request())
            .unwrap();
        assert!(plain.ext.is_none());
    }

    #[test]
    fn builds_banner_imp() {
        let mut request = sample_request();
        request.ad_object.banner = Some(BannerAdObject {
            format: AdFormat::Adaptive,
        });
        request.device.device_type = DeviceType::Tablet;
        request.ad_object.price_floor = 0.3;

        let bid_request = client("http://localhost").create_request(&base(), &request).unwrap();
        let imp = &bid_request.imp[0];
        let banner = imp.banner.as_ref().unwrap();
        assert_eq!((banner.w, banner.h), (728, 90));
        assert_eq!(banner.pos, Some(POSITION_ABOVE_FOLD));
        assert_eq!(imp.instl, 0);
        assert_eq!(imp.secure, Some(1));
        assert_eq!(imp.bidfloor, 0.3);
        assert_eq!(imp.displaymanager.as_deref(), Some("bidmachine"));
        assert_eq!(imp.displaymanagerver.as_deref(), Some("2.4.0"));
        assert_eq!(
            imp.ext.as_ref().and_then(|e| e.bid_token.as_deref()),
            Some("bm-token")
        );
        assert!(imp.video.is_none());
        assert_eq!(
            bid_request.app.unwrap().publisher.unwrap().id,
            "seller-1".to_string()
        );
        assert_ne!(imp.id, client("http://localhost").create_request(&base(), &request).unwrap().imp[0].id);
    }

    #[test]
    fn builds_interstitial_imp_in_landscape() {
        let mut request = sample_request();
        request.ad_type = AdType::Interstitial;
        request.ad_object.banner = None;
        request.ad_object.orientation = Some("LANDSCAPE".to_string());

        let bid_request = client("http://localhost").create_request(&base(), &request).unwrap();
        let imp = &bid_request.imp[0];
        let banner = imp.banner.as_ref().unwrap();
        let video = imp.video.as_ref().unwrap();
        assert_eq!((banner.w, banner.h), (480, 320));
        assert_eq!((video.w, video.h), (480, 320));
        assert_eq!(imp.instl, 1);
        assert_eq!(video.mimes.len(), 5);
        assert!(video.mimes.contains(&"video/3gpp2".to_string()));
        assert!(video.protocols.is_empty());
        assert_eq!(imp.ext.as_ref().unwrap().rewarded, None);
    }

    #[test]
    fn builds_rewarded_imp() {
        let mut request = sample_request();
        request.ad_type = AdType::Rewarded;
        request.device.device_type = DeviceType::Tablet;

        let bid_request = client("http://localhost").create_request(&base(), &request).unwrap();
        let imp = &bid_request.imp[0];
        let video = imp.video.as_ref().unwrap();
        assert_eq!((video.w, video.h), (768, 1024));
        assert_eq!(video.battr, vec![16]);
        assert_eq!(imp.banner.as_ref().unwrap().battr, vec![16]);
        assert_eq!(video.protocols, (1..=14).collect::<Vec<u8>>());
        assert!(video.mimes.contains(&"video/avi".to_string()));
        assert_eq!(imp.ext.as_ref().unwrap().rewarded, Some(1));
    }

    #[test]
    fn rejects_unsupported_banner_format() {
        let mut request = sample_request();
        request.ad_object.banner = None;
        let result = client("http://localhost").create_request(&base(), &request);
        assert!(matches!(result, Err(AdapterError::InvalidRequest(_))));
    }

    fn with_status(status: u16, body: &str) -> DemandResponse {
        let mut response = DemandResponse::new(AdapterKey::Bidmachine);
        response.status = Some(status);
        response.raw_response = body.to_string();
        response
    }

    #[test]
    fn classifies_statuses() {
        let adapter = client("http://localhost");
        assert_eq!(adapter.parse_bids(&with_status(204, "")), Ok(None));
        for status in [400, 401, 403, 503] {
            assert_eq!(
                adapter.parse_bids(&with_status(status, "")),
                Err(AdapterError::Unauthorized(status))
            );
        }
        assert_eq!(
            adapter.parse_bids(&with_status(500, "")),
            Err(AdapterError::UnexpectedStatus(500))
        );
        assert!(matches!(
            adapter.parse_bids(&with_status(200, r#"{"id":"1","seatbid":[]}"#)),
            Err(AdapterError::Parse(_))
        ));
        assert!(matches!(
            adapter.parse_bids(&with_status(200, r#"{"id":"1","seatbid":[{"bid":[]}]}"#)),
            Err(AdapterError::Parse(_))
        ));
    }

    #[test]
    fn takes_first_bid_of_first_seat() {
        let body = json!({
            "id": "req-1",
            "seatbid": [{
                "seat": "seat-1",
                "bid": [
                    {"id": "b1", "impid": "imp-1", "price": 1.25, "adm": "payload-1", "nurl": "https://n", "lurl": "https://l", "burl": "https://b", "adid": "ad-1"},
                    {"id": "b2", "impid": "imp-1", "price": 9.0}
                ]
            }]
        });
        let bid = client("http://localhost")
            .parse_bids(&with_status(200, &body.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(bid.id, "b1");
        assert_eq!(bid.price, 1.25);
        assert_eq!(bid.payload, "payload-1");
        assert_eq!(bid.seat_id, "seat-1");
        assert_eq!(bid.ad_id, "ad-1");
        assert_eq!(bid.burl, "https://b");
        assert_eq!(bid.demand_id, AdapterKey::Bidmachine);
    }

    async fn spawn_bidder(status: StatusCode, body: Value) -> String {
        let app = Router::new().route(
            "/auction/prebid/bidon",
            post(move |Json(_request): Json<BidRequest>| {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/auction/prebid/bidon", addr)
    }

    #[tokio::test]
    async fn executes_against_bidder() {
        let endpoint = spawn_bidder(
            StatusCode::OK,
            json!({"id": "req-1", "seatbid": [{"bid": [{"id": "b1", "impid": "i", "price": 2.0, "adm": "p"}]}]}),
        )
        .await;
        let adapter = client(&endpoint);
        let bid_request = adapter.create_request(&base(), &sample_request()).unwrap();

        let response = adapter.execute(&Client::new(), &bid_request).await;
        assert_eq!(response.status, Some(200));
        assert!(response.error.is_none());
        assert!(response.raw_request.contains("seller-1"));
        assert!(response.end_ts >= response.start_ts);
        let bid = adapter.parse_bids(&response).unwrap().unwrap();
        assert_eq!(bid.price, 2.0);
    }

    #[tokio::test]
    async fn transport_failure_is_recorded() {
        let adapter = client("http://127.0.0.1:1/auction/prebid/bidon");
        let response = adapter.execute(&Client::new(), &base()).await;
        assert!(matches!(response.error, Some(AdapterError::Transport(_))));
        assert_eq!(response.status, None);
    }
}
