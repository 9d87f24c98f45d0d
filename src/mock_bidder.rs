// src/mock_bidder.rs

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, serve, Json, Router};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::openrtb::request::{BidRequest, Imp};
use crate::openrtb::response::{Bid, BidExt, BidResponse, SeatBid};

/// 不出价的概率
const NO_FILL_RATE: f64 = 0.2;

fn mock_bid(imp: &Imp) -> Bid {
    let mut rng = rand::thread_rng();
    // 全屏广告出价更高
    let multiplier = if imp.instl == 1 {
        rng.gen_range(1.2..2.5)
    } else if imp.banner.as_ref().map(|b| (b.w, b.h)) == Some((300, 250)) {
        rng.gen_range(1.1..2.0)
    } else {
        rng.gen_range(1.01..1.5)
    };
    let price = (imp.bidfloor.max(0.01) * multiplier * 10_000.0).round() / 10_000.0;
    let bid_id = format!("bid-{}", imp.id);

    Bid {
        id: bid_id.clone(),
        impid: imp.id.clone(),
        price,
        adm: None,
        adid: Some(format!("ad-{}", rng.gen_range(1000..9999))),
        crid: None,
        nurl: Some(format!("http://bidder.local/win?bid={}&price=${{AUCTION_PRICE}}", bid_id)),
        lurl: Some(format!("http://bidder.local/loss?bid={}", bid_id)),
        burl: None,
        ext: Some(BidExt {
            payload: Some(format!("mock-payload-{}", bid_id)),
            signaldata: None,
        }),
    }
}

/// 模拟需求方：随机延迟后返回 204 或单个 seat 的出价，价格高于 bidfloor
async fn handle_bid(Json(request): Json<BidRequest>) -> Response {
    info!(
        request_id = %request.id,
        imp_count = request.imp.len(),
        "mock bidder received request"
    );

    let delay_ms = rand::thread_rng().gen_range(100..300);
    sleep(Duration::from_millis(delay_ms)).await;

    let Some(imp) = request.imp.first() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    if rand::thread_rng().gen_bool(NO_FILL_RATE) {
        return StatusCode::NO_CONTENT.into_response();
    }

    Json(BidResponse {
        id: request.id.clone(),
        seatbid: vec![SeatBid {
            bid: vec![mock_bid(imp)],
            seat: Some("mock_seat".to_string()),
        }],
        bidid: None,
        cur: Some("USD".to_string()),
        nbr: None,
    })
    .into_response()
}

pub fn router() -> Router {
    Router::new().route("/auction/prebid/bidon", post(handle_bid))
}

/// 启动 Mock 需求方，路由为 `/auction/prebid/bidon`
pub async fn start_mock_bidder(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Mock bidder running at http://{}", addr);
    serve(listener, router()).await
}
