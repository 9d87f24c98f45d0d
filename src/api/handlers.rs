// src/api/handlers.rs

use crate::auction::error::AuctionError;
use crate::model::ad::AdType;
use crate::model::request::AuctionRequest;
use crate::model::response::AuctionResponse;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auction/{ad_type}", post(handle_auction))
        .route("/{ad_type}/auction", post(handle_auction))
        .route("/health", get(health))
        .with_state(state)
}

/// 路径中的 ad_type 覆盖请求体中的值
fn parse_request(ad_type: &str, body: Value) -> Result<AuctionRequest, AuctionError> {
    let ad_type: AdType = ad_type.parse().map_err(AuctionError::InvalidRequest)?;
    let Value::Object(mut body) = body else {
        return Err(AuctionError::InvalidRequest(
            "request body must be a JSON object".to_string(),
        ));
    };
    body.insert("ad_type".to_string(), Value::from(ad_type.as_str()));
    serde_json::from_value(Value::Object(body))
        .map_err(|e| AuctionError::InvalidRequest(e.to_string()))
}

/// **处理 SDK 拍卖请求**
pub async fn handle_auction(
    State(state): State<Arc<AppState>>,
    Path(ad_type): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AuctionResponse>, AuctionError> {
    let Json(body) = body.map_err(|e| AuctionError::InvalidRequest(e.body_text()))?;
    let request = parse_request(&ad_type, body)?;
    debug!(
        auction_id = %request.ad_object.auction_id,
        ad_type = %request.ad_type,
        "auction request received"
    );
    let response = state.auction.run(request).await?;
    Ok(Json(response))
}

pub async fn health() -> &'static str {
    "ok"
}
