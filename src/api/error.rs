// src/api/error.rs

use crate::auction::error::AuctionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

impl AuctionError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuctionError::InvalidAuctionKey
            | AuctionError::NoAds
            | AuctionError::AppNotFound
            | AuctionError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuctionError::AdapterMisconfigured(_) | AuctionError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "auction failed");
        } else {
            info!(code = self.code(), error = %self, "auction rejected");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
