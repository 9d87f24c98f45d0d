// src/auction/error.rs

use crate::bidding::adapter::AdapterError;
use crate::model::repository::RepositoryError;
use thiserror::Error;

/// 会让整个拍卖请求失败的错误
#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("no ads available for this request")]
    NoAds,
    #[error("invalid auction key")]
    InvalidAuctionKey,
    #[error("app not found")]
    AppNotFound,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    AdapterMisconfigured(AdapterError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuctionError {
    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::NoAds => "NO_ADS",
            AuctionError::InvalidAuctionKey => "INVALID_AUCTION_KEY",
            AuctionError::AppNotFound => "APP_NOT_FOUND",
            AuctionError::InvalidRequest(_) => "INVALID_REQUEST",
            AuctionError::AdapterMisconfigured(_) => "ADAPTER_MISCONFIGURED",
            AuctionError::Repository(_) => "INTERNAL",
        }
    }
}
