pub mod ad;
pub mod ad_unit;
pub mod adapter;
pub mod auction_config;
pub mod context;
pub mod demand;
pub mod repository;
pub mod request;
pub mod response;
