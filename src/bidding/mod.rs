pub mod adapter;
pub mod bid_cache;
pub mod cache_store;
pub mod datacenter;
pub mod engine;
pub mod registry;
pub mod rtb_client;
