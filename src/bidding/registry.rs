// src/bidding/registry.rs

use crate::bidding::adapter::{Adapter, AdapterError};
use crate::bidding::rtb_client::RtbClient;
use crate::config::settings::BidderConfig;
use crate::model::adapter::AdapterKey;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// **需求方注册表**：AdapterKey → 接入配置，按需构建 adapter
#[derive(Clone, Debug, Default)]
pub struct BidderRegistry {
    bidders: HashMap<AdapterKey, BidderConfig>,
}

impl BidderRegistry {
    pub fn new(bidders: HashMap<AdapterKey, BidderConfig>) -> Self {
        Self { bidders }
    }

    #[cfg(test)]
    pub fn add_bidder(&mut self, key: AdapterKey, config: BidderConfig) {
        self.bidders.insert(key, config);
    }

    /// 未注册的 key 返回 None；已注册但缺少必填字段时返回 Misconfigured
    pub fn build(&self, key: AdapterKey) -> Option<Result<Arc<dyn Adapter>, AdapterError>> {
        let config = self.bidders.get(&key)?;
        Some(RtbClient::new(key, config).map(|client| Arc::new(client) as Arc<dyn Adapter>))
    }

    /// 构建一组 adapter，任意一个配置错误都会使整个请求失败
    pub fn build_all(&self, keys: &[AdapterKey]) -> Result<Vec<Arc<dyn Adapter>>, AdapterError> {
        let mut adapters = Vec::with_capacity(keys.len());
        for key in keys {
            match self.build(*key) {
                Some(adapter) => adapters.push(adapter?),
                None => warn!(demand_id = %key, "bidder is not registered, skipping"),
            }
        }
        Ok(adapters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BidderConfig {
        BidderConfig {
            endpoint: Some("https://api-{dc}.example.com/auction/prebid/bidon".to_string()),
            seller_id: Some("1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn skips_unregistered_keys() {
        let mut registry = BidderRegistry::default();
        registry.add_bidder(AdapterKey::Bidmachine, complete());

        let adapters = registry
            .build_all(&[AdapterKey::Bidmachine, AdapterKey::Vungle])
            .unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].key(), AdapterKey::Bidmachine);
        assert!(registry.build(AdapterKey::Vungle).is_none());
    }

    #[test]
    fn incomplete_config_is_misconfigured() {
        let mut registry = BidderRegistry::default();
        registry.add_bidder(AdapterKey::Bidmachine, complete());
        registry.add_bidder(
            AdapterKey::Meta,
            BidderConfig {
                endpoint: Some("https://meta.example.com".to_string()),
                ..Default::default()
            },
        );

        let result = registry.build_all(&[AdapterKey::Bidmachine, AdapterKey::Meta]);
        assert!(matches!(result, Err(AdapterError::Misconfigured(_))));
    }
}
