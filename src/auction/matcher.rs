// src/auction/matcher.rs

use crate::auction::error::AuctionError;
use crate::model::ad::{AdFormat, AdType, DeviceType};
use crate::model::ad_unit::{AdUnit, StoredAdUnit};
use crate::model::adapter::AdapterKey;
use crate::model::context::BuildParams;
use crate::model::repository::InventoryRepository;
use std::sync::Arc;
use tracing::debug;

/// banner 请求接受的格式集合
fn accepted_formats(format: AdFormat, device_type: DeviceType) -> Vec<AdFormat> {
    let mut accepted = vec![format];
    if format == AdFormat::Adaptive {
        match device_type {
            DeviceType::Tablet => accepted.push(AdFormat::Leaderboard),
            DeviceType::Phone => accepted.push(AdFormat::Banner),
            DeviceType::Unknown => {}
        }
    }
    accepted
}

/// 按构建参数过滤库存中的广告单元，保持库存顺序
pub fn filter_ad_units(params: &BuildParams, stored: &[StoredAdUnit]) -> Vec<AdUnit> {
    if params.ad_type == AdType::Banner && !params.ad_format.is_banner_format() {
        return Vec::new();
    }

    let accepted = accepted_formats(params.ad_format, params.device_type);
    let allow_list = &params.auction_configuration.ad_unit_ids;

    stored
        .iter()
        .filter(|unit| unit.app_id == params.app_id && unit.ad_type == params.ad_type)
        .filter(|unit| {
            unit.demand_id
                .parse::<AdapterKey>()
                .map(|key| params.adapters.contains(&key))
                .unwrap_or(false)
        })
        .filter(|unit| allow_list.is_empty() || allow_list.contains(&unit.id))
        .filter(|unit| match params.price_floor {
            Some(floor) => unit.is_bidding || unit.bid_floor.unwrap_or(0.0) >= floor,
            None => true,
        })
        .filter(|unit| params.ad_type != AdType::Banner || accepted.contains(&unit.format))
        .map(AdUnit::from_stored)
        .collect()
}

/// 广告单元匹配器，从配置仓库读取候选单元
pub struct AdUnitMatcher {
    repository: Arc<dyn InventoryRepository>,
}

impl AdUnitMatcher {
    pub fn new(repository: Arc<dyn InventoryRepository>) -> Self {
        Self { repository }
    }

    pub async fn match_ad_units(&self, params: &BuildParams) -> Result<Vec<AdUnit>, AuctionError> {
        if params.ad_type == AdType::Banner && !params.ad_format.is_banner_format() {
            return Ok(Vec::new());
        }
        let stored = self.repository.ad_units(params.app_id, params.ad_type).await?;
        let matched = filter_ad_units(params, &stored);
        debug!(
            app_id = params.app_id,
            ad_type = %params.ad_type,
            candidates = stored.len(),
            matched = matched.len(),
            "ad units matched"
        );
        Ok(matched)
    }
}
