// src/auction/floor.rs

use crate::model::auction_config::AuctionConfig;
use crate::model::request::AuctionRequest;

/// 计算有效底价：
/// 请求底价、客户端缓存的价格、配置底价取最大值；
/// mediator 为 max / level_play 且带有上一轮价格时再与之取最大值。
pub fn calculate_price_floor(request: &AuctionRequest, config: &AuctionConfig) -> f64 {
    let mut floor = request.ad_object.price_floor;

    for entry in &request.ad_cache {
        floor = floor.max(entry.price);
    }

    floor = floor.max(config.price_floor);

    let ext = request.normalized_ext();
    if ext.is_price_carrying_mediator() {
        if let Some(previous) = ext.previous_auction_price {
            floor = floor.max(previous);
        }
    }

    floor.max(0.0)
}
