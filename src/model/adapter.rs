// src/model/adapter.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 需求方（adapter）标识，封闭集合
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKey {
    Admob,
    Amazon,
    Applovin,
    Bidmachine,
    Bigoads,
    Chartboost,
    Dtexchange,
    Gam,
    Inmobi,
    Ironsource,
    Meta,
    Mintegral,
    Mobilefuse,
    Moloco,
    Startio,
    Taurusx,
    Unityads,
    Vkads,
    Vungle,
    Yandex,
}

impl AdapterKey {
    pub const ALL: [AdapterKey; 20] = [
        AdapterKey::Admob,
        AdapterKey::Amazon,
        AdapterKey::Applovin,
        AdapterKey::Bidmachine,
        AdapterKey::Bigoads,
        AdapterKey::Chartboost,
        AdapterKey::Dtexchange,
        AdapterKey::Gam,
        AdapterKey::Inmobi,
        AdapterKey::Ironsource,
        AdapterKey::Meta,
        AdapterKey::Mintegral,
        AdapterKey::Mobilefuse,
        AdapterKey::Moloco,
        AdapterKey::Startio,
        AdapterKey::Taurusx,
        AdapterKey::Unityads,
        AdapterKey::Vkads,
        AdapterKey::Vungle,
        AdapterKey::Yandex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKey::Admob => "admob",
            AdapterKey::Amazon => "amazon",
            AdapterKey::Applovin => "applovin",
            AdapterKey::Bidmachine => "bidmachine",
            AdapterKey::Bigoads => "bigoads",
            AdapterKey::Chartboost => "chartboost",
            AdapterKey::Dtexchange => "dtexchange",
            AdapterKey::Gam => "gam",
            AdapterKey::Inmobi => "inmobi",
            AdapterKey::Ironsource => "ironsource",
            AdapterKey::Meta => "meta",
            AdapterKey::Mintegral => "mintegral",
            AdapterKey::Mobilefuse => "mobilefuse",
            AdapterKey::Moloco => "moloco",
            AdapterKey::Startio => "startio",
            AdapterKey::Taurusx => "taurusx",
            AdapterKey::Unityads => "unityads",
            AdapterKey::Vkads => "vkads",
            AdapterKey::Vungle => "vungle",
            AdapterKey::Yandex => "yandex",
        }
    }

    /// 这些需求方不接受面向儿童（COPPA）的流量
    pub fn is_coppa_disabled(&self) -> bool {
        matches!(
            self,
            AdapterKey::Meta | AdapterKey::Mintegral | AdapterKey::Bigoads | AdapterKey::Vkads
        )
    }

    /// bidmachine / amazon 的出价绑定单次请求，不能留到后续请求复用
    pub fn is_bid_cacheable(&self) -> bool {
        !matches!(self, AdapterKey::Bidmachine | AdapterKey::Amazon)
    }
}

impl fmt::Display for AdapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdapterKey::ALL
            .iter()
            .find(|key| key.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown adapter key: {}", s))
    }
}
