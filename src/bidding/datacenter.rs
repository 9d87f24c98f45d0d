// src/bidding/datacenter.rs

use once_cell::sync::Lazy;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datacenter {
    Eu,
    Us,
    Apac,
}

impl Datacenter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datacenter::Eu => "eu",
            Datacenter::Us => "us",
            Datacenter::Apac => "apac",
        }
    }
}

/// 路由到 apac 数据中心的国家（alpha-3）
static APAC_COUNTRIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AUS", "BGD", "BRN", "BTN", "CHN", "FJI", "HKG", "IDN", "IND", "JPN", "KHM", "KOR", "LAO",
        "LKA", "MAC", "MDV", "MMR", "MNG", "MYS", "NPL", "NZL", "PAK", "PHL", "PNG", "SGP", "THA",
        "TLS", "TWN", "VNM",
    ]
    .into_iter()
    .collect()
});

/// 路由到 us 数据中心的国家（alpha-3）
static US_COUNTRIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ARG", "BHS", "BLZ", "BOL", "BRA", "BRB", "CAN", "CHL", "COL", "CRI", "CUB", "DOM", "ECU",
        "GTM", "GUY", "HND", "HTI", "JAM", "MEX", "NIC", "PAN", "PER", "PRI", "PRY", "SLV", "SUR",
        "TTO", "URY", "USA", "VEN",
    ]
    .into_iter()
    .collect()
});

pub fn datacenter_for(country: Option<&str>) -> Datacenter {
    let Some(country) = country else {
        return Datacenter::Eu;
    };
    let country = country.to_ascii_uppercase();
    if APAC_COUNTRIES.contains(country.as_str()) {
        Datacenter::Apac
    } else if US_COUNTRIES.contains(country.as_str()) {
        Datacenter::Us
    } else {
        Datacenter::Eu
    }
}

/// 用数据中心替换 endpoint 模板中的 `{dc}`
pub fn resolve_endpoint(template: &str, country: Option<&str>) -> String {
    template.replace("{dc}", datacenter_for(country).as_str())
}
