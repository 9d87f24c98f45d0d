// src/model/ad.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 广告类型
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AdType {
    Banner,
    Interstitial,
    Rewarded,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Banner => "banner",
            AdType::Interstitial => "interstitial",
            AdType::Rewarded => "rewarded",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "banner" => Ok(AdType::Banner),
            "interstitial" => Ok(AdType::Interstitial),
            "rewarded" => Ok(AdType::Rewarded),
            _ => Err(format!("Invalid value for AdType: {}", s)),
        }
    }
}

/// 广告格式，只有 banner 类型会携带非空格式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdFormat {
    #[serde(rename = "BANNER")]
    Banner,
    #[serde(rename = "LEADERBOARD")]
    Leaderboard,
    #[serde(rename = "MREC")]
    Mrec,
    #[serde(rename = "ADAPTIVE")]
    Adaptive,
    #[default]
    #[serde(rename = "")]
    Empty,
}

/// 可用于 banner 广告位的格式集合
pub const BANNER_FORMATS: [AdFormat; 4] = [
    AdFormat::Banner,
    AdFormat::Leaderboard,
    AdFormat::Mrec,
    AdFormat::Adaptive,
];

impl AdFormat {
    pub fn is_banner_format(&self) -> bool {
        BANNER_FORMATS.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdFormat::Banner => "BANNER",
            AdFormat::Leaderboard => "LEADERBOARD",
            AdFormat::Mrec => "MREC",
            AdFormat::Adaptive => "ADAPTIVE",
            AdFormat::Empty => "",
        }
    }

    /// 静态尺寸表，adaptive 在平板上升级为 leaderboard
    pub fn size(&self, device_type: DeviceType) -> Option<(u32, u32)> {
        match self {
            AdFormat::Banner => Some((320, 50)),
            AdFormat::Leaderboard => Some((728, 90)),
            AdFormat::Mrec => Some((300, 250)),
            AdFormat::Adaptive if device_type == DeviceType::Tablet => Some((728, 90)),
            AdFormat::Adaptive => Some((320, 50)),
            AdFormat::Empty => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[serde(rename = "PHONE")]
    Phone,
    #[serde(rename = "TABLET")]
    Tablet,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "PHONE" => DeviceType::Phone,
            "TABLET" => DeviceType::Tablet,
            _ => DeviceType::Unknown,
        })
    }
}

impl DeviceType {
    /// OpenRTB devicetype 枚举值
    pub fn openrtb_code(&self) -> Option<u8> {
        match self {
            DeviceType::Phone => Some(4),
            DeviceType::Tablet => Some(5),
            DeviceType::Unknown => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Ios,
    Android,
    #[default]
    Unknown,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Ios => "ios",
            Os::Android => "android",
            Os::Unknown => "unknown",
        }
    }
}

// 客户端上报 "iOS" / "Android"，大小写不固定
impl<'de> Deserialize<'de> for Os {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "ios" => Os::Ios,
            "android" => Os::Android,
            _ => Os::Unknown,
        })
    }
}

/// 广告单元的计价方式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BidType {
    #[serde(rename = "CPM")]
    Cpm,
    #[serde(rename = "RTB")]
    Rtb,
}
