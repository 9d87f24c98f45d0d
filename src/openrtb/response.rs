use serde::{Deserialize, Serialize};

/// OpenRTB Bid Response
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(default)]
    pub bidid: Option<String>,
    #[serde(default)]
    pub cur: Option<String>,
    /// no-bid reason
    #[serde(default)]
    pub nbr: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SeatBid {
    #[serde(default)]
    pub bid: Vec<Bid>,
    #[serde(default)]
    pub seat: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    /// Ad markup，对 bidon SDK 来说即 payload
    #[serde(default)]
    pub adm: Option<String>,
    #[serde(default)]
    pub adid: Option<String>,
    #[serde(default)]
    pub crid: Option<String>,
    #[serde(default)]
    pub nurl: Option<String>,
    #[serde(default)]
    pub lurl: Option<String>,
    #[serde(default)]
    pub burl: Option<String>,
    #[serde(default)]
    pub ext: Option<BidExt>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidExt {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub signaldata: Option<String>,
}
