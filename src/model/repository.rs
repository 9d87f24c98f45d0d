// src/model/repository.rs

use crate::model::ad::AdType;
use crate::model::ad_unit::StoredAdUnit;
use crate::model::adapter::AdapterKey;
use crate::model::auction_config::AuctionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to read inventory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse inventory: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppRecord {
    pub id: i64,
    pub key: String,
    pub bundle: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub id: i64,
    pub uid: String,
    pub app_id: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppDemand {
    pub app_id: i64,
    pub demand: AdapterKey,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// 库存快照：应用、拍卖配置、广告单元、分群、应用启用的需求方
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Inventory {
    #[serde(default)]
    pub apps: Vec<AppRecord>,
    #[serde(default)]
    pub auction_configurations: Vec<AuctionConfig>,
    #[serde(default)]
    pub ad_units: Vec<StoredAdUnit>,
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
    #[serde(default)]
    pub app_demands: Vec<AppDemand>,
}

/// 配置仓库（外部协作者）
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find_app(&self, key: &str, bundle: &str) -> Result<Option<AppRecord>, RepositoryError>;

    async fn auction_configs(
        &self,
        app_id: i64,
        ad_type: AdType,
    ) -> Result<Vec<AuctionConfig>, RepositoryError>;

    /// uid 非空时按公开 uid 查找，否则按 id 查找
    async fn auction_config(
        &self,
        app_id: i64,
        id: i64,
        uid: &str,
    ) -> Result<Option<AuctionConfig>, RepositoryError>;

    async fn ad_units(&self, app_id: i64, ad_type: AdType)
        -> Result<Vec<StoredAdUnit>, RepositoryError>;

    async fn segments(&self, app_id: i64) -> Result<Vec<SegmentRecord>, RepositoryError>;

    async fn enabled_adapters(&self, app_id: i64) -> Result<Vec<AdapterKey>, RepositoryError>;
}

/// 从 JSON 文件加载的静态库存
pub struct FileInventoryRepository {
    inventory: Inventory,
}

impl FileInventoryRepository {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let content = tokio::fs::read_to_string(path).await?;
        let inventory: Inventory = serde_json::from_str(&content)?;
        Ok(Self::new(inventory))
    }
}

#[async_trait]
impl InventoryRepository for FileInventoryRepository {
    async fn find_app(&self, key: &str, bundle: &str) -> Result<Option<AppRecord>, RepositoryError> {
        Ok(self
            .inventory
            .apps
            .iter()
            .find(|app| app.key == key && app.bundle == bundle)
            .cloned())
    }

    async fn auction_configs(
        &self,
        app_id: i64,
        ad_type: AdType,
    ) -> Result<Vec<AuctionConfig>, RepositoryError> {
        Ok(self
            .inventory
            .auction_configurations
            .iter()
            .filter(|config| config.app_id == app_id && config.ad_type == ad_type)
            .cloned()
            .collect())
    }

    async fn auction_config(
        &self,
        app_id: i64,
        id: i64,
        uid: &str,
    ) -> Result<Option<AuctionConfig>, RepositoryError> {
        let mut configs = self
            .inventory
            .auction_configurations
            .iter()
            .filter(|config| config.app_id == app_id);
        let found = if !uid.is_empty() {
            configs.find(|config| config.uid == uid)
        } else if id != 0 {
            configs.find(|config| config.id == id)
        } else {
            None
        };
        Ok(found.cloned())
    }

    async fn ad_units(
        &self,
        app_id: i64,
        ad_type: AdType,
    ) -> Result<Vec<StoredAdUnit>, RepositoryError> {
        Ok(self
            .inventory
            .ad_units
            .iter()
            .filter(|unit| unit.app_id == app_id && unit.ad_type == ad_type)
            .cloned()
            .collect())
    }

    async fn segments(&self, app_id: i64) -> Result<Vec<SegmentRecord>, RepositoryError> {
        Ok(self
            .inventory
            .segments
            .iter()
            .filter(|segment| segment.app_id == app_id)
            .cloned()
            .collect())
    }

    async fn enabled_adapters(&self, app_id: i64) -> Result<Vec<AdapterKey>, RepositoryError> {
        Ok(self
            .inventory
            .app_demands
            .iter()
            .filter(|demand| demand.app_id == app_id && demand.enabled)
            .map(|demand| demand.demand)
            .collect())
    }
}
