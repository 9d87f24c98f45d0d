// src/main.rs

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

mod api;
mod auction;
mod bidding;
mod config;
mod logging;
mod mock_bidder;
mod model;
mod openrtb;

use auction::collaborators::{InventoryAdapterEnabler, InventorySegmentMatcher};
use auction::matcher::AdUnitMatcher;
use auction::orchestrator::AuctionService;
use auction::resolver::ConfigResolver;
use bidding::bid_cache::BidCache;
use bidding::cache_store::MokaCacheStore;
use bidding::engine::BiddingEngine;
use bidding::registry::BidderRegistry;
use config::settings::Settings;
use logging::event_logger::{tracing_error_sink, EventLogger, RollingFilePublisher};
use model::repository::{FileInventoryRepository, InventoryRepository};

pub struct AppState {
    pub auction: Arc<AuctionService>,
}

#[derive(Parser, Debug)]
#[command(version = "1.0", about = "Mediated real-time ad auction server for mobile SDKs")]
struct CliArgs {
    #[arg(short, long, env = "AUCTION_PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "AUCTION_LOG_DIR", default_value = "logs")]
    log_dir: String,
    #[arg(long, env = "AUCTION_SETTINGS", default_value = "static/settings.json")]
    settings: String,
    #[arg(long, env = "AUCTION_INVENTORY", default_value = "static/inventory.json")]
    inventory: String,
    /// 设置后在该端口启动 Mock 需求方
    #[arg(long, env = "AUCTION_MOCK_BIDDER_PORT")]
    mock_bidder_port: Option<u16>,
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 运行日志：JSON 写入按小时滚动的文件，同时输出到 stdout
    let log_file = rolling::hourly(&args.log_dir, "auction_log.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stdout));
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to set global tracing subscriber")?;

    let settings = Settings::load(&args.settings)
        .await
        .with_context(|| format!("loading settings from {}", args.settings))?;
    let repository: Arc<dyn InventoryRepository> = Arc::new(
        FileInventoryRepository::load(&args.inventory)
            .await
            .with_context(|| format!("loading inventory from {}", args.inventory))?,
    );
    info!(
        bidders = settings.bidders.len(),
        inventory = %args.inventory,
        "configuration loaded"
    );

    if let Some(port) = args.mock_bidder_port {
        tokio::spawn(async move {
            if let Err(e) = mock_bidder::start_mock_bidder(port).await {
                error!(error = %e, port, "mock bidder stopped");
            }
        });
    }

    let client = bidding::engine::http_client().context("building HTTP client")?;

    let publisher = Arc::new(RollingFilePublisher::new(
        &args.log_dir,
        "events.json",
        settings.event_buffer_size,
        settings.event_batch_size,
        settings.event_flush_interval_ms,
    ));

    let auction = AuctionService::new(
        repository.clone(),
        Arc::new(InventorySegmentMatcher::new(repository.clone())),
        Arc::new(InventoryAdapterEnabler::new(repository.clone())),
        ConfigResolver::new(
            repository.clone(),
            settings.config_cache_ttl(),
            settings.config_cache_capacity,
        ),
        AdUnitMatcher::new(repository),
        BiddingEngine::new(client, Arc::new(BidderRegistry::new(settings.bidders.clone()))),
        BidCache::new(
            Arc::new(MokaCacheStore::new(settings.bid_cache_capacity)),
            settings.bid_cache_ttl(),
        ),
        EventLogger::new(publisher.clone(), tracing_error_sink()),
    );
    let state = Arc::new(AppState {
        auction: Arc::new(auction),
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Auction server running at http://{}", addr);

    axum::serve(listener, api::handlers::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    publisher.shutdown().await;
    info!("Auction server shut down.");
    Ok(())
}
