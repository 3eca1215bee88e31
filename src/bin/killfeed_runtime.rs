//! Killfeed Runtime
//!
//! Wires the full ingestion pipeline:
//! - Opens the SQLite database (schema created if absent)
//! - Builds the processor with a SQLite-backed entitlement provider
//! - Spawns the periodic ingestion scheduler
//! - Resumes automated leaderboard tasks from persisted configuration
//! - Feeds kill events from JSONL lines on stdin (one raw event per line),
//!   standing in for the external game-log watcher
//!
//! Usage:
//!   tail -f killfeed.jsonl | cargo run --release --bin killfeed_runtime
//!
//! Environment variables:
//!   KILLFEED_DB_PATH - SQLite database path (default: killfeed.db)
//!   KILL_BUFFER_SIZE - Flush-on-full threshold (default: 50)
//!   PROCESSING_INTERVAL_SECS - Periodic flush interval (default: 10)
//!   FLOOD_THRESHOLD / FLOOD_WINDOW_SECS - Flood guard tuning (default: 5 / 60)
//!   ENABLE_PROCESSOR - Master switch (default: true)

use dotenv::dotenv;
use killfeed::pipeline::{
    leaderboard::{resume_from_configs, DisplaySink, LeaderboardRegistry, LogDisplaySink},
    premium::SqliteEntitlementProvider,
    scheduler::run_ingestion_scheduler,
    EntitlementChain, KillEventProcessor, PipelineConfig, SqliteStatsStore, StatsAggregator,
    StatsStore,
};
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 Killfeed Runtime");

    let config = PipelineConfig::from_env();
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Buffer size: {} events", config.buffer_size);
    info!("   ├─ Processing interval: {}s", config.processing_interval_secs);
    info!(
        "   └─ Flood guard: {} kills / {:.0}s",
        config.flood_threshold, config.flood_window_secs
    );

    let store = Arc::new(SqliteStatsStore::new(&config.db_path)?);
    info!("✅ Database initialized");

    let entitlement = EntitlementChain::new(
        Some(Arc::new(SqliteEntitlementProvider::new(store.connection()))),
        None,
    );

    let aggregator = StatsAggregator::new(store.clone() as Arc<dyn StatsStore>, entitlement);
    let processor = Arc::new(KillEventProcessor::new(aggregator, &config));
    processor.set_enabled(config.enabled);

    tokio::spawn(run_ingestion_scheduler(
        processor.clone(),
        config.processing_interval_secs,
    ));

    // Recreate leaderboard tasks from persisted configuration
    let registry = Arc::new(LeaderboardRegistry::new());
    let sink: Arc<dyn DisplaySink> = Arc::new(LogDisplaySink::default());
    resume_from_configs(&registry, store.clone() as Arc<dyn StatsStore>, sink).await;

    info!("✅ Pipeline running, reading kill events from stdin (JSONL)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(raw) => processor.add_kill_event(&raw).await,
            Err(e) => warn!("Skipping unparseable kill event line: {}", e),
        }
    }

    // Source closed: final flush before exit
    info!("🔄 Event source closed, performing final flush...");
    let processed = processor.flush().await;
    info!("✅ Final flush complete ({} events)", processed);

    Ok(())
}
