//! # Kill-event ingestion and aggregation pipeline
//!
//! Buffered, rate-limited, concurrent processor for game-server kill
//! telemetry:
//! - Validates raw kill events at the telemetry boundary (lossy, never blocks)
//! - Detects per-actor kill floods with a 60s sliding window
//! - Buffers validated events until a size or time threshold flushes them
//! - Applies flushed events to persisted per-player statistics in
//!   concurrent sub-batches
//! - Runs one background refresh task per configured automated leaderboard
//!
//! ## Data flow
//!
//! ```text
//! game-log watcher (external)
//!     ↓ add_kill_event(raw JSON)
//! validator → FloodGuard → EventBuffer
//!     ↓ drain (periodic tick, buffer full, or manual flush)
//! KillEventProcessor::process_pending()
//!     ↓ sub-batches of 20, fanned out
//! StatsAggregator::apply()  — entitlement gate, audit log, counters
//!     ↓
//! StatsStore (SQLite)  ← queried by LeaderboardRegistry tasks
//! ```
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (KillEvent, PlayerStats, leaderboard types)
//! - `validator` - Raw event shape/type validation
//! - `flood` - Per-actor sliding-window flood detection
//! - `buffer` - Bounded event accumulation and the drain primitive
//! - `premium` - Entitlement provider chain (fail-closed)
//! - `db` - Persistence trait and SQLite implementation
//! - `aggregator` - Per-event stats application
//! - `processor` - Pipeline orchestrator (admission + drain-and-process)
//! - `scheduler` - Periodic flush loop
//! - `leaderboard` - Refresh task registry and display sink trait
//! - `config` - Environment-based configuration

pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod db;
pub mod flood;
pub mod leaderboard;
pub mod premium;
pub mod processor;
pub mod scheduler;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use aggregator::{ApplyOutcome, StatsAggregator};
pub use buffer::EventBuffer;
pub use config::PipelineConfig;
pub use db::{SqliteStatsStore, StatsStore};
pub use flood::FloodGuard;
pub use leaderboard::{DisplaySink, LeaderboardKey, LeaderboardRegistry, StartError};
pub use premium::{EntitlementChain, EntitlementProvider};
pub use processor::KillEventProcessor;
pub use types::{KillEvent, LeaderboardConfig, LeaderboardRow, LeaderboardType, PlayerStats};
