//! killfeed - game-server companion stats backend
//!
//! Relays in-game kill/death telemetry into persisted per-player statistics
//! and keeps configured leaderboard displays refreshed. See `pipeline` for
//! the ingestion architecture.

pub mod pipeline;
