//! Pipeline configuration from environment variables

use std::env;

/// Configuration for the kill-event pipeline runtime.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Buffer occupancy that triggers an immediate flush (events)
    pub buffer_size: usize,

    /// Periodic flush interval in seconds
    pub processing_interval_secs: u64,

    /// Max kills allowed per actor within `flood_window_secs`
    pub flood_threshold: usize,

    /// Sliding flood window in seconds
    pub flood_window_secs: f64,

    /// Events per concurrent processing round
    pub sub_batch_size: usize,

    /// Master enable flag for the processor at startup
    pub enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: "killfeed.db".to_string(),
            buffer_size: 50,
            processing_interval_secs: 10,
            flood_threshold: 5,
            flood_window_secs: 60.0,
            sub_batch_size: 20,
            enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KILLFEED_DB_PATH` (default: killfeed.db)
    /// - `KILL_BUFFER_SIZE` (default: 50)
    /// - `PROCESSING_INTERVAL_SECS` (default: 10)
    /// - `FLOOD_THRESHOLD` (default: 5)
    /// - `FLOOD_WINDOW_SECS` (default: 60)
    /// - `SUB_BATCH_SIZE` (default: 20)
    /// - `ENABLE_PROCESSOR` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: env::var("KILLFEED_DB_PATH").unwrap_or(defaults.db_path),

            buffer_size: env::var("KILL_BUFFER_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.buffer_size),

            processing_interval_secs: env::var("PROCESSING_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.processing_interval_secs),

            flood_threshold: env::var("FLOOD_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.flood_threshold),

            flood_window_secs: env::var("FLOOD_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.flood_window_secs),

            sub_batch_size: env::var("SUB_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sub_batch_size),

            enabled: env::var("ENABLE_PROCESSOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enabled),
        }
    }
}
