//! Automated leaderboard refresh tasks
//!
//! One background task per configured leaderboard queries aggregated stats
//! on a fixed cadence and hands the result to an external presentation sink.
//! Persisted configuration is the source of truth across restarts; the
//! in-memory registry only prevents duplicate concurrent tasks for the same
//! identity tuple.
//!
//! Cancellation is explicit: the registry maps each identity tuple to a
//! oneshot handle, and a cancelled task observes the signal at its next
//! suspension point (the inter-update sleep) and releases its slot on every
//! exit path.

use super::db::StatsStore;
use super::types::{BoxError, LeaderboardConfig, LeaderboardRow, LeaderboardType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Duration;

/// Valid range for a leaderboard's update interval, in hours.
pub const UPDATE_INTERVAL_HOURS: std::ops::RangeInclusive<u64> = 1..=720;

/// Identity tuple of a running leaderboard task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaderboardKey {
    pub guild_id: i64,
    pub channel_id: i64,
    pub leaderboard_type: LeaderboardType,
    pub server_id: String,
}

impl LeaderboardKey {
    pub fn of(config: &LeaderboardConfig) -> Self {
        Self {
            guild_id: config.guild_id,
            channel_id: config.channel_id,
            leaderboard_type: config.leaderboard_type,
            server_id: config.server_id.clone(),
        }
    }
}

impl fmt::Display for LeaderboardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.guild_id, self.channel_id, self.leaderboard_type, self.server_id
        )
    }
}

/// Renderable leaderboard data handed to the presentation sink.
///
/// The core only forwards this; rendering is a collaborator concern.
#[derive(Debug, Clone)]
pub struct LeaderboardDisplay {
    pub leaderboard_type: LeaderboardType,
    pub guild_id: i64,
    pub server_id: String,
    /// Ranked rows, best first; may be empty when no data exists yet
    pub rows: Vec<LeaderboardRow>,
    pub generated_at: i64,
}

/// External "post or edit a display" sink.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    /// Create a new display, returning its reference.
    async fn create_display(
        &self,
        channel_id: i64,
        display: &LeaderboardDisplay,
    ) -> Result<u64, BoxError>;

    /// Edit an existing display in place.
    async fn edit_display(
        &self,
        channel_id: i64,
        message_id: u64,
        display: &LeaderboardDisplay,
    ) -> Result<(), BoxError>;
}

/// Sink that writes displays to the log. Stands in for a chat-platform
/// sink in the runtime binary and in smoke testing.
#[derive(Default)]
pub struct LogDisplaySink {
    next_id: AtomicU64,
}

#[async_trait]
impl DisplaySink for LogDisplaySink {
    async fn create_display(
        &self,
        channel_id: i64,
        display: &LeaderboardDisplay,
    ) -> Result<u64, BoxError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "📊 [channel {}] {} leaderboard ({} rows) posted as display {}",
            channel_id,
            display.leaderboard_type,
            display.rows.len(),
            id
        );
        Ok(id)
    }

    async fn edit_display(
        &self,
        channel_id: i64,
        message_id: u64,
        display: &LeaderboardDisplay,
    ) -> Result<(), BoxError> {
        log::info!(
            "📊 [channel {}] {} leaderboard ({} rows) updated on display {}",
            channel_id,
            display.leaderboard_type,
            display.rows.len(),
            message_id
        );
        Ok(())
    }
}

/// Why a leaderboard task could not be started.
#[derive(Debug, PartialEq, Eq)]
pub enum StartError {
    /// A task for the same (guild, channel, type, server) tuple is running
    AlreadyRunning,
    /// Update interval outside 1..=720 hours
    InvalidInterval(u64),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::AlreadyRunning => {
                write!(f, "a leaderboard is already running for this channel and type")
            }
            StartError::InvalidInterval(hours) => {
                write!(f, "update interval must be between 1 and 720 hours, got {}", hours)
            }
        }
    }
}

impl std::error::Error for StartError {}

/// Registry of running leaderboard tasks, keyed by identity tuple.
///
/// Holds an explicit cancellation handle per task; dropping the handle
/// cancels the task at its next suspension point.
#[derive(Default)]
pub struct LeaderboardRegistry {
    tasks: Mutex<HashMap<LeaderboardKey, oneshot::Sender<()>>>,
}

impl LeaderboardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a refresher task for `config`.
    ///
    /// Rejects a duplicate identity tuple without spawning anything and
    /// rejects out-of-range update intervals.
    pub fn start(
        self: &Arc<Self>,
        config: LeaderboardConfig,
        store: Arc<dyn StatsStore>,
        sink: Arc<dyn DisplaySink>,
    ) -> Result<(), StartError> {
        if !UPDATE_INTERVAL_HOURS.contains(&config.update_interval) {
            return Err(StartError::InvalidInterval(config.update_interval));
        }

        let key = LeaderboardKey::of(&config);
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&key) {
            return Err(StartError::AlreadyRunning);
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        tasks.insert(key.clone(), cancel_tx);
        drop(tasks);

        let registry = self.clone();
        tokio::spawn(run_leaderboard_task(
            key.clone(),
            config,
            store,
            sink,
            cancel_rx,
            registry,
        ));
        log::info!("Started leaderboard task: {}", key);
        Ok(())
    }

    /// Cancel a running task and release its slot.
    ///
    /// Returns false if no task was running for the key. The task itself
    /// observes the cancellation at its next suspension point.
    pub fn stop(&self, key: &LeaderboardKey) -> bool {
        let removed = self.tasks.lock().unwrap().remove(key).is_some();
        if removed {
            // Dropping the sender resolves the receiver and cancels the task
            log::info!("Stopped leaderboard task: {}", key);
        }
        removed
    }

    pub fn is_running(&self, key: &LeaderboardKey) -> bool {
        self.tasks.lock().unwrap().contains_key(key)
    }

    pub fn running_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    fn release(&self, key: &LeaderboardKey) {
        self.tasks.lock().unwrap().remove(key);
    }
}

/// Start one task per persisted leaderboard config.
///
/// Called at process start so configuration outlives restarts. Configs
/// already running (or invalid) are skipped with a log entry. Returns the
/// number of tasks started.
pub async fn resume_from_configs(
    registry: &Arc<LeaderboardRegistry>,
    store: Arc<dyn StatsStore>,
    sink: Arc<dyn DisplaySink>,
) -> usize {
    let configs = match store.list_leaderboard_configs().await {
        Ok(configs) => configs,
        Err(e) => {
            log::error!("Failed to load automated leaderboards: {}", e);
            return 0;
        }
    };

    let mut started = 0;
    for config in configs {
        let key = LeaderboardKey::of(&config);
        match registry.start(config, store.clone(), sink.clone()) {
            Ok(()) => {
                log::info!("Loaded automated leaderboard: {}", key);
                started += 1;
            }
            Err(e) => {
                log::warn!("Skipping automated leaderboard {}: {}", key, e);
            }
        }
    }

    log::info!("✅ Automated leaderboards loaded ({} running)", started);
    started
}

/// Background refresher for one leaderboard.
///
/// Per iteration: query the aggregate, hand a display to the sink (edit the
/// previous display, falling back to creating a new one), persist any new
/// display reference, then sleep for the update interval. An edit failure
/// only forces recreation; a creation failure is fatal to this task alone.
async fn run_leaderboard_task(
    key: LeaderboardKey,
    config: LeaderboardConfig,
    store: Arc<dyn StatsStore>,
    sink: Arc<dyn DisplaySink>,
    mut cancel_rx: oneshot::Receiver<()>,
    registry: Arc<LeaderboardRegistry>,
) {
    // Resume the previously posted display if the config carries one
    let mut message_id = config.message_id;
    let mut cancelled = false;

    loop {
        match store
            .get_leaderboard(key.leaderboard_type, key.guild_id, &key.server_id, 10)
            .await
        {
            Ok(rows) => {
                let display = LeaderboardDisplay {
                    leaderboard_type: key.leaderboard_type,
                    guild_id: key.guild_id,
                    server_id: key.server_id.clone(),
                    rows,
                    generated_at: chrono::Utc::now().timestamp(),
                };

                if let Some(id) = message_id {
                    match sink.edit_display(key.channel_id, id, &display).await {
                        Ok(()) => {
                            log::debug!("Updated leaderboard display for {}", key);
                        }
                        Err(e) => {
                            // Display reference no longer resolvable; recreate
                            log::warn!(
                                "Failed to edit leaderboard display for {}: {}. Creating a new one",
                                key,
                                e
                            );
                            message_id = None;
                        }
                    }
                }

                if message_id.is_none() {
                    match sink.create_display(key.channel_id, &display).await {
                        Ok(new_id) => {
                            message_id = Some(new_id);
                            if let Err(e) = store
                                .update_leaderboard_message_id(
                                    key.guild_id,
                                    key.channel_id,
                                    key.leaderboard_type,
                                    &key.server_id,
                                    new_id,
                                )
                                .await
                            {
                                log::error!(
                                    "Failed to persist display reference for {}: {}",
                                    key,
                                    e
                                );
                            }
                        }
                        Err(e) => {
                            // Broken output sink: fatal to this task only
                            log::error!(
                                "Failed to create leaderboard display for {}: {}. Terminating task",
                                key,
                                e
                            );
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("Leaderboard query failed for {}: {}", key, e);
            }
        }

        tokio::select! {
            _ = &mut cancel_rx => {
                log::info!("Leaderboard task cancelled: {}", key);
                cancelled = true;
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(config.update_interval * 3600)) => {}
        }
    }

    // stop() already released the slot on the cancellation path
    if !cancelled {
        registry.release(&key);
    }
    log::info!("Leaderboard task finished: {}", key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::db::SqliteStatsStore;
    use crate::pipeline::types::PlayerStats;
    use std::sync::atomic::AtomicBool;
    use tempfile::NamedTempFile;

    /// Sink that records calls and can be told to fail
    #[derive(Default)]
    struct RecordingSink {
        next_id: AtomicU64,
        creates: Mutex<Vec<(i64, usize)>>,
        edits: Mutex<Vec<(i64, u64)>>,
        fail_edits: AtomicBool,
        fail_creates: AtomicBool,
    }

    #[async_trait]
    impl DisplaySink for RecordingSink {
        async fn create_display(
            &self,
            channel_id: i64,
            display: &LeaderboardDisplay,
        ) -> Result<u64, BoxError> {
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err("channel unavailable".into());
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.creates.lock().unwrap().push((channel_id, display.rows.len()));
            Ok(id)
        }

        async fn edit_display(
            &self,
            channel_id: i64,
            message_id: u64,
            _display: &LeaderboardDisplay,
        ) -> Result<(), BoxError> {
            if self.fail_edits.load(Ordering::SeqCst) {
                return Err("message not found".into());
            }
            self.edits.lock().unwrap().push((channel_id, message_id));
            Ok(())
        }
    }

    fn make_config(channel_id: i64) -> LeaderboardConfig {
        LeaderboardConfig {
            guild_id: 1001,
            channel_id,
            leaderboard_type: LeaderboardType::Kills,
            server_id: "default".to_string(),
            update_interval: 1,
            message_id: None,
        }
    }

    fn test_store() -> (NamedTempFile, Arc<SqliteStatsStore>) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStatsStore::new(temp_file.path().to_str().unwrap()).unwrap());
        (temp_file, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_start_rejected() {
        let (_temp, store) = test_store();
        let registry = Arc::new(LeaderboardRegistry::new());
        let sink: Arc<dyn DisplaySink> = Arc::new(RecordingSink::default());

        registry
            .start(make_config(42), store.clone(), sink.clone())
            .unwrap();
        let err = registry
            .start(make_config(42), store.clone(), sink.clone())
            .unwrap_err();
        assert_eq!(err, StartError::AlreadyRunning);
        assert_eq!(registry.running_count(), 1);

        // Different channel is a different identity tuple
        registry.start(make_config(43), store, sink).unwrap();
        assert_eq!(registry.running_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_bounds_enforced() {
        let (_temp, store) = test_store();
        let registry = Arc::new(LeaderboardRegistry::new());
        let sink: Arc<dyn DisplaySink> = Arc::new(RecordingSink::default());

        for bad in [0u64, 721] {
            let mut config = make_config(42);
            config.update_interval = bad;
            let err = registry
                .start(config, store.clone(), sink.clone())
                .unwrap_err();
            assert_eq!(err, StartError::InvalidInterval(bad));
        }
        assert_eq!(registry.running_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_sleep_releases_slot() {
        let (_temp, store) = test_store();
        let registry = Arc::new(LeaderboardRegistry::new());
        let sink: Arc<dyn DisplaySink> = Arc::new(RecordingSink::default());
        let key = LeaderboardKey::of(&make_config(42));

        registry.start(make_config(42), store, sink).unwrap();
        // Let the task post its first display and enter the sleep
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(registry.is_running(&key));

        assert!(registry.stop(&key));
        assert!(!registry.is_running(&key));
        assert_eq!(registry.running_count(), 0);
        // Stopping again is a no-op
        assert!(!registry.stop(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_iteration_creates_and_persists_display() {
        let (_temp, store) = test_store();
        store
            .update_player_stats(1001, "A", "default", &PlayerStats { kills: 5, deaths: 1, suicides: 0 })
            .await
            .unwrap();
        store.add_leaderboard_config(&make_config(42)).await.unwrap();

        let registry = Arc::new(LeaderboardRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        registry
            .start(make_config(42), store.clone(), sink.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(*sink.creates.lock().unwrap(), vec![(42, 1)]);
        let configs = store.list_leaderboard_configs().await.unwrap();
        assert_eq!(configs[0].message_id, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_display_edited_not_recreated() {
        let (_temp, store) = test_store();
        let registry = Arc::new(LeaderboardRegistry::new());
        let sink = Arc::new(RecordingSink::default());

        let mut config = make_config(42);
        config.message_id = Some(99);
        registry.start(config, store, sink.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(*sink.edits.lock().unwrap(), vec![(42, 99)]);
        assert!(sink.creates.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_failure_falls_back_to_create() {
        let (_temp, store) = test_store();
        let registry = Arc::new(LeaderboardRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        sink.fail_edits.store(true, Ordering::SeqCst);

        let mut config = make_config(42);
        config.message_id = Some(99); // stale reference
        registry.start(config, store, sink.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(sink.edits.lock().unwrap().is_empty());
        assert_eq!(sink.creates.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_terminates_task_only() {
        let (_temp, store) = test_store();
        let registry = Arc::new(LeaderboardRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        sink.fail_creates.store(true, Ordering::SeqCst);

        let key = LeaderboardKey::of(&make_config(42));
        registry.start(make_config(42), store, sink).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Broken sink: task terminated and released its slot unprompted
        assert!(!registry.is_running(&key));
        assert_eq!(registry.running_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_from_configs_skips_running() {
        let (_temp, store) = test_store();
        store.add_leaderboard_config(&make_config(42)).await.unwrap();
        store.add_leaderboard_config(&make_config(43)).await.unwrap();

        let registry = Arc::new(LeaderboardRegistry::new());
        let sink: Arc<dyn DisplaySink> = Arc::new(RecordingSink::default());

        // One of the two is already running
        registry
            .start(make_config(42), store.clone(), sink.clone())
            .unwrap();

        let started = resume_from_configs(&registry, store.clone(), sink).await;
        assert_eq!(started, 1);
        assert_eq!(registry.running_count(), 2);
    }
}
