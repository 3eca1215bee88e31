//! Kill-event processor - pipeline orchestrator
//!
//! Owns the admission path (validate → flood check → buffer) and the single
//! drain-and-process primitive shared by the periodic scheduler, the
//! buffer-full trigger and the manual flush.
//!
//! No error escapes `add_kill_event` or `process_pending` to the caller:
//! the pipeline favors availability over per-event delivery guarantees, so
//! failures are logged and contained per event.

use super::aggregator::{ApplyOutcome, StatsAggregator};
use super::buffer::EventBuffer;
use super::config::PipelineConfig;
use super::flood::FloodGuard;
use super::validator;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::task::JoinSet;

/// Pipeline orchestrator, constructed once at process start and shared via
/// `Arc` with the ingestion source, the scheduler and administrative callers.
///
/// The buffer is appended to only by the admission path and drained only by
/// `process_pending`; the flood-window map is touched only at admission.
pub struct KillEventProcessor {
    enabled: AtomicBool,
    buffer: Mutex<EventBuffer>,
    flood: Mutex<FloodGuard>,
    aggregator: StatsAggregator,
    /// Occupancy at which admission triggers an immediate flush
    buffer_size: usize,
    /// Fan-out slice size for one concurrent processing round
    sub_batch_size: usize,
    /// Wall-clock source, injectable for deterministic tests
    now_fn: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl KillEventProcessor {
    pub fn new(aggregator: StatsAggregator, config: &PipelineConfig) -> Self {
        Self::new_with_timestamp_fn(
            aggregator,
            config,
            Box::new(|| chrono::Utc::now().timestamp_millis() as f64 / 1000.0),
        )
    }

    /// Construct with a custom timestamp function (used by tests to step
    /// through flood windows deterministically).
    pub fn new_with_timestamp_fn(
        aggregator: StatsAggregator,
        config: &PipelineConfig,
        now_fn: Box<dyn Fn() -> f64 + Send + Sync>,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            buffer: Mutex::new(EventBuffer::new()),
            flood: Mutex::new(FloodGuard::new(
                config.flood_threshold,
                config.flood_window_secs,
            )),
            aggregator,
            buffer_size: config.buffer_size,
            sub_batch_size: config.sub_batch_size,
            now_fn,
        }
    }

    /// Entry point for the external log watcher. Safe to call at any
    /// pipeline state, including before the scheduler has started.
    ///
    /// Malformed or flood-flagged events are dropped silently from the
    /// caller's perspective (logged at warn). When the buffer reaches its
    /// size threshold the pending events are flushed immediately instead of
    /// waiting for the next scheduled interval.
    pub async fn add_kill_event(&self, raw: &Value) {
        if !self.is_enabled() {
            return;
        }

        let event = match validator::parse_kill_event(raw) {
            Some(event) => event,
            None => return,
        };

        let now = (self.now_fn)();
        if self.flood.lock().unwrap().is_flooding(&event.killer, now) {
            return;
        }

        let occupancy = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.add(event);
            buffer.len()
        };
        log::debug!("Kill event added to buffer. Buffer size: {}", occupancy);

        if occupancy >= self.buffer_size {
            self.process_pending().await;
        }
    }

    /// Drain the buffer and process its contents in concurrent sub-batches.
    ///
    /// This is the single flush primitive: the periodic scheduler, the
    /// buffer-full trigger and the manual flush all call it, and draining an
    /// empty buffer is a no-op. Per-event failures are logged and do not
    /// abort the sub-batch or its siblings.
    ///
    /// Returns the number of events drained.
    pub async fn process_pending(&self) -> usize {
        if !self.is_enabled() {
            return 0;
        }

        let drained = self.buffer.lock().unwrap().drain_all();
        if drained.is_empty() {
            log::debug!("No kill events to process");
            return 0;
        }

        let total = drained.len();
        let mut processed = 0usize;

        for batch in drained.chunks(self.sub_batch_size) {
            let mut units = JoinSet::new();
            for event in batch {
                let aggregator = self.aggregator.clone();
                let event = event.clone();
                units.spawn(async move {
                    let outcome = aggregator.apply(&event).await;
                    (event, outcome)
                });
            }

            while let Some(joined) = units.join_next().await {
                match joined {
                    Ok((_, Ok(ApplyOutcome::Applied))) => {}
                    Ok((event, Ok(ApplyOutcome::SkippedNotPremium))) => {
                        log::debug!("Event from guild {} skipped (not premium)", event.guild_id);
                    }
                    Ok((event, Err(e))) => {
                        log::error!(
                            "Failed to process kill event ({} -> {}): {}",
                            event.killer,
                            event.victim,
                            e
                        );
                    }
                    Err(join_err) => {
                        log::error!("Kill event unit panicked: {}", join_err);
                    }
                }
            }

            processed += batch.len();
            log::info!(
                "📊 Processed a batch of {} kill events. Remaining in buffer: {}",
                batch.len(),
                total - processed
            );
        }

        processed
    }

    /// Administrative toggle. Returns the new state.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.store(enabled, Ordering::SeqCst);
        log::info!(
            "Kill event processor {}",
            if enabled { "enabled" } else { "disabled" }
        );
        enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Administrative manual flush: same drain path as the scheduler,
    /// invoked outside the periodic cadence. Returns events processed.
    pub async fn flush(&self) -> usize {
        let processed = self.process_pending().await;
        log::info!("Manually processed {} kill events from the buffer", processed);
        processed
    }

    /// Current buffer occupancy (diagnostics and tests).
    pub fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}
