//! Periodic ingestion scheduler
//!
//! Owns the buffer's flush cadence: on a fixed period, drain whatever
//! accumulated and dispatch it for aggregation. The immediate buffer-full
//! flush and the administrative manual flush share the same drain primitive
//! inside the processor, so this loop never needs to coordinate with them.

use super::processor::KillEventProcessor;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Background flush loop for the kill-event processor.
///
/// Runs until the owning task is dropped or aborted. A tick that drains
/// nothing is a no-op; per-event failures are handled inside
/// `process_pending` and never break the cadence.
pub async fn run_ingestion_scheduler(processor: Arc<KillEventProcessor>, interval_secs: u64) {
    log::info!(
        "⏰ Kill event processor started (interval: {}s)",
        interval_secs
    );

    let mut timer = interval(Duration::from_secs(interval_secs));

    loop {
        timer.tick().await;

        if !processor.is_enabled() {
            continue;
        }

        let processed = processor.process_pending().await;
        if processed > 0 {
            log::debug!("✅ Scheduler flush processed {} kill events", processed);
        }
    }
}
