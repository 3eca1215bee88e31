//! Per-event stats aggregation
//!
//! `StatsAggregator::apply` is the unit of work dispatched for each event in
//! a sub-batch. Each step is independently fault-tolerant: a failure is
//! returned to the dispatcher, which logs it and moves on; sibling events in
//! the same sub-batch are unaffected.

use super::db::StatsStore;
use super::premium::EntitlementChain;
use super::types::{BoxError, KillEvent, PlayerStats};
use std::sync::Arc;

/// What happened to an event handed to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Counters updated and event recorded to the audit log
    Applied,
    /// Event accepted but dropped at the entitlement gate
    SkippedNotPremium,
}

/// Applies a batch of events to persisted per-player statistics.
///
/// Cheap to clone; clones share the store and entitlement chain, so one
/// instance per in-flight event unit is the normal usage.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn StatsStore>,
    entitlement: EntitlementChain,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn StatsStore>, entitlement: EntitlementChain) -> Self {
        Self { store, entitlement }
    }

    /// Apply one kill event to the persisted statistics.
    ///
    /// Steps:
    /// 1. Entitlement gate, re-checked per event (it can change between
    ///    buffer admission and flush). Non-premium tenants produce no writes.
    /// 2. Append the raw event to the audit log.
    /// 3. Read current counters for killer and victim, defaulting to zero.
    /// 4. Suicide: increment the killer's `suicides` only.
    /// 5. Otherwise: increment killer `kills` and victim `deaths` as two
    ///    independent read-modify-write operations. Concurrent updates to
    ///    the same player within one flush can lose an increment on the
    ///    read snapshot; this is a known weak-consistency trade-off.
    pub async fn apply(&self, event: &KillEvent) -> Result<ApplyOutcome, BoxError> {
        if !self.entitlement.has_premium_access(event.guild_id).await {
            log::debug!(
                "Skipping kill event for non-premium guild {}",
                event.guild_id
            );
            return Ok(ApplyOutcome::SkippedNotPremium);
        }

        self.store.record_kill_event(event).await?;

        let killer_stats = self
            .store
            .get_player_stats(event.guild_id, &event.killer, &event.server_id)
            .await?
            .unwrap_or_default();

        if event.is_suicide {
            let updated = PlayerStats {
                suicides: killer_stats.suicides + 1,
                ..killer_stats
            };
            self.store
                .update_player_stats(event.guild_id, &event.killer, &event.server_id, &updated)
                .await?;
        } else {
            let updated = PlayerStats {
                kills: killer_stats.kills + 1,
                ..killer_stats
            };
            self.store
                .update_player_stats(event.guild_id, &event.killer, &event.server_id, &updated)
                .await?;

            let victim_stats = self
                .store
                .get_player_stats(event.guild_id, &event.victim, &event.server_id)
                .await?
                .unwrap_or_default();
            let updated = PlayerStats {
                deaths: victim_stats.deaths + 1,
                ..victim_stats
            };
            self.store
                .update_player_stats(event.guild_id, &event.victim, &event.server_id, &updated)
                .await?;
        }

        log::info!(
            "Kill event processed: {} killed {} with {} in guild {}",
            event.killer,
            event.victim,
            event.weapon,
            event.guild_id
        );
        Ok(ApplyOutcome::Applied)
    }
}
