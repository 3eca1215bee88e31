//! Per-actor kill-flood detection
//!
//! Sliding-window rate limiter over recent event timestamps. A single
//! compromised or bugged game-server feed must not be able to overwhelm
//! storage writes or display noise.

use std::collections::HashMap;

/// Sliding-window flood detector keyed by actor name.
///
/// Windows are created lazily on an actor's first event and pruned on every
/// call; they live for the life of the process, which is acceptable because
/// actor cardinality is bounded by active players.
#[derive(Debug)]
pub struct FloodGuard {
    /// Per-actor recent event timestamps, most-recent last
    windows: HashMap<String, Vec<f64>>,
    /// Max events allowed within `window_secs` before flagging
    threshold: usize,
    /// Sliding window length in seconds
    window_secs: f64,
}

impl FloodGuard {
    pub fn new(threshold: usize, window_secs: f64) -> Self {
        Self {
            windows: HashMap::new(),
            threshold,
            window_secs,
        }
    }

    /// Record an event for `actor` at `now` and report whether it floods.
    ///
    /// The current event is always appended before the threshold check, so
    /// the (threshold+1)-th event inside one window is the first one flagged,
    /// and a flagged event still counts toward future windows.
    pub fn is_flooding(&mut self, actor: &str, now: f64) -> bool {
        let window = self.windows.entry(actor.to_string()).or_default();

        window.retain(|&t| now - t <= self.window_secs);
        window.push(now);

        let count = window.len();
        let flooding = count > self.threshold;
        if flooding {
            log::warn!(
                "⚠️  Player {} is flooding the killfeed ({} kills in {:.0} seconds)",
                actor,
                count,
                self.window_secs
            );
        }
        flooding
    }

    /// Number of actors with a live window (diagnostics only).
    pub fn tracked_actors(&self) -> usize {
        self.windows.len()
    }
}
