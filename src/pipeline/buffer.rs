//! Bounded kill-event buffer
//!
//! Accumulates validated, flood-checked events until the scheduler (or a
//! buffer-full trigger) drains them. Only the admission path appends and
//! only the drain primitive empties it; the orchestrator serializes access.

use super::types::KillEvent;

/// FIFO accumulation buffer for validated kill events.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<KillEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn add(&mut self, event: KillEvent) {
        self.events.push(event);
    }

    /// Atomically empty the buffer and return its contents.
    ///
    /// Draining an empty buffer returns an empty vec and is a no-op, so the
    /// periodic flush, the buffer-full flush and the manual flush can all
    /// share this primitive without coordination.
    pub fn drain_all(&mut self) -> Vec<KillEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
