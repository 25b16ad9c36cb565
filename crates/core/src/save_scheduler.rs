//! Debounced per-canvas persistence
//!
//! Keeps at most one pending snapshot per canvas. A newer snapshot replaces
//! the pending one and restarts its window, so only the latest state is ever
//! handed out for writing. Time is passed in by the caller.

use iiif_model::AnnotationData;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SaveSchedulerConfig {
    /// Idle time after the last change before a snapshot becomes due.
    pub debounce: Duration,
}

impl Default for SaveSchedulerConfig {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(500) }
    }
}

impl SaveSchedulerConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Annotation list of one canvas, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSave {
    pub canvas_index: usize,
    pub canvas_id: String,
    pub annotations: Vec<AnnotationData>,
}

#[derive(Debug)]
struct PendingWrite {
    snapshot: CanvasSave,
    due_at: Instant,
}

#[derive(Debug, Default)]
pub struct SaveScheduler {
    config: SaveSchedulerConfig,
    pending: BTreeMap<usize, PendingWrite>,
}

impl SaveScheduler {
    pub fn new(config: SaveSchedulerConfig) -> Self {
        Self { config, pending: BTreeMap::new() }
    }

    /// Replace any pending snapshot for the canvas and restart its window.
    pub fn schedule(&mut self, snapshot: CanvasSave, now: Instant) {
        let due_at = now + self.config.debounce;
        self.pending.insert(snapshot.canvas_index, PendingWrite { snapshot, due_at });
    }

    /// Remove and return every snapshot whose window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<CanvasSave> {
        let due: Vec<usize> = self
            .pending
            .iter()
            .filter(|(_, write)| write.due_at <= now)
            .map(|(index, _)| *index)
            .collect();

        due.into_iter().filter_map(|index| self.pending.remove(&index)).map(|w| w.snapshot).collect()
    }

    /// Hand out the pending snapshot for a canvas right away.
    pub fn flush(&mut self, canvas_index: usize) -> Option<CanvasSave> {
        self.pending.remove(&canvas_index).map(|write| write.snapshot)
    }

    pub fn flush_all(&mut self) -> Vec<CanvasSave> {
        std::mem::take(&mut self.pending).into_values().map(|write| write.snapshot).collect()
    }

    /// Drop a pending snapshot, typically because a fresher one was written directly.
    pub fn cancel(&mut self, canvas_index: usize) -> bool {
        self.pending.remove(&canvas_index).is_some()
    }

    pub fn is_pending(&self, canvas_index: usize) -> bool {
        self.pending.contains_key(&canvas_index)
    }

    /// Earliest instant at which [`SaveScheduler::take_due`] will return something.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.values().map(|write| write.due_at).min()
    }
}
