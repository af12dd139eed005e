//! Counters for register mutation and event dispatch
//!
//! Dropped calls and dropped events are invisible at the call site, so these
//! counters are the place to observe them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters shared by a delegate and its dispatch loop
#[derive(Default, Debug)]
pub struct Metrics {
    /// Mutating calls that passed the context check
    pub calls_applied: AtomicU64,
    /// Mutating calls dropped because their context was done
    pub calls_dropped: AtomicU64,
    /// Bit transitions observed
    pub transitions: AtomicU64,
    /// Events handed to the channel
    pub events_emitted: AtomicU64,
    /// Events lost to a full or closed channel
    pub events_dropped: AtomicU64,
    /// Handler tasks spawned by the dispatch loop
    pub handlers_spawned: AtomicU64,
    /// Handler tasks that panicked
    pub handler_panics: AtomicU64,
}

impl Metrics {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call that passed the context check
    pub fn record_applied(&self, transitions: usize) {
        self.calls_applied.fetch_add(1, Ordering::Relaxed);
        self.transitions.fetch_add(transitions as u64, Ordering::Relaxed);
    }

    /// Record a call dropped because its context was done
    pub fn record_dropped_call(&self) {
        self.calls_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event handed to the channel
    pub fn record_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event lost to a full or closed channel
    pub fn record_dropped_event(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a spawned handler task
    pub fn record_spawned(&self) {
        self.handlers_spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handler task that panicked
    pub fn record_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter into a plain copy
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_applied: self.calls_applied.load(Ordering::Relaxed),
            calls_dropped: self.calls_dropped.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            handlers_spawned: self.handlers_spawned.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls_applied: u64,
    pub calls_dropped: u64,
    pub transitions: u64,
    pub events_emitted: u64,
    pub events_dropped: u64,
    pub handlers_spawned: u64,
    pub handler_panics: u64,
}
