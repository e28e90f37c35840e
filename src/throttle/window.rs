//! Sliding-window call tracking for one throttling target.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::config::WindowConfig;

/// Tracks the admitted calls of one target and decides whether a new call
/// fits in the window.
///
/// The call log is only touched under the tracker's mutex, so admit decisions
/// for one target are linearized no matter how many threads or tasks call in.
/// Expired entries are dropped lazily on each check; there is no timer.
#[derive(Debug)]
pub struct WindowTracker {
    config: WindowConfig,
    /// Start times of admitted calls, oldest first
    calls: Mutex<VecDeque<Instant>>,
}

impl WindowTracker {
    /// Create a tracker with an empty call log.
    pub fn new(config: WindowConfig) -> Self {
        Self {
            calls: Mutex::new(VecDeque::new()),
            config,
        }
    }

    /// Get the window configuration for this tracker.
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Try to admit a call now.
    ///
    /// The clock is read under the lock so concurrent callers record their
    /// calls in the order they were decided.
    pub fn try_admit(&self) -> bool {
        let mut calls = self.calls.lock();
        self.admit_locked(&mut calls, Instant::now())
    }

    /// Try to admit a call at `now`, recording it if admitted.
    ///
    /// A rejection leaves the call log untouched.
    pub fn try_admit_at(&self, now: Instant) -> bool {
        let mut calls = self.calls.lock();
        self.admit_locked(&mut calls, now)
    }

    fn admit_locked(&self, calls: &mut VecDeque<Instant>, now: Instant) -> bool {
        self.evict_expired(calls, now);

        let admitted = calls.len() < self.config.limit() as usize;
        if admitted {
            // Explicit times may arrive out of order; keep the log sorted.
            let at = calls.partition_point(|&t| t <= now);
            calls.insert(at, now);
        }

        trace!(
            admitted,
            live = calls.len(),
            limit = self.config.limit(),
            "Admit decision"
        );
        admitted
    }

    /// Number of calls still counting against the limit at `now`.
    pub fn live_count_at(&self, now: Instant) -> usize {
        let calls = self.calls.lock();
        calls.iter().filter(|&&t| !self.is_expired(t, now)).count()
    }

    /// Number of calls that would still be admitted at `now`.
    pub fn remaining_at(&self, now: Instant) -> usize {
        (self.config.limit() as usize).saturating_sub(self.live_count_at(now))
    }

    /// Time until a slot frees up, or zero if one is free at `now`.
    pub fn duration_until_slot_at(&self, now: Instant) -> Duration {
        let calls = self.calls.lock();
        let live: Vec<Instant> = calls
            .iter()
            .copied()
            .filter(|&t| !self.is_expired(t, now))
            .collect();

        if live.len() < self.config.limit() as usize {
            return Duration::ZERO;
        }

        // The slot frees when enough of the oldest calls leave the window.
        let blocking = live[live.len() - self.config.limit() as usize];
        self.config
            .occupancy()
            .saturating_sub(now.saturating_duration_since(blocking))
    }

    /// Snapshot of the recorded call times, oldest first.
    pub fn entries(&self) -> Vec<Instant> {
        self.calls.lock().iter().copied().collect()
    }

    fn is_expired(&self, recorded: Instant, now: Instant) -> bool {
        now.saturating_duration_since(recorded) >= self.config.occupancy()
    }

    fn evict_expired(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = calls.front() {
            if !self.is_expired(oldest, now) {
                break;
            }
            calls.pop_front();
        }
    }
}
