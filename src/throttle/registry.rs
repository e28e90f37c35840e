//! Per-target tracker registry.

use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use super::guard::{Guard, GuardedFn, Throttled};
use super::target::ThrottleTarget;
use super::window::WindowTracker;
use crate::config::{GuardPresets, WindowConfig};
use crate::error::Result;

/// Maps each throttling target to exactly one [`WindowTracker`].
///
/// Trackers are created on first use and never removed. The first caller
/// for a target fixes its window configuration; later callers share that
/// tracker even if they pass a different configuration.
///
/// This struct is thread-safe and can be shared across threads and tasks.
#[derive(Debug, Default)]
pub struct Registry {
    trackers: DashMap<ThrottleTarget, Arc<WindowTracker>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            trackers: DashMap::new(),
        }
    }

    /// The process-wide registry. Created on first access and kept for the
    /// life of the process.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Get the tracker for `target`, creating it with `config` if needed.
    pub fn resolve(&self, target: ThrottleTarget, config: WindowConfig) -> Arc<WindowTracker> {
        let tracker = {
            let entry = self.trackers.entry(target.clone()).or_insert_with(|| {
                debug!(
                    throttle_target = %target,
                    limit = config.limit(),
                    duration = ?config.duration(),
                    execution_time = ?config.execution_time(),
                    "Creating new window tracker"
                );
                Arc::new(WindowTracker::new(config))
            });
            Arc::clone(entry.value())
        };

        if *tracker.config() != config {
            debug!(
                throttle_target = %target,
                existing_limit = tracker.config().limit(),
                requested_limit = config.limit(),
                "Target already has a tracker, ignoring differing config"
            );
        }

        tracker
    }

    /// Build a guard for an explicit target.
    pub fn guard(&self, target: impl Into<ThrottleTarget>, config: WindowConfig) -> Guard {
        let target = target.into();
        let tracker = self.resolve(target.clone(), config);
        Guard::new(target, tracker)
    }

    /// Wrap a callable, throttled under its own identity.
    pub fn wrap<F: 'static>(&self, config: WindowConfig, f: F) -> GuardedFn<F> {
        self.wrap_with_target(ThrottleTarget::callable::<F>(), config, f)
    }

    /// Wrap a callable under an explicit target. Callables wrapped with
    /// equal targets share one quota.
    pub fn wrap_with_target<F>(
        &self,
        target: impl Into<ThrottleTarget>,
        config: WindowConfig,
        f: F,
    ) -> GuardedFn<F> {
        GuardedFn::new(self.guard(target, config), f)
    }

    /// Guard every call on a service value. All values of type `T` wrapped
    /// this way share one quota.
    pub fn throttled<T: 'static>(&self, value: T, config: WindowConfig) -> Throttled<T> {
        self.throttled_with_target(ThrottleTarget::of_type::<T>(), value, config)
    }

    /// Guard every call on a service value under an explicit target.
    pub fn throttled_with_target<T>(
        &self,
        target: impl Into<ThrottleTarget>,
        value: T,
        config: WindowConfig,
    ) -> Throttled<T> {
        Throttled::new(value, self.guard(target, config))
    }

    /// Build a guard from a named preset.
    pub fn preset_guard(&self, presets: &GuardPresets, name: &str) -> Result<Guard> {
        let preset = presets.get(name)?;
        Ok(self.guard(preset.target.clone(), preset.window))
    }

    /// Get the tracker for `target` if one exists.
    pub fn tracker(&self, target: &ThrottleTarget) -> Option<Arc<WindowTracker>> {
        self.trackers.get(target).map(|entry| Arc::clone(entry.value()))
    }

    /// Get the number of trackers.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Check whether no tracker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}
