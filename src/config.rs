//! Configuration for throttle guards.
//!
//! A [`WindowConfig`] is fixed when a guard is created. Guards can also be
//! described up front in a YAML presets file and looked up by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};
use crate::throttle::ThrottleTarget;

/// Default estimated cost of one guarded call, in milliseconds.
pub const DEFAULT_EXECUTION_TIME_MS: u64 = 10;

/// Immutable sliding-window settings for one throttling target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    duration: Duration,
    limit: u32,
    execution_time: Duration,
}

impl WindowConfig {
    /// Create a window admitting at most `limit` calls per `duration`.
    ///
    /// Fails if either value is zero.
    pub fn new(duration: Duration, limit: u32) -> Result<Self> {
        if duration.is_zero() {
            return Err(Error::Config("duration must be greater than 0".to_string()));
        }
        if limit == 0 {
            return Err(Error::Config("limit must be greater than 0".to_string()));
        }

        Ok(Self {
            duration,
            limit,
            execution_time: Duration::from_millis(DEFAULT_EXECUTION_TIME_MS),
        })
    }

    /// Shorthand for a window measured in whole seconds.
    pub fn from_secs(duration_secs: u64, limit: u32) -> Result<Self> {
        Self::new(Duration::from_secs(duration_secs), limit)
    }

    /// Set the estimated cost of one call.
    ///
    /// Each admitted call keeps occupying its slot for this long past the
    /// window, so eviction errs on the strict side.
    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = execution_time;
        self
    }

    /// Get the window length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the maximum admitted calls per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Get the estimated cost of one call.
    pub fn execution_time(&self) -> Duration {
        self.execution_time
    }

    /// How long an admitted call counts against the limit.
    pub fn occupancy(&self) -> Duration {
        self.duration.saturating_add(self.execution_time)
    }
}

/// Serialized guard options, as written in a presets file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardOptions {
    /// Window length in seconds (fractions allowed)
    pub duration_secs: f64,

    /// Maximum admitted calls per window
    pub limit: u32,

    /// Explicit target key; defaults to the preset name
    #[serde(default)]
    pub target: Option<String>,

    /// Estimated per-call execution time in milliseconds
    #[serde(default = "default_execution_time_ms")]
    pub execution_time_ms: u64,
}

fn default_execution_time_ms() -> u64 {
    DEFAULT_EXECUTION_TIME_MS
}

impl GuardOptions {
    /// Validate the options and build the window configuration.
    pub fn window_config(&self) -> Result<WindowConfig> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(Error::Config(format!(
                "duration_secs must be a positive number, got {}",
                self.duration_secs
            )));
        }
        let duration = Duration::try_from_secs_f64(self.duration_secs)
            .map_err(|e| Error::Config(format!("invalid duration_secs: {}", e)))?;

        Ok(WindowConfig::new(duration, self.limit)?
            .with_execution_time(Duration::from_millis(self.execution_time_ms)))
    }
}

/// A validated, named guard definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPreset {
    pub target: ThrottleTarget,
    pub window: WindowConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PresetsFile {
    #[serde(default)]
    guards: BTreeMap<String, GuardOptions>,
}

/// Named guard presets loaded from YAML.
///
/// ```yaml
/// guards:
///   api:
///     duration_secs: 10
///     limit: 5
///     target: user_123
/// ```
#[derive(Debug, Clone, Default)]
pub struct GuardPresets {
    presets: BTreeMap<String, GuardPreset>,
}

impl GuardPresets {
    /// Create an empty set of presets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load presets from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading guard presets");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load presets from a YAML string. Every entry is validated here.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: PresetsFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse guard presets: {}", e)))?;

        let mut presets = BTreeMap::new();
        for (name, options) in file.guards {
            let window = options.window_config().map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("guard '{}': {}", name, msg)),
                other => other,
            })?;
            let target = ThrottleTarget::key(options.target.unwrap_or_else(|| name.clone()));
            presets.insert(name, GuardPreset { target, window });
        }

        Ok(Self { presets })
    }

    /// Add or replace a preset.
    pub fn insert(&mut self, name: impl Into<String>, preset: GuardPreset) {
        self.presets.insert(name.into(), preset);
    }

    /// Look up a preset by name.
    pub fn get(&self, name: &str) -> Result<&GuardPreset> {
        self.presets
            .get(name)
            .ok_or_else(|| Error::UnknownGuard(name.to_string()))
    }

    /// Names of all presets, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Get the number of presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Check whether no presets are defined.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
