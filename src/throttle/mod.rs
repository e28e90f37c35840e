//! Throttling state and the wrappers that apply it.

mod guard;
mod registry;
mod target;
mod window;

pub use guard::{Guard, GuardedFn, Throttled};
pub use registry::Registry;
pub use target::ThrottleTarget;
pub use window::WindowTracker;

use crate::config::WindowConfig;

/// Build a guard for `target` on the global registry.
pub fn global_guard(target: impl Into<ThrottleTarget>, config: WindowConfig) -> Guard {
    Registry::global().guard(target, config)
}

/// Wrap a callable on the global registry, throttled under its own identity.
pub fn global_wrap<F: 'static>(config: WindowConfig, f: F) -> GuardedFn<F> {
    Registry::global().wrap(config, f)
}
