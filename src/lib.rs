//! Throttle Guard - In-process call throttling
//!
//! This crate wraps functions, async functions and service values in a guard
//! that rejects calls once a target has used up its quota for a sliding time
//! window. Each target gets exactly one tracker, shared by every call site
//! that names it.

pub mod config;
pub mod error;
pub mod throttle;

pub use config::{GuardPresets, WindowConfig};
pub use error::{Error, Result, ThrottledError};
pub use throttle::{Guard, GuardedFn, Registry, ThrottleTarget, Throttled, WindowTracker};
