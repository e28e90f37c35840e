//! Wrappers that run the admit check before a callable.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::target::ThrottleTarget;
use super::window::WindowTracker;
use crate::error::ThrottledError;

/// A handle pairing a target with its tracker.
///
/// Cloning is cheap; clones share the same tracker.
#[derive(Debug, Clone)]
pub struct Guard {
    target: ThrottleTarget,
    tracker: Arc<WindowTracker>,
}

impl Guard {
    pub(crate) fn new(target: ThrottleTarget, tracker: Arc<WindowTracker>) -> Self {
        Self { target, tracker }
    }

    /// Get the target this guard throttles.
    pub fn target(&self) -> &ThrottleTarget {
        &self.target
    }

    /// Get the tracker shared by every call on this target.
    pub fn tracker(&self) -> &Arc<WindowTracker> {
        &self.tracker
    }

    /// Record one call against the quota, or fail if it is used up.
    pub fn check(&self) -> Result<(), ThrottledError> {
        if self.tracker.try_admit() {
            return Ok(());
        }

        debug!(throttle_target = %self.target, "Request throttled");
        Err(ThrottledError::new(self.target.clone()))
    }

    /// Run `f` if the call is admitted.
    pub fn call<F, R>(&self, f: F) -> Result<R, ThrottledError>
    where
        F: FnOnce() -> R,
    {
        self.check()?;
        Ok(f())
    }

    /// Run a fallible `f` if admitted, folding the throttling error into
    /// the callable's own error type.
    pub fn try_call<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<ThrottledError>,
    {
        self.check()?;
        f()
    }

    /// Build and await the future returned by `f` if admitted.
    ///
    /// The check itself never suspends, and `f` is not called at all when
    /// the call is rejected.
    pub async fn call_async<F, Fut>(&self, f: F) -> Result<Fut::Output, ThrottledError>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.check()?;
        Ok(f().await)
    }

    /// Async counterpart of [`Guard::try_call`].
    pub async fn try_call_async<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ThrottledError>,
    {
        self.check()?;
        f().await
    }
}

/// A callable bound to a guard.
///
/// Arguments go through `call_with` as a single value; use a tuple for
/// several.
#[derive(Clone)]
pub struct GuardedFn<F> {
    guard: Guard,
    f: F,
}

impl<F> GuardedFn<F> {
    pub(crate) fn new(guard: Guard, f: F) -> Self {
        Self { guard, f }
    }

    /// Get the guard applied to this callable.
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn call<R>(&self) -> Result<R, ThrottledError>
    where
        F: Fn() -> R,
    {
        self.guard.call(|| (self.f)())
    }

    pub fn call_with<A, R>(&self, args: A) -> Result<R, ThrottledError>
    where
        F: Fn(A) -> R,
    {
        self.guard.call(|| (self.f)(args))
    }

    pub async fn call_async<Fut>(&self) -> Result<Fut::Output, ThrottledError>
    where
        F: Fn() -> Fut,
        Fut: Future,
    {
        self.guard.call_async(|| (self.f)()).await
    }

    pub async fn call_async_with<A, Fut>(&self, args: A) -> Result<Fut::Output, ThrottledError>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        self.guard.call_async(|| (self.f)(args)).await
    }
}

impl<F> fmt::Debug for GuardedFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedFn")
            .field("target", &self.guard.target)
            .finish_non_exhaustive()
    }
}

/// A service value whose method calls all share one guard.
///
/// Route each method call through [`Throttled::call`] (or its `_mut` and
/// async variants).
#[derive(Debug, Clone)]
pub struct Throttled<T> {
    inner: T,
    guard: Guard,
}

impl<T> Throttled<T> {
    pub(crate) fn new(inner: T, guard: Guard) -> Self {
        Self { inner, guard }
    }

    /// Get the guard applied to this service.
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Access the service without going through the guard.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Unwrap the service, dropping the guard.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn call<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, ThrottledError> {
        self.guard.call(|| f(&self.inner))
    }

    pub fn call_mut<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R, ThrottledError> {
        let inner = &mut self.inner;
        self.guard.call(move || f(inner))
    }

    pub async fn call_async<'a, F, Fut>(&'a self, f: F) -> Result<Fut::Output, ThrottledError>
    where
        F: FnOnce(&'a T) -> Fut,
        Fut: Future + 'a,
    {
        self.guard.call_async(|| f(&self.inner)).await
    }
}
