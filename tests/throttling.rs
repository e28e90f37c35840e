use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use throttle_guard::throttle::{global_guard, global_wrap};
use throttle_guard::{Error, Registry, ThrottleTarget, ThrottledError, WindowConfig};

fn window(duration_secs: u64, limit: u32) -> WindowConfig {
    WindowConfig::from_secs(duration_secs, limit).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_window_reopens_after_duration() {
    let registry = Registry::new();
    let guarded = registry.wrap(window(10, 5), || "Executed");

    for _ in 0..5 {
        assert_eq!(guarded.call(), Ok("Executed"));
    }

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(guarded.call().is_err());

    tokio::time::advance(Duration::from_millis(10_499)).await;
    assert_eq!(guarded.call(), Ok("Executed"));
}

struct Service {
    name: &'static str,
}

impl Service {
    fn method(&self) -> String {
        format!("{} executed", self.name)
    }

    async fn fetch(&self) -> &'static str {
        self.name
    }
}

#[test]
fn test_service_instances_share_quota() {
    let registry = Registry::new();
    let first = registry.throttled(Service { name: "first" }, window(15, 2));
    let second = registry.throttled(Service { name: "second" }, window(15, 2));

    assert_eq!(first.call(|s| s.method()), Ok("first executed".to_string()));
    assert_eq!(first.call(|s| s.method()), Ok("first executed".to_string()));
    assert!(first.call(|s| s.method()).is_err());
    assert!(second.call(|s| s.method()).is_err());
}

#[test]
fn test_service_instances_with_distinct_targets() {
    let registry = Registry::new();
    let first =
        registry.throttled_with_target("instance-1", Service { name: "first" }, window(15, 1));
    let second =
        registry.throttled_with_target("instance-2", Service { name: "second" }, window(15, 1));

    assert!(first.call(|s| s.method()).is_ok());
    assert!(first.call(|s| s.method()).is_err());
    assert!(second.call(|s| s.method()).is_ok());
}

#[tokio::test]
async fn test_service_async_methods_share_guard() {
    let registry = Registry::new();
    let service = registry.throttled(Service { name: "svc" }, window(15, 2));

    assert_eq!(service.call_async(|s| s.fetch()).await, Ok("svc"));
    assert_eq!(service.call(|s| s.method()), Ok("svc executed".to_string()));
    assert!(service.call_async(|s| s.fetch()).await.is_err());
}

#[test]
fn test_shared_target_across_functions() {
    let registry = Registry::new();
    let function_a = registry.wrap_with_target("user_123", window(10, 3), || "A");
    let function_b = registry.wrap_with_target("user_123", window(10, 3), || "B");

    for _ in 0..3 {
        assert_eq!(function_a.call(), Ok("A"));
    }

    let err = function_b.call().unwrap_err();
    assert_eq!(err.target(), &ThrottleTarget::from("user_123"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_exhausted_target_does_not_affect_others() {
    let registry = Registry::new();
    let busy = registry.guard("busy", window(10, 2));
    let idle = registry.guard("idle", window(10, 2));

    while busy.check().is_ok() {}

    assert!(idle.check().is_ok());
    assert!(idle.check().is_ok());
    assert!(idle.check().is_err());
}

#[tokio::test]
async fn test_async_rejected_bodies_never_run() {
    let registry = Registry::new();
    let started = Arc::new(AtomicUsize::new(0));

    let body_started = Arc::clone(&started);
    let guarded = registry.wrap(window(10, 3), move || {
        let body_started = Arc::clone(&body_started);
        async move {
            body_started.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            "Executed"
        }
    });

    let mut results = Vec::new();
    for _ in 0..5 {
        results.push(guarded.call_async().await);
    }

    assert!(results[..3].iter().all(|r| r == &Ok("Executed")));
    assert!(results[3..].iter().all(|r| r.is_err()));
    assert_eq!(started.load(Ordering::SeqCst), 3);
}

async fn double(n: u32) -> u32 {
    n * 2
}

#[tokio::test]
async fn test_async_fn_with_arguments() {
    let registry = Registry::new();
    let guarded = registry.wrap(window(10, 1), double);

    assert_eq!(guarded.call_async_with(21).await, Ok(42));
    assert!(guarded.call_async_with(1).await.is_err());
}

#[test]
fn test_callee_errors_propagate_unchanged() {
    #[derive(Debug, PartialEq)]
    enum JobError {
        Throttled,
        Invalid(String),
    }

    impl From<ThrottledError> for JobError {
        fn from(_: ThrottledError) -> Self {
            JobError::Throttled
        }
    }

    let registry = Registry::new();
    let guard = registry.guard("jobs", window(10, 2));

    let failed: Result<(), JobError> =
        guard.try_call(|| Err(JobError::Invalid("bad input".into())));
    assert_eq!(failed, Err(JobError::Invalid("bad input".into())));

    // The failed call still used a slot.
    assert!(guard.try_call(|| Ok::<_, JobError>(())).is_ok());
    assert_eq!(guard.try_call(|| Ok::<_, JobError>(())), Err(JobError::Throttled));
}

#[test]
fn test_throttled_error_converts_to_crate_error() {
    let registry = Registry::new();
    let guard = registry.guard("convert", window(10, 1));

    let run = || -> throttle_guard::Result<u8> {
        guard.check()?;
        Ok(1)
    };

    assert_eq!(run().unwrap(), 1);
    let err = run().unwrap_err();
    assert!(matches!(err, Error::Throttled(_)));
    assert_eq!(err.to_string(), "Request throttled due to exceeding limit");
}

#[test]
fn test_multithreaded_calls_admit_exactly_limit() {
    let registry = Registry::new();
    let limit = 500;
    let guarded = Arc::new(registry.wrap(window(20, limit), || "Executed"));
    let admitted = Arc::new(AtomicUsize::new(0));
    let throttled = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let guarded = Arc::clone(&guarded);
            let admitted = Arc::clone(&admitted);
            let throttled = Arc::clone(&throttled);
            std::thread::spawn(move || {
                for _ in 0..51 {
                    match guarded.call() {
                        Ok(_) => admitted.fetch_add(1, Ordering::SeqCst),
                        Err(_) => throttled.fetch_add(1, Ordering::SeqCst),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), limit as usize);
    assert_eq!(throttled.load(Ordering::SeqCst), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_admit_exactly_limit() {
    let registry = Arc::new(Registry::new());
    let guard = registry.guard("tasks", window(20, 25));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let guard = guard.clone();
            tokio::spawn(async move {
                guard
                    .call_async(|| async { tokio::task::yield_now().await })
                    .await
            })
        })
        .collect();

    let admitted = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(()))))
        .count();

    assert_eq!(admitted, 25);
}

#[test]
fn test_global_helpers_share_the_global_registry() {
    let guard = global_guard("global-helpers-test", window(10, 1));
    assert!(guard.check().is_ok());

    let same = Registry::global().guard("global-helpers-test", window(10, 1));
    assert!(same.check().is_err());

    let wrapped = global_wrap(window(10, 1), || 5);
    assert_eq!(wrapped.call(), Ok(5));
    assert!(wrapped.call().is_err());
}
