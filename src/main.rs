use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use throttle_guard::config::{GuardOptions, DEFAULT_EXECUTION_TIME_MS};
use throttle_guard::{Guard, GuardPresets, Registry};

/// Drive a guarded workload and report how many calls were admitted.
#[derive(Parser, Debug)]
#[command(name = "throttle-guard", version, about)]
struct Args {
    /// Window length in seconds
    #[arg(long, default_value_t = 10.0)]
    duration_secs: f64,

    /// Maximum admitted calls per window
    #[arg(long, default_value_t = 5)]
    limit: u32,

    /// Estimated per-call execution time in milliseconds
    #[arg(long, default_value_t = DEFAULT_EXECUTION_TIME_MS)]
    execution_time_ms: u64,

    /// Explicit target key (defaults to "cli")
    #[arg(long)]
    target: Option<String>,

    /// Total number of calls to attempt
    #[arg(long, default_value_t = 20)]
    calls: usize,

    /// Worker threads issuing calls
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Issue calls from async tasks instead of threads
    #[arg(long = "async")]
    run_async: bool,

    /// YAML file with named guard presets
    #[arg(long, requires = "guard")]
    presets: Option<PathBuf>,

    /// Preset to use from --presets
    #[arg(long, requires = "presets")]
    guard: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Serialize)]
struct Report {
    target: String,
    limit: u32,
    duration_secs: f64,
    calls: usize,
    admitted: usize,
    throttled: usize,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let guard = build_guard(&args)?;
    let window = *guard.tracker().config();
    info!(
        throttle_target = %guard.target(),
        limit = window.limit(),
        duration = ?window.duration(),
        "Guard ready"
    );

    let started = Instant::now();
    let admitted = if args.run_async {
        run_tasks(guard.clone(), args.calls).await?
    } else {
        let worker_guard = guard.clone();
        let (calls, threads) = (args.calls, args.threads.max(1));
        tokio::task::spawn_blocking(move || run_threads(worker_guard, calls, threads)).await?
    };

    let report = Report {
        target: guard.target().to_string(),
        limit: window.limit(),
        duration_secs: window.duration().as_secs_f64(),
        calls: args.calls,
        admitted,
        throttled: args.calls - admitted,
        elapsed_ms: started.elapsed().as_millis(),
    };

    if report.admitted > report.limit as usize {
        warn!(
            admitted = report.admitted,
            limit = report.limit,
            "Admitted more calls than the limit"
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}: {} of {} calls admitted, {} throttled ({} / {:?}) in {} ms",
            report.target,
            report.admitted,
            report.calls,
            report.throttled,
            report.limit,
            window.duration(),
            report.elapsed_ms
        );
    }

    Ok(())
}

fn build_guard(args: &Args) -> anyhow::Result<Guard> {
    let registry = Registry::global();

    if let (Some(path), Some(name)) = (&args.presets, &args.guard) {
        let presets = GuardPresets::from_file(path)?;
        return Ok(registry.preset_guard(&presets, name)?);
    }

    let options = GuardOptions {
        duration_secs: args.duration_secs,
        limit: args.limit,
        target: args.target.clone(),
        execution_time_ms: args.execution_time_ms,
    };
    let config = options.window_config()?;
    let target = options.target.unwrap_or_else(|| "cli".to_string());
    Ok(registry.guard(target, config))
}

/// Spread `calls` across `threads` OS threads, returning the admitted count.
fn run_threads(guard: Guard, calls: usize, threads: usize) -> usize {
    let admitted = AtomicUsize::new(0);
    let next = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                while next.fetch_add(1, Ordering::SeqCst) < calls {
                    if guard.call(workload).is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    admitted.into_inner()
}

/// Issue `calls` concurrent async tasks, returning the admitted count.
async fn run_tasks(guard: Guard, calls: usize) -> anyhow::Result<usize> {
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..calls)
        .map(|_| {
            let guard = guard.clone();
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                let result = guard
                    .call_async(|| async {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        workload()
                    })
                    .await;
                if result.is_ok() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        result?;
    }

    Ok(admitted.load(Ordering::SeqCst))
}

fn workload() -> u64 {
    std::hint::black_box((0..1_000u64).sum())
}
