//! demos/run_modes.rs
//!
//! Runs a slow job every second in both run modes and shows how `Serial`
//! skips overlapping firings while `TimeFirst` lets them pile up.
//! Requires the `cron_engine` feature (on by default).

#![cfg(feature = "cron_engine")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::info;
use cronkeeper::{job_fn, JobOptions, RunMode, Scheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // --- Setup Tracing ---
  let filter = tracing_subscriber::EnvFilter::try_new("warn,cronkeeper=info,run_modes=info")
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let scheduler = Scheduler::builder().build()?;

  let serial_runs = Arc::new(AtomicUsize::new(0));
  let overlapping_runs = Arc::new(AtomicUsize::new(0));

  // --- Define Jobs ---
  let serial_clone = serial_runs.clone();
  let serial_id = scheduler.add_second_job(
    1,
    job_fn!(
      {
        let counter = serial_clone.clone();
      }
      {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Serial run #{} started", n);
        tokio::time::sleep(StdDuration::from_millis(2500)).await;
      }
    ),
    JobOptions::new().run_mode(RunMode::Serial),
  );

  let overlap_clone = overlapping_runs.clone();
  let time_first_id = scheduler.add_second_job(
    1,
    job_fn!(
      {
        let counter = overlap_clone.clone();
      }
      {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!("TimeFirst run #{} started", n);
        tokio::time::sleep(StdDuration::from_millis(2500)).await;
      }
    ),
    JobOptions::new().run_mode(RunMode::TimeFirst),
  );
  info!("Jobs registered: serial={}, time_first={}", serial_id, time_first_id);

  // --- Run for a while ---
  scheduler
    .run_until(tokio::time::sleep(StdDuration::from_secs(8)))
    .await?;
  scheduler.shutdown();

  let metrics = scheduler.metrics_snapshot();
  info!(
    "Serial runs: {}, TimeFirst runs: {}, skipped while busy: {}",
    serial_runs.load(Ordering::Relaxed),
    overlapping_runs.load(Ordering::Relaxed),
    metrics.firings_skipped_busy
  );
  Ok(())
}
