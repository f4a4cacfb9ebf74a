//! demos/panic_handling.rs
//!
//! A job that panics on every other run. With `recover` left on, each panic is
//! logged and the job keeps firing on schedule.

#![cfg(feature = "cron_engine")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use cronkeeper::{JobOptions, Scheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let filter = tracing_subscriber::EnvFilter::try_new("warn,cronkeeper=info,panic_handling=info")
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let scheduler = Scheduler::builder().build()?;
  let attempts = Arc::new(AtomicUsize::new(0));

  let attempts_clone = attempts.clone();
  let job_id = scheduler.add_second_job(
    1,
    move || {
      let attempts = attempts_clone.clone();
      async move {
        let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 2 == 0 {
          panic!("Simulated failure on attempt {}", n);
        }
        info!("Attempt {} succeeded", n);
      }
    },
    JobOptions::new().immediate(true),
  );
  if !job_id.is_valid() {
    warn!("Job was not registered.");
    return Ok(());
  }

  scheduler
    .run_until(tokio::time::sleep(StdDuration::from_secs(5)))
    .await?;
  scheduler.shutdown();

  let metrics = scheduler.metrics_snapshot();
  info!(
    "Attempts: {}, recovered panics: {}, status now: {:?}",
    attempts.load(Ordering::SeqCst),
    metrics.jobs_panicked,
    scheduler.get_status(job_id)
  );
  Ok(())
}
