//! tests/gating.rs
//! Run-mode gating: Serial skips overlapping firings, TimeFirst never does.

mod common;

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration as StdDuration;

use crate::common::{build_scheduler, job_blocking, job_counter, setup_tracing, wait_until, ManualEngine};
use tokio::sync::Semaphore;

use cronkeeper::{FireOutcome, JobOptions, JobStatus, RunMode};

#[tokio::test]
async fn test_status_ready_before_first_firing() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));

  let id = scheduler.add_job(
    "*/5 * * * * *",
    job_counter(counter.clone(), StdDuration::ZERO),
    JobOptions::new(),
  );

  assert!(id.is_valid());
  assert_eq!(scheduler.get_status(id), JobStatus::Ready);
  assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_serial_skips_overlapping_firings() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let started = Arc::new(AtomicUsize::new(0));
  let release = Arc::new(Semaphore::new(0));

  let id = scheduler.add_job(
    "* * * * * *",
    job_blocking(started.clone(), release.clone()),
    JobOptions::new().run_mode(RunMode::Serial),
  );
  let handle = engine.latest_handle().expect("job should be registered");

  // First firing occupies the job.
  let first = tokio::spawn(engine.fire(handle).expect("registration is live"));
  assert!(
    wait_until(|| started.load(Ordering::SeqCst) == 1, StdDuration::from_secs(2)).await,
    "First firing should start"
  );
  assert_eq!(scheduler.get_status(id), JobStatus::Running);

  // Overlapping scheduled firing returns at once without running.
  engine.fire(handle).expect("registration is live").await;
  assert_eq!(started.load(Ordering::SeqCst), 1, "Overlapping firing must be skipped");
  assert_eq!(scheduler.get_status(id), JobStatus::Running);

  // Manual calls share the same gate.
  assert_eq!(scheduler.call(id).await, Some(FireOutcome::SkippedBusy));
  assert_eq!(started.load(Ordering::SeqCst), 1);

  release.add_permits(1);
  first.await.expect("first firing should not panic");
  assert_eq!(scheduler.get_status(id), JobStatus::Ready);

  let metrics = scheduler.metrics_snapshot();
  assert_eq!(metrics.firings_executed, 1);
  assert_eq!(metrics.firings_skipped_busy, 2);
  assert_eq!(metrics.manual_calls, 1);
  assert_eq!(metrics.jobs_running_current, 0);
}

#[tokio::test]
async fn test_serial_runs_again_after_completion() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));

  let id = scheduler.add_job(
    "* * * * * *",
    job_counter(counter.clone(), StdDuration::from_millis(5)),
    JobOptions::new(),
  );
  let handle = engine.latest_handle().expect("job should be registered");

  for _ in 0..3 {
    engine.fire(handle).expect("registration is live").await;
    assert_eq!(scheduler.get_status(id), JobStatus::Ready);
  }
  assert_eq!(scheduler.call(id).await, Some(FireOutcome::Completed));

  assert_eq!(counter.load(Ordering::SeqCst), 4);
  assert_eq!(scheduler.metrics_snapshot().firings_skipped_busy, 0);
}

#[tokio::test]
async fn test_time_first_allows_overlap() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let started = Arc::new(AtomicUsize::new(0));
  let release = Arc::new(Semaphore::new(0));

  let id = scheduler.add_job(
    "* * * * * *",
    job_blocking(started.clone(), release.clone()),
    JobOptions::new().run_mode(RunMode::TimeFirst),
  );
  let handle = engine.latest_handle().expect("job should be registered");

  let first = tokio::spawn(engine.fire(handle).expect("registration is live"));
  let second = tokio::spawn(engine.fire(handle).expect("registration is live"));

  assert!(
    wait_until(|| started.load(Ordering::SeqCst) == 2, StdDuration::from_secs(2)).await,
    "Both firings should run concurrently"
  );
  assert_eq!(scheduler.get_status(id), JobStatus::Ready, "TimeFirst never marks Running");

  release.add_permits(2);
  first.await.expect("first firing should not panic");
  second.await.expect("second firing should not panic");

  assert_eq!(scheduler.get_status(id), JobStatus::Ready);
  let metrics = scheduler.metrics_snapshot();
  assert_eq!(metrics.firings_executed, 2);
  assert_eq!(metrics.firings_skipped_busy, 0);
}

#[tokio::test]
async fn test_set_status_forces_gate() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));

  let id = scheduler.add_job(
    "* * * * * *",
    job_counter(counter.clone(), StdDuration::ZERO),
    JobOptions::new(),
  );

  scheduler.set_status(id, JobStatus::Running);
  assert_eq!(scheduler.call(id).await, Some(FireOutcome::SkippedBusy));
  assert_eq!(counter.load(Ordering::SeqCst), 0);

  scheduler.set_status(id, JobStatus::Ready);
  assert_eq!(scheduler.call(id).await, Some(FireOutcome::Completed));
  assert_eq!(counter.load(Ordering::SeqCst), 1);
}
