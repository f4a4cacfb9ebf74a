//! tests/schedule_helpers.rs
//! Expressions synthesized by the `add_*_job` helpers.

mod common;

use std::sync::{atomic::AtomicUsize, Arc};
use std::time::Duration as StdDuration;

use crate::common::{build_scheduler, job_counter, setup_tracing, ManualEngine};

use cronkeeper::{Granularity, JobOptions};

fn fields(expression: &str) -> Vec<String> {
  expression.split_whitespace().map(str::to_string).collect()
}

fn in_range(field: &str, lo: u32, hi: u32) -> bool {
  field
    .parse::<u32>()
    .map(|value| (lo..=hi).contains(&value))
    .unwrap_or(false)
}

#[tokio::test]
async fn test_helpers_without_jitter() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));
  let job = || job_counter(counter.clone(), StdDuration::ZERO);
  let opts = JobOptions::new();

  let cases = [
    (scheduler.add_second_job(10, job(), opts), "*/10 * * * * *"),
    (scheduler.add_minute_job(15, job(), opts), "0 */15 * * * *"),
    (scheduler.add_hour_job(6, job(), opts), "0 0 */6 * * *"),
    (scheduler.add_day_job(2, job(), opts), "0 0 0 */2 * *"),
    (scheduler.add_month_job(3, job(), opts), "0 0 0 1 */3 *"),
    (scheduler.add_week_job(1, job(), opts), "0 0 0 * * */1"),
  ];

  for (id, expected) in cases {
    assert!(id.is_valid());
    assert_eq!(scheduler.job_expression(id).as_deref(), Some(expected));
  }

  // What the engine received matches what the scheduler reports.
  let handle = engine.latest_handle().expect("job should be registered");
  assert_eq!(engine.expression(handle).as_deref(), Some("0 0 0 * * */1"));
}

#[tokio::test]
async fn test_out_of_range_values_clamp_to_max() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));
  let job = || job_counter(counter.clone(), StdDuration::ZERO);
  let opts = JobOptions::new();

  let second = scheduler.add_second_job(75, job(), opts);
  assert_eq!(scheduler.job_expression(second).as_deref(), Some("*/59 * * * * *"));

  let minute = scheduler.add_minute_job(60, job(), opts);
  assert_eq!(scheduler.job_expression(minute).as_deref(), Some("0 */59 * * * *"));

  let hour = scheduler.add_hour_job(100, job(), opts);
  assert_eq!(scheduler.job_expression(hour).as_deref(), Some("0 0 */23 * * *"));

  // Below the minimum also clamps to the maximum.
  let day = scheduler.add_day_job(0, job(), opts);
  assert_eq!(scheduler.job_expression(day).as_deref(), Some("0 0 0 */31 * *"));

  let week = scheduler.add_week_job(9, job(), opts);
  assert_eq!(scheduler.job_expression(week).as_deref(), Some("0 0 0 * * */7"));

  let month = scheduler.add_month_job(13, job(), opts);
  assert_eq!(scheduler.job_expression(month).as_deref(), Some("0 0 0 1 */12 *"));
}

#[tokio::test]
async fn test_try_add_every_matches_helper() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));

  let id = scheduler
    .try_add_every(
      Granularity::Hour,
      12,
      job_counter(counter, StdDuration::ZERO),
      JobOptions::new(),
    )
    .expect("expression should be accepted");
  assert_eq!(scheduler.job_expression(id).as_deref(), Some("0 0 */12 * * *"));
}

#[tokio::test]
async fn test_jitter_fields_in_range_and_stable() {
  setup_tracing();
  let engine = ManualEngine::new();
  let scheduler = build_scheduler(engine.clone());
  let counter = Arc::new(AtomicUsize::new(0));
  let job = || job_counter(counter.clone(), StdDuration::ZERO);
  let opts = JobOptions::new().random(true);

  for _ in 0..20 {
    let minute = scheduler.add_minute_job(5, job(), opts);
    let expr = scheduler.job_expression(minute).expect("job should exist");
    let f = fields(&expr);
    assert!(in_range(&f[0], 0, 59), "second offset out of range: {expr}");
    assert_eq!(&f[1..], ["*/5", "*", "*", "*", "*"]);

    // Drawn once per registration.
    for _ in 0..3 {
      assert_eq!(scheduler.job_expression(minute).as_deref(), Some(expr.as_str()));
    }

    let month = scheduler.add_month_job(2, job(), opts);
    let expr = scheduler.job_expression(month).expect("job should exist");
    let f = fields(&expr);
    assert!(in_range(&f[0], 0, 59), "second offset out of range: {expr}");
    assert!(in_range(&f[1], 0, 59), "minute offset out of range: {expr}");
    assert!(in_range(&f[2], 0, 23), "hour offset out of range: {expr}");
    assert!(in_range(&f[3], 1, 28), "day offset out of range: {expr}");
    assert_eq!(&f[4..], ["*/2", "*"]);
  }

  // Second-granularity jobs have no finer fields to jitter.
  let second = scheduler.add_second_job(30, job(), opts);
  assert_eq!(scheduler.job_expression(second).as_deref(), Some("*/30 * * * * *"));

  let summaries = scheduler.list_jobs();
  for summary in &summaries {
    assert_eq!(
      scheduler.job_expression(summary.id).as_deref(),
      Some(summary.expression.as_str())
    );
  }
}
