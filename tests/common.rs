//! tests/common.rs
//! Shared helper functions for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use cronkeeper::{EngineCallback, RegisterError, Scheduler, TriggerEngine, TriggerHandle};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing_subscriber::fmt::TestWriter;

// Initializes tracing subscriber for test output.
pub fn setup_tracing() {
  // Use try_init to avoid panic if called multiple times
  let _ = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_writer(TestWriter::new())
    .with_test_writer()
    .try_init();
}

// --- Manual trigger engine ---

#[derive(Default)]
struct ManualState {
  next_handle: u64,
  live: HashMap<TriggerHandle, (String, EngineCallback)>,
  unregistered: HashMap<TriggerHandle, usize>,
  latest: Option<TriggerHandle>,
  starts: usize,
  stopped: bool,
}

/// Trigger engine double: never fires on its own. Tests fire registrations
/// explicitly and inspect what was registered and unregistered.
#[derive(Default)]
pub struct ManualEngine {
  state: Mutex<ManualState>,
}

impl ManualEngine {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Produces one firing of a live registration, or `None` if it is gone.
  pub fn fire(&self, handle: TriggerHandle) -> Option<BoxFuture<'static, ()>> {
    let callback = self.state.lock().live.get(&handle).map(|(_, cb)| cb.clone())?;
    Some(callback())
  }

  pub fn latest_handle(&self) -> Option<TriggerHandle> {
    self.state.lock().latest
  }

  pub fn expression(&self, handle: TriggerHandle) -> Option<String> {
    self.state.lock().live.get(&handle).map(|(expr, _)| expr.clone())
  }

  pub fn unregister_count(&self, handle: TriggerHandle) -> usize {
    self
      .state
      .lock()
      .unregistered
      .get(&handle)
      .copied()
      .unwrap_or(0)
  }

  pub fn live_count(&self) -> usize {
    self.state.lock().live.len()
  }

  pub fn start_count(&self) -> usize {
    self.state.lock().starts
  }

  pub fn is_stopped(&self) -> bool {
    self.state.lock().stopped
  }
}

impl TriggerEngine for ManualEngine {
  fn register(
    &self,
    expression: &str,
    callback: EngineCallback,
  ) -> Result<TriggerHandle, RegisterError> {
    if expression.split_whitespace().count() != 6 {
      return Err(RegisterError::InvalidExpression {
        expression: expression.to_string(),
        reason: "expected six fields".to_string(),
      });
    }
    let mut state = self.state.lock();
    state.next_handle += 1;
    let handle = TriggerHandle::new(state.next_handle);
    state.live.insert(handle, (expression.to_string(), callback));
    state.latest = Some(handle);
    Ok(handle)
  }

  fn unregister(&self, handle: TriggerHandle) {
    let mut state = self.state.lock();
    if state.live.remove(&handle).is_some() {
      *state.unregistered.entry(handle).or_insert(0) += 1;
    }
  }

  fn start(&self) {
    self.state.lock().starts += 1;
  }

  fn stop(&self) {
    let mut state = self.state.lock();
    state.stopped = true;
    state.live.clear();
  }
}

// Builds a scheduler on the current runtime backed by `engine`.
pub fn build_scheduler(engine: Arc<ManualEngine>) -> Scheduler {
  Scheduler::builder()
    .engine(engine)
    .build()
    .expect("Failed to build scheduler")
}

// --- Job helpers ---

// Creates a job that increments a counter, optionally after a delay.
pub fn job_counter(
  counter: Arc<AtomicUsize>,
  delay: StdDuration,
) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
  move || {
    let ctr = counter.clone();
    Box::pin(async move {
      if delay > StdDuration::ZERO {
        tokio::time::sleep(delay).await;
      }
      let count = ctr.fetch_add(1, Ordering::SeqCst) + 1;
      tracing::debug!("Counter job executing (Count: {})", count);
    }) as BoxFuture<'static, ()>
  }
}

// Creates a job that records its start, then waits for a permit on `release`.
pub fn job_blocking(
  started: Arc<AtomicUsize>,
  release: Arc<Semaphore>,
) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
  move || {
    let started = started.clone();
    let release = release.clone();
    Box::pin(async move {
      let n = started.fetch_add(1, Ordering::SeqCst) + 1;
      tracing::debug!("Blocking job started (Started: {})", n);
      if let Ok(permit) = release.acquire().await {
        permit.forget();
      }
      tracing::debug!("Blocking job released");
    }) as BoxFuture<'static, ()>
  }
}

// Creates a job that counts its attempts and then panics.
pub fn job_panic(attempts: Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
  move || {
    let attempts = attempts.clone();
    Box::pin(async move {
      attempts.fetch_add(1, Ordering::SeqCst);
      tokio::task::yield_now().await;
      panic!("Job forced panic!");
    }) as BoxFuture<'static, ()>
  }
}

// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(condition: F, timeout: StdDuration) -> bool
where
  F: Fn() -> bool,
{
  let deadline = Instant::now() + timeout;
  loop {
    if condition() {
      return true;
    }
    if Instant::now() >= deadline {
      return false;
    }
    tokio::time::sleep(StdDuration::from_millis(10)).await;
  }
}
