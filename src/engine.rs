//! Boundary with the trigger engine that turns schedule expressions into firings.
//!
//! The scheduler only ever talks to an engine through [`TriggerEngine`]. The
//! built-in [`CronEngine`] (feature `cron_engine`) parses six-field,
//! seconds-resolution expressions with the `cron` crate and drives firings on
//! Tokio tasks. Tests and embedders can plug in their own implementation.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::RegisterError;

/// Zero-argument callback fired by the engine. Every call yields one firing.
pub type EngineCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static>;

/// Opaque handle for one engine registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerHandle(u64);

impl TriggerHandle {
  pub const fn new(raw: u64) -> Self {
    TriggerHandle(raw)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for TriggerHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// An engine that fires registered callbacks at the moments described by
/// their schedule expressions.
///
/// Implementations must run each firing on their own dispatch context; the
/// scheduler's wrapped callbacks execute inside that context.
pub trait TriggerEngine: Send + Sync + 'static {
  /// Registers `callback` under `expression`.
  ///
  /// # Errors
  ///
  /// Returns [`RegisterError::InvalidExpression`] for expressions the engine
  /// cannot parse.
  fn register(
    &self,
    expression: &str,
    callback: EngineCallback,
  ) -> Result<TriggerHandle, RegisterError>;

  /// Removes a registration. Unknown or already-dropped handles are ignored.
  /// Firings already in progress are not interrupted.
  fn unregister(&self, handle: TriggerHandle);

  /// Begins firing registered callbacks. Called once per scheduler.
  fn start(&self);

  /// Stops all dispatch. Firings already in progress run to completion.
  fn stop(&self) {}
}

#[cfg(feature = "cron_engine")]
pub use cron_engine::CronEngine;

#[cfg(feature = "cron_engine")]
mod cron_engine {
  use super::{EngineCallback, TriggerEngine, TriggerHandle};
  use crate::error::{FiringPanic, RegisterError};
  use crate::runner::panic_message;

  use std::cmp;
  use std::collections::HashMap;
  use std::str::FromStr;
  use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  use chrono::Utc;
  use cron::Schedule as CronSchedule;
  use parking_lot::Mutex;
  use tokio::runtime::Handle;
  use tokio::sync::watch;
  use tokio::task::JoinHandle;
  use tracing::{debug, error, info, trace, warn};

  /// Trigger engine backed by the `cron` crate and Tokio timers (UTC).
  ///
  /// Each registration gets its own dispatch task. The task waits for
  /// [`TriggerEngine::start`], then sleeps until every upcoming instant of its
  /// schedule and spawns the callback on a fresh task, so slow firings never
  /// delay the next one.
  ///
  /// ```no_run
  /// use cronkeeper::engine::{CronEngine, EngineCallback, TriggerEngine};
  /// use futures::future::BoxFuture;
  /// use std::sync::Arc;
  ///
  /// # #[tokio::main]
  /// # async fn main() {
  /// let engine = CronEngine::new().expect("inside a tokio runtime");
  /// let tick: EngineCallback =
  ///   Arc::new(|| Box::pin(async { println!("tick") }) as BoxFuture<'static, ()>);
  /// let handle = engine.register("*/5 * * * * *", tick).unwrap();
  /// engine.start();
  /// # engine.unregister(handle);
  /// # }
  /// ```
  #[derive(Debug, Clone)]
  pub struct CronEngine {
    inner: Arc<EngineInner>,
  }

  #[derive(Debug)]
  struct EngineInner {
    runtime: Handle,
    next_handle: AtomicU64,
    entries: Mutex<HashMap<TriggerHandle, Entry>>,
    started_tx: watch::Sender<bool>,
    stopped: AtomicBool,
  }

  #[derive(Debug)]
  struct Entry {
    expression: String,
    task: JoinHandle<()>,
  }

  impl CronEngine {
    /// Creates an engine on the current Tokio runtime.
    /// Returns `None` when called outside a runtime.
    pub fn new() -> Option<Self> {
      Handle::try_current().ok().map(Self::with_runtime)
    }

    /// Creates an engine whose dispatch tasks run on `runtime`.
    pub fn with_runtime(runtime: Handle) -> Self {
      let (started_tx, _) = watch::channel(false);
      Self {
        inner: Arc::new(EngineInner {
          runtime,
          next_handle: AtomicU64::new(1),
          entries: Mutex::new(HashMap::new()),
          started_tx,
          stopped: AtomicBool::new(false),
        }),
      }
    }

    /// Number of live registrations.
    pub fn registration_count(&self) -> usize {
      self.inner.entries.lock().len()
    }

    /// Expression a live registration was made with.
    pub fn expression(&self, handle: TriggerHandle) -> Option<String> {
      self
        .inner
        .entries
        .lock()
        .get(&handle)
        .map(|entry| entry.expression.clone())
    }

    pub fn is_started(&self) -> bool {
      *self.inner.started_tx.borrow()
    }
  }

  impl TriggerEngine for CronEngine {
    fn register(
      &self,
      expression: &str,
      callback: EngineCallback,
    ) -> Result<TriggerHandle, RegisterError> {
      if has_zero_step(expression) {
        return Err(RegisterError::InvalidExpression {
          expression: expression.to_string(),
          reason: "step values must be positive".to_string(),
        });
      }
      let schedule =
        CronSchedule::from_str(expression).map_err(|e| RegisterError::InvalidExpression {
          expression: expression.to_string(),
          reason: e.to_string(),
        })?;

      // `stop` flips the flag under this lock, so a registration either lands
      // before the drain or is refused.
      let mut entries = self.inner.entries.lock();
      if self.inner.stopped.load(Ordering::Acquire) {
        return Err(RegisterError::Stopped);
      }

      let handle = TriggerHandle::new(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
      let started_rx = self.inner.started_tx.subscribe();
      let runtime = self.inner.runtime.clone();
      let task = self
        .inner
        .runtime
        .spawn(dispatch_loop(handle, schedule, callback, started_rx, runtime));

      entries.insert(
        handle,
        Entry {
          expression: expression.to_string(),
          task,
        },
      );
      drop(entries);
      debug!(%handle, expression, "Registered trigger.");
      Ok(handle)
    }

    fn unregister(&self, handle: TriggerHandle) {
      // Lock only long enough to take the entry out.
      let removed = self.inner.entries.lock().remove(&handle);
      match removed {
        Some(entry) => {
          entry.task.abort();
          debug!(%handle, expression = entry.expression.as_str(), "Unregistered trigger.");
        }
        None => trace!(%handle, "Unregister for unknown trigger ignored."),
      }
    }

    fn start(&self) {
      if self.inner.started_tx.send_replace(true) {
        warn!("Cron engine start requested more than once.");
      } else {
        info!(
          registrations = self.registration_count(),
          "Cron engine started."
        );
      }
    }

    fn stop(&self) {
      let drained: Vec<(TriggerHandle, Entry)> = {
        let mut entries = self.inner.entries.lock();
        self.inner.stopped.store(true, Ordering::Release);
        entries.drain().collect()
      };
      for (_, entry) in &drained {
        entry.task.abort();
      }
      info!(aborted = drained.len(), "Cron engine stopped.");
    }
  }

  impl Drop for EngineInner {
    fn drop(&mut self) {
      for (_, entry) in self.entries.get_mut().drain() {
        entry.task.abort();
      }
    }
  }

  /// `cron` iterates steps with `step_by`, which cannot take a zero step.
  fn has_zero_step(expression: &str) -> bool {
    expression
      .split_whitespace()
      .flat_map(|field| field.split(','))
      .filter_map(|part| part.split_once('/'))
      .any(|(_, step)| step.parse::<u32>() == Ok(0))
  }

  /// Fires `callback` at each upcoming instant of `schedule` once the engine is started.
  async fn dispatch_loop(
    handle: TriggerHandle,
    schedule: CronSchedule,
    callback: EngineCallback,
    mut started_rx: watch::Receiver<bool>,
    runtime: Handle,
  ) {
    let started = started_rx.wait_for(|started| *started).await.is_ok();
    if !started {
      // Engine dropped before it was ever started.
      return;
    }

    let mut cursor = Utc::now();
    loop {
      // Never fire twice for the same instant; skip instants missed while lagging.
      let reference = cmp::max(cursor, Utc::now());
      let Some(next) = schedule.after(&reference).next() else {
        debug!(%handle, "Schedule has no further occurrences.");
        return;
      };

      let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
      tokio::time::sleep(wait).await;
      cursor = next;

      trace!(%handle, fire_time = %next, "Firing trigger.");
      let firing = runtime.spawn(callback());
      runtime.spawn(async move {
        if let Err(join_error) = firing.await {
          if join_error.is_panic() {
            let failure = FiringPanic {
              handle,
              message: panic_message(&*join_error.into_panic()),
            };
            error!(%handle, error = %failure, "Unrecovered panic in firing.");
          }
        }
      });
    }
  }

}
