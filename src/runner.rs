//! Execution wrapper registered with the trigger engine for every job.
//!
//! A [`JobRunner`] layers two concerns over the user's callback:
//!
//! - **Run-mode gating** (outer): `Serial` jobs flip their status cell from
//!   `Ready` to `Running` before the callback and back afterwards. A firing
//!   that finds the job already `Running` is skipped without side effects.
//!   `TimeFirst` jobs bypass the gate and never leave `Ready`.
//! - **Panic isolation** (inner, when `recover` is set): a panic while
//!   building or polling the callback's future is caught, reported through
//!   `tracing` and the metrics, and treated as a normal return.
//!
//! The `Running -> Ready` transition is done by a drop guard, so it also
//! happens when a panic unwinds through an unrecovered job.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, trace};

#[cfg(feature = "job_context")]
use crate::job::context::{JobContext, CURRENT_JOB_CONTEXT};
use crate::job::{BoxedJobFn, JobId, JobStatus, StatusCell};
use crate::metrics::SchedulerMetrics;
use crate::options::{JobOptions, RunMode};

/// What caused a particular firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FireSource {
  /// Fired by the trigger engine according to the schedule.
  Scheduled,
  /// The one-shot run requested with `immediate = true`.
  Immediate,
  /// A manual `Scheduler::call`.
  Manual,
}

impl fmt::Display for FireSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FireSource::Scheduled => f.write_str("scheduled"),
      FireSource::Immediate => f.write_str("immediate"),
      FireSource::Manual => f.write_str("manual"),
    }
  }
}

/// Result of a single firing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
  /// The callback ran to completion.
  Completed,
  /// The callback panicked and the panic was recovered.
  Recovered,
  /// A `Serial` job was already running; nothing was executed.
  SkippedBusy,
}

/// Fully composed unit of work for one job registration.
pub struct JobRunner {
  job_id: JobId,
  run_mode: RunMode,
  recover: bool,
  status: Arc<StatusCell>,
  func: BoxedJobFn,
  metrics: SchedulerMetrics,
}

impl fmt::Debug for JobRunner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JobRunner")
      .field("job_id", &self.job_id)
      .field("run_mode", &self.run_mode)
      .field("recover", &self.recover)
      .field("status", &self.status.load())
      .field("func", &format_args!("<Fn>"))
      .finish()
  }
}

/// Resets a `Serial` job to `Ready` when dropped, including during unwinding.
struct RunningGuard<'a> {
  status: &'a StatusCell,
  metrics: &'a SchedulerMetrics,
}

impl Drop for RunningGuard<'_> {
  fn drop(&mut self) {
    self.status.store(JobStatus::Ready);
    self
      .metrics
      .jobs_running_current
      .fetch_sub(1, AtomicOrdering::Relaxed);
  }
}

impl JobRunner {
  /// Builds the runner, consuming the job's resolved options.
  pub(crate) fn new(
    job_id: JobId,
    options: JobOptions,
    status: Arc<StatusCell>,
    func: BoxedJobFn,
    metrics: SchedulerMetrics,
  ) -> Self {
    Self {
      job_id,
      run_mode: options.run_mode,
      recover: options.recover,
      status,
      func,
      metrics,
    }
  }

  /// Fires the job once, applying run-mode gating and panic isolation.
  ///
  /// Runs the callback to completion in the caller's task.
  pub async fn fire(&self, source: FireSource) -> FireOutcome {
    match self.run_mode {
      RunMode::TimeFirst => self.invoke(source).await,
      RunMode::Serial => {
        if !self.status.try_begin() {
          self
            .metrics
            .firings_skipped_busy
            .fetch_add(1, AtomicOrdering::Relaxed);
          debug!(job_id = %self.job_id, %source, "Job still running, skipping firing.");
          return FireOutcome::SkippedBusy;
        }
        self
          .metrics
          .jobs_running_current
          .fetch_add(1, AtomicOrdering::Relaxed);
        let _guard = RunningGuard {
          status: &self.status,
          metrics: &self.metrics,
        };
        self.invoke(source).await
      }
    }
  }

  /// Runs the callback, catching panics when `recover` is enabled.
  async fn invoke(&self, source: FireSource) -> FireOutcome {
    let func = self.func.clone();
    // Calling `func` inside the future keeps a synchronous panic within the catch boundary.
    let future = async move { func().await };

    #[cfg(feature = "job_context")]
    let future = CURRENT_JOB_CONTEXT.scope(
      JobContext {
        job_id: self.job_id,
        source,
      },
      future,
    );

    trace!(job_id = %self.job_id, %source, "Starting job firing.");
    let started = Instant::now();

    let outcome = if self.recover {
      match AssertUnwindSafe(future).catch_unwind().await {
        Ok(()) => FireOutcome::Completed,
        Err(payload) => {
          let message = panic_message(&*payload);
          error!(
            job_id = %self.job_id,
            %source,
            panic = message.as_str(),
            "Job callback panicked; recovered."
          );
          self
            .metrics
            .jobs_panicked
            .fetch_add(1, AtomicOrdering::Relaxed);
          FireOutcome::Recovered
        }
      }
    } else {
      future.await;
      FireOutcome::Completed
    };

    let duration = started.elapsed();
    self.metrics.job_execution_duration.record(duration);
    self
      .metrics
      .firings_executed
      .fetch_add(1, AtomicOrdering::Relaxed);
    debug!(
      job_id = %self.job_id,
      %source,
      duration_ms = duration.as_millis(),
      outcome = ?outcome,
      "Finished job firing."
    );
    outcome
  }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "<non-string panic payload>".to_string()
  }
}
