#[cfg(feature = "job_context")]
pub mod context;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::engine::TriggerHandle;
use crate::options::RunMode;
use crate::runner::JobRunner;

// --- Public Type Aliases ---

/// The function type registered jobs execute.
///
/// Each call produces a fresh `Send` future. Panics raised while building or
/// polling that future are caught by the job's runner when `recover` is enabled.
pub type BoxedJobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static>;

/// Boxes a plain `Fn() -> impl Future` closure into a [`BoxedJobFn`].
pub fn boxed_job_fn<F, Fut>(f: F) -> BoxedJobFn
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  Arc::new(move || Box::pin(f()) as BoxFuture<'static, ()>)
}

// --- Job Identity ---

/// Identifier of a registered job, unique for the lifetime of one `Scheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobId(u64);

impl JobId {
  /// Sentinel returned when a job could not be registered. Never allocated.
  pub const INVALID: JobId = JobId(0);

  pub const fn new(raw: u64) -> Self {
    JobId(raw)
  }

  pub const fn get(self) -> u64 {
    self.0
  }

  pub const fn is_valid(self) -> bool {
    self.0 != 0
  }
}

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u64> for JobId {
  fn from(raw: u64) -> Self {
    JobId(raw)
  }
}

// --- Status ---

/// Gating state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum JobStatus {
  #[default]
  Ready = 0,
  Running = 1,
}

impl JobStatus {
  fn from_u8(raw: u8) -> Self {
    match raw {
      1 => JobStatus::Running,
      _ => JobStatus::Ready,
    }
  }
}

/// Atomic status slot owned by one job registration.
///
/// Shared between the registry record and the job's runner. A replaced or
/// removed registration keeps its own cell, so late updates from an in-flight
/// firing never touch the record that superseded it.
#[derive(Debug, Default)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(&self) -> JobStatus {
    JobStatus::from_u8(self.0.load(Ordering::Acquire))
  }

  pub fn store(&self, status: JobStatus) {
    self.0.store(status as u8, Ordering::Release);
  }

  /// Moves `Ready -> Running`. Returns `false` if the job was already running.
  pub fn try_begin(&self) -> bool {
    self
      .0
      .compare_exchange(
        JobStatus::Ready as u8,
        JobStatus::Running as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .is_ok()
  }
}

// --- Registry Record ---

/// Internal per-job state held by the registry. Not exposed publicly.
pub(crate) struct JobRecord {
  pub id: JobId,
  /// Registration in the trigger engine; only used for removal.
  pub handle: TriggerHandle,
  /// Expression the job was registered with (after synthesis/jitter).
  pub expression: String,
  pub run_mode: RunMode,
  pub status: Arc<StatusCell>,
  /// Wrapped callback, re-fired by manual `call`s.
  pub runner: Arc<JobRunner>,
  pub added_at: DateTime<Utc>,
}

impl JobRecord {
  pub fn summary(&self) -> JobSummary {
    JobSummary {
      id: self.id,
      expression: self.expression.clone(),
      run_mode: self.run_mode,
      status: self.status.load(),
      added_at: self.added_at,
    }
  }
}

impl fmt::Debug for JobRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JobRecord")
      .field("id", &self.id)
      .field("handle", &self.handle)
      .field("expression", &self.expression)
      .field("run_mode", &self.run_mode)
      .field("status", &self.status.load())
      .field("runner", &format_args!("Arc<JobRunner>"))
      .field("added_at", &self.added_at)
      .finish()
  }
}

// --- Public Snapshot Structs for Querying ---

/// A summary of one registered job, suitable for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobSummary {
  pub id: JobId,
  /// The schedule expression handed to the trigger engine.
  pub expression: String,
  pub run_mode: RunMode,
  /// Status at the moment the summary was taken.
  pub status: JobStatus,
  pub added_at: DateTime<Utc>,
}
