use crate::engine::TriggerHandle;
use crate::job::JobId;

use thiserror::Error;

/// Errors that can occur while building a `Scheduler` with `SchedulerBuilder`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  #[error("No Tokio runtime handle was supplied and none is current on this thread")]
  NoRuntime,
  #[error("No trigger engine was supplied and the `cron_engine` feature is disabled")]
  MissingEngine,
}

/// Errors reported by a `TriggerEngine` when a registration is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
  #[error("Invalid schedule expression '{expression}': {reason}")]
  InvalidExpression { expression: String, reason: String },
  #[error("Trigger engine has been stopped and accepts no new registrations.")]
  Stopped,
}

/// Errors related to adding a job via `Scheduler::try_add_job` and friends.
///
/// The non-`try_` variants collapse all of these into [`JobId::INVALID`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddJobError {
  #[error("Trigger engine refused the registration: {0}")]
  Register(#[from] RegisterError),
  #[error("Job ID {0} is reserved and cannot be registered.")]
  InvalidId(JobId),
  #[error("No job IDs left to allocate.")]
  IdsExhausted,
}

/// Errors related to starting the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
  #[error("Scheduler was already started.")]
  AlreadyStarted,
}

/// Panic that escaped a job firing when `recover` is disabled.
/// Only produced by the engine's firing supervisor for logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Firing for trigger {handle} panicked: {message}")]
pub struct FiringPanic {
  pub handle: TriggerHandle,
  pub message: String,
}
