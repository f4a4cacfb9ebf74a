use super::JobId;
use crate::runner::FireSource;

/// Contextual information available to a running job callback via task-locals.
/// Accessible within a job callback using `try_get_current_job_context()`
/// or the `job_context!()` macro when the `job_context` feature is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobContext {
  /// The ID of the job being fired.
  pub job_id: JobId,
  /// What caused this firing (schedule, immediate run, manual call).
  pub source: FireSource,
}

tokio::task_local! {
    /// Provides access to the current `JobContext` within a job's execution scope.
    /// Set by the job runner if the `job_context` feature is enabled.
    pub static CURRENT_JOB_CONTEXT: JobContext;
}

/// Attempts to retrieve the current `JobContext` for the executing job.
///
/// Returns `Some(JobContext)` if called from inside a job callback,
/// `None` otherwise.
pub fn try_get_current_job_context() -> Option<JobContext> {
  CURRENT_JOB_CONTEXT.try_with(|ctx| *ctx).ok()
}

/// Retrieves the current `JobContext`, panicking if called outside a job callback.
///
/// Use `try_get_current_job_context()` for safe, optional access.
///
/// # Panics
/// Panics if the `CURRENT_JOB_CONTEXT` task local has not been set.
#[macro_export]
macro_rules! job_context {
  () => {
    $crate::job::context::CURRENT_JOB_CONTEXT.with(|ctx| *ctx)
  };
}
