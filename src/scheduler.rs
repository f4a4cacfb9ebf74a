use crate::engine::{EngineCallback, TriggerEngine};
use crate::error::{AddJobError, BuildError, StartError};
use crate::id::IdAllocator;
use crate::job::{boxed_job_fn, BoxedJobFn, JobId, JobRecord, JobStatus, JobSummary, StatusCell};
use crate::metrics::{MetricsSnapshot, SchedulerMetrics};
use crate::options::JobOptions;
use crate::registry::JobRegistry;
use crate::runner::{FireOutcome, FireSource, JobRunner};
use crate::schedule::{self, Granularity};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// Builder for configuring and creating a [`Scheduler`].
///
/// # Example
///
/// ```no_run
/// use cronkeeper::Scheduler;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = Scheduler::builder().build()?; // Built-in cron engine on the current runtime
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SchedulerBuilder {
  engine: Option<Arc<dyn TriggerEngine>>,
  runtime: Option<Handle>,
}

impl fmt::Debug for SchedulerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SchedulerBuilder")
      .field("engine", &self.engine.as_ref().map(|_| "Arc<dyn TriggerEngine>"))
      .field("runtime", &self.runtime)
      .finish()
  }
}

impl SchedulerBuilder {
  /// Creates a builder with no engine and no runtime handle set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Uses a custom trigger engine instead of the built-in `CronEngine`.
  pub fn engine(mut self, engine: Arc<dyn TriggerEngine>) -> Self {
    self.engine = Some(engine);
    self
  }

  /// Sets the runtime used for immediate one-shot runs (and for the built-in
  /// engine's dispatch tasks). Defaults to the current runtime.
  pub fn runtime(mut self, runtime: Handle) -> Self {
    self.runtime = Some(runtime);
    self
  }

  /// Builds the scheduler. The trigger engine is not started until
  /// [`Scheduler::start`] is called.
  ///
  /// # Errors
  ///
  /// - [`BuildError::NoRuntime`]: no runtime handle was set and none is current.
  /// - [`BuildError::MissingEngine`]: no engine was set and the `cron_engine` feature is disabled.
  pub fn build(self) -> Result<Scheduler, BuildError> {
    let runtime = match self.runtime {
      Some(runtime) => runtime,
      None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
    };
    let engine = match self.engine {
      Some(engine) => engine,
      None => default_engine(&runtime)?,
    };

    debug!("Scheduler built.");
    Ok(Scheduler {
      registry: JobRegistry::new(engine.clone()),
      engine,
      ids: IdAllocator::new(),
      metrics: SchedulerMetrics::new(),
      runtime,
      started: AtomicBool::new(false),
    })
  }
}

#[cfg(feature = "cron_engine")]
fn default_engine(runtime: &Handle) -> Result<Arc<dyn TriggerEngine>, BuildError> {
  Ok(Arc::new(crate::engine::CronEngine::with_runtime(runtime.clone())))
}

#[cfg(not(feature = "cron_engine"))]
fn default_engine(_runtime: &Handle) -> Result<Arc<dyn TriggerEngine>, BuildError> {
  Err(BuildError::MissingEngine)
}

/// Job layer over a trigger engine.
///
/// Decides, per job, whether and how each triggered firing runs: `Serial`
/// jobs skip firings that overlap a running one, `TimeFirst` jobs always run.
/// Callback panics are contained unless `recover` is disabled.
///
/// Use [`Scheduler::builder()`] to create an instance.
pub struct Scheduler {
  engine: Arc<dyn TriggerEngine>,
  registry: JobRegistry,
  ids: IdAllocator,
  metrics: SchedulerMetrics,
  runtime: Handle,
  started: AtomicBool,
}

impl fmt::Debug for Scheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scheduler")
      .field("registry", &self.registry)
      .field("ids", &self.ids)
      .field("started", &self.started.load(AtomicOrdering::Relaxed))
      .finish()
  }
}

impl Scheduler {
  /// Returns a builder to configure and create a `Scheduler`.
  pub fn builder() -> SchedulerBuilder {
    SchedulerBuilder::new()
  }

  // --- Registration ---

  /// Registers `job` under a raw schedule expression and returns its new ID.
  ///
  /// Returns [`JobId::INVALID`] if the trigger engine rejects the expression;
  /// nothing is stored in that case. Use [`Scheduler::try_add_job`] to get the reason.
  pub fn add_job<F, Fut>(&self, expression: &str, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self
      .try_add_job(expression, job, options)
      .unwrap_or(JobId::INVALID)
  }

  /// Like [`Scheduler::add_job`] but reports why a registration failed.
  ///
  /// # Errors
  ///
  /// - [`AddJobError::Register`]: the trigger engine refused the expression.
  /// - [`AddJobError::IdsExhausted`]: a caller-chosen ID at the top of the range used up the ID space.
  pub fn try_add_job<F, Fut>(
    &self,
    expression: &str,
    job: F,
    options: JobOptions,
  ) -> Result<JobId, AddJobError>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let Some(id) = self.ids.next_id() else {
      self
        .metrics
        .registrations_rejected
        .fetch_add(1, AtomicOrdering::Relaxed);
      warn!(expression, "Job ID space exhausted, registration refused.");
      return Err(AddJobError::IdsExhausted);
    };
    self.register(id, expression.to_string(), boxed_job_fn(job), options)
  }

  /// Registers `job` under a caller-chosen ID, superseding any job already
  /// registered with that ID. Returns [`JobId::INVALID`] on failure, in which
  /// case an existing job with that ID is left untouched.
  pub fn add_job_with_id<F, Fut>(
    &self,
    id: JobId,
    expression: &str,
    job: F,
    options: JobOptions,
  ) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self
      .try_add_job_with_id(id, expression, job, options)
      .unwrap_or(JobId::INVALID)
  }

  /// Like [`Scheduler::add_job_with_id`] but reports why a registration failed.
  ///
  /// # Errors
  ///
  /// - [`AddJobError::InvalidId`]: `id` is [`JobId::INVALID`].
  /// - [`AddJobError::Register`]: the trigger engine refused the expression.
  pub fn try_add_job_with_id<F, Fut>(
    &self,
    id: JobId,
    expression: &str,
    job: F,
    options: JobOptions,
  ) -> Result<JobId, AddJobError>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    if !id.is_valid() {
      self
        .metrics
        .registrations_rejected
        .fetch_add(1, AtomicOrdering::Relaxed);
      warn!(job_id = %id, "Refusing to register a job under the reserved ID.");
      return Err(AddJobError::InvalidId(id));
    }
    self.ids.observe(id);
    self.register(id, expression.to_string(), boxed_job_fn(job), options)
  }

  /// Registers `job` to run every `n` units of `granularity`.
  ///
  /// `n` is clamped to the granularity's legal range (see [`Granularity::range`]).
  /// With `options.random`, finer fields get offsets drawn once for this registration.
  ///
  /// # Errors
  ///
  /// - [`AddJobError::Register`]: the trigger engine refused the synthesized expression.
  pub fn try_add_every<F, Fut>(
    &self,
    granularity: Granularity,
    n: u32,
    job: F,
    options: JobOptions,
  ) -> Result<JobId, AddJobError>
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    if !granularity.range().contains(&n) {
      debug!(%granularity, requested = n, clamped = granularity.clamp(n), "Clamping out-of-range step.");
    }
    let expression = schedule::every(granularity, n, options.random);
    self.try_add_job(&expression, job, options)
  }

  fn add_every<F, Fut>(&self, granularity: Granularity, n: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self
      .try_add_every(granularity, n, job, options)
      .unwrap_or(JobId::INVALID)
  }

  /// Every `sec` seconds (0–59, larger values clamp to 59).
  pub fn add_second_job<F, Fut>(&self, sec: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_every(Granularity::Second, sec, job, options)
  }

  /// Every `min` minutes (0–59, larger values clamp to 59).
  pub fn add_minute_job<F, Fut>(&self, min: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_every(Granularity::Minute, min, job, options)
  }

  /// Every `hour` hours (0–23, larger values clamp to 23).
  pub fn add_hour_job<F, Fut>(&self, hour: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_every(Granularity::Hour, hour, job, options)
  }

  /// Every `day` days of the month (1–31, other values clamp to 31).
  pub fn add_day_job<F, Fut>(&self, day: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_every(Granularity::Day, day, job, options)
  }

  /// Every `month` months (0–12, larger values clamp to 12).
  pub fn add_month_job<F, Fut>(&self, month: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_every(Granularity::Month, month, job, options)
  }

  /// Every `week` days of the week (1–7, other values clamp to 7).
  pub fn add_week_job<F, Fut>(&self, week: u32, job: F, options: JobOptions) -> JobId
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_every(Granularity::Week, week, job, options)
  }

  /// Builds the runner, registers it with the engine and stores the record.
  fn register(
    &self,
    id: JobId,
    expression: String,
    func: BoxedJobFn,
    options: JobOptions,
  ) -> Result<JobId, AddJobError> {
    let status = Arc::new(StatusCell::new());
    let runner = Arc::new(JobRunner::new(
      id,
      options,
      status.clone(),
      func,
      self.metrics.clone(),
    ));

    let callback: EngineCallback = {
      let runner = runner.clone();
      Arc::new(move || {
        let runner = runner.clone();
        Box::pin(async move {
          runner.fire(FireSource::Scheduled).await;
        }) as BoxFuture<'static, ()>
      })
    };

    let handle = match self.engine.register(&expression, callback) {
      Ok(handle) => handle,
      Err(e) => {
        self
          .metrics
          .registrations_rejected
          .fetch_add(1, AtomicOrdering::Relaxed);
        warn!(job_id = %id, expression = expression.as_str(), error = %e, "Job registration rejected.");
        return Err(e.into());
      }
    };

    let record = JobRecord {
      id,
      handle,
      expression,
      run_mode: options.run_mode,
      status,
      runner: runner.clone(),
      added_at: Utc::now(),
    };
    let expression_for_log = record.expression.clone();
    let replaced = self.registry.put(id, record);

    self.metrics.jobs_added.fetch_add(1, AtomicOrdering::Relaxed);
    if replaced {
      self
        .metrics
        .jobs_replaced
        .fetch_add(1, AtomicOrdering::Relaxed);
    }
    info!(
      job_id = %id,
      %handle,
      expression = expression_for_log.as_str(),
      run_mode = %options.run_mode,
      immediate = options.immediate,
      replaced,
      "Job added."
    );

    if options.immediate {
      self
        .metrics
        .immediate_runs
        .fetch_add(1, AtomicOrdering::Relaxed);
      // Fire-and-forget: registration never waits on the callback.
      self.runtime.spawn(async move {
        runner.fire(FireSource::Immediate).await;
      });
    }

    Ok(id)
  }

  // --- Removal & Invocation ---

  /// Removes a job and unregisters its trigger. Unknown IDs are ignored.
  ///
  /// A firing already in progress runs to completion.
  pub fn remove_job(&self, id: JobId) {
    if self.registry.remove(id) {
      self
        .metrics
        .jobs_removed
        .fetch_add(1, AtomicOrdering::Relaxed);
      info!(job_id = %id, "Job removed.");
    }
  }

  /// Fires a job once in the calling task, bypassing the trigger engine but
  /// not the run-mode gating: a busy `Serial` job is skipped.
  ///
  /// Returns `None` if no job is registered under `id`.
  pub async fn call(&self, id: JobId) -> Option<FireOutcome> {
    let Some(runner) = self.registry.runner(id) else {
      trace!(job_id = %id, "Call for unknown job ignored.");
      return None;
    };
    self
      .metrics
      .manual_calls
      .fetch_add(1, AtomicOrdering::Relaxed);
    Some(runner.fire(FireSource::Manual).await)
  }

  // --- Status ---

  /// Current gating status; `Ready` for unknown IDs and for `TimeFirst` jobs.
  pub fn get_status(&self, id: JobId) -> JobStatus {
    self.registry.get_status(id)
  }

  /// Overwrites a job's gating status. Diagnostic only: forcing a status can
  /// desynchronize the gate from what is actually executing. No-op for unknown IDs.
  pub fn set_status(&self, id: JobId, status: JobStatus) {
    warn!(job_id = %id, ?status, "Job status overwritten manually.");
    self.registry.set_status(id, status);
  }

  // --- Queries ---

  /// The schedule expression a job was registered with, after synthesis and jitter.
  pub fn job_expression(&self, id: JobId) -> Option<String> {
    self.registry.expression(id)
  }

  pub fn contains_job(&self, id: JobId) -> bool {
    self.registry.contains(id)
  }

  pub fn job_count(&self) -> usize {
    self.registry.len()
  }

  /// Summaries of all registered jobs, ordered by ID.
  pub fn list_jobs(&self) -> Vec<JobSummary> {
    self.registry.summaries()
  }

  /// Retrieves a snapshot of the current scheduler metrics.
  pub fn metrics_snapshot(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  // --- Lifecycle ---

  /// Starts the trigger engine's dispatch and returns immediately.
  ///
  /// # Errors
  ///
  /// - [`StartError::AlreadyStarted`]: `start` or `run_until` was already called.
  pub fn start(&self) -> Result<(), StartError> {
    if self.started.swap(true, AtomicOrdering::AcqRel) {
      warn!("Scheduler start requested more than once.");
      return Err(StartError::AlreadyStarted);
    }
    self.engine.start();
    info!(jobs = self.registry.len(), "Scheduler started.");
    Ok(())
  }

  /// Starts dispatch, then waits until `signal` resolves.
  ///
  /// Dispatch stays active after returning; call [`Scheduler::shutdown`] to stop it.
  ///
  /// # Errors
  ///
  /// - [`StartError::AlreadyStarted`]: `start` or `run_until` was already called.
  pub async fn run_until<S>(&self, signal: S) -> Result<(), StartError>
  where
    S: Future<Output = ()>,
  {
    self.start()?;
    signal.await;
    info!("Scheduler stop signal received.");
    Ok(())
  }

  /// Removes every job and stops the trigger engine.
  /// Firings already in progress run to completion.
  pub fn shutdown(&self) {
    let summaries = self.registry.summaries();
    for summary in &summaries {
      self.remove_job(summary.id);
    }
    self.engine.stop();
    info!(removed = summaries.len(), "Scheduler shut down.");
  }
}
