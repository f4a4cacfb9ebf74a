use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// --- Simple Histogram Implementation ---

/// A basic concurrent histogram storing count and sum.
///
/// Suitable for simple latency tracking without detailed percentile information.
#[derive(Debug, Default)]
pub struct SimpleHistogram {
  count: AtomicUsize,
  sum_micros: AtomicUsize,
}

impl SimpleHistogram {
  /// Records a duration observation in the histogram.
  pub fn record(&self, duration: Duration) {
    self.count.fetch_add(1, Ordering::Relaxed);
    self.sum_micros.fetch_add(
      duration.as_micros().try_into().unwrap_or(usize::MAX),
      Ordering::Relaxed,
    );
  }

  /// Gets the total number of observations recorded.
  pub fn get_count(&self) -> usize {
    self.count.load(Ordering::Relaxed)
  }

  /// Gets the total sum of durations recorded (in microseconds).
  pub fn get_sum_micros(&self) -> usize {
    self.sum_micros.load(Ordering::Relaxed)
  }
}

// --- Main Metrics Struct (Internal State) ---

/// Internal state for tracking scheduler metrics using atomic counters.
///
/// Cloned into every job runner. Cloning only clones the `Arc`s, so all
/// clones update the same counters.
#[derive(Debug, Clone)]
pub struct SchedulerMetrics {
  // --- Counters (Monotonically increasing) ---
  /// Jobs successfully registered (including replacements).
  pub jobs_added: Arc<AtomicUsize>,
  /// Registrations that superseded an existing job with the same ID.
  pub jobs_replaced: Arc<AtomicUsize>,
  /// Jobs removed through `remove_job` (replacements not counted).
  pub jobs_removed: Arc<AtomicUsize>,
  /// Registrations refused by the trigger engine or by ID validation.
  pub registrations_rejected: Arc<AtomicUsize>,
  /// Firings whose callback was actually invoked.
  pub firings_executed: Arc<AtomicUsize>,
  /// `Serial` firings skipped because the job was still running.
  pub firings_skipped_busy: Arc<AtomicUsize>,
  /// Callback panics caught by the runner (`recover = true`).
  pub jobs_panicked: Arc<AtomicUsize>,
  /// One-shot runs dispatched for `immediate = true` jobs.
  pub immediate_runs: Arc<AtomicUsize>,
  /// Manual `call`s that found a job.
  pub manual_calls: Arc<AtomicUsize>,

  // --- Gauges (Current state values) ---
  /// `Serial` jobs currently in the `Running` state.
  pub jobs_running_current: Arc<AtomicUsize>,

  // --- Histograms/Summaries ---
  /// Execution duration of invoked callbacks.
  pub job_execution_duration: Arc<SimpleHistogram>,
}

impl Default for SchedulerMetrics {
  fn default() -> Self {
    Self::new()
  }
}

impl SchedulerMetrics {
  /// Creates a new `SchedulerMetrics` instance with all counters initialized to zero.
  pub fn new() -> Self {
    Self {
      jobs_added: Default::default(),
      jobs_replaced: Default::default(),
      jobs_removed: Default::default(),
      registrations_rejected: Default::default(),
      firings_executed: Default::default(),
      firings_skipped_busy: Default::default(),
      jobs_panicked: Default::default(),
      immediate_runs: Default::default(),
      manual_calls: Default::default(),
      jobs_running_current: Default::default(),
      job_execution_duration: Arc::new(SimpleHistogram::default()),
    }
  }

  /// Creates a point-in-time snapshot of the current metric values.
  pub fn snapshot(&self) -> MetricsSnapshot {
    // Counters are independent; Relaxed is enough for a monitoring view.
    let order = Ordering::Relaxed;

    MetricsSnapshot {
      jobs_added: self.jobs_added.load(order),
      jobs_replaced: self.jobs_replaced.load(order),
      jobs_removed: self.jobs_removed.load(order),
      registrations_rejected: self.registrations_rejected.load(order),
      firings_executed: self.firings_executed.load(order),
      firings_skipped_busy: self.firings_skipped_busy.load(order),
      jobs_panicked: self.jobs_panicked.load(order),
      immediate_runs: self.immediate_runs.load(order),
      manual_calls: self.manual_calls.load(order),
      jobs_running_current: self.jobs_running_current.load(order),
      job_execution_duration_count: self.job_execution_duration.get_count(),
      job_execution_duration_sum_micros: self.job_execution_duration.get_sum_micros(),
    }
  }
}

// --- Metrics Snapshot Struct (Public Data) ---

/// A snapshot of the scheduler's metrics at a specific point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
  // Counters
  pub jobs_added: usize,
  pub jobs_replaced: usize,
  pub jobs_removed: usize,
  pub registrations_rejected: usize,
  pub firings_executed: usize,
  pub firings_skipped_busy: usize,
  pub jobs_panicked: usize,
  pub immediate_runs: usize,
  pub manual_calls: usize,
  // Gauges
  pub jobs_running_current: usize,
  // Histogram Data
  pub job_execution_duration_count: usize,
  pub job_execution_duration_sum_micros: usize,
}

impl MetricsSnapshot {
  /// Mean callback execution duration in microseconds, if any firing ran.
  pub fn mean_execution_duration_micros(&self) -> Option<f64> {
    if self.job_execution_duration_count == 0 {
      None
    } else {
      Some(self.job_execution_duration_sum_micros as f64 / self.job_execution_duration_count as f64)
    }
  }

  /// Mean callback execution duration, if any firing ran.
  pub fn mean_execution_duration(&self) -> Option<Duration> {
    self
      .mean_execution_duration_micros()
      .map(|micros| Duration::from_micros(micros as u64))
  }
}
