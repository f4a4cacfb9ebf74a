//! Per-job execution policy.
//!
//! A [`JobOptions`] value is resolved once per `add_*` call, from the default
//! baseline plus any [`JobOption`] directives, and is consumed when the job's
//! [`JobRunner`](crate::runner::JobRunner) is built.

use std::fmt;

/// How overlapping firings of the same job are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunMode {
  /// Skip a firing while a previous firing of the same job is still running.
  #[default]
  Serial,
  /// Always run on schedule, even if a previous firing still overlaps.
  TimeFirst,
}

impl fmt::Display for RunMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunMode::Serial => f.write_str("serial"),
      RunMode::TimeFirst => f.write_str("time_first"),
    }
  }
}

/// A single override directive applied on top of a baseline [`JobOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JobOption {
  RunMode(RunMode),
  /// Fire once, asynchronously, at registration time.
  Immediate(bool),
  /// Jitter the sub-unit fields of synthesized schedule expressions.
  Random(bool),
  /// Catch panics raised by the job callback.
  Recover(bool),
}

/// Resolved, immutable execution policy for one job.
///
/// Defaults: [`RunMode::Serial`], `immediate = false`, `random = false`, `recover = true`.
///
/// ```
/// use cronkeeper::{JobOptions, RunMode};
///
/// let opts = JobOptions::new().run_mode(RunMode::TimeFirst).immediate(true);
/// assert_eq!(opts.run_mode, RunMode::TimeFirst);
/// assert!(opts.recover);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobOptions {
  pub run_mode: RunMode,
  pub immediate: bool,
  pub random: bool,
  pub recover: bool,
}

impl Default for JobOptions {
  fn default() -> Self {
    Self {
      run_mode: RunMode::Serial,
      immediate: false,
      random: false,
      recover: true,
    }
  }
}

impl JobOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Applies `overrides` to `base` in order. Later directives win on conflicts;
  /// untouched fields keep the value from `base`.
  pub fn resolve<I>(base: JobOptions, overrides: I) -> JobOptions
  where
    I: IntoIterator<Item = JobOption>,
  {
    overrides.into_iter().fold(base, |mut opts, directive| {
      match directive {
        JobOption::RunMode(mode) => opts.run_mode = mode,
        JobOption::Immediate(flag) => opts.immediate = flag,
        JobOption::Random(flag) => opts.random = flag,
        JobOption::Recover(flag) => opts.recover = flag,
      }
      opts
    })
  }

  /// Resolves `overrides` against the default baseline.
  pub fn from_overrides<I>(overrides: I) -> JobOptions
  where
    I: IntoIterator<Item = JobOption>,
  {
    Self::resolve(Self::default(), overrides)
  }

  pub fn run_mode(mut self, mode: RunMode) -> Self {
    self.run_mode = mode;
    self
  }

  pub fn immediate(mut self, flag: bool) -> Self {
    self.immediate = flag;
    self
  }

  pub fn random(mut self, flag: bool) -> Self {
    self.random = flag;
    self
  }

  pub fn recover(mut self, flag: bool) -> Self {
    self.recover = flag;
    self
  }
}

impl From<RunMode> for JobOptions {
  fn from(mode: RunMode) -> Self {
    Self::default().run_mode(mode)
  }
}
