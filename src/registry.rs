//! Concurrent map from [`JobId`] to the job's record.
//!
//! The registry owns the pairing between a record and its trigger-engine
//! registration: a record is only reachable while its registration is live,
//! and removing a record always unregisters its handle exactly once. Engine
//! calls are made after the map entry has been claimed, never while a shard
//! lock is held.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::engine::TriggerEngine;
use crate::job::{JobId, JobRecord, JobStatus, JobSummary};
use crate::runner::JobRunner;

pub(crate) struct JobRegistry {
  jobs: DashMap<JobId, JobRecord>,
  engine: Arc<dyn TriggerEngine>,
}

impl JobRegistry {
  pub fn new(engine: Arc<dyn TriggerEngine>) -> Self {
    Self {
      jobs: DashMap::new(),
      engine,
    }
  }

  /// Returns the runner of a registered job.
  pub fn runner(&self, id: JobId) -> Option<Arc<JobRunner>> {
    self.jobs.get(&id).map(|record| record.runner.clone())
  }

  pub fn expression(&self, id: JobId) -> Option<String> {
    self.jobs.get(&id).map(|record| record.expression.clone())
  }

  pub fn contains(&self, id: JobId) -> bool {
    self.jobs.contains_key(&id)
  }

  pub fn len(&self) -> usize {
    self.jobs.len()
  }

  /// Stores `record` under `id`, releasing any record it displaces.
  /// Returns `true` if an existing job was superseded.
  ///
  /// The swap is a single map operation, so lookups see either the old or the
  /// new record, never neither.
  pub fn put(&self, id: JobId, record: JobRecord) -> bool {
    match self.jobs.insert(id, record) {
      Some(displaced) => {
        self.release(displaced);
        true
      }
      None => false,
    }
  }

  /// Removes the job and unregisters its trigger. Returns `true` if it existed.
  pub fn remove(&self, id: JobId) -> bool {
    match self.jobs.remove(&id) {
      Some((_, record)) => {
        self.release(record);
        true
      }
      None => {
        trace!(job_id = %id, "Remove for unknown job ignored.");
        false
      }
    }
  }

  /// Status of the job, or `Ready` if it is not registered.
  pub fn get_status(&self, id: JobId) -> JobStatus {
    self
      .jobs
      .get(&id)
      .map(|record| record.status.load())
      .unwrap_or_default()
  }

  /// Overwrites the status of a registered job. No-op if absent.
  pub fn set_status(&self, id: JobId, status: JobStatus) {
    if let Some(record) = self.jobs.get(&id) {
      record.status.store(status);
    }
  }

  /// Summaries of all registered jobs, ordered by ID.
  pub fn summaries(&self) -> Vec<JobSummary> {
    let mut summaries: Vec<JobSummary> = self.jobs.iter().map(|entry| entry.summary()).collect();
    summaries.sort_by_key(|summary| summary.id);
    summaries
  }

  fn release(&self, record: JobRecord) {
    self.engine.unregister(record.handle);
    debug!(
      job_id = %record.id,
      handle = %record.handle,
      expression = record.expression.as_str(),
      "Released job registration."
    );
  }
}

impl std::fmt::Debug for JobRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JobRegistry")
      .field("jobs", &self.jobs.len())
      .field("engine", &format_args!("Arc<dyn TriggerEngine>"))
      .finish()
  }
}
