use std::sync::atomic::{AtomicU64, Ordering};

use crate::job::JobId;

/// Hands out strictly increasing job IDs, starting at 1.
///
/// Each `Scheduler` owns one allocator. IDs are never recycled, including
/// after a job is removed.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
  last: AtomicU64,
}

impl IdAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns `None` once the ID space is used up, which only happens after a
  /// caller-chosen ID at the top of the range has been observed.
  pub fn next_id(&self) -> Option<JobId> {
    self
      .last
      .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| last.checked_add(1))
      .ok()
      .map(|last| JobId::new(last + 1))
  }

  /// Advances the counter past an ID chosen by the caller, so later
  /// allocations cannot collide with it.
  pub fn observe(&self, id: JobId) {
    self.last.fetch_max(id.get(), Ordering::Relaxed);
  }
}
