//! CronKeeper: a concurrency-aware job layer over a cron trigger engine.
//!
//! A trigger engine decides *when* a callback fires. CronKeeper decides
//! *whether and how* each firing of a logical job is allowed to run.
//!
//! # Features
//!
//! - Register jobs under raw six-field, seconds-resolution expressions
//!   (`"<sec> <min> <hour> <day> <month> <weekday>"`) or through the
//!   `add_{second,minute,hour,day,month,week}_job` helpers that synthesize
//!   "every n units" expressions.
//! - Run modes per job:
//!   - `Serial`: a firing that overlaps a running one is skipped.
//!   - `TimeFirst`: every firing runs, overlaps allowed.
//! - Optional jitter (`random`) of the finer schedule fields, drawn once per
//!   registration, to avoid thundering-herd firing.
//! - Optional one-shot `immediate` run at registration time.
//! - Manual `call`s that share the job's gating.
//! - Panic isolation (`recover`, on by default): a panicking callback is
//!   logged and never wedges a `Serial` job in `Running`.
//! - Pluggable [`TriggerEngine`]; the built-in [`CronEngine`] (feature
//!   `cron_engine`) uses the `cron` crate and Tokio timers (UTC).
//! - Metrics snapshots ([`MetricsSnapshot`]) and job listing ([`JobSummary`]).
//! - Optional task-local job context (`JobContext`, feature `job_context`).
//!
//! # Usage
//!
//! ```no_run
//! use cronkeeper::{JobOptions, RunMode, Scheduler};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // tracing_subscriber::fmt().with_env_filter("info,cronkeeper=debug").init();
//!
//!     let scheduler = Scheduler::builder().build()?;
//!     let counter = Arc::new(AtomicUsize::new(0));
//!
//!     // Every 10 seconds, skipped while a previous run is still busy.
//!     let ctr = counter.clone();
//!     let sync_id = scheduler.add_second_job(
//!         10,
//!         move || {
//!             let ctr = ctr.clone();
//!             async move {
//!                 ctr.fetch_add(1, Ordering::SeqCst);
//!             }
//!         },
//!         JobOptions::new().immediate(true),
//!     );
//!     assert!(sync_id.is_valid());
//!
//!     // Hourly, at a random minute/second, always on time.
//!     scheduler.add_hour_job(
//!         1,
//!         || async { println!("hourly report") },
//!         JobOptions::new().run_mode(RunMode::TimeFirst).random(true),
//!     );
//!
//!     // Blocks until Ctrl-C; dispatch keeps running until shutdown.
//!     scheduler
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     scheduler.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Observability
//!
//! - Integrate with the `tracing` crate for structured logs; recovered panics
//!   are logged at `error` level with the job ID and panic message.
//! - Retrieve counters with [`Scheduler::metrics_snapshot`].

// --- Feature-gated Documentation ---

#[cfg(all(doc, feature = "job_context"))]
pub mod job_context_docs {
    //! # Accessing Job Context (`job_context` feature)
    //!
    //! Inside a job callback, the ID of the job and the reason for the firing
    //! are available through Tokio's task-local context:
    //!
    //! 1.  **`try_get_current_job_context() -> Option<JobContext>`**: returns
    //!     `None` outside a job callback.
    //! 2.  **`job_context!() -> JobContext`**: panics outside a job callback.
    //!
    //! ```no_run
    //! # #[cfg(feature = "job_context")] {
    //! use cronkeeper::{try_get_current_job_context, job_context};
    //!
    //! let job = || async {
    //!     if let Some(ctx) = try_get_current_job_context() {
    //!         println!("job {} fired ({})", ctx.job_id, ctx.source);
    //!     }
    //!     let required = job_context!();
    //!     println!("job {}", required.job_id);
    //! };
    //! # let _ = job;
    //! # }
    //! ```
}

pub mod engine;
pub mod error;
mod id;
pub mod job;
mod macros;
pub mod metrics;
pub mod options;
mod registry;
pub mod runner;
pub mod schedule;
pub mod scheduler;

// --- Public Re-exports ---

pub use scheduler::{Scheduler, SchedulerBuilder};

pub use engine::{EngineCallback, TriggerEngine, TriggerHandle};
#[cfg(feature = "cron_engine")]
pub use engine::CronEngine;

pub use error::{AddJobError, BuildError, RegisterError, StartError};

pub use job::{BoxedJobFn, JobId, JobStatus, JobSummary};
#[cfg(feature = "job_context")]
pub use job::context::{try_get_current_job_context, JobContext};

pub use options::{JobOption, JobOptions, RunMode};
pub use runner::{FireOutcome, FireSource};
pub use schedule::Granularity;

pub use metrics::{MetricsSnapshot, SchedulerMetrics};
