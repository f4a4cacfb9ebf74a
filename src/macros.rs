/// Macro to simplify writing job callbacks that capture shared state.
///
/// Takes an optional synchronous setup block and a mandatory async logic block.
/// The setup block runs at the start of every firing, before the future is
/// built, which is the place to clone `Arc`s the logic block moves.
///
/// # Usage
///
/// ```ignore
/// # use cronkeeper::{job_fn, JobOptions, Scheduler};
/// # use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// # let counter = Arc::new(AtomicUsize::new(0));
/// # let scheduler: Scheduler = todo!();
/// // With setup block:
/// let job = job_fn! {
///     {
///         let job_counter = counter.clone();
///     }
///     {
///         job_counter.fetch_add(1, Ordering::SeqCst);
///     }
/// };
/// scheduler.add_second_job(5, job, JobOptions::new());
///
/// // Without setup block:
/// scheduler.add_minute_job(1, job_fn! {{ println!("tick"); }}, JobOptions::new());
/// ```
#[macro_export]
macro_rules! job_fn {
    // Matcher 1: Setup block `{...}` followed by the main logic block `{...}`
    (
        { $($setup_stmts:stmt);* $(;)? }
        $main_block:block
    ) => {
        move || {
            $($setup_stmts;)*

            let fut = async move { $main_block };

            Box::pin(fut) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'static>>
        }
    };

    // Matcher 2: Only the main logic block is provided
    (
        $main_block:block
    ) => {
        move || {
            let fut = async move { $main_block };

            Box::pin(fut) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'static>>
        }
    };
}
