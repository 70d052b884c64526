//! Fork-join capability used to run the steps of one wave concurrently.

use crate::error::ExecutionError;
use core::fmt::Debug;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::Arc;

/// One step invocation, including the write of its result slot.
pub type WorkUnit = Box<dyn FnOnce() -> Result<(), ExecutionError> + Send>;

/// Runs a batch of independent units and waits for all of them.
///
/// Implementations must not return before every unit has completed; the
/// return is the barrier that makes the units' writes visible to the next
/// wave. Any unit failure must be reported to the caller.
pub trait ParallelExecutor: Debug + Send + Sync {
    /// Run `units` concurrently and block until all complete.
    ///
    /// # Errors
    /// The failure of some unit, as chosen by the implementation's
    /// aggregation policy.
    fn run(&self, units: Vec<WorkUnit>) -> Result<(), ExecutionError>;
}

/// Reports the failure of the earliest unit in batch order.
///
/// Every unit has already run to completion by the time this is called.
fn first_failure(results: Vec<Result<(), ExecutionError>>) -> Result<(), ExecutionError> {
    results.into_iter().collect()
}

/// Fork-join over `rayon`.
///
/// The batch is split in halves recursively and each half is handed to
/// `rayon::join`. All units run to completion; the failure of the earliest
/// unit in batch order is returned. A panicking unit propagates its panic to
/// the caller once both halves have joined.
#[derive(Debug, Clone, Default)]
pub struct RayonExecutor {
    pool: Option<Arc<ThreadPool>>,
}

impl RayonExecutor {
    /// Executor on rayon's global pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor on a dedicated pool of `threads` workers.
    ///
    /// # Errors
    /// If the pool cannot be created.
    pub fn with_threads(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }
}

impl ParallelExecutor for RayonExecutor {
    fn run(&self, units: Vec<WorkUnit>) -> Result<(), ExecutionError> {
        let results = match &self.pool {
            Some(pool) => pool.install(|| join_units(units)),
            None => join_units(units),
        };
        first_failure(results)
    }
}

fn join_units(mut units: Vec<WorkUnit>) -> Vec<Result<(), ExecutionError>> {
    match units.len() {
        0 => Vec::new(),
        1 => units.into_iter().map(|unit| unit()).collect(),
        len => {
            let right = units.split_off(len / 2);
            let (mut lhs, rhs) = rayon::join(|| join_units(units), || join_units(right));
            lhs.extend(rhs);
            lhs
        }
    }
}

/// Runs every unit immediately on the calling thread, in batch order.
///
/// Uses the same aggregation policy as [`RayonExecutor`]: all units run, the
/// earliest failure is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl ParallelExecutor for InlineExecutor {
    fn run(&self, units: Vec<WorkUnit>) -> Result<(), ExecutionError> {
        first_failure(units.into_iter().map(|unit| unit()).collect())
    }
}
