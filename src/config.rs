use crate::parallel::{ParallelExecutor, RayonExecutor};
use std::sync::Arc;

/// How the waves of a pipeline are executed.
#[derive(Debug, Clone, Default)]
pub enum ExecutionMode {
    /// One step per wave, in registration order, on the calling thread.
    #[default]
    Sequential,
    /// Independent steps share a wave and are fanned out to the executor.
    WaveParallel(Arc<dyn ParallelExecutor>),
}

/// Build configuration for a [`FlowBuilder`](crate::builder::FlowBuilder).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Execution mode baked into pipelines built with this configuration.
    pub mode: ExecutionMode,
}

impl Config {
    /// Purely sequential execution.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Wave-parallel execution over `executor`.
    #[must_use]
    pub fn parallel(executor: impl ParallelExecutor + 'static) -> Self {
        Self {
            mode: ExecutionMode::WaveParallel(Arc::new(executor)),
        }
    }

    /// Wave-parallel execution on rayon's global pool.
    #[must_use]
    pub fn rayon() -> Self {
        Self::parallel(RayonExecutor::new())
    }
}
