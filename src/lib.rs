//! Type-driven pipeline builder with wave-parallel execution.
//!
//! Callers register independent steps, each declaring the types it consumes
//! and the type(s) it produces. No edges are authored: at build time every
//! parameter is wired to the nearest earlier step producing its type, or, if
//! none does, to the resolution chain (invocation inputs, constants, sources,
//! then an external container). The resulting waits-on relation is turned
//! into waves; a wave only starts after every wave it depends on completed.
//!
//! Key modules:
//! - `builder`: the `FlowBuilder` registration surface, `build` and `run`.
//! - `executor`: the dependency graph builder, the wave scheduler and the
//!   `Pipeline` artifact that runs waves over per-invocation result slots.
//! - `parallel`: the fork-join capability (`ParallelExecutor`) used to fan out
//!   a wave, with a rayon-backed and an inline implementation.
//! - `handler`: the typed front door turning closures into erased steps.
//!
//! Quick start:
//! 1. Create a `FlowBuilder`, optionally `set_parallel(RayonExecutor::new())`.
//! 2. Register constants, sources and steps.
//! 3. `build_typed::<Inputs, Outputs>()` once and `call` it many times, or
//!    `run` for a one-shot build and invocation.
//!
//! Build errors (`FlowSetupError`) and invocation errors (`ExecutionError`)
//! are distinct types. A pipeline is never produced from a partially
//! resolved graph.

/// Registration surface and build entry points.
pub mod builder;
/// Execution mode selection.
pub mod config;
/// Build-time and run-time error types.
pub mod error;
/// Graph building, wave scheduling and the executable pipeline.
///
/// Contains the nearest-preceding-producer resolution of step parameters,
/// the wave assignment, and the per-invocation execution of waves with a
/// fork-join barrier between them.
pub mod executor;
/// Typed closures and value groups.
pub mod handler;
/// Fork-join executors for wave-parallel mode.
pub mod parallel;
/// Constants, sources and the external container.
pub mod registry;
mod resolve;
/// Erased step records.
pub mod step;
mod sync;
/// Type keys, erased values, shapes and result slots.
pub mod types;
mod utils;

pub use builder::FlowBuilder;
pub use config::{Config, ExecutionMode};
pub use error::{ExecutionError, FlowError, FlowSetupError, ResolveError};
pub use executor::{Pipeline, TypedPipeline};
pub use handler::{Handler, Pack};
pub use parallel::{InlineExecutor, ParallelExecutor, RayonExecutor, WorkUnit};
pub use registry::{BindingKind, Container};
pub use step::Step;
pub use types::{Shape, StepId, TypeKey, Value, value};
