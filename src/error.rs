use crate::{
    registry::BindingKind,
    types::{StepId, TypeKey},
};
use thiserror::Error;

/// Configuration error raised while registering providers or building a
/// pipeline.
///
/// Every variant is a configuration mistake: no pipeline is produced and
/// nothing is retried.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum FlowSetupError {
    /// A constant or source is already bound to this type.
    #[error("{attempted} for `{key}` conflicts with an existing {existing}")]
    DuplicateBinding {
        /// Type being bound.
        key: TypeKey,
        /// Kind of the binding already present.
        existing: BindingKind,
        /// Kind of the rejected binding.
        attempted: BindingKind,
    },
    /// A tuple-producing step declares the same type twice.
    #[error("tuple output declares `{key}` more than once")]
    AmbiguousTuple {
        /// Repeated component type.
        key: TypeKey,
    },
    /// Nothing in steps, inputs, constants, sources or the container
    /// provides this type.
    #[error("no provider for `{key}` required by {requested_by}")]
    UnresolvedType {
        /// Missing type.
        key: TypeKey,
        /// Who needed it: a step, a source or the pipeline outputs.
        requested_by: String,
    },
    /// Sources depend on each other in a loop.
    #[error("sources form a cycle: {}", format_chain(.chain))]
    CyclicDependency {
        /// Types being resolved, outermost first, ending with the repeated one.
        chain: Vec<TypeKey>,
    },
}

fn format_chain(chain: &[TypeKey]) -> String {
    chain
        .iter()
        .map(TypeKey::name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Failure reported by an external resolver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The resolver has no value for this type.
    #[error("`{0}` not found")]
    NotFound(TypeKey),
    /// Any other resolver failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error raised while invoking a built pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// A step returned an error.
    #[error("step {step} ({label}) failed")]
    StepFailed {
        /// Failing step.
        step: StepId,
        /// Step label.
        label: String,
        /// Error returned by the step.
        #[source]
        source: anyhow::Error,
    },
    /// A source returned an error.
    #[error("source for `{key}` failed")]
    SourceFailed {
        /// Type the source provides.
        key: TypeKey,
        /// Error returned by the source.
        #[source]
        source: anyhow::Error,
    },
    /// The external resolver could not provide a value.
    #[error("container could not resolve `{key}`")]
    ContainerFailed {
        /// Requested type.
        key: TypeKey,
        /// Resolver error.
        #[source]
        source: ResolveError,
    },
    /// A value of the wrong type reached a typed boundary.
    #[error("expected a value of type `{expected}`")]
    TypeMismatch {
        /// Expected type.
        expected: TypeKey,
    },
    /// Invocation inputs do not match the declared input signature.
    #[error("expected {expected} input(s), got {found}")]
    InputCount {
        /// Declared number of inputs.
        expected: usize,
        /// Supplied number of inputs.
        found: usize,
    },
    /// A consumer read a slot whose producer never wrote it.
    #[error("result of step {step} is not available")]
    SlotUnset {
        /// Producer of the slot.
        step: StepId,
    },
    /// A step wrote its slot twice within one invocation.
    #[error("result of step {step} was written twice")]
    SlotRewritten {
        /// Producer of the slot.
        step: StepId,
    },
}

/// Error of a one-shot build-and-invoke.
///
/// Keeps configuration mistakes apart from invocation failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    /// The pipeline could not be built.
    #[error(transparent)]
    Setup(#[from] FlowSetupError),
    /// The pipeline was built but failed while running.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
