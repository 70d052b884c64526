use crate::{
    config::{Config, ExecutionMode},
    error::{FlowError, FlowSetupError},
    executor::{Pipeline, TypedPipeline},
    handler::{Handler, Pack},
    parallel::ParallelExecutor,
    registry::{Container, TypeRegistry},
    step::Step,
    types::{StepId, TypeKey, value},
};
use core::any::Any;
use std::sync::Arc;
use tracing::{trace, warn};

/// Registration surface for steps, constants, sources and the container.
///
/// Steps are wired by type only: each parameter is taken from the nearest
/// earlier step producing that type, or else from invocation inputs,
/// constants, sources or the container, in that order.
///
/// ```
/// use tfg::builder::FlowBuilder;
///
/// let mut flow = FlowBuilder::new();
/// flow.add_step(|| 3i32);
/// flow.add_step(|n: i32| n.to_string());
/// let (text,): (String,) = flow.run(()).unwrap();
/// assert_eq!(text, "3");
/// ```
#[derive(Debug, Default, Clone)]
pub struct FlowBuilder {
    registry: TypeRegistry,
    steps: Vec<Step>,
    config: Config,
}

impl FlowBuilder {
    /// Sequential builder with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder using `config`.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Enable wave-parallel execution over `executor`.
    pub fn set_parallel(&mut self, executor: impl ParallelExecutor + 'static) -> &mut Self {
        self.config.mode = ExecutionMode::WaveParallel(Arc::new(executor));
        self
    }

    /// Return to sequential execution.
    pub fn set_sequential(&mut self) -> &mut Self {
        self.config.mode = ExecutionMode::Sequential;
        self
    }

    /// Install the external resolver consulted when nothing else matches.
    pub fn set_container(&mut self, container: impl Container + 'static) -> &mut Self {
        self.registry.set_container(Arc::new(container));
        self
    }

    /// Bind a constant value to its type.
    ///
    /// # Errors
    /// [`FlowSetupError::DuplicateBinding`] if the type is already bound.
    pub fn set_constant<T: Any + Send + Sync>(&mut self, val: T) -> Result<&mut Self, FlowSetupError> {
        self.registry.set_constant(TypeKey::of::<T>(), value(val))?;
        Ok(self)
    }

    /// Bind a provider to the type it returns.
    ///
    /// Its parameters are resolved from inputs, constants, other sources or
    /// the container, never from steps. It runs at every point of use.
    ///
    /// # Errors
    /// [`FlowSetupError::DuplicateBinding`] if the type is already bound.
    pub fn set_source<Args, F>(&mut self, f: F) -> Result<&mut Self, FlowSetupError>
    where
        F: Handler<Args>,
        F::Output: Any + Send + Sync,
    {
        self.registry
            .set_source(TypeKey::of::<F::Output>(), Step::from_fn(f))?;
        Ok(self)
    }

    /// Bind a fallible provider to the type it returns on success.
    ///
    /// # Errors
    /// [`FlowSetupError::DuplicateBinding`] if the type is already bound.
    pub fn set_fallible_source<Args, F, R>(&mut self, f: F) -> Result<&mut Self, FlowSetupError>
    where
        F: Handler<Args, Output = anyhow::Result<R>>,
        R: Any + Send + Sync,
    {
        self.registry
            .set_source(TypeKey::of::<R>(), Step::from_fallible_fn(f))?;
        Ok(self)
    }

    /// Register a step producing one value, or nothing if it returns `()`.
    pub fn add_step<Args, F>(&mut self, f: F) -> StepId
    where
        F: Handler<Args>,
        F::Output: Any + Send + Sync,
    {
        self.push(Step::from_fn(f))
    }

    /// Register a step that may fail.
    pub fn add_fallible_step<Args, F, R>(&mut self, f: F) -> StepId
    where
        F: Handler<Args, Output = anyhow::Result<R>>,
        R: Any + Send + Sync,
    {
        self.push(Step::from_fallible_fn(f))
    }

    /// Register a step returning a tuple; each component is matched by its
    /// own type.
    ///
    /// # Errors
    /// [`FlowSetupError::AmbiguousTuple`] if the tuple repeats a type.
    pub fn add_packed_step<Args, F>(&mut self, f: F) -> Result<StepId, FlowSetupError>
    where
        F: Handler<Args>,
        F::Output: Pack,
    {
        Ok(self.push(Step::from_packed_fn(f)?))
    }

    /// Register an already erased step.
    ///
    /// # Errors
    /// [`FlowSetupError::AmbiguousTuple`] if its output shape repeats a type.
    pub fn add(&mut self, step: Step) -> Result<StepId, FlowSetupError> {
        if let Err(err) = step.output().validate() {
            warn!(label = step.label(), %err, "step rejected");
            return Err(err);
        }
        Ok(self.push(step))
    }

    fn push(&mut self, step: Step) -> StepId {
        let id = StepId(self.steps.len());
        trace!(step = %id, label = step.label(), "step registered");
        self.steps.push(step);
        id
    }

    /// Registered steps in registration order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Build an erased pipeline taking `inputs` and returning `outputs`.
    ///
    /// # Errors
    /// [`FlowSetupError::UnresolvedType`] or
    /// [`FlowSetupError::CyclicDependency`]; no pipeline is produced.
    pub fn build(
        &self,
        inputs: Vec<TypeKey>,
        outputs: Vec<TypeKey>,
    ) -> Result<Pipeline, FlowSetupError> {
        Pipeline::build(
            &self.steps,
            &self.registry,
            self.config.mode.clone(),
            inputs,
            outputs,
        )
    }

    /// Build a pipeline with a typed signature.
    ///
    /// # Errors
    /// As [`FlowBuilder::build`].
    pub fn build_typed<In: Pack, Out: Pack>(&self) -> Result<TypedPipeline<In, Out>, FlowSetupError> {
        self.build(In::type_keys(), Out::type_keys())
            .map(TypedPipeline::new)
    }

    /// Build and invoke once.
    ///
    /// # Errors
    /// [`FlowError::Setup`] if the build fails, [`FlowError::Execution`] if
    /// the invocation fails.
    pub fn run<In: Pack, Out: Pack>(&self, inputs: In) -> Result<Out, FlowError> {
        Ok(self.build_typed::<In, Out>()?.call(inputs)?)
    }
}
