mod execute;
pub(crate) mod schedule;
pub(crate) mod setup;

use crate::{
    config::ExecutionMode,
    error::{ExecutionError, FlowSetupError},
    executor::setup::GraphBuilder,
    handler::Pack,
    registry::TypeRegistry,
    resolve::Binding,
    step::Step,
    types::{StepId, TypeKey, Value},
};
use core::marker::PhantomData;
use derive_more::Debug;
use std::sync::Arc;
use tracing::debug;

/// Executable pipeline produced by a build.
///
/// Stand-alone: it owns its steps, bindings and wave plan, and can be invoked
/// any number of times, from any number of threads. Every invocation gets
/// fresh result slots.
#[must_use]
#[derive(Debug, Clone)]
pub struct Pipeline {
    plan: Arc<Plan>,
}

#[derive(Debug)]
pub(crate) struct Plan {
    steps: Vec<StepLayout>,
    /// Step indices per wave, ascending wave order.
    waves: Vec<Vec<usize>>,
    inputs: Vec<TypeKey>,
    outputs: Vec<TypeKey>,
    output_bindings: Vec<Binding>,
    slot_count: usize,
    mode: ExecutionMode,
}

#[derive(Debug)]
pub(crate) struct StepLayout {
    step: Step,
    /// One binding per parameter of `step`.
    inputs: Vec<Binding>,
    waits_on: Vec<StepId>,
    wave: usize,
    /// Present only if some consumer reads this step's output.
    slot: Option<usize>,
}

impl Pipeline {
    /// Resolve, schedule and assemble `steps` into a pipeline.
    ///
    /// # Errors
    /// [`FlowSetupError::UnresolvedType`] if some parameter or output has no
    /// provider, [`FlowSetupError::CyclicDependency`] if sources depend on
    /// each other in a loop.
    pub(crate) fn build(
        steps: &[Step],
        registry: &TypeRegistry,
        mode: ExecutionMode,
        inputs: Vec<TypeKey>,
        outputs: Vec<TypeKey>,
    ) -> Result<Self, FlowSetupError> {
        let mut graph = GraphBuilder::new(steps, &inputs, registry).build(&outputs)?;
        let parallel = matches!(mode, ExecutionMode::WaveParallel(_));
        schedule::assign_waves(&mut graph.records, parallel);
        let waves = schedule::group_waves(&graph.records);

        let steps: Vec<_> = steps
            .iter()
            .zip(graph.records)
            .map(|(step, record)| StepLayout {
                step: step.clone(),
                inputs: record.inputs,
                waits_on: record.waits_on.into_iter().map(StepId).collect(),
                wave: record.wave,
                slot: record.slot,
            })
            .collect();

        debug!(
            steps = steps.len(),
            waves = waves.len(),
            slots = graph.slot_count,
            parallel,
            "pipeline built"
        );

        Ok(Self {
            plan: Arc::new(Plan {
                steps,
                waves,
                inputs,
                outputs,
                output_bindings: graph.outputs,
                slot_count: graph.slot_count,
                mode,
            }),
        })
    }

    /// Invoke the pipeline with values matching [`Pipeline::input_types`].
    ///
    /// Returns one value per entry of [`Pipeline::output_types`].
    ///
    /// # Errors
    /// If the inputs do not match the declared signature, or any step,
    /// source, container or executor fails.
    pub fn invoke(&self, inputs: Vec<Value>) -> Result<Vec<Value>, ExecutionError> {
        self.plan.run(inputs)
    }

    /// Declared invocation input types.
    #[must_use]
    pub fn input_types(&self) -> &[TypeKey] {
        &self.plan.inputs
    }

    /// Requested output types.
    #[must_use]
    pub fn output_types(&self) -> &[TypeKey] {
        &self.plan.outputs
    }

    /// Number of steps in the pipeline.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.plan.steps.len()
    }

    /// Steps grouped by wave, in execution order.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<StepId>> {
        self.plan
            .waves
            .iter()
            .map(|wave| wave.iter().copied().map(StepId).collect())
            .collect()
    }

    /// Wave of `step`.
    #[must_use]
    pub fn wave_of(&self, step: StepId) -> Option<usize> {
        self.plan.steps.get(step.0).map(|s| s.wave)
    }

    /// Earlier steps whose output `step` consumes.
    #[must_use]
    pub fn dependencies(&self, step: StepId) -> Option<&[StepId]> {
        self.plan.steps.get(step.0).map(|s| s.waits_on.as_slice())
    }

    /// The registered step at `step`.
    #[must_use]
    pub fn step(&self, step: StepId) -> Option<&Step> {
        self.plan.steps.get(step.0).map(|s| &s.step)
    }
}

/// A [`Pipeline`] with a typed input and output signature.
#[must_use]
#[derive(Debug)]
pub struct TypedPipeline<In, Out> {
    pipeline: Pipeline,
    #[debug(skip)]
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Clone for TypedPipeline<In, Out> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            _marker: PhantomData,
        }
    }
}

impl<In: Pack, Out: Pack> TypedPipeline<In, Out> {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            _marker: PhantomData,
        }
    }

    /// Invoke the pipeline.
    ///
    /// # Errors
    /// If any step, source, container or executor fails.
    pub fn call(&self, inputs: In) -> Result<Out, ExecutionError> {
        Out::from_values(self.pipeline.invoke(inputs.into_values())?)
    }

    /// The underlying erased pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
