use crate::{
    config::ExecutionMode,
    error::ExecutionError,
    executor::Plan,
    parallel::WorkUnit,
    resolve::Binding,
    types::{ResultSlot, StepId, Value},
    utils::check_type,
};
use std::sync::Arc;
use tracing::trace;

/// Per-invocation state: the inputs and one slot per referenced producer.
#[derive(Debug)]
pub(super) struct Frame {
    inputs: Vec<Value>,
    slots: Vec<ResultSlot>,
}

impl Frame {
    fn new(inputs: Vec<Value>, slot_count: usize) -> Self {
        Self {
            inputs,
            slots: (0..slot_count).map(|_| ResultSlot::new()).collect(),
        }
    }
}

impl Plan {
    /// Run every wave in ascending order, then read the requested outputs.
    ///
    /// A wave starts only after the previous one has fully completed. A
    /// failing wave stops the invocation, so no later step observes an unset
    /// slot.
    pub(super) fn run(self: &Arc<Self>, inputs: Vec<Value>) -> Result<Vec<Value>, ExecutionError> {
        if inputs.len() != self.inputs.len() {
            return Err(ExecutionError::InputCount {
                expected: self.inputs.len(),
                found: inputs.len(),
            });
        }
        let inputs = self
            .inputs
            .iter()
            .zip(inputs)
            .map(|(&key, value)| check_type(key, value))
            .collect::<Result<Vec<_>, _>>()?;
        let frame = Arc::new(Frame::new(inputs, self.slot_count));

        for (wave_idx, wave) in self.waves.iter().enumerate() {
            trace!(wave = wave_idx, steps = wave.len(), "wave started");
            match (&self.mode, wave.as_slice()) {
                (_, &[idx]) => self.exec_step(idx, &frame)?,
                (ExecutionMode::Sequential, _) => {
                    for &idx in wave {
                        self.exec_step(idx, &frame)?;
                    }
                }
                (ExecutionMode::WaveParallel(executor), _) => {
                    let units = wave
                        .iter()
                        .map(|&idx| {
                            let plan = Arc::clone(self);
                            let frame = Arc::clone(&frame);
                            Box::new(move || plan.exec_step(idx, &frame)) as WorkUnit
                        })
                        .collect();
                    executor.run(units)?;
                }
            }
        }

        self.output_bindings
            .iter()
            .map(|binding| binding.evaluate(&frame))
            .collect()
    }

    /// Evaluate the arguments of step `idx`, call it and publish its result.
    fn exec_step(&self, idx: usize, frame: &Frame) -> Result<(), ExecutionError> {
        let layout = &self.steps[idx];
        let args = layout
            .inputs
            .iter()
            .map(|binding| binding.evaluate(frame))
            .collect::<Result<Vec<_>, _>>()?;
        let produced = layout
            .step
            .call(args)
            .map_err(|source| ExecutionError::StepFailed {
                step: StepId(idx),
                label: layout.step.label().to_owned(),
                source,
            })?;
        if let Some(slot) = layout.slot
            && !frame.slots[slot].write(produced)
        {
            return Err(ExecutionError::SlotRewritten { step: StepId(idx) });
        }
        Ok(())
    }
}

impl Binding {
    /// Produce the value this binding stands for within `frame`.
    pub(super) fn evaluate(&self, frame: &Frame) -> Result<Value, ExecutionError> {
        match self {
            Self::Input(idx) => Ok(Arc::clone(&frame.inputs[*idx])),
            Self::Constant(value) => Ok(Arc::clone(value)),
            Self::Source { key, source, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(frame))
                    .collect::<Result<Vec<_>, _>>()?;
                let produced = source
                    .call(args)
                    .map_err(|err| ExecutionError::SourceFailed {
                        key: *key,
                        source: err,
                    })?;
                produced
                    .0
                    .into_iter()
                    .next()
                    .ok_or(ExecutionError::TypeMismatch { expected: *key })
            }
            Self::Container { key, container } => {
                let value = container
                    .resolve(*key)
                    .map_err(|source| ExecutionError::ContainerFailed { key: *key, source })?;
                check_type(*key, value)
            }
            Self::Step {
                step,
                slot,
                component,
            } => frame.slots[*slot]
                .read(*component)
                .ok_or(ExecutionError::SlotUnset { step: *step }),
        }
    }
}
