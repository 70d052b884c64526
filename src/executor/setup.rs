use crate::{
    error::FlowSetupError,
    registry::TypeRegistry,
    resolve::{Binding, ResolutionChain},
    step::Step,
    types::{IndexSet, StepId, TypeKey},
};
use tracing::trace;

/// Per-step wiring discovered while building the graph.
#[derive(Debug, Default)]
pub(crate) struct DependencyRecord {
    /// One binding per parameter.
    pub(crate) inputs: Vec<Binding>,
    /// Earlier steps whose output this step consumes.
    pub(crate) waits_on: IndexSet<usize>,
    /// Assigned by the scheduler.
    pub(crate) wave: usize,
    /// Allocated the first time a consumer references this step's output.
    pub(crate) slot: Option<usize>,
}

/// Fully resolved graph: records, final output bindings and slot count.
#[derive(Debug)]
pub(crate) struct Graph {
    pub(crate) records: Vec<DependencyRecord>,
    pub(crate) outputs: Vec<Binding>,
    pub(crate) slot_count: usize,
}

/// Wires every parameter of every step, and every requested output, to its
/// supplier.
///
/// The supplier of a type is the nearest preceding step producing it. When no
/// earlier step produces it, the resolution chain is consulted. Any failure
/// aborts the build: an incomplete graph never reaches execution.
pub(crate) struct GraphBuilder<'a> {
    steps: &'a [Step],
    records: Vec<DependencyRecord>,
    chain: ResolutionChain<'a>,
    slot_count: usize,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(steps: &'a [Step], inputs: &'a [TypeKey], registry: &'a TypeRegistry) -> Self {
        Self {
            steps,
            records: steps.iter().map(|_| DependencyRecord::default()).collect(),
            chain: ResolutionChain::new(inputs, registry),
            slot_count: 0,
        }
    }

    pub(crate) fn build(mut self, outputs: &[TypeKey]) -> Result<Graph, FlowSetupError> {
        let steps = self.steps;
        for (idx, step) in steps.iter().enumerate() {
            let requested_by = format!("step {} ({})", StepId(idx), step.label());
            let inputs = step
                .params()
                .iter()
                .map(|&param| self.find_input(Some(idx), param, idx, &requested_by))
                .collect::<Result<Vec<_>, _>>()?;
            self.records[idx].inputs = inputs;
        }

        // Final outputs search from after the last step.
        let outputs = outputs
            .iter()
            .map(|&key| self.find_input(None, key, steps.len(), "pipeline outputs"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Graph {
            records: self.records,
            outputs,
            slot_count: self.slot_count,
        })
    }

    /// Search steps `start_at - 1` down to `0` for a producer of `key`,
    /// falling back to the resolution chain.
    fn find_input(
        &mut self,
        consumer: Option<usize>,
        key: TypeKey,
        start_at: usize,
        requested_by: &str,
    ) -> Result<Binding, FlowSetupError> {
        for producer in (0..start_at).rev() {
            let Some(component) = self.steps[producer].output().position(key) else {
                continue;
            };
            if let Some(consumer) = consumer {
                self.records[consumer].waits_on.insert(producer);
            }
            let slot_count = &mut self.slot_count;
            let slot = *self.records[producer].slot.get_or_insert_with(|| {
                let slot = *slot_count;
                *slot_count = slot_count.checked_add(1).expect("GraphBuilder::find_input: [1]");
                slot
            });
            trace!(%key, producer, component, requested_by, "resolved from step");
            return Ok(Binding::Step {
                step: StepId(producer),
                slot,
                component,
            });
        }
        self.chain.resolve(key, requested_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(steps: &[Step], outputs: &[TypeKey]) -> Result<Graph, FlowSetupError> {
        let registry = TypeRegistry::default();
        GraphBuilder::new(steps, &[], &registry).build(outputs)
    }

    #[test]
    fn nearest_preceding_producer_wins() {
        let steps = [
            Step::from_fn(|| 1i32),
            Step::from_fn(|| 2i32),
            Step::from_fn(|x: i32| x.to_string()),
        ];
        let graph = build(&steps, &[]).unwrap();
        assert_eq!(graph.records[2].waits_on.iter().copied().collect::<Vec<_>>(), [1]);
        assert!(matches!(
            graph.records[2].inputs.as_slice(),
            [Binding::Step { step: StepId(1), slot: 0, component: 0 }]
        ));
        // Shadowed producer never gets a slot.
        assert_eq!(graph.records[0].slot, None);
        assert_eq!(graph.slot_count, 1);
    }

    #[test]
    fn tuple_component_is_selected_by_type() {
        let steps = [
            Step::from_packed_fn(|| (2i32, String::from("b"))).unwrap(),
            Step::from_fn(|s: String| s.len()),
        ];
        let graph = build(&steps, &[TypeKey::of::<i32>()]).unwrap();
        assert!(matches!(
            graph.records[1].inputs.as_slice(),
            [Binding::Step { step: StepId(0), slot: 0, component: 1 }]
        ));
        assert!(matches!(
            graph.outputs.as_slice(),
            [Binding::Step { step: StepId(0), slot: 0, component: 0 }]
        ));
        assert_eq!(graph.slot_count, 1);
    }

    #[test]
    fn steps_never_consume_later_steps() {
        let steps = [
            Step::from_fn(|x: i32| x.to_string()),
            Step::from_fn(|| 1i32),
        ];
        let err = build(&steps, &[]).unwrap_err();
        assert!(matches!(err, FlowSetupError::UnresolvedType { key, .. } if key == TypeKey::of::<i32>()));
    }

    #[test]
    fn unresolved_output_fails_the_build() {
        let steps = [Step::from_fn(|| 1i32)];
        let err = build(&steps, &[TypeKey::of::<bool>()]).unwrap_err();
        assert!(matches!(
            err,
            FlowSetupError::UnresolvedType { requested_by, .. } if requested_by == "pipeline outputs"
        ));
    }
}
