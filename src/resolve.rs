use crate::{
    error::FlowSetupError,
    registry::{Container, TypeRegistry},
    step::Step,
    types::{StepId, TypeKey, Value},
};
use derive_more::Debug;
use std::sync::Arc;
use tracing::trace;

/// Where a parameter or a requested output gets its value from.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// Invocation-time input at this position.
    Input(usize),
    /// Registered constant.
    Constant(Value),
    /// Registered source, invoked at the point of use with its own resolved
    /// arguments.
    Source {
        key: TypeKey,
        source: Step,
        args: Vec<Binding>,
    },
    /// External container, consulted at invocation time.
    Container {
        key: TypeKey,
        #[debug(skip)]
        container: Arc<dyn Container>,
    },
    /// Component `component` of the values stored in `slot` by `step`.
    Step {
        step: StepId,
        slot: usize,
        component: usize,
    },
}

#[derive(Debug, Copy, Clone)]
enum Link {
    Inputs,
    Constants,
    Sources,
    Container,
}

/// Fixed precedence of the chain.
const LINKS: [Link; 4] = [Link::Inputs, Link::Constants, Link::Sources, Link::Container];

/// Fallback resolver for any type no earlier step produces.
///
/// Looks up, in order: explicit invocation inputs, constants, sources and the
/// external container. Source parameters are resolved through the same chain
/// and never against steps.
#[derive(Debug)]
pub(crate) struct ResolutionChain<'a> {
    inputs: &'a [TypeKey],
    registry: &'a TypeRegistry,
    /// Sources currently being resolved, outermost first.
    resolving: Vec<TypeKey>,
}

impl<'a> ResolutionChain<'a> {
    pub(crate) fn new(inputs: &'a [TypeKey], registry: &'a TypeRegistry) -> Self {
        Self {
            inputs,
            registry,
            resolving: Vec::new(),
        }
    }

    /// Resolve `key` on behalf of `requested_by`.
    pub(crate) fn resolve(
        &mut self,
        key: TypeKey,
        requested_by: &str,
    ) -> Result<Binding, FlowSetupError> {
        for link in LINKS {
            if let Some(binding) = self.lookup(link, key)? {
                trace!(%key, ?link, requested_by, "resolved from chain");
                return Ok(binding);
            }
        }
        Err(FlowSetupError::UnresolvedType {
            key,
            requested_by: requested_by.to_owned(),
        })
    }

    fn lookup(&mut self, link: Link, key: TypeKey) -> Result<Option<Binding>, FlowSetupError> {
        let registry = self.registry;
        let binding = match link {
            Link::Inputs => {
                let mut matches = self
                    .inputs
                    .iter()
                    .enumerate()
                    .filter(|(_, input)| **input == key);
                // Exactly one input of the type is required; otherwise fall through.
                match (matches.next(), matches.next()) {
                    (Some((idx, _)), None) => Some(Binding::Input(idx)),
                    _ => None,
                }
            }
            Link::Constants => registry.constant(key).cloned().map(Binding::Constant),
            Link::Sources => match registry.source(key) {
                Some(source) => Some(self.resolve_source(key, source)?),
                None => None,
            },
            Link::Container => registry.container().map(|container| Binding::Container {
                key,
                container: Arc::clone(container),
            }),
        };
        Ok(binding)
    }

    fn resolve_source(&mut self, key: TypeKey, source: &Step) -> Result<Binding, FlowSetupError> {
        if self.resolving.contains(&key) {
            let mut chain = self.resolving.clone();
            chain.push(key);
            return Err(FlowSetupError::CyclicDependency { chain });
        }
        self.resolving.push(key);
        let requested_by = format!("source for `{key}`");
        let args = source
            .params()
            .iter()
            .map(|param| self.resolve(*param, &requested_by))
            .collect::<Result<Vec<_>, _>>();
        self.resolving.pop();
        Ok(Binding::Source {
            key,
            source: source.clone(),
            args: args?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ResolveError, types::value};

    fn key<T: 'static>() -> TypeKey {
        TypeKey::of::<T>()
    }

    #[test]
    fn inputs_take_precedence_over_constants() {
        let mut registry = TypeRegistry::default();
        registry.set_constant(key::<i32>(), value(1i32)).unwrap();
        let inputs = [key::<i32>()];
        let mut chain = ResolutionChain::new(&inputs, &registry);
        assert!(matches!(chain.resolve(key::<i32>(), "test"), Ok(Binding::Input(0))));
    }

    #[test]
    fn ambiguous_inputs_fall_through() {
        let mut registry = TypeRegistry::default();
        registry.set_constant(key::<i32>(), value(1i32)).unwrap();
        let inputs = [key::<i32>(), key::<i32>()];
        let mut chain = ResolutionChain::new(&inputs, &registry);
        assert!(matches!(chain.resolve(key::<i32>(), "test"), Ok(Binding::Constant(_))));
    }

    #[test]
    fn source_parameters_resolve_through_the_chain() {
        let mut registry = TypeRegistry::default();
        registry.set_constant(key::<u8>(), value(2u8)).unwrap();
        registry
            .set_source(key::<u16>(), Step::from_fn(|x: u8| u16::from(x)))
            .unwrap();
        let mut chain = ResolutionChain::new(&[], &registry);
        let Ok(Binding::Source { args, .. }) = chain.resolve(key::<u16>(), "test") else {
            panic!("expected a source binding");
        };
        assert!(matches!(args.as_slice(), [Binding::Constant(_)]));
    }

    #[test]
    fn container_is_the_last_resort() {
        let mut registry = TypeRegistry::default();
        registry.set_container(Arc::new(|k: TypeKey| -> Result<Value, ResolveError> {
            Err(ResolveError::NotFound(k))
        }));
        let mut chain = ResolutionChain::new(&[], &registry);
        assert!(matches!(
            chain.resolve(key::<String>(), "test"),
            Ok(Binding::Container { .. })
        ));
    }

    #[test]
    fn missing_type_without_container_is_unresolved() {
        let registry = TypeRegistry::default();
        let mut chain = ResolutionChain::new(&[], &registry);
        let err = chain.resolve(key::<String>(), "outputs").unwrap_err();
        assert_eq!(
            err,
            FlowSetupError::UnresolvedType {
                key: key::<String>(),
                requested_by: "outputs".into(),
            }
        );
    }

    #[test]
    fn source_cycle_is_reported() {
        let mut registry = TypeRegistry::default();
        registry
            .set_source(key::<u8>(), Step::from_fn(|x: u16| x.to_le_bytes()[0]))
            .unwrap();
        registry
            .set_source(key::<u16>(), Step::from_fn(|x: u8| u16::from(x)))
            .unwrap();
        let mut chain = ResolutionChain::new(&[], &registry);
        let err = chain.resolve(key::<u8>(), "test").unwrap_err();
        assert_eq!(
            err,
            FlowSetupError::CyclicDependency {
                chain: vec![key::<u8>(), key::<u16>(), key::<u8>()],
            }
        );
    }
}
