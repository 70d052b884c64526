use crate::{
    error::{FlowSetupError, ResolveError},
    step::Step,
    types::{IndexMap, TypeKey, Value},
};
use derive_more::{Debug, Display};
use std::sync::Arc;
use tracing::{trace, warn};

/// External value provider consulted when nothing else supplies a type.
///
/// Called at invocation time, once per point of use.
pub trait Container: Send + Sync {
    /// Produce a value of type `key`.
    ///
    /// # Errors
    /// [`ResolveError::NotFound`] if the container has no such type.
    fn resolve(&self, key: TypeKey) -> Result<Value, ResolveError>;
}

impl<F> Container for F
where
    F: Fn(TypeKey) -> Result<Value, ResolveError> + Send + Sync,
{
    fn resolve(&self, key: TypeKey) -> Result<Value, ResolveError> {
        self(key)
    }
}

/// Kind of a type-keyed binding.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// A precomputed value.
    #[display("constant")]
    Constant,
    /// A lazily invoked provider.
    #[display("source")]
    Source,
}

/// Constants, sources and the optional container.
///
/// Constants and sources share one namespace: each type may be bound at most
/// once across both kinds.
#[derive(Debug, Default, Clone)]
pub(crate) struct TypeRegistry {
    constants: IndexMap<TypeKey, Value>,
    sources: IndexMap<TypeKey, Step>,
    #[debug(skip)]
    container: Option<Arc<dyn Container>>,
}

impl TypeRegistry {
    pub(crate) fn set_constant(&mut self, key: TypeKey, value: Value) -> Result<(), FlowSetupError> {
        self.ensure_unbound(key, BindingKind::Constant)?;
        trace!(%key, "constant registered");
        self.constants.insert(key, value);
        Ok(())
    }

    pub(crate) fn set_source(&mut self, key: TypeKey, source: Step) -> Result<(), FlowSetupError> {
        self.ensure_unbound(key, BindingKind::Source)?;
        trace!(%key, params = source.params().len(), "source registered");
        self.sources.insert(key, source);
        Ok(())
    }

    pub(crate) fn set_container(&mut self, container: Arc<dyn Container>) {
        self.container = Some(container);
    }

    pub(crate) fn constant(&self, key: TypeKey) -> Option<&Value> {
        self.constants.get(&key)
    }

    pub(crate) fn source(&self, key: TypeKey) -> Option<&Step> {
        self.sources.get(&key)
    }

    pub(crate) fn container(&self) -> Option<&Arc<dyn Container>> {
        self.container.as_ref()
    }

    fn ensure_unbound(&self, key: TypeKey, attempted: BindingKind) -> Result<(), FlowSetupError> {
        let existing = if self.constants.contains_key(&key) {
            BindingKind::Constant
        } else if self.sources.contains_key(&key) {
            BindingKind::Source
        } else {
            return Ok(());
        };
        warn!(%key, %existing, %attempted, "duplicate binding rejected");
        Err(FlowSetupError::DuplicateBinding {
            key,
            existing,
            attempted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value;

    fn source_of_i32() -> Step {
        Step::from_fn(|| 1i32)
    }

    #[test]
    fn constant_then_source_is_rejected() {
        let mut registry = TypeRegistry::default();
        registry.set_constant(TypeKey::of::<i32>(), value(1i32)).unwrap();
        let err = registry
            .set_source(TypeKey::of::<i32>(), source_of_i32())
            .unwrap_err();
        assert_eq!(
            err,
            FlowSetupError::DuplicateBinding {
                key: TypeKey::of::<i32>(),
                existing: BindingKind::Constant,
                attempted: BindingKind::Source,
            }
        );
    }

    #[test]
    fn source_then_constant_is_rejected() {
        let mut registry = TypeRegistry::default();
        registry.set_source(TypeKey::of::<i32>(), source_of_i32()).unwrap();
        let err = registry
            .set_constant(TypeKey::of::<i32>(), value(1i32))
            .unwrap_err();
        assert!(matches!(
            err,
            FlowSetupError::DuplicateBinding {
                existing: BindingKind::Source,
                attempted: BindingKind::Constant,
                ..
            }
        ));
    }

    #[test]
    fn same_kind_twice_is_rejected() {
        let mut registry = TypeRegistry::default();
        registry.set_constant(TypeKey::of::<u8>(), value(1u8)).unwrap();
        assert!(registry.set_constant(TypeKey::of::<u8>(), value(2u8)).is_err());
        assert_eq!(
            registry
                .constant(TypeKey::of::<u8>())
                .and_then(|v| v.downcast_ref::<u8>().copied()),
            Some(1)
        );
    }
}
