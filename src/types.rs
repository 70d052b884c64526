use crate::{error::FlowSetupError, sync::Mutex};
use core::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
};
use derive_more::{Deref, Display};
use indexmap::{IndexMap as _IndexMap, IndexSet as _IndexSet};
use rustc_hash::FxBuildHasher;
use std::{
    collections::HashSet as _HashSet,
    sync::{Arc, PoisonError},
};

/// Stable identifier of a semantic type.
///
/// Equality and hashing use only the `TypeId`; the name is kept for
/// diagnostics.
#[derive(Copy, Clone, Display)]
#[display("{name}")]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of the Rust type `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Human-readable type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `value` holds an instance of this type.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        Any::type_id(&**value) == self.id
    }

    pub(crate) fn is_unit(&self) -> bool {
        self.id == TypeId::of::<()>()
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A type-erased, shareable value flowing between steps.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value into a [`Value`].
#[must_use]
pub fn value<T: Any + Send + Sync>(val: T) -> Value {
    Arc::new(val)
}

/// Identity of a registered step: its registration index.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct StepId(pub(crate) usize);

impl StepId {
    /// Registration index of the step.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Result shape of a step or of a whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// No value.
    Unit,
    /// Exactly one value.
    Single(TypeKey),
    /// An ordered tuple of values; position `i` carries type `i`.
    Tuple(Vec<TypeKey>),
}

impl Shape {
    /// Shape from an ordered list of result types.
    ///
    /// A single `()` collapses to [`Shape::Unit`].
    ///
    /// # Errors
    /// [`FlowSetupError::AmbiguousTuple`] if a tuple repeats a type.
    pub fn from_types(types: Vec<TypeKey>) -> Result<Self, FlowSetupError> {
        match types.len() {
            0 => Ok(Self::Unit),
            1 if types[0].is_unit() => Ok(Self::Unit),
            1 => Ok(Self::Single(types[0])),
            _ => {
                let shape = Self::Tuple(types);
                shape.validate()?;
                Ok(shape)
            }
        }
    }

    /// Check that no result type occurs twice.
    ///
    /// # Errors
    /// [`FlowSetupError::AmbiguousTuple`] naming the first repeated type.
    pub fn validate(&self) -> Result<(), FlowSetupError> {
        let types = self.types();
        let mut seen = HashSet::with_capacity_and_hasher(types.len(), FxBuildHasher);
        match types.iter().find(|key| !seen.insert(**key)) {
            Some(key) => Err(FlowSetupError::AmbiguousTuple { key: *key }),
            None => Ok(()),
        }
    }

    /// Result types in positional order.
    #[must_use]
    pub fn types(&self) -> &[TypeKey] {
        match self {
            Self::Unit => &[],
            Self::Single(key) => core::slice::from_ref(key),
            Self::Tuple(keys) => keys,
        }
    }

    /// Position of `key` among the result types.
    #[must_use]
    pub fn position(&self, key: TypeKey) -> Option<usize> {
        self.types().iter().position(|k| *k == key)
    }

}

/// Values produced by one invocation of a step, in shape order.
#[derive(Debug, Clone, Deref)]
pub(crate) struct Produced(pub(crate) Vec<Value>);

/// Single-writer, multi-reader storage for one step's produced values.
///
/// Tuple-producing steps store all their components in the same slot.
/// Written exactly once per invocation, by the producing step, before any
/// consumer in a later wave reads it.
#[derive(Debug)]
pub(crate) struct ResultSlot(Mutex<Option<Produced>>);

impl ResultSlot {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(None))
    }

    /// Store the produced values. Returns `false` if the slot was already
    /// written during this invocation.
    pub(crate) fn write(&self, produced: Produced) -> bool {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return false;
        }
        *guard = Some(produced);
        true
    }

    /// Component `component` of the stored values, or `None` if unset.
    pub(crate) fn read(&self, component: usize) -> Option<Value> {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().and_then(|p| p.0.get(component).cloned())
    }
}

pub(crate) type HashSet<T> = _HashSet<T, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
/// `IndexSet` type with fast hasher.
pub type IndexSet<T> = _IndexSet<T, FxBuildHasher>;
