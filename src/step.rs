use crate::{
    error::{ExecutionError, FlowSetupError},
    handler::{Handler, Pack},
    types::{Produced, Shape, TypeKey, Value, value},
};
use core::any::Any;
use derive_more::Debug;
use std::sync::Arc;

pub(crate) type Invoke = Arc<dyn Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync>;

/// A registered unit of work.
///
/// A step declares the ordered types it consumes and the shape of what it
/// produces. Its identity is its registration index in the builder.
#[derive(Debug, Clone)]
pub struct Step {
    label: String,
    params: Vec<TypeKey>,
    output: Shape,
    #[debug(skip)]
    invoke: Invoke,
}

impl Step {
    /// Step over an erased callable.
    ///
    /// `f` receives one value per entry of `params`, in order, and must
    /// return exactly one value per type of `output`. A tuple `output` that
    /// repeats a type is rejected by [`FlowBuilder::add`](crate::FlowBuilder::add).
    #[must_use]
    pub fn new<F>(label: impl Into<String>, params: Vec<TypeKey>, output: Shape, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            params,
            output,
            invoke: Arc::new(f),
        }
    }

    /// Step producing a single value, or nothing when `F::Output` is `()`.
    #[must_use]
    pub fn from_fn<Args, F>(f: F) -> Self
    where
        F: Handler<Args>,
        F::Output: Any + Send + Sync,
    {
        let output = if TypeKey::of::<F::Output>().is_unit() {
            Shape::Unit
        } else {
            Shape::Single(TypeKey::of::<F::Output>())
        };
        let unit = output == Shape::Unit;
        Self::new(
            core::any::type_name::<F>(),
            F::param_types(),
            output,
            move |args| {
                let out = <F as Handler<Args>>::call(&f, args)?;
                Ok(if unit { vec![] } else { vec![value(out)] })
            },
        )
    }

    /// Step producing a single value or failing with an error.
    #[must_use]
    pub fn from_fallible_fn<Args, F, R>(f: F) -> Self
    where
        F: Handler<Args, Output = anyhow::Result<R>>,
        R: Any + Send + Sync,
    {
        let output = if TypeKey::of::<R>().is_unit() {
            Shape::Unit
        } else {
            Shape::Single(TypeKey::of::<R>())
        };
        let unit = output == Shape::Unit;
        Self::new(
            core::any::type_name::<F>(),
            F::param_types(),
            output,
            move |args| {
                let out = <F as Handler<Args>>::call(&f, args)??;
                Ok(if unit { vec![] } else { vec![value(out)] })
            },
        )
    }

    /// Step producing a tuple whose components are matched individually.
    ///
    /// # Errors
    /// [`FlowSetupError::AmbiguousTuple`] if the tuple repeats a type.
    pub fn from_packed_fn<Args, F>(f: F) -> Result<Self, FlowSetupError>
    where
        F: Handler<Args>,
        F::Output: Pack,
    {
        let output = Shape::from_types(<F::Output as Pack>::type_keys())?;
        Ok(Self::new(
            core::any::type_name::<F>(),
            F::param_types(),
            output,
            move |args| Ok(<F as Handler<Args>>::call(&f, args)?.into_values()),
        ))
    }

    /// Replace the diagnostic label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Parameter types in call order.
    #[must_use]
    pub fn params(&self) -> &[TypeKey] {
        &self.params
    }

    /// Result shape.
    #[must_use]
    pub fn output(&self) -> &Shape {
        &self.output
    }

    /// Run the callable and check that it honoured its declared shape.
    pub(crate) fn call(&self, args: Vec<Value>) -> anyhow::Result<Produced> {
        let values = (self.invoke)(args)?;
        let expected = self.output.types();
        anyhow::ensure!(
            values.len() == expected.len(),
            "declared {} result(s), produced {}",
            expected.len(),
            values.len()
        );
        for (key, val) in expected.iter().zip(&values) {
            if !key.matches(val) {
                return Err(ExecutionError::TypeMismatch { expected: *key }.into());
            }
        }
        Ok(Produced(values))
    }
}
