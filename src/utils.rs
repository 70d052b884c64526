use crate::{
    error::ExecutionError,
    types::{TypeKey, Value},
};
use core::any::Any;
use std::sync::Arc;

/// Move a `T` out of an erased value, cloning only when the value is shared.
pub(crate) fn take<T: Any + Clone + Send + Sync>(value: Value) -> Result<T, ExecutionError> {
    value
        .downcast::<T>()
        .map(|arc| Arc::try_unwrap(arc).unwrap_or_else(|shared| T::clone(&shared)))
        .map_err(|_| ExecutionError::TypeMismatch {
            expected: TypeKey::of::<T>(),
        })
}

/// Ensure an externally supplied value carries the expected type.
pub(crate) fn check_type(key: TypeKey, value: Value) -> Result<Value, ExecutionError> {
    if key.matches(&value) {
        Ok(value)
    } else {
        Err(ExecutionError::TypeMismatch { expected: key })
    }
}
