//! Typed front door.
//!
//! Reduces ordinary Rust closures to the erased form the graph works with:
//! an ordered list of parameter [`TypeKey`]s and a callable over [`Value`]s.

use crate::{
    error::ExecutionError,
    types::{TypeKey, Value, value},
    utils::take,
};
use core::any::Any;

/// A callable whose parameters are resolved by type.
///
/// Implemented for every `Fn` of up to six arguments whose argument types are
/// `Clone + Send + Sync + 'static`.
pub trait Handler<Args>: Send + Sync + 'static {
    /// Return type of the callable.
    type Output;

    /// Parameter types in call order.
    fn param_types() -> Vec<TypeKey>;

    /// Downcast `args` and call.
    ///
    /// # Errors
    /// If an argument does not hold the declared type.
    fn call(&self, args: Vec<Value>) -> anyhow::Result<Self::Output>;
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> Handler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            $($arg: Any + Clone + Send + Sync,)*
        {
            type Output = R;

            fn param_types() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, args: Vec<Value>) -> anyhow::Result<R> {
                let found = args.len();
                let expected = <Self as Handler<($($arg,)*)>>::param_types().len();
                if found != expected {
                    return Err(ExecutionError::InputCount { expected, found }.into());
                }
                let mut args = args.into_iter();
                $(
                    let $arg = take::<$arg>(args.next().expect("Handler::call: [1]"))?;
                )*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_handler!();
impl_handler!(A);
impl_handler!(A, B);
impl_handler!(A, B, C);
impl_handler!(A, B, C, D);
impl_handler!(A, B, C, D, E);
impl_handler!(A, B, C, D, E, G);

/// An ordered, fixed-size group of typed values.
///
/// `()` is the empty group and `(A,)` a group of one. Used for invocation
/// inputs, pipeline outputs and tuple-producing steps.
pub trait Pack: Sized + Send + 'static {
    /// Component types in order.
    fn type_keys() -> Vec<TypeKey>;

    /// Erase the components.
    fn into_values(self) -> Vec<Value>;

    /// Rebuild from erased components.
    ///
    /// # Errors
    /// If the count or any component type does not match.
    fn from_values(values: Vec<Value>) -> Result<Self, ExecutionError>;
}

macro_rules! impl_pack {
    ($($arg:ident),*) => {
        impl<$($arg,)*> Pack for ($($arg,)*)
        where
            $($arg: Any + Clone + Send + Sync,)*
        {
            fn type_keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$arg>()),*]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($arg,)*) = self;
                vec![$(value($arg)),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn from_values(values: Vec<Value>) -> Result<Self, ExecutionError> {
                let expected = Self::type_keys().len();
                if values.len() != expected {
                    return Err(ExecutionError::InputCount {
                        expected,
                        found: values.len(),
                    });
                }
                let mut values = values.into_iter();
                $(
                    let $arg = take::<$arg>(values.next().expect("Pack::from_values: [1]"))?;
                )*
                Ok(($($arg,)*))
            }
        }
    };
}

impl_pack!();
impl_pack!(A);
impl_pack!(A, B);
impl_pack!(A, B, C);
impl_pack!(A, B, C, D);
impl_pack!(A, B, C, D, E);
impl_pack!(A, B, C, D, E, G);

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<Args, F: Handler<Args>>(_: &F) -> Vec<TypeKey> {
        F::param_types()
    }

    #[test]
    fn closure_parameters_are_reported_in_order() {
        let f = |_: i32, _: String, _: bool| ();
        assert_eq!(
            keys(&f),
            vec![TypeKey::of::<i32>(), TypeKey::of::<String>(), TypeKey::of::<bool>()]
        );
    }

    #[test]
    fn call_downcasts_arguments() {
        let f = |a: i32, b: String| format!("{b}{a}");
        let out = Handler::call(&f, vec![value(7i32), value(String::from("n"))]).unwrap();
        assert_eq!(out, "n7");
    }

    #[test]
    fn call_rejects_wrong_argument_type() {
        let f = |a: i32| a;
        let err = Handler::call(&f, vec![value(1u64)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn pack_rejects_wrong_arity() {
        let err = <(i32, bool)>::from_values(vec![value(1i32)]).unwrap_err();
        assert!(matches!(err, ExecutionError::InputCount { expected: 2, found: 1 }));
    }
}
