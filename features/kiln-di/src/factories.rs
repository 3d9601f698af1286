use std::{fmt, sync::Arc};

use crate::{
    errors::ResolveError,
    inject::Inject,
    types::{AnyArc, DynError, Injectable, Instance, TypeKey},
};

/// Type erased build function of a constructor
pub(crate) type BuildFn =
    Arc<dyn Fn(&mut Arguments<'_>) -> Result<AnyArc, DynError> + Send + Sync + 'static>;

/// One way of constructing an implementation
///
/// The parameters are resolved left to right and handed to the build function as [Arguments].
#[derive(Clone)]
pub struct Constructor {
    params: Vec<TypeKey>,
    build: BuildFn,
}

impl Constructor {
    pub(crate) fn new(params: Vec<TypeKey>, build: BuildFn) -> Self {
        Constructor { params, build }
    }

    /// Constructor without parameters handing out the same object every time
    pub(crate) fn shared(object: AnyArc) -> Self {
        Constructor {
            params: Vec::new(),
            build: Arc::new(move |_| Ok(object.clone())),
        }
    }

    pub fn params(&self) -> &[TypeKey] {
        &self.params
    }

    /// Copy of this constructor with the type parameters of its owner bound
    pub(crate) fn substitute(&self, args: &[TypeKey]) -> Constructor {
        Constructor {
            params: self.params.iter().map(|param| param.substitute(args)).collect(),
            build: self.build.clone(),
        }
    }

    pub(crate) fn build(&self, arguments: &mut Arguments<'_>) -> Result<AnyArc, DynError> {
        (self.build)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Constructor").field(&self.params).finish()
    }
}

/// Resolved constructor arguments, consumed in declaration order
pub struct Arguments<'a> {
    implementation: &'a TypeKey,
    values: std::vec::IntoIter<Instance>,
    declared: usize,
    taken: usize,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(implementation: &'a TypeKey, values: Vec<Instance>) -> Self {
        Arguments {
            implementation,
            declared: values.len(),
            values: values.into_iter(),
            taken: 0,
        }
    }

    /// Key of the implementation being constructed
    pub fn implementation(&self) -> &TypeKey {
        self.implementation
    }

    /// Type arguments the implementation was closed with, empty for non generic types
    pub fn type_args(&self) -> &[TypeKey] {
        self.implementation.type_args()
    }

    /// Takes the next argument without converting it
    pub fn next_instance(&mut self) -> Result<Instance, ResolveError> {
        let index = self.taken;
        self.taken += 1;
        self.values.next().ok_or_else(|| ResolveError::MissingArgument {
            implementation: self.implementation.clone(),
            index,
            declared: self.declared,
        })
    }

    /// Takes the next argument as an injectable type
    pub fn take<A: Inject>(&mut self) -> Result<A, ResolveError> {
        A::from_instance(self.next_instance()?)
    }
}

/// Closures over injectable arguments which construct an implementation
///
/// Implemented for `Fn(A, B, ..) -> I` with up to six [Inject] arguments,
/// the parameter keys are derived from the argument types.
pub trait ConstructorFn<I, Marker>: Send + Sync + 'static {
    fn params() -> Vec<TypeKey>;

    fn call(&self, arguments: &mut Arguments<'_>) -> Result<I, DynError>;
}

macro_rules! impl_constructor_fn {
    ($($arg:ident),*) => {
        impl<F, I, $($arg,)*> ConstructorFn<I, ($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> I + Send + Sync + 'static,
            I: Injectable,
            $($arg: Inject,)*
        {
            fn params() -> Vec<TypeKey> {
                vec![$(<$arg as Inject>::key()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn call(&self, arguments: &mut Arguments<'_>) -> Result<I, DynError> {
                $(let $arg = arguments.take::<$arg>()?;)*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_constructor_fn!();
impl_constructor_fn!(A1);
impl_constructor_fn!(A1, A2);
impl_constructor_fn!(A1, A2, A3);
impl_constructor_fn!(A1, A2, A3, A4);
impl_constructor_fn!(A1, A2, A3, A4, A5);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6);
