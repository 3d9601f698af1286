use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    factories::{Arguments, Constructor, ConstructorFn},
    types::{AnyArc, DynError, Injectable, TypeKey},
};

/// Turns the concrete object into the view of a dependency
pub(crate) type CastFn = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync + 'static>;

/// What kind of type a descriptor describes
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TypeKind {
    Interface,
    Abstract,
    Concrete,
}

/// A key a type is assignable to
#[derive(Clone)]
pub struct Capability {
    key: TypeKey,
    cast: Option<CastFn>,
}

impl Capability {
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// True if resolving through this key gives a typed view
    pub fn is_typed(&self) -> bool {
        self.cast.is_some()
    }

    pub(crate) fn cast(&self) -> Option<&CastFn> {
        self.cast.as_ref()
    }
}

/// Erases `Fn(Arc<S>) -> Arc<D>` into a cast between type-erased views
fn erase_cast<S, D>(cast: impl Fn(Arc<S>) -> Arc<D> + Send + Sync + 'static) -> CastFn
where
    S: ?Sized + Send + Sync + 'static,
    D: ?Sized + Send + Sync + 'static,
{
    Arc::new(move |object: &AnyArc| {
        let source = (**object).downcast_ref::<Arc<S>>()?.clone();
        Some(Arc::new(cast(source)) as AnyArc)
    })
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("key", &format_args!("{}", self.key))
            .field("typed", &self.is_typed())
            .finish()
    }
}

/// Everything the container knows about a type
///
/// Lists which keys the type is assignable to and how it can be constructed.
/// Descriptors of generic definitions use [TypeKey::Parameter] for their type parameters.
#[derive(Clone)]
pub struct TypeDescriptor {
    key: TypeKey,
    kind: TypeKind,
    satisfies: Vec<Capability>,
    constructors: Vec<Constructor>,
}

impl TypeDescriptor {
    fn new(key: TypeKey, kind: TypeKind) -> Self {
        TypeDescriptor {
            key,
            kind,
            satisfies: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Describes an interface, it can be depended on but never constructed
    pub fn interface(key: TypeKey) -> Self {
        Self::new(key, TypeKind::Interface)
    }

    /// Describes an abstract type, it can be depended on but never constructed
    pub fn abstract_type(key: TypeKey) -> Self {
        Self::new(key, TypeKind::Abstract)
    }

    /// Describes the concrete Rust type `I`
    pub fn concrete<I: Injectable>() -> ConcreteBuilder<I> {
        Self::concrete_keyed(TypeKey::of::<I>())
    }

    /// Describes a concrete type under a custom key, constructed as the Rust type `I`
    pub fn concrete_keyed<I: Injectable>(key: TypeKey) -> ConcreteBuilder<I> {
        ConcreteBuilder {
            descriptor: Self::new(key, TypeKind::Concrete),
            _marker: PhantomData,
        }
    }

    /// Describes an open generic definition, constructed as the Rust type `I`
    ///
    /// The closing type arguments are available through [Arguments::type_args].
    pub fn generic<I: Injectable>(name: &'static str, arity: usize) -> ConcreteBuilder<I> {
        Self::concrete_keyed(TypeKey::definition(name, arity))
    }

    /// Declares that this interface or abstract type is assignable to `key`
    ///
    /// Implementations resolved through `key` only reach it this way untyped, use
    /// [TypeDescriptor::extends_as] to keep their view.
    pub fn extends(mut self, key: TypeKey) -> Self {
        self.satisfies.push(Capability { key, cast: None });
        self
    }

    /// Declares that this interface is assignable to `key`, turning its view `S` into `D`
    ///
    /// ```ignore
    /// TypeDescriptor::interface(TypeKey::of::<dyn LoudGreeter>())
    ///     .extends_as(TypeKey::of::<dyn Greeter>(), |it: Arc<dyn LoudGreeter>| it.into_greeter())
    /// ```
    pub fn extends_as<S, D>(
        mut self,
        key: TypeKey,
        cast: impl Fn(Arc<S>) -> Arc<D> + Send + Sync + 'static,
    ) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        D: ?Sized + Send + Sync + 'static,
    {
        self.satisfies.push(Capability {
            key,
            cast: Some(erase_cast(cast)),
        });
        self
    }

    pub(crate) fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.satisfies
    }

    pub fn satisfies(&self) -> impl Iterator<Item = &TypeKey> {
        self.satisfies.iter().map(Capability::key)
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Concrete with at least one constructor
    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Concrete && !self.constructors.is_empty()
    }

    /// Descriptor of the closed type, parameters replaced by `args`
    ///
    /// Descriptors of non generic types are returned as they are.
    pub fn close(&self, args: &[TypeKey]) -> TypeDescriptor {
        let Some(key) = self.key.close(args) else {
            return self.clone();
        };

        TypeDescriptor {
            key,
            kind: self.kind,
            satisfies: self
                .satisfies
                .iter()
                .map(|capability| Capability {
                    key: capability.key.substitute(args),
                    cast: capability.cast.clone(),
                })
                .collect(),
            constructors: self
                .constructors
                .iter()
                .map(|constructor| constructor.substitute(args))
                .collect(),
        }
    }

    /// Type arguments which close this definition into something assignable to `request`
    ///
    /// Capabilities of the definition are unified against the request, so
    /// `Pair<T0, T1>: Swapped<T1, T0>` closes `Swapped<u8, String>` as `Pair<String, u8>`.
    pub fn solve_type_args(&self, request: &TypeKey) -> Option<Vec<TypeKey>> {
        self.solve_type_args_through(request, self.satisfies())
    }

    /// Like [TypeDescriptor::solve_type_args], unifying against `supertypes` instead of the
    /// direct capabilities
    pub(crate) fn solve_type_args_through<'k>(
        &self,
        request: &TypeKey,
        supertypes: impl IntoIterator<Item = &'k TypeKey>,
    ) -> Option<Vec<TypeKey>> {
        let TypeKey::Definition { arity, .. } = &self.key else {
            return None;
        };
        let definition = request.generic_definition()?;

        if definition == self.key {
            return Some(request.type_args().to_vec());
        }

        supertypes
            .into_iter()
            .filter(|key| key.generic_definition().as_ref() == Some(&definition))
            .find_map(|key| {
                let mut solved = vec![None; *arity];
                if !key.unify(request, &mut solved) {
                    return None;
                }
                solved.into_iter().collect::<Option<Vec<_>>>()
            })
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("key", &format_args!("{}", self.key))
            .field("kind", &self.kind)
            .field("satisfies", &self.satisfies)
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// Builder for descriptors of concrete types
pub struct ConcreteBuilder<I> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> I>,
}

impl<I: Injectable> ConcreteBuilder<I> {
    /// Declares `I` assignable to the trait object `D`
    ///
    /// ```ignore
    /// TypeDescriptor::concrete::<SmtpMailer>().satisfies::<dyn Mailer>(|it| it)
    /// ```
    pub fn satisfies<D>(self, cast: impl Fn(Arc<I>) -> Arc<D> + Send + Sync + 'static) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.satisfies_key_as(TypeKey::of::<D>(), cast)
    }

    /// Declares `I` assignable to `key` without a typed view
    pub fn satisfies_key(mut self, key: TypeKey) -> Self {
        self.descriptor.satisfies.push(Capability { key, cast: None });
        self
    }

    /// Declares `I` assignable to `key`, viewed as `D` when resolved through it
    pub fn satisfies_key_as<D>(
        mut self,
        key: TypeKey,
        cast: impl Fn(Arc<I>) -> Arc<D> + Send + Sync + 'static,
    ) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.descriptor.satisfies.push(Capability {
            key,
            cast: Some(erase_cast(cast)),
        });
        self
    }

    /// Adds a constructor from a closure over injectable arguments
    ///
    /// ```ignore
    /// .constructor(|mailer: Arc<dyn Mailer>, hooks: Vec<Arc<dyn Hook>>| Signup { mailer, hooks })
    /// ```
    pub fn constructor<Marker, F>(mut self, constructor: F) -> Self
    where
        F: ConstructorFn<I, Marker>,
    {
        let build = move |arguments: &mut Arguments<'_>| {
            constructor
                .call(arguments)
                .map(|instance| Arc::new(Arc::new(instance)) as AnyArc)
        };
        self.descriptor
            .constructors
            .push(Constructor::new(F::params(), Arc::new(build)));
        self
    }

    /// Adds a fallible constructor with explicitly listed parameters
    pub fn constructor_raw<F>(mut self, params: impl IntoIterator<Item = TypeKey>, build: F) -> Self
    where
        F: Fn(&mut Arguments<'_>) -> Result<I, DynError> + Send + Sync + 'static,
    {
        let build = move |arguments: &mut Arguments<'_>| {
            build(arguments).map(|instance| Arc::new(Arc::new(instance)) as AnyArc)
        };
        self.descriptor.constructors.push(Constructor::new(
            params.into_iter().collect(),
            Arc::new(build),
        ));
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

impl<I: Injectable> From<ConcreteBuilder<I>> for TypeDescriptor {
    fn from(builder: ConcreteBuilder<I>) -> Self {
        builder.build()
    }
}

/// A concrete type which knows how to describe itself
pub trait Component: Injectable + Sized {
    fn describe() -> ConcreteBuilder<Self>;
}
