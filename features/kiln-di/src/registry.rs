use std::{
    borrow::Cow,
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use crate::{
    container::{Resolver, ResolverOptions},
    descriptor::{Component, TypeDescriptor, TypeKind},
    errors::RegistrationError,
    factories::Constructor,
    types::{AnyArc, Injectable, Lifetime, TypeKey},
};

// The container consists of two parts.
// 1. The Registry where all types are described and implementations are registered
// 2. The Resolver, which takes the frozen Registry and constructs instances

/// One implementation registered for a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementationRecord {
    implementation: TypeKey,
    lifetime: Lifetime,
}

impl ImplementationRecord {
    pub fn implementation(&self) -> &TypeKey {
        &self.implementation
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

/// Result of a lookup: the record plus the type arguments its implementation gets closed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    record: ImplementationRecord,
    type_args: Vec<TypeKey>,
}

impl Binding {
    fn exact(record: ImplementationRecord) -> Self {
        Binding {
            record,
            type_args: Vec::new(),
        }
    }

    pub fn record(&self) -> &ImplementationRecord {
        &self.record
    }

    pub fn lifetime(&self) -> Lifetime {
        self.record.lifetime
    }

    pub fn type_args(&self) -> &[TypeKey] {
        &self.type_args
    }

    /// Key of the implementation after closing it with the type arguments
    pub fn implementation(&self) -> TypeKey {
        self.record
            .implementation
            .close(&self.type_args)
            .unwrap_or_else(|| self.record.implementation.clone())
    }
}

/// Interfaces extending generic interfaces can grow their arguments forever, walks stop here
const MAX_SUPERTYPE_DEPTH: usize = 64;

#[derive(Debug, Default)]
pub struct Registry {
    /// Every type the container knows about
    catalog: HashMap<TypeKey, Arc<TypeDescriptor>>,
    /// Implementations per dependency, in registration order
    registrations: HashMap<TypeKey, Vec<ImplementationRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Adds a type to the catalog, replacing an earlier description of the same key
    pub fn describe(&mut self, descriptor: impl Into<TypeDescriptor>) -> &mut Self {
        let descriptor = descriptor.into();
        let key = descriptor.key().clone();
        if self.catalog.insert(key.clone(), Arc::new(descriptor)).is_some() {
            tracing::warn!("Type {key} was described twice - the last description wins");
        }
        self
    }

    /// Registers `implementation` as one way to satisfy `dependency`
    ///
    /// Registering several implementations for the same dependency adds alternatives,
    /// the first one stays the one a single resolution returns.
    pub fn register(
        &mut self,
        dependency: TypeKey,
        implementation: TypeKey,
        lifetime: Lifetime,
    ) -> Result<&mut Self, RegistrationError> {
        self.check_registration(&dependency, &implementation)?;

        tracing::debug!("Registered {implementation} for {dependency} as {lifetime:?}");
        self.registrations
            .entry(dependency)
            .or_default()
            .push(ImplementationRecord {
                implementation,
                lifetime,
            });
        Ok(self)
    }

    /// Registers the component `I` for the dependency `D`, describing `I` if it is not known yet
    pub fn register_type<D, I>(&mut self, lifetime: Lifetime) -> Result<&mut Self, RegistrationError>
    where
        D: ?Sized + 'static,
        I: Component,
    {
        let implementation = TypeKey::of::<I>();
        if !self.catalog.contains_key(&implementation) {
            self.describe(I::describe());
        }

        self.register(TypeKey::of::<D>(), implementation, lifetime)
    }

    /// Registers an already created instance as a singleton implementation of `T`
    ///
    /// Adding several instances of `T` adds alternatives like [Registry::register] does,
    /// the first one stays the one a single resolution returns.
    /// Every instance is described under a key of its own, the first one that is free of
    /// `T`, `T (instance #1)`, `T (instance #2)`, ...
    pub fn add_instance<T: Injectable>(&mut self, instance: T) -> &mut Self {
        let dependency = TypeKey::of::<T>();
        let mut implementation = dependency.clone();
        let mut index = 0;
        while self.catalog.contains_key(&implementation) {
            index += 1;
            implementation = TypeKey::named(format!("{dependency} (instance #{index})"));
        }

        let object: AnyArc = Arc::new(Arc::new(instance));
        self.describe(
            TypeDescriptor::concrete_keyed::<T>(implementation.clone())
                .build()
                .with_constructor(Constructor::shared(object)),
        );

        tracing::debug!("Registered instance {implementation} for {dependency}");
        self.registrations
            .entry(dependency)
            .or_default()
            .push(ImplementationRecord {
                implementation,
                lifetime: Lifetime::Singleton,
            });
        self
    }

    pub fn descriptor(&self, key: &TypeKey) -> Option<&Arc<TypeDescriptor>> {
        self.catalog.get(key)
    }

    /// True if at least one implementation is registered directly for `key`
    pub fn is_registered(&self, key: &TypeKey) -> bool {
        self.registrations.contains_key(key)
    }

    /// All dependency keys with registrations
    pub fn dependencies(&self) -> impl Iterator<Item = &TypeKey> {
        self.registrations.keys()
    }

    /// Records registered directly for `key`
    pub fn records(&self, key: &TypeKey) -> &[ImplementationRecord] {
        self.registrations.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first registered implementation for `key`
    ///
    /// Closed generic keys without an exact registration fall back to the registrations
    /// of their generic definition.
    pub fn lookup(&self, key: &TypeKey) -> Option<Binding> {
        if let Some(record) = self.registrations.get(key).and_then(|records| records.first()) {
            return Some(Binding::exact(record.clone()));
        }

        let definition = key.generic_definition()?;
        self.registrations
            .get(&definition)?
            .iter()
            .find_map(|record| self.close_binding(record, key))
    }

    /// Every registered implementation for `key`, in registration order
    pub fn lookup_all(&self, key: &TypeKey) -> Vec<Binding> {
        if let Some(records) = self.registrations.get(key) {
            return records.iter().cloned().map(Binding::exact).collect();
        }

        key.generic_definition()
            .and_then(|definition| self.registrations.get(&definition))
            .map(|records| {
                records
                    .iter()
                    .filter_map(|record| self.close_binding(record, key))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Binds a described concrete type to itself
    ///
    /// Used for parameters naming a concrete type that has no registration of its own.
    pub fn self_binding(&self, key: &TypeKey) -> Option<Binding> {
        let (descriptor, type_args) = match self.catalog.get(key) {
            Some(descriptor) => (descriptor, Vec::new()),
            None => {
                let descriptor = self.catalog.get(&key.generic_definition()?)?;
                (descriptor, key.type_args().to_vec())
            }
        };

        if !descriptor.is_instantiable() || (descriptor.key().is_open() && type_args.is_empty()) {
            return None;
        }

        Some(Binding {
            record: ImplementationRecord {
                implementation: descriptor.key().clone(),
                lifetime: Lifetime::Transient,
            },
            type_args,
        })
    }

    /// Dependency `dependency` can be satisfied by the described `implementation`
    pub fn is_assignable(&self, dependency: &TypeKey, implementation: &TypeDescriptor) -> bool {
        if dependency == implementation.key() {
            return true;
        }

        let assignable = self.assignable_keys(implementation);
        match dependency {
            // Open pair: the definition has to show up among the implementation's supertypes
            TypeKey::Definition { arity, .. } => {
                matches!(implementation.key(), TypeKey::Definition { arity: own, .. } if own == arity)
                    && assignable.iter().any(|key| {
                        key == dependency || key.generic_definition().as_ref() == Some(dependency)
                    })
            }
            _ => assignable.contains(dependency),
        }
    }

    /// Every key `descriptor` is assignable to, nearest first
    ///
    /// Follows the capabilities of described interfaces and abstract types. Generic ones are
    /// described by their definition, its parameters are replaced by the arguments of the key
    /// that led there, so `Repo<T0>: IReadRepo<T0>` with `IReadRepo<T0>: IRepo<T0>` yields
    /// both `IReadRepo<T0>` and `IRepo<T0>`.
    pub fn assignable_keys(&self, descriptor: &TypeDescriptor) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = Vec::new();
        let mut pending: VecDeque<(TypeKey, usize)> =
            descriptor.satisfies().map(|key| (key.clone(), 1)).collect();
        while let Some((key, depth)) = pending.pop_front() {
            if keys.contains(&key) {
                continue;
            }
            if depth < MAX_SUPERTYPE_DEPTH {
                if let Some(supertype) = self.supertype(&key) {
                    pending.extend(supertype.satisfies().map(|next| (next.clone(), depth + 1)));
                }
            }
            keys.push(key);
        }
        keys
    }

    /// View of `concrete` as `dependency`
    ///
    /// The view is produced by the typed capability of the implementation naming `dependency`,
    /// or by a chain of typed capabilities through the interfaces in between.
    /// Any untyped link on the way leaves the instance without a view.
    pub(crate) fn view_of(
        &self,
        implementation: &TypeDescriptor,
        dependency: &TypeKey,
        concrete: &AnyArc,
    ) -> Option<AnyArc> {
        let mut seen = HashSet::new();
        let mut pending = VecDeque::from([(Cow::Borrowed(implementation), concrete.clone(), 0)]);
        while let Some((descriptor, object, depth)) = pending.pop_front() {
            for capability in descriptor.capabilities() {
                // An untyped link ends the chain
                let Some(view) = capability.cast().and_then(|cast| cast(&object)) else {
                    continue;
                };
                if capability.key() == dependency {
                    return Some(view);
                }
                if depth < MAX_SUPERTYPE_DEPTH && seen.insert(capability.key().clone()) {
                    if let Some(supertype) = self.supertype(capability.key()) {
                        pending.push_back((supertype, view, depth + 1));
                    }
                }
            }
        }

        None
    }

    /// Descriptor of a key an implementation is assignable to
    ///
    /// Closed generic keys without a description of their own use their definition, closed
    /// with the key's arguments.
    fn supertype(&self, key: &TypeKey) -> Option<Cow<'_, TypeDescriptor>> {
        if let Some(descriptor) = self.catalog.get(key) {
            return Some(Cow::Borrowed(&**descriptor));
        }
        let descriptor = self.catalog.get(&key.generic_definition()?)?;
        Some(Cow::Owned(descriptor.close(key.type_args())))
    }

    /// Freezes the registry into a resolver with default options
    pub fn freeze(self) -> Resolver {
        self.freeze_with(ResolverOptions::default())
    }

    pub fn freeze_with(self, options: ResolverOptions) -> Resolver {
        tracing::debug!(
            "Freezing registry with {} described types and {} dependencies",
            self.catalog.len(),
            self.registrations.len()
        );
        Resolver::new(self, options)
    }

    fn check_registration(
        &self,
        dependency: &TypeKey,
        implementation: &TypeKey,
    ) -> Result<(), RegistrationError> {
        if !dependency.is_bound() || dependency.element().is_some() {
            return Err(RegistrationError::UnresolvedType(dependency.clone()));
        }
        let Some(descriptor) = self.catalog.get(implementation) else {
            return Err(RegistrationError::UnresolvedType(implementation.clone()));
        };

        let not_instantiable = |reason| RegistrationError::NotInstantiable {
            implementation: implementation.clone(),
            reason,
        };
        match descriptor.kind() {
            TypeKind::Interface => return Err(not_instantiable("interfaces can not be constructed")),
            TypeKind::Abstract => return Err(not_instantiable("abstract types can not be constructed")),
            TypeKind::Concrete if descriptor.constructors().is_empty() => {
                return Err(not_instantiable("the type has no constructor"))
            }
            TypeKind::Concrete => {}
        }
        if implementation.is_open() && !dependency.is_open() {
            return Err(not_instantiable(
                "open generic definitions can only be registered for open generic definitions",
            ));
        }

        if !self.is_assignable(dependency, descriptor) {
            return Err(RegistrationError::NotAssignable {
                dependency: dependency.clone(),
                implementation: implementation.clone(),
            });
        }

        Ok(())
    }

    fn close_binding(&self, record: &ImplementationRecord, request: &TypeKey) -> Option<Binding> {
        let descriptor = self.catalog.get(&record.implementation)?;
        let type_args =
            descriptor.solve_type_args_through(request, &self.assignable_keys(descriptor))?;

        Some(Binding {
            record: record.clone(),
            type_args,
        })
    }
}
