use crate::{
    container::{CacheKey, ResolverInner},
    dependency_graph::Plan,
    errors::ResolveError,
    factories::Arguments,
    registry::Binding,
    types::{Instance, Lifetime, TypeKey},
};

/// State of one top level resolution
///
/// The stack holds every key currently being resolved, it is never shared between calls.
pub(crate) struct ResolutionContext<'r> {
    resolver: &'r ResolverInner,
    stack: Vec<TypeKey>,
}

impl<'r> ResolutionContext<'r> {
    pub(crate) fn new(resolver: &'r ResolverInner) -> Self {
        ResolutionContext {
            resolver,
            stack: Vec::new(),
        }
    }

    pub(crate) fn resolve_internal(&mut self, key: &TypeKey) -> Result<Instance, ResolveError> {
        if !key.is_closed() {
            return Err(ResolveError::OpenType(key.clone()));
        }

        // Circular Dependency Check
        if let Some(position) = self.stack.iter().position(|entry| entry == key) {
            let mut chain = self.stack[position..].to_vec();
            chain.push(key.clone());
            return Err(ResolveError::CircularDependency { chain });
        }

        let max_depth = self.resolver.options.max_depth();
        if self.stack.len() >= max_depth {
            return Err(ResolveError::ResolutionTooDeep {
                key: key.clone(),
                max_depth,
            });
        }

        self.stack.push(key.clone());
        let result = self.resolve_node(key);
        self.stack.pop();

        result
    }

    fn resolve_node(&mut self, key: &TypeKey) -> Result<Instance, ResolveError> {
        let resolver = self.resolver;
        let registry = &resolver.registry;

        if let TypeKey::Sequence(element) = key {
            let bindings = registry.lookup_all(element);
            tracing::trace!("Resolving {} implementations of {element}", bindings.len());

            let mut items = Vec::with_capacity(bindings.len());
            for binding in &bindings {
                items.push(self.activate(element, binding)?);
            }
            return Ok(Instance::sequence(key.clone(), items));
        }

        let binding = registry
            .lookup(key)
            .or_else(|| registry.self_binding(key))
            .ok_or_else(|| ResolveError::UnregisteredDependency(key.clone()))?;

        self.activate(key, &binding)
    }

    /// Returns the cached singleton or constructs a new instance
    fn activate(&mut self, dependency: &TypeKey, binding: &Binding) -> Result<Instance, ResolveError> {
        let resolver = self.resolver;
        let plan = resolver
            .planner
            .plan(&resolver.registry, binding)
            .ok_or_else(|| ResolveError::UnregisteredDependency(dependency.clone()))?;

        // Frames reaching a cycle always fail - they skip the cell so no lock is held while failing
        let frame = self.stack.last().unwrap_or(dependency);
        let cacheable = binding.lifetime() == Lifetime::Singleton
            && !resolver.planner.reaches_cycle(
                &resolver.registry,
                frame,
                resolver.options.max_depth(),
            );
        if !cacheable {
            return self.construct(dependency, &plan);
        }

        let cell = resolver.singleton_cell(CacheKey {
            dependency: dependency.clone(),
            implementation: plan.key().clone(),
        });
        if let Some(instance) = cell.get() {
            tracing::trace!("Using cached singleton {} for {dependency}", plan.key());
            return Ok(instance.clone());
        }

        cell.get_or_try_init(|| self.construct(dependency, &plan))
            .cloned()
    }

    fn construct(&mut self, dependency: &TypeKey, plan: &Plan) -> Result<Instance, ResolveError> {
        let implementation = plan.key();
        let constructor = plan
            .constructor()
            .ok_or_else(|| ResolveError::UnsatisfiableConstructor {
                implementation: implementation.clone(),
            })?;

        let mut values = Vec::with_capacity(constructor.params().len());
        for param in constructor.params() {
            values.push(self.resolve_internal(param)?);
        }

        let concrete = constructor
            .build(&mut Arguments::new(implementation, values))
            .map_err(|error| ResolveError::FactoryFailed {
                implementation: implementation.clone(),
                error: error.into(),
            })?;
        let view = self
            .resolver
            .registry
            .view_of(plan.descriptor(), dependency, &concrete);

        tracing::debug!("Constructed instance of {implementation} for {dependency}");
        Ok(Instance::object(implementation.clone(), concrete, view))
    }
}
