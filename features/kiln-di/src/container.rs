use std::{collections::HashMap, fmt::Debug, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{
    context::ResolutionContext,
    dependency_graph::{DependencyGraph, DependencyGraphErrors, Planner},
    errors::ResolveError,
    registry::Registry,
    types::{Instance, TypeKey},
};

/// Options of a [Resolver]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions { max_depth: 128 }
    }
}

impl ResolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deepest dependency chain a single resolution may walk before failing
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Singletons are cached per dependency and implementation
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) struct CacheKey {
    pub dependency: TypeKey,
    pub implementation: TypeKey,
}

/// Resolves instances from a frozen [Registry]
///
/// Cheap to clone, all clones share the registry and the singleton cache.
#[derive(Clone)]
pub struct Resolver(pub(crate) Arc<ResolverInner>);
pub(crate) struct ResolverInner {
    pub(crate) registry: Registry,
    pub(crate) options: ResolverOptions,
    pub(crate) planner: Planner,
    singletons: RwLock<HashMap<CacheKey, Arc<OnceCell<Instance>>>>,
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("Resolver");
        for dependency in self.0.registry.dependencies() {
            let implementations: Vec<String> = self
                .0
                .registry
                .records(dependency)
                .iter()
                .map(|record| format!("{} ({:?})", record.implementation(), record.lifetime()))
                .collect();
            map.field(&dependency.to_string(), &implementations);
        }
        map.field("cached_singletons", &self.cached_singletons());
        map.finish()
    }
}

impl Resolver {
    pub(crate) fn new(registry: Registry, options: ResolverOptions) -> Self {
        Self(Arc::new(ResolverInner {
            planner: Planner::new(options.max_depth()),
            registry,
            options,
            singletons: RwLock::new(HashMap::new()),
        }))
    }

    /// Resolves an instance of `key`
    ///
    /// Sequence keys resolve to an instance holding every registered implementation.
    pub fn resolve(&self, key: &TypeKey) -> Result<Instance, ResolveError> {
        let result = ResolutionContext::new(&self.0).resolve_internal(key);
        if let Err(error) = &result {
            tracing::error!("Failed to resolve {key}: {error}");
        }
        result
    }

    /// Resolves every registered implementation of `key`, in registration order
    ///
    /// Returns an empty list if nothing is registered.
    pub fn resolve_all(&self, key: &TypeKey) -> Result<Vec<Instance>, ResolveError> {
        let sequence = self.resolve(&TypeKey::sequence_of(key.clone()))?;
        Ok(sequence.items().to_vec())
    }

    /// Resolves `T` and downcasts it
    pub fn resolve_as<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve(&TypeKey::of::<T>())?.get::<T>()
    }

    /// Resolves every implementation of `T` and downcasts them
    pub fn resolve_all_as<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<Arc<T>>, ResolveError> {
        self.resolve(&TypeKey::all_of::<T>())?.collect::<T>()
    }

    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.0.options
    }

    /// Number of singletons constructed so far
    pub fn cached_singletons(&self) -> usize {
        self.0
            .singletons
            .read()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Static graph of every registered dependency
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::new(&self.0)
    }

    /// Checks every registered dependency for missing parameters and cycles
    ///
    /// Returns all issues at once instead of failing on the first resolution.
    pub fn validate(&self) -> Result<(), DependencyGraphErrors> {
        self.dependency_graph().check()
    }
}

impl ResolverInner {
    /// Cell holding the singleton for `key`, created empty on first access
    pub(crate) fn singleton_cell(&self, key: CacheKey) -> Arc<OnceCell<Instance>> {
        if let Some(cell) = self.singletons.read().get(&key) {
            return cell.clone();
        }

        self.singletons.write().entry(key).or_default().clone()
    }
}
