use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    container::ResolverInner,
    descriptor::TypeDescriptor,
    errors::format_chain,
    factories::Constructor,
    registry::{Binding, Registry},
    types::TypeKey,
};

/// A closed implementation together with the constructor resolution will use
pub(crate) struct Plan {
    descriptor: TypeDescriptor,
    constructor: Option<usize>,
}

impl Plan {
    pub(crate) fn key(&self) -> &TypeKey {
        self.descriptor.key()
    }

    pub(crate) fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// None if no constructor has all of its parameters available
    pub(crate) fn constructor(&self) -> Option<&Constructor> {
        self.constructor
            .map(|index| &self.descriptor.constructors()[index])
    }

    pub(crate) fn params(&self) -> &[TypeKey] {
        self.constructor()
            .map(Constructor::params)
            .unwrap_or_default()
    }
}

/// Caches constructor selection and cycle reachability of a frozen registry
///
/// The registry never changes after freezing, so both answers are computed once per key.
/// Checking whether a constructor can be satisfied follows self-bound parameters at most
/// `max_depth` levels down, anything deeper counts as unsatisfiable.
pub(crate) struct Planner {
    max_depth: usize,
    plans: RwLock<HashMap<TypeKey, Arc<Plan>>>,
    cycles: RwLock<HashMap<TypeKey, bool>>,
}

impl Planner {
    pub(crate) fn new(max_depth: usize) -> Self {
        Planner {
            max_depth,
            plans: RwLock::default(),
            cycles: RwLock::default(),
        }
    }

    /// Plan for the implementation of `binding`, None if it is not described
    pub(crate) fn plan(&self, registry: &Registry, binding: &Binding) -> Option<Arc<Plan>> {
        let key = binding.implementation();
        if let Some(plan) = self.plans.read().get(&key) {
            return Some(plan.clone());
        }

        let descriptor = registry
            .descriptor(binding.record().implementation())?
            .close(binding.type_args());
        let mut visiting = Visiting::new(self.max_depth);
        let constructor = select_constructor(registry, &descriptor, &mut visiting);
        if constructor.is_none() {
            tracing::debug!("No constructor of {key} can be satisfied");
        }

        let plan = Arc::new(Plan {
            descriptor,
            constructor,
        });
        self.plans.write().insert(key, plan.clone());
        Some(plan)
    }

    /// Plans of every implementation resolving `key` would construct
    fn plans_for(&self, registry: &Registry, key: &TypeKey) -> Vec<Arc<Plan>> {
        match key.element() {
            Some(element) => registry
                .lookup_all(element)
                .iter()
                .filter_map(|binding| self.plan(registry, binding))
                .collect(),
            None => registry
                .lookup(key)
                .or_else(|| registry.self_binding(key))
                .and_then(|binding| self.plan(registry, &binding))
                .into_iter()
                .collect(),
        }
    }

    fn edges(&self, registry: &Registry, key: &TypeKey) -> Vec<TypeKey> {
        self.plans_for(registry, key)
            .iter()
            .flat_map(|plan| plan.params().iter().cloned())
            .collect()
    }

    /// True if resolving `key` runs into a circular dependency somewhere below it
    ///
    /// Walks are cut off at `max_depth`, resolution fails there anyway.
    pub(crate) fn reaches_cycle(&self, registry: &Registry, key: &TypeKey, max_depth: usize) -> bool {
        let mut walk = CycleWalk {
            path: Vec::new(),
            truncated: false,
            max_depth,
        };
        self.walk(registry, key, &mut walk)
    }

    fn walk(&self, registry: &Registry, key: &TypeKey, walk: &mut CycleWalk) -> bool {
        if walk.path.contains(key) {
            return true;
        }
        if let Some(found) = self.cycles.read().get(key) {
            return *found;
        }
        if walk.path.len() >= walk.max_depth {
            walk.truncated = true;
            return false;
        }

        walk.path.push(key.clone());
        let found = self
            .edges(registry, key)
            .iter()
            .any(|next| self.walk(registry, next, walk));
        walk.path.pop();

        // A cut off walk only knows about the part it has seen
        if found || !walk.truncated {
            self.cycles.write().insert(key.clone(), found);
        }
        found
    }
}

struct CycleWalk {
    path: Vec<TypeKey>,
    truncated: bool,
    max_depth: usize,
}

/// Implementations whose constructors are currently being checked
struct Visiting {
    keys: HashSet<TypeKey>,
    max_depth: usize,
}

impl Visiting {
    fn new(max_depth: usize) -> Self {
        Visiting {
            keys: HashSet::new(),
            max_depth,
        }
    }

    fn exhausted(&self) -> bool {
        self.keys.len() >= self.max_depth
    }
}

/// Index of the constructor with the most parameters that can all be resolved
///
/// Ties go to the constructor declared first.
fn select_constructor(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    visiting: &mut Visiting,
) -> Option<usize> {
    visiting.keys.insert(descriptor.key().clone());

    let mut selected: Option<(usize, usize)> = None;
    for (index, constructor) in descriptor.constructors().iter().enumerate() {
        let count = constructor.params().len();
        if selected.is_some_and(|(_, best)| count <= best) {
            continue;
        }
        if constructor
            .params()
            .iter()
            .all(|param| is_satisfiable(registry, param, visiting))
        {
            selected = Some((index, count));
        }
    }

    visiting.keys.remove(descriptor.key());
    selected.map(|(index, _)| index)
}

/// Parameters of `descriptor` that keep at least one of its constructors from being used
fn unsatisfiable_params(
    registry: &Registry,
    descriptor: &TypeDescriptor,
    max_depth: usize,
) -> Vec<TypeKey> {
    let mut visiting = Visiting::new(max_depth);
    visiting.keys.insert(descriptor.key().clone());
    let mut missing = Vec::new();
    for param in descriptor.constructors().iter().flat_map(Constructor::params) {
        if !missing.contains(param) && !is_satisfiable(registry, param, &mut visiting) {
            missing.push(param.clone());
        }
    }
    missing
}

fn is_satisfiable(registry: &Registry, param: &TypeKey, visiting: &mut Visiting) -> bool {
    // Sequences may be empty
    if param.element().is_some() || registry.lookup(param).is_some() {
        return true;
    }
    // Already being checked further up, resolution reports the cycle
    if visiting.keys.contains(param) {
        return true;
    }
    // Self-bound generics can keep producing new keys, resolution could never get this deep
    if visiting.exhausted() {
        return false;
    }

    let Some(binding) = registry.self_binding(param) else {
        return false;
    };
    let Some(descriptor) = registry.descriptor(binding.record().implementation()) else {
        return false;
    };
    select_constructor(registry, &descriptor.close(binding.type_args()), visiting).is_some()
}

/// Static graph of a frozen registry
///
/// Contains every closed registered dependency and everything reachable from them.
/// Used to find missing dependencies and cycles before anything is resolved.
pub struct DependencyGraph {
    map: BTreeMap<TypeKey, DependencyGraphEntry>,
}

impl DependencyGraph {
    pub(crate) fn new(resolver: &ResolverInner) -> Self {
        let registry = &resolver.registry;
        let mut graph = Self {
            map: Default::default(),
        };

        let mut pending: Vec<TypeKey> = registry
            .dependencies()
            .filter(|key| !key.is_open())
            .cloned()
            .collect();
        while let Some(key) = pending.pop() {
            if graph.map.contains_key(&key) {
                continue;
            }

            let plans = resolver.planner.plans_for(registry, &key);
            let mut entry = DependencyGraphEntry {
                implementations: plans.iter().map(|plan| plan.key().clone()).collect(),
                dependencies: Vec::new(),
                missing: Vec::new(),
            };
            for plan in &plans {
                if plan.constructor().is_none() {
                    let max_depth = resolver.options.max_depth();
                    entry.missing.extend(
                        unsatisfiable_params(registry, plan.descriptor(), max_depth)
                            .into_iter()
                            .map(|dependency| (plan.key().clone(), dependency)),
                    );
                }
                for param in plan.params() {
                    if !entry.dependencies.contains(param) {
                        entry.dependencies.push(param.clone());
                    }
                }
            }

            pending.extend(entry.dependencies.iter().cloned());
            graph.map.insert(key, entry);
        }

        graph
    }

    /// Keys the constructors selected for `key` depend on
    pub fn dependencies_of(&self, key: &TypeKey) -> Option<&[TypeKey]> {
        self.map.get(key).map(|entry| entry.dependencies.as_slice())
    }

    /// Implementations resolving `key` constructs
    pub fn implementations_of(&self, key: &TypeKey) -> Option<&[TypeKey]> {
        self.map.get(key).map(|entry| entry.implementations.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();
        for (key, entry) in &self.map {
            errors.extend(entry.missing.iter().map(|(required_by, dependency)| {
                DependencyGraphError::MissingDependency {
                    dependency: dependency.clone(),
                    required_by: required_by.clone(),
                }
            }));

            let mut dependency_chain = Vec::new();
            check_recurse(self, &mut checked, &mut errors, &mut dependency_chain, key);
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse(
            graph: &DependencyGraph,
            checked: &mut HashSet<TypeKey>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<TypeKey>,
            key: &TypeKey,
        ) {
            // Circular Dependency Check
            if let Some(from) = dependency_chain.first().cloned() {
                if dependency_chain.contains(key) {
                    let mut chain = dependency_chain.clone();
                    chain.push(key.clone()); // Add current so chain is complete

                    errors.push(DependencyGraphError::CircularDependency {
                        from,
                        to: key.clone(),
                        chain,
                    });
                    return;
                }
            }

            // Skip other checks if already checked
            if !checked.insert(key.clone()) {
                return;
            };

            let Some(entry) = graph.map.get(key) else {
                return;
            };

            dependency_chain.push(key.clone());
            for dependency in &entry.dependencies {
                check_recurse(graph, checked, errors, dependency_chain, dependency);
            }
            dependency_chain.pop();
        }
    }
}

struct DependencyGraphEntry {
    implementations: Vec<TypeKey>,
    dependencies: Vec<TypeKey>,
    /// Implementation and the parameter it can not get
    missing: Vec<(TypeKey, TypeKey)>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: TypeKey,
        required_by: TypeKey,
    },
    #[error("A Circular Dependency exists between '{from}' and '{to}' through {}", format_chain(.chain))]
    CircularDependency {
        from: TypeKey,
        to: TypeKey,
        chain: Vec<TypeKey>,
    },
}

impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
