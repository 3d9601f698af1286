use std::sync::Arc;

use thiserror::Error;

use crate::types::{DynError, TypeKey};

/// Errors when registering an implementation
///
/// A failed registration leaves the registry untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// One of the keys does not denote a known, fully bound type
    #[error("'{0}' is unresolved - describe the type before registering it")]
    UnresolvedType(TypeKey),
    /// The implementation can not be constructed
    #[error("'{implementation}' can not be instantiated: {reason}")]
    NotInstantiable {
        implementation: TypeKey,
        reason: &'static str,
    },
    /// The implementation does not satisfy the dependency
    #[error("'{implementation}' is not assignable to '{dependency}'")]
    NotAssignable {
        dependency: TypeKey,
        implementation: TypeKey,
    },
}

/// Errors while resolving an instance
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Nothing is registered for the requested type
    #[error("No implementation is registered for '{0}'")]
    UnregisteredDependency(TypeKey),
    /// Open definitions and parameter placeholders never get instantiated as they are
    #[error("'{0}' is not a closed type and can not be resolved")]
    OpenType(TypeKey),
    /// None of the constructors has only resolvable parameters
    #[error("'{implementation}' has no constructor whose parameters can all be resolved")]
    UnsatisfiableConstructor { implementation: TypeKey },
    /// The type is already being resolved further up the chain
    #[error("Circular dependency: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<TypeKey> },
    /// The dependency chain is deeper than the configured limit
    #[error("Resolving '{key}' exceeded the maximum depth of {max_depth}")]
    ResolutionTooDeep { key: TypeKey, max_depth: usize },
    /// A constructor returned an error
    #[error("Factory for '{implementation}' failed - error: {error}")]
    FactoryFailed {
        implementation: TypeKey,
        error: Arc<DynError>,
    },
    #[error("Failed to downcast, required: '{required}' actual: '{actual}'")]
    DowncastFailed {
        required: &'static str,
        actual: TypeKey,
    },
    /// A constructor consumed more arguments than it declared
    #[error("Constructor of '{implementation}' asked for argument #{index} but only declared {declared}")]
    MissingArgument {
        implementation: TypeKey,
        index: usize,
        declared: usize,
    },
}

pub(crate) fn format_chain(chain: &[TypeKey]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
