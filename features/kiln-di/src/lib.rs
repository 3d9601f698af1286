//! Kiln DI resolves object graphs from registered implementations.
//!
//! Kiln DI is split into two major parts:
//! 1. Registry: Describes types and registers implementations for dependencies
//! 2. Resolver: The frozen registry, constructs instances and caches singletons
//!
//! Types are identified by [TypeKey]s and described by [TypeDescriptor]s,
//! so interfaces, trait objects and generic definitions can all be modelled without reflection.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use kiln_di::{Lifetime, Registry, TypeDescriptor, TypeKey};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "Hello".to_string()
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry
//!     .describe(TypeDescriptor::interface(TypeKey::of::<dyn Greeter>()))
//!     .describe(
//!         TypeDescriptor::concrete::<English>()
//!             .satisfies::<dyn Greeter>(|it| it)
//!             .constructor(|| English),
//!     );
//! registry
//!     .register(TypeKey::of::<dyn Greeter>(), TypeKey::of::<English>(), Lifetime::Singleton)
//!     .unwrap();
//!
//! let resolver = registry.freeze();
//! let greeter = resolver.resolve_as::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "Hello");
//! ```
//!
//! Kiln DI consists of the following components:
//!
//! 1. Types - keys, lifetimes and resolved instances
//! 2. Descriptor - what the container knows about a type
//! 3. Registry - registration and lookup
//! 4. Container - the resolver and its singleton cache
//! 5. Dependency Graph - constructor selection and static validation
//! 6. Inject - argument types constructors can ask for

pub mod container;
mod context;
pub mod dependency_graph;
pub mod descriptor;
pub mod errors;
pub mod factories;
pub mod inject;
pub mod registry;
pub mod types;

pub use container::{Resolver, ResolverOptions};
pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphErrors};
pub use descriptor::{Capability, Component, ConcreteBuilder, TypeDescriptor, TypeKind};
pub use errors::{RegistrationError, ResolveError};
pub use factories::{Arguments, Constructor, ConstructorFn};
pub use inject::Inject;
pub use registry::{Binding, ImplementationRecord, Registry};
pub use types::{DynError, Injectable, Instance, Lifetime, TypeKey};
