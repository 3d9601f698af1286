use std::{
    any::{type_name, Any},
    borrow::Cow,
    fmt,
    sync::Arc,
};

use crate::errors::ResolveError;

/// All errors must be Send + Sync, factories may run on any thread
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Type erased object as it is stored by the container
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Resolution can happen on any thread
/// So anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Lifetime policy of a registration
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A new instance is constructed on every resolution
    #[default]
    Transient,
    /// One instance per resolver, constructed on first resolution
    Singleton,
}

/// Identifier of a type known to the container
///
/// Keys are plain data, the container never inspects the Rust types behind them.
/// [TypeKey::of] derives a key from a Rust type (sized or `dyn Trait`),
/// the other constructors model generic shapes explicitly.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeKey {
    /// A closed, non generic type
    Named(Cow<'static, str>),
    /// A closed instantiation of a generic type, e.g. `Repository<User>`
    Generic {
        name: Cow<'static, str>,
        args: Vec<TypeKey>,
    },
    /// An open generic type definition, e.g. `Repository<_>`
    Definition {
        name: Cow<'static, str>,
        arity: usize,
    },
    /// Type parameter placeholder inside the descriptor of a generic definition
    Parameter(usize),
    /// All registered implementations of the element type
    Sequence(Box<TypeKey>),
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> TypeKey {
        TypeKey::Named(Cow::Borrowed(type_name::<T>()))
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> TypeKey {
        TypeKey::Named(name.into())
    }

    pub fn generic(
        name: impl Into<Cow<'static, str>>,
        args: impl IntoIterator<Item = TypeKey>,
    ) -> TypeKey {
        TypeKey::Generic {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn definition(name: impl Into<Cow<'static, str>>, arity: usize) -> TypeKey {
        TypeKey::Definition {
            name: name.into(),
            arity,
        }
    }

    pub fn param(index: usize) -> TypeKey {
        TypeKey::Parameter(index)
    }

    pub fn sequence_of(element: TypeKey) -> TypeKey {
        TypeKey::Sequence(Box::new(element))
    }

    /// Shorthand for a sequence of the key of `T`
    pub fn all_of<T: ?Sized + 'static>() -> TypeKey {
        TypeKey::sequence_of(TypeKey::of::<T>())
    }

    /// True for open generic definitions
    pub fn is_open(&self) -> bool {
        matches!(self, TypeKey::Definition { .. })
    }

    /// True if no type parameter placeholder is left anywhere in the key
    pub fn is_bound(&self) -> bool {
        match self {
            TypeKey::Parameter(_) => false,
            TypeKey::Generic { args, .. } => args.iter().all(TypeKey::is_bound),
            TypeKey::Sequence(element) => element.is_bound(),
            TypeKey::Named(_) | TypeKey::Definition { .. } => true,
        }
    }

    /// True if the key names a single constructible type shape
    ///
    /// Open definitions and parameter placeholders, also nested ones, are not closed.
    pub fn is_closed(&self) -> bool {
        match self {
            TypeKey::Named(_) => true,
            TypeKey::Generic { args, .. } => args.iter().all(TypeKey::is_closed),
            TypeKey::Sequence(element) => element.is_closed(),
            TypeKey::Parameter(_) | TypeKey::Definition { .. } => false,
        }
    }

    /// Element type of a sequence shape
    pub fn element(&self) -> Option<&TypeKey> {
        match self {
            TypeKey::Sequence(element) => Some(&**element),
            _ => None,
        }
    }

    /// The open definition a closed generic instantiation was made from
    pub fn generic_definition(&self) -> Option<TypeKey> {
        match self {
            TypeKey::Generic { name, args } => Some(TypeKey::Definition {
                name: name.clone(),
                arity: args.len(),
            }),
            _ => None,
        }
    }

    /// Type arguments of a closed generic instantiation
    pub fn type_args(&self) -> &[TypeKey] {
        match self {
            TypeKey::Generic { args, .. } => args,
            _ => &[],
        }
    }

    /// Closes an open definition with the given arguments
    ///
    /// Returns None if this is not a definition or the arity does not match
    pub fn close(&self, args: &[TypeKey]) -> Option<TypeKey> {
        match self {
            TypeKey::Definition { name, arity } if *arity == args.len() && *arity > 0 => {
                Some(TypeKey::Generic {
                    name: name.clone(),
                    args: args.to_vec(),
                })
            }
            _ => None,
        }
    }

    /// Replaces every parameter placeholder with the argument at its index
    pub fn substitute(&self, args: &[TypeKey]) -> TypeKey {
        match self {
            TypeKey::Parameter(index) => args.get(*index).cloned().unwrap_or_else(|| self.clone()),
            TypeKey::Generic { name, args: inner } => TypeKey::Generic {
                name: name.clone(),
                args: inner.iter().map(|arg| arg.substitute(args)).collect(),
            },
            TypeKey::Sequence(element) => TypeKey::Sequence(Box::new(element.substitute(args))),
            TypeKey::Named(_) | TypeKey::Definition { .. } => self.clone(),
        }
    }

    /// Matches this pattern against a closed key, binding parameter placeholders
    ///
    /// A placeholder that is already bound must match the same type again.
    pub fn unify(&self, closed: &TypeKey, solved: &mut [Option<TypeKey>]) -> bool {
        match (self, closed) {
            (TypeKey::Parameter(index), _) => match solved.get_mut(*index) {
                Some(Some(bound)) => *bound == *closed,
                Some(slot) => {
                    *slot = Some(closed.clone());
                    true
                }
                None => false,
            },
            (
                TypeKey::Generic { name, args },
                TypeKey::Generic {
                    name: closed_name,
                    args: closed_args,
                },
            ) => {
                name == closed_name
                    && args.len() == closed_args.len()
                    && args
                        .iter()
                        .zip(closed_args)
                        .all(|(pattern, arg)| pattern.unify(arg, solved))
            }
            (TypeKey::Sequence(pattern), TypeKey::Sequence(element)) => {
                pattern.unify(element, solved)
            }
            _ => self == closed,
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Named(name) => f.write_str(name),
            TypeKey::Generic { name, args } => {
                write!(f, "{name}<")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            TypeKey::Definition { name, arity } => {
                let holes = vec!["_"; *arity].join(", ");
                write!(f, "{name}<{holes}>")
            }
            TypeKey::Parameter(index) => write!(f, "T{index}"),
            TypeKey::Sequence(element) => write!(f, "[{element}]"),
        }
    }
}

/// A resolved object, or the ordered result of a sequence request
#[derive(Clone)]
pub struct Instance {
    implementation: TypeKey,
    value: Value,
}

#[derive(Clone)]
enum Value {
    Object {
        /// Holds an `Arc<Impl>`
        concrete: AnyArc,
        /// Holds an `Arc<dyn Dependency>` if the registration provided a cast
        view: Option<AnyArc>,
    },
    Sequence(Arc<[Instance]>),
}

impl Instance {
    pub(crate) fn object(implementation: TypeKey, concrete: AnyArc, view: Option<AnyArc>) -> Self {
        Instance {
            implementation,
            value: Value::Object { concrete, view },
        }
    }

    pub(crate) fn sequence(key: TypeKey, items: Vec<Instance>) -> Self {
        Instance {
            implementation: key,
            value: Value::Sequence(items.into()),
        }
    }

    /// Key of the constructed implementation, or the sequence key
    pub fn implementation(&self) -> &TypeKey {
        &self.implementation
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.value, Value::Sequence(_))
    }

    /// Elements of a sequence, empty for single objects
    pub fn items(&self) -> &[Instance] {
        match &self.value {
            Value::Sequence(items) => items,
            Value::Object { .. } => &[],
        }
    }

    /// Typed access to the object
    ///
    /// `T` may be the implementation type or a trait object the registration provided a cast for.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let found = match &self.value {
            Value::Object { concrete, view } => view
                .iter()
                .chain(std::iter::once(concrete))
                .find_map(|object| (**object).downcast_ref::<Arc<T>>())
                .cloned(),
            Value::Sequence(_) => None,
        };

        found.ok_or_else(|| ResolveError::DowncastFailed {
            required: type_name::<T>(),
            actual: self.implementation.clone(),
        })
    }

    /// Typed access to every element of a sequence
    pub fn collect<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveError> {
        match &self.value {
            Value::Sequence(items) => items.iter().map(Instance::get::<T>).collect(),
            Value::Object { .. } => Err(ResolveError::DowncastFailed {
                required: type_name::<Vec<Arc<T>>>(),
                actual: self.implementation.clone(),
            }),
        }
    }

    /// True if both instances share the same underlying object
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        match (&self.value, &other.value) {
            (Value::Object { concrete: a, .. }, Value::Object { concrete: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (Value::Sequence(a), Value::Sequence(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Object { view, .. } => f
                .debug_struct("Instance")
                .field("implementation", &format_args!("{}", self.implementation))
                .field("view", &view.is_some())
                .finish(),
            Value::Sequence(items) => f
                .debug_struct("Instance")
                .field("sequence", &format_args!("{}", self.implementation))
                .field("items", items)
                .finish(),
        }
    }
}
