use crate::{
    errors::ResolveError,
    types::{Instance, TypeKey},
};

pub mod arc;

/// Argument types a constructor closure can ask for
///
/// Maps the Rust argument type to the key it depends on,
/// and extracts the argument from the resolved instance.
pub trait Inject: Sized + 'static {
    /// The dependency this argument is resolved from
    fn key() -> TypeKey;

    fn from_instance(instance: Instance) -> Result<Self, ResolveError>;
}
