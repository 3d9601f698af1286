use std::sync::Arc;

use crate::{
    errors::ResolveError,
    inject::Inject,
    types::{Instance, TypeKey},
};

impl<T: ?Sized + Send + Sync + 'static> Inject for Arc<T> {
    fn key() -> TypeKey {
        TypeKey::of::<T>()
    }

    fn from_instance(instance: Instance) -> Result<Self, ResolveError> {
        instance.get::<T>()
    }
}

// All registered implementations, in registration order
impl<T: ?Sized + Send + Sync + 'static> Inject for Vec<Arc<T>> {
    fn key() -> TypeKey {
        TypeKey::all_of::<T>()
    }

    fn from_instance(instance: Instance) -> Result<Self, ResolveError> {
        instance.collect::<T>()
    }
}
