use std::{ops::Deref, sync::Arc};

use kiln_di::{Inject, Instance, ResolveError, TypeKey};

/// A wrapper type to allow for config injections
///
/// Configs added to a [ConfigProvider](crate::provider::ConfigProvider) are installed
/// into the registry as `Config<T>`, so constructors can take them as an argument.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use kiln_config::{config::Config, provider::ConfigProvider};
/// use kiln_di::{Registry, TypeDescriptor};
///
/// struct MailConfig {
///     relay: String,
/// }
///
/// struct Mailer {
///     relay: String,
/// }
///
/// let mut provider = ConfigProvider::initialize();
/// provider
///     .add_config(MailConfig {
///         relay: "smtp.local".to_string(),
///     })
///     .unwrap();
///
/// let mut registry = Registry::new();
/// provider.install(&mut registry);
/// registry.describe(TypeDescriptor::concrete::<Mailer>().constructor(
///     |config: Config<MailConfig>| Mailer {
///         relay: config.relay.clone(),
///     },
/// ));
///
/// let mailer = registry.freeze().resolve_as::<Mailer>().unwrap();
/// assert_eq!(mailer.relay, "smtp.local");
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}

impl<T> Config<T> {
    pub(crate) fn new(inner: Arc<T>) -> Self {
        Config { inner }
    }

    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

// Manual impl, T itself does not have to be Clone
impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Inject for Config<T> {
    fn key() -> TypeKey {
        TypeKey::of::<Config<T>>()
    }

    fn from_instance(instance: Instance) -> Result<Self, ResolveError> {
        let config = instance.get::<Config<T>>()?;
        Ok(Config::clone(&config))
    }
}
