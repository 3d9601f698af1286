use std::{
    any::Any,
    collections::BTreeMap,
    sync::Arc,
};

use kiln_di::{Registry, TypeKey};

use crate::{config::Config, errors::ConfigError};

type Installer = Box<dyn Fn(&mut Registry) + Send + Sync + 'static>;

struct ConfigEntry {
    value: Arc<dyn Any + Send + Sync + 'static>,
    install: Installer,
}

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type,
/// and installed into a [Registry] to be injected as [Config].
#[derive(Default)]
pub struct ConfigProvider {
    configs: BTreeMap<TypeKey, ConfigEntry>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn initialize() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    ///
    /// If the config type is not available, it will return [ConfigError::Missing]
    pub fn get_config<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigError> {
        let key = TypeKey::of::<T>();

        self.configs
            .get(&key)
            .and_then(|entry| entry.value.clone().downcast().ok())
            .ok_or(ConfigError::Missing(key))
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return
    /// [ConfigError::AlreadyRegistered]
    pub fn add_config<T: Send + Sync + 'static>(
        &mut self,
        config: T,
    ) -> Result<&mut Self, ConfigError> {
        let key = TypeKey::of::<T>();

        if self.configs.contains_key(&key) {
            return Err(ConfigError::AlreadyRegistered(key));
        }

        let config = Arc::new(config);
        let shared = config.clone();
        self.configs.insert(
            key,
            ConfigEntry {
                value: config,
                install: Box::new(move |registry| {
                    registry.add_instance(Config::new(shared.clone()));
                }),
            },
        );
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Send + Sync + 'static>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.configs.contains_key(&TypeKey::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Registers every config as a singleton `Config<T>` instance
    pub fn install(&self, registry: &mut Registry) {
        for (key, entry) in &self.configs {
            (entry.install)(registry);
            tracing::debug!("Installed config {key}");
        }
    }
}
