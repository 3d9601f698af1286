use kiln_di::TypeKey;

/// Errors of the [ConfigProvider](crate::provider::ConfigProvider)
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A config of this type was added before
    #[error("The config '{0}' is already registered")]
    AlreadyRegistered(TypeKey),
    /// The required config is not known
    #[error("The config '{0}' is not known")]
    Missing(TypeKey),
}
