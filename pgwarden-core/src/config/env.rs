//! Process environment configuration store.

use super::{ConfigKey, ConfigStore};

/// Reads configuration from environment variables.
///
/// With prefix `PGWARDEN_`, [`ConfigKey::Host`] is read from
/// `PGWARDEN_DB_HOST`. The environment is consulted on every lookup.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    /// Creates a store reading `<prefix><KEY>` variables.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The environment variable name for `key`.
    pub fn variable_name(&self, key: ConfigKey) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }
}

impl ConfigStore for EnvConfig {
    fn get(&self, key: ConfigKey) -> Option<String> {
        std::env::var(self.variable_name(key)).ok()
    }
}
