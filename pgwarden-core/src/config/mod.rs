//! Injected, read-only configuration lookup.
//!
//! Lifecycle operations never consult a global. They receive an
//! `Arc<dyn ConfigStore>` at construction and read every value fresh on
//! each call, so a change in the underlying store is observed by the next
//! operation.
//!
//! # Module Structure
//! - `memory`: in-memory store, optionally loaded from a JSON file
//! - `env`: process environment store with an optional key prefix

mod env;
mod memory;

pub use env::EnvConfig;
pub use memory::MemoryConfig;

use crate::{Result, error::LifecycleError};

/// Keys consumed by the lifecycle component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Database server host
    Host,
    /// Database server port
    Port,
    /// Role used for the administrative connection and remote client
    Username,
    /// Password of that role
    Password,
    /// Name of the database being managed
    Database,
    /// Whether to drop through local `sudo dropdb`
    UseSudoToManageDatabase,
}

impl ConfigKey {
    /// All keys, in documentation order.
    pub const ALL: [Self; 6] = [
        Self::Host,
        Self::Port,
        Self::Username,
        Self::Password,
        Self::Database,
        Self::UseSudoToManageDatabase,
    ];

    /// The key's name in a configuration store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "DB_HOST",
            Self::Port => "DB_PORT",
            Self::Username => "DB_USERNAME",
            Self::Password => "DB_PASSWORD",
            Self::Database => "DB_DATABASE",
            Self::UseSudoToManageDatabase => "USE_SUDO_TO_MANAGE_DATABASE",
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only key/value configuration accessor with typed getters.
///
/// Implementors only provide [`ConfigStore::get`]; the typed getters parse
/// on top of it.
pub trait ConfigStore: Send + Sync {
    /// Raw lookup. `None` when the key is not set.
    fn get(&self, key: ConfigKey) -> Option<String>;

    /// Required string value.
    ///
    /// # Errors
    /// Returns a configuration error if the key is not set.
    fn get_string(&self, key: ConfigKey) -> Result<String> {
        self.get(key)
            .ok_or_else(|| LifecycleError::configuration(format!("{} is not set", key)))
    }

    /// Boolean value with a default for unset keys.
    ///
    /// Accepts `true/false`, `1/0`, `yes/no`, and `on/off` in any case.
    ///
    /// # Errors
    /// Returns a configuration error if the value is not a recognised boolean.
    fn get_bool(&self, key: ConfigKey, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                LifecycleError::configuration(format!("{} must be a boolean, got '{}'", key, raw))
            }),
        }
    }

    /// Port-sized integer with a default for unset keys.
    ///
    /// # Errors
    /// Returns a configuration error if the value is not a valid non-zero port.
    fn get_u16(&self, key: ConfigKey, default: u16) -> Result<u16> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(value) if value > 0 => Ok(value),
                _ => Err(LifecycleError::configuration(format!(
                    "{} must be an integer between 1 and 65535",
                    key
                ))),
            },
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Chains stores: the first store that has a key wins.
///
/// # Example
/// ```rust
/// use pgwarden_core::config::{ConfigKey, ConfigStore, LayeredConfig, MemoryConfig};
///
/// let file = MemoryConfig::new().with(ConfigKey::Host, "db.local");
/// let defaults = MemoryConfig::new()
///     .with(ConfigKey::Host, "localhost")
///     .with(ConfigKey::Port, "6432");
/// let config = LayeredConfig::new(vec![Box::new(file), Box::new(defaults)]);
///
/// assert_eq!(config.get(ConfigKey::Host).as_deref(), Some("db.local"));
/// assert_eq!(config.get(ConfigKey::Port).as_deref(), Some("6432"));
/// ```
pub struct LayeredConfig {
    layers: Vec<Box<dyn ConfigStore>>,
}

impl LayeredConfig {
    /// Creates a layered store; earlier layers take precedence.
    pub fn new(layers: Vec<Box<dyn ConfigStore>>) -> Self {
        Self { layers }
    }
}

impl ConfigStore for LayeredConfig {
    fn get(&self, key: ConfigKey) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }
}
