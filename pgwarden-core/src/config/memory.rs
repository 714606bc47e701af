//! In-memory configuration store.

use super::{ConfigKey, ConfigStore};
use crate::{Result, error::LifecycleError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Configuration held in memory.
///
/// Values can be replaced at runtime through [`MemoryConfig::set`]; lifecycle
/// operations read the store on every call and see the new value.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: RwLock<HashMap<ConfigKey, String>>,
}

impl MemoryConfig {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a value.
    #[must_use]
    pub fn with(self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets or replaces a value.
    pub fn set(&self, key: ConfigKey, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.into());
    }

    /// Removes a value.
    pub fn remove(&self, key: ConfigKey) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    /// Parses a JSON object of key/value pairs.
    ///
    /// Keys use their store names (`DB_HOST`, `DB_PORT`, ...). String,
    /// number, and boolean values are accepted. Unknown keys are ignored
    /// with a warning.
    ///
    /// # Errors
    /// Returns a configuration error if the document is not a JSON object or
    /// a known key holds an array, object, or null.
    ///
    /// # Example
    /// ```rust
    /// use pgwarden_core::config::{ConfigKey, ConfigStore, MemoryConfig};
    ///
    /// let config = MemoryConfig::from_json_str(
    ///     r#"{"DB_HOST": "db.local", "DB_PORT": 5432, "USE_SUDO_TO_MANAGE_DATABASE": false}"#,
    /// )?;
    /// assert_eq!(config.get_u16(ConfigKey::Port, 0)?, 5432);
    /// assert!(!config.get_bool(ConfigKey::UseSudoToManageDatabase, true)?);
    /// # Ok::<(), pgwarden_core::LifecycleError>(())
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| {
                LifecycleError::configuration(format!(
                    "Configuration must be a JSON object of key/value pairs: {}",
                    e
                ))
            })?;

        let config = Self::new();
        for (name, value) in document {
            let Some(key) = ConfigKey::ALL.into_iter().find(|key| key.as_str() == name) else {
                tracing::warn!(key = %name, "Ignoring unknown configuration key");
                continue;
            };
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(LifecycleError::configuration(format!(
                        "{} must be a string, number, or boolean",
                        key
                    )));
                }
            };
            config.set(key, value);
        }

        Ok(config)
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if its contents are invalid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::io(
                format!("Failed to read configuration file {}", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&contents)
    }
}

impl ConfigStore for MemoryConfig {
    fn get(&self, key: ConfigKey) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_set_and_remove() {
        let config = MemoryConfig::new().with(ConfigKey::Host, "localhost");
        assert_eq!(config.get(ConfigKey::Host).as_deref(), Some("localhost"));

        config.set(ConfigKey::Host, "db.local");
        assert_eq!(config.get(ConfigKey::Host).as_deref(), Some("db.local"));

        config.remove(ConfigKey::Host);
        assert_eq!(config.get(ConfigKey::Host), None);
    }

    #[test]
    fn test_from_json_str_mixed_types() {
        let config = MemoryConfig::from_json_str(
            r#"{
                "DB_HOST": "db.local",
                "DB_PORT": 5432,
                "DB_USERNAME": "zed",
                "DB_DATABASE": "shop_db",
                "USE_SUDO_TO_MANAGE_DATABASE": true,
                "UNRELATED": "ignored"
            }"#,
        )
        .unwrap();

        assert_eq!(config.get(ConfigKey::Host).as_deref(), Some("db.local"));
        assert_eq!(config.get(ConfigKey::Port).as_deref(), Some("5432"));
        assert_eq!(
            config.get(ConfigKey::UseSudoToManageDatabase).as_deref(),
            Some("true")
        );
        assert_eq!(config.get(ConfigKey::Password), None);
    }

    #[test]
    fn test_from_json_str_rejects_non_object() {
        assert!(MemoryConfig::from_json_str("[1, 2, 3]").is_err());
        assert!(MemoryConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_json_str_rejects_nested_values() {
        let err = MemoryConfig::from_json_str(r#"{"DB_HOST": {"name": "x"}}"#).unwrap_err();
        assert!(err.to_string().contains("DB_HOST"));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"DB_DATABASE": "shop_db"}}"#).unwrap();

        let config = MemoryConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.get(ConfigKey::Database).as_deref(), Some("shop_db"));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = MemoryConfig::from_json_file(Path::new("/nonexistent/pgwarden.json"));
        assert!(matches!(result, Err(LifecycleError::Io { .. })));
    }
}
