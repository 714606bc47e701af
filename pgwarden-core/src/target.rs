//! The database a lifecycle operation acts on.

use crate::config::{ConfigKey, ConfigStore};
use crate::security::{Credentials, validate_config_value};
use crate::Result;

/// Default PostgreSQL port used when none is configured.
pub const DEFAULT_PORT: u16 = 5432;

/// Server-level maintenance database used for administrative connections.
pub const ADMIN_DATABASE: &str = "postgres";

/// Connection coordinates and credentials of the managed database.
///
/// Built fresh from configuration for every operation and dropped when the
/// operation ends. The password lives in zeroizing memory and is redacted
/// from `Debug` and `Display` output.
///
/// Fields are stored as read from configuration; the accessors that feed a
/// command, connection, or child environment validate them first.
#[derive(Debug, Clone)]
pub struct DatabaseTarget {
    host: String,
    port: u16,
    database: String,
    credentials: Credentials,
}

impl DatabaseTarget {
    /// Creates a target from explicit values.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        database: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            credentials: Credentials::new(username.into(), password.into()),
        }
    }

    /// Reads a target from configuration.
    ///
    /// Host, username, and database are required. Port defaults to
    /// [`DEFAULT_PORT`] and password to empty.
    ///
    /// # Errors
    /// Returns a configuration error if a required key is missing or the
    /// port is invalid.
    pub fn from_config(config: &dyn ConfigStore) -> Result<Self> {
        Ok(Self::new(
            config.get_string(ConfigKey::Host)?,
            config.get_u16(ConfigKey::Port, DEFAULT_PORT)?,
            config.get_string(ConfigKey::Username)?,
            config.get_string(ConfigKey::Database)?,
            config.get(ConfigKey::Password).unwrap_or_default(),
        ))
    }

    /// Validated server host.
    ///
    /// # Errors
    /// Returns [`crate::LifecycleError::UnsafeConfigValue`] on forbidden characters.
    pub fn host(&self) -> Result<&str> {
        validate_config_value(ConfigKey::Host.as_str(), &self.host)
    }

    /// Server port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Validated role name.
    ///
    /// # Errors
    /// Returns [`crate::LifecycleError::UnsafeConfigValue`] on forbidden characters.
    pub fn username(&self) -> Result<&str> {
        validate_config_value(ConfigKey::Username.as_str(), self.credentials.username())
    }

    /// Validated name of the managed database.
    ///
    /// # Errors
    /// Returns [`crate::LifecycleError::UnsafeConfigValue`] on forbidden characters.
    pub fn database(&self) -> Result<&str> {
        validate_config_value(ConfigKey::Database.as_str(), &self.database)
    }

    /// Validated password.
    ///
    /// # Security
    /// Callers must not log or format the returned value.
    ///
    /// # Errors
    /// Returns [`crate::LifecycleError::UnsafeConfigValue`] on forbidden characters.
    pub fn password(&self) -> Result<&str> {
        validate_config_value(ConfigKey::Password.as_str(), self.credentials.password())
    }

    /// Checks every text value against the configuration guard.
    ///
    /// # Errors
    /// Returns [`crate::LifecycleError::UnsafeConfigValue`] for the first
    /// rejected value, in the order host, username, database, password.
    pub fn validate(&self) -> Result<()> {
        self.host()?;
        self.username()?;
        self.database()?;
        self.password()?;
        Ok(())
    }

    /// Loggable URL of the administrative connection, without password.
    pub fn admin_url(&self) -> String {
        let mut url = match url::Url::parse(&format!("postgres://{}", self.host)) {
            Ok(url) => url,
            Err(_) => return "<redacted>".to_string(),
        };
        let _ = url.set_port(Some(self.port));
        let _ = url.set_username(self.credentials.username());
        url.set_path(ADMIN_DATABASE);
        url.to_string()
    }
}

impl std::fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
        // Intentionally omit username and never include credentials
    }
}
