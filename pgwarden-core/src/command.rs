//! Drop command construction for the two privilege strategies.
//!
//! Commands are shell strings, so every interpolated value goes through the
//! configuration guard via the [`DatabaseTarget`] accessors.

use crate::config::{ConfigKey, ConfigStore};
use crate::target::{ADMIN_DATABASE, DatabaseTarget};
use crate::Result;
use zeroize::Zeroizing;

/// Environment variable carrying the password to PostgreSQL client tools.
pub const PASSWORD_ENV_VAR: &str = "PGPASSWORD";

/// Prints the major.minor version of the local `psql` client.
pub const CLIENT_VERSION_COMMAND: &str = "psql --version | awk '{print $3}' | cut -f1,2 -d'.'";

/// Environment entries for a child process. Values are zeroized on drop.
pub type ChildEnv = Vec<(String, Zeroizing<String>)>;

/// How a database is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeStrategy {
    /// `sudo dropdb` on the local host
    LocalPrivileged,
    /// `psql` against the configured server, authenticated by password
    RemoteAuthenticated,
}

impl PrivilegeStrategy {
    /// Maps the "use sudo" switch to a strategy.
    pub const fn from_use_sudo(use_sudo: bool) -> Self {
        if use_sudo {
            Self::LocalPrivileged
        } else {
            Self::RemoteAuthenticated
        }
    }

    /// Reads the strategy from configuration. Defaults to
    /// [`PrivilegeStrategy::LocalPrivileged`] when the switch is unset.
    ///
    /// # Errors
    /// Returns a configuration error if the switch is not a boolean.
    pub fn from_config(config: &dyn ConfigStore) -> Result<Self> {
        config
            .get_bool(ConfigKey::UseSudoToManageDatabase, true)
            .map(Self::from_use_sudo)
    }

    /// Whether the command's stdout must carry a truthy integer for the
    /// drop to count as done.
    pub const fn requires_sentinel(self) -> bool {
        matches!(self, Self::RemoteAuthenticated)
    }
}

impl std::fmt::Display for PrivilegeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalPrivileged => f.write_str("local-privileged"),
            Self::RemoteAuthenticated => f.write_str("remote-authenticated"),
        }
    }
}

/// Builds the shell command that drops `target` under `strategy`.
///
/// # Errors
/// Returns [`crate::LifecycleError::UnsafeConfigValue`] if any interpolated
/// value contains a forbidden character.
///
/// # Example
/// ```rust
/// use pgwarden_core::command::{PrivilegeStrategy, build_drop_command};
/// use pgwarden_core::DatabaseTarget;
///
/// let target = DatabaseTarget::new("db.local", 5432, "zed", "shop_db", "secret");
/// assert_eq!(
///     build_drop_command(&target, PrivilegeStrategy::LocalPrivileged)?,
///     "sudo dropdb shop_db --if-exists"
/// );
/// # Ok::<(), pgwarden_core::LifecycleError>(())
/// ```
pub fn build_drop_command(target: &DatabaseTarget, strategy: PrivilegeStrategy) -> Result<String> {
    let command = match strategy {
        PrivilegeStrategy::LocalPrivileged => {
            format!("sudo dropdb {} --if-exists", target.database()?)
        }
        PrivilegeStrategy::RemoteAuthenticated => format!(
            "psql -h {} -p {} -U {} -w -c \"DROP DATABASE IF EXISTS \\\"{}\\\"; \" {}",
            target.host()?,
            target.port(),
            target.username()?,
            target.database()?,
            ADMIN_DATABASE
        ),
    };
    Ok(command)
}

/// Environment for the drop command: the password, validated, under
/// [`PASSWORD_ENV_VAR`].
///
/// # Errors
/// Returns [`crate::LifecycleError::UnsafeConfigValue`] if the password
/// contains a forbidden character.
pub fn password_env(target: &DatabaseTarget) -> Result<ChildEnv> {
    Ok(vec![(
        PASSWORD_ENV_VAR.to_string(),
        Zeroizing::new(target.password()?.to_string()),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::error::LifecycleError;

    fn shop_target() -> DatabaseTarget {
        DatabaseTarget::new("db.local", 5432, "zed", "shop_db", "hunter2")
    }

    #[test]
    fn test_local_privileged_command() {
        let command = build_drop_command(&shop_target(), PrivilegeStrategy::LocalPrivileged).unwrap();
        assert_eq!(command, "sudo dropdb shop_db --if-exists");
    }

    #[test]
    fn test_remote_authenticated_command() {
        let command =
            build_drop_command(&shop_target(), PrivilegeStrategy::RemoteAuthenticated).unwrap();
        assert_eq!(
            command,
            r#"psql -h db.local -p 5432 -U zed -w -c "DROP DATABASE IF EXISTS \"shop_db\"; " postgres"#
        );
    }

    #[test]
    fn test_commands_never_contain_password() {
        for strategy in [
            PrivilegeStrategy::LocalPrivileged,
            PrivilegeStrategy::RemoteAuthenticated,
        ] {
            let command = build_drop_command(&shop_target(), strategy).unwrap();
            assert!(!command.contains("hunter2"), "{}", strategy);
        }
    }

    #[test]
    fn test_unsafe_database_name_rejected() {
        let target = DatabaseTarget::new("db.local", 5432, "zed", "shop`rm -rf /`", "");
        for strategy in [
            PrivilegeStrategy::LocalPrivileged,
            PrivilegeStrategy::RemoteAuthenticated,
        ] {
            let err = build_drop_command(&target, strategy).unwrap_err();
            assert!(matches!(err, LifecycleError::UnsafeConfigValue { ref key } if key == "DB_DATABASE"));
        }
    }

    #[test]
    fn test_unsafe_remote_values_rejected() {
        let target = DatabaseTarget::new("$(hostname)", 5432, "zed", "shop_db", "");
        // The local command does not interpolate the host.
        assert!(build_drop_command(&target, PrivilegeStrategy::LocalPrivileged).is_ok());
        assert!(build_drop_command(&target, PrivilegeStrategy::RemoteAuthenticated).is_err());

        let target = DatabaseTarget::new("db.local", 5432, "`whoami`", "shop_db", "");
        assert!(build_drop_command(&target, PrivilegeStrategy::RemoteAuthenticated).is_err());
    }

    #[test]
    fn test_password_env() {
        let env = password_env(&shop_target()).unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].0, "PGPASSWORD");
        assert_eq!(env[0].1.as_str(), "hunter2");

        let target = DatabaseTarget::new("db.local", 5432, "zed", "shop_db", "pa$$word");
        assert!(password_env(&target).is_err());
    }

    #[test]
    fn test_strategy_from_config() {
        let config = MemoryConfig::new();
        assert_eq!(
            PrivilegeStrategy::from_config(&config).unwrap(),
            PrivilegeStrategy::LocalPrivileged
        );

        config.set(ConfigKey::UseSudoToManageDatabase, "false");
        assert_eq!(
            PrivilegeStrategy::from_config(&config).unwrap(),
            PrivilegeStrategy::RemoteAuthenticated
        );
    }

    #[test]
    fn test_sentinel_only_for_remote() {
        assert!(!PrivilegeStrategy::LocalPrivileged.requires_sentinel());
        assert!(PrivilegeStrategy::RemoteAuthenticated.requires_sentinel());
    }
}
