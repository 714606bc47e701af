//! Forbidden-character policy for configuration-sourced values.
//!
//! Values read from configuration are interpolated into a shell command
//! string, not passed as an argument vector. The shell would expand `$VAR`
//! and `` `cmd` `` before the database tool ever sees them, so any value
//! containing either character is refused outright.

use crate::{Result, error::LifecycleError};

/// Characters that trigger shell variable expansion or command substitution.
pub const FORBIDDEN_CHARACTERS: [char; 2] = ['$', '`'];

/// Returns `true` if `value` contains none of the [`FORBIDDEN_CHARACTERS`].
pub fn is_safe_config_value(value: &str) -> bool {
    !value.contains(FORBIDDEN_CHARACTERS)
}

/// Validates a configuration value before it is used in a command,
/// connection options, or a child process environment.
///
/// Safe values are returned unchanged. The error names the configuration
/// key only; the rejected value may be a password and is never echoed.
///
/// # Errors
/// Returns [`LifecycleError::UnsafeConfigValue`] if `value` contains `$` or
/// a backtick anywhere.
///
/// # Example
/// ```rust
/// use pgwarden_core::security::validate_config_value;
///
/// assert_eq!(validate_config_value("DB_DATABASE", "shop_db")?, "shop_db");
/// assert!(validate_config_value("DB_DATABASE", "shop_$(id)").is_err());
/// # Ok::<(), pgwarden_core::LifecycleError>(())
/// ```
pub fn validate_config_value<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    if is_safe_config_value(value) {
        Ok(value)
    } else {
        tracing::error!(key, "Rejected configuration value containing shell metacharacters");
        Err(LifecycleError::unsafe_config_value(key))
    }
}
