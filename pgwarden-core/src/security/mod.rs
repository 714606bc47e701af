//! Security utilities for configuration screening and credential protection.
//!
//! # Security Guarantees
//! - Every configuration value that reaches a shell command, the
//!   administrative connection, or a child environment passes
//!   [`validate_config_value`] first
//! - Credentials are stored in `Zeroizing` containers for automatic memory clearing
//! - Passwords are redacted from `Debug` output
//!
//! # Module Structure
//! - `guard`: forbidden-character policy for configuration values
//! - `credentials`: secure credential container with automatic memory zeroing

mod credentials;
mod guard;

pub use credentials::Credentials;
pub use guard::{FORBIDDEN_CHARACTERS, is_safe_config_value, validate_config_value};
