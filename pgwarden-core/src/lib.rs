//! Safe lifecycle operations for PostgreSQL databases.
//!
//! This crate checks whether a database exists, terminates the sessions
//! connected to it, and drops it through the PostgreSQL command-line tools,
//! either with local `sudo dropdb` or with a password-authenticated remote
//! `psql`.
//!
//! # Security Guarantees
//! - Configuration values are screened for `$` and backticks before they
//!   reach a shell command, connection options, or a child environment
//! - The password travels only through zeroizing memory, the driver, and
//!   the child's `PGPASSWORD`; it never appears in argv, logs, or errors
//! - The administrative probe never terminates its own session
//!
//! # Architecture
//! - [`config`]: injected read-only configuration store
//! - [`probe`]: administrative connection (existence, session termination)
//! - [`command`]: drop command construction per privilege strategy
//! - [`process`]: shell command execution
//! - [`lifecycle`]: the orchestrating [`DatabaseLifecycleManager`]
//! - [`health`]: write-then-delete health probe

pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod probe;
pub mod process;
pub mod security;
pub mod target;

// Re-export commonly used types
pub use command::{PrivilegeStrategy, build_drop_command};
pub use config::{ConfigKey, ConfigStore, EnvConfig, LayeredConfig, MemoryConfig};
pub use error::{LifecycleError, Result};
pub use health::{HealthCheckResult, HealthIndicator};
pub use lifecycle::{DatabaseLifecycleManager, DropOutcome};
pub use logging::init_logging;
pub use probe::{ConnectionProbe, PgAdminConnector};
pub use process::{CommandResult, ProcessRunner, ShellProcessRunner};
pub use target::DatabaseTarget;

/// Lifecycle manager wired to PostgreSQL and the system shell.
pub type PgLifecycleManager = DatabaseLifecycleManager<PgAdminConnector, ShellProcessRunner>;
