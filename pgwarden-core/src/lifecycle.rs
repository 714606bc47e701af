//! Database lifecycle orchestration.
//!
//! A drop runs a fixed sequence, start to finish, on every call:
//!
//! ```text
//! CheckExistence ──absent──▶ Done(AlreadyAbsent)
//!       │ exists
//!       ▼
//! TerminateConnections ─▶ SelectStrategy ─▶ RunDropCommand ─▶ Done(Dropped | NoEffect)
//! ```
//!
//! Any error aborts the sequence and propagates. Nothing is retried.

use crate::command::{PrivilegeStrategy, build_drop_command, password_env};
use crate::config::ConfigStore;
use crate::probe::{AdminConnector, ConnectionProbe};
use crate::process::ProcessRunner;
use crate::target::DatabaseTarget;
use crate::Result;
use std::sync::Arc;

/// Classified result of a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// The database did not exist; nothing was done.
    AlreadyAbsent,
    /// The drop command completed successfully.
    Dropped,
    /// The drop command exited zero but its output did not confirm an effect.
    NoEffect,
}

impl DropOutcome {
    /// `true` for [`DropOutcome::AlreadyAbsent`] and [`DropOutcome::Dropped`].
    pub const fn is_success(self) -> bool {
        matches!(self, Self::AlreadyAbsent | Self::Dropped)
    }
}

impl std::fmt::Display for DropOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyAbsent => f.write_str("database does not exist"),
            Self::Dropped => f.write_str("database dropped"),
            Self::NoEffect => f.write_str("drop command reported no effect"),
        }
    }
}

/// Existence check, session termination, and drop for the configured
/// database.
///
/// Configuration is read fresh on every call: a change to the target or to
/// the privilege switch takes effect on the next operation.
pub struct DatabaseLifecycleManager<C, R> {
    config: Arc<dyn ConfigStore>,
    probe: ConnectionProbe<C>,
    runner: R,
}

impl<C, R> std::fmt::Debug for DatabaseLifecycleManager<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseLifecycleManager").finish_non_exhaustive()
    }
}

impl<C: AdminConnector, R: ProcessRunner> DatabaseLifecycleManager<C, R> {
    /// Creates a manager from its collaborators.
    pub fn new(config: Arc<dyn ConfigStore>, connector: C, runner: R) -> Self {
        Self {
            config,
            probe: ConnectionProbe::new(connector),
            runner,
        }
    }

    /// The target as currently configured, with every value already
    /// screened by the configuration guard.
    ///
    /// # Errors
    /// Returns a configuration error if a required key is missing, and
    /// [`crate::LifecycleError::UnsafeConfigValue`] if a value is rejected.
    pub fn target(&self) -> Result<DatabaseTarget> {
        let target = DatabaseTarget::from_config(self.config.as_ref())?;
        target.validate()?;
        Ok(target)
    }

    /// The privilege strategy as currently configured.
    ///
    /// # Errors
    /// Returns a configuration error if the switch is not a boolean.
    pub fn strategy(&self) -> Result<PrivilegeStrategy> {
        PrivilegeStrategy::from_config(self.config.as_ref())
    }

    /// Whether the configured database exists.
    ///
    /// # Errors
    /// Propagates configuration and connection errors.
    pub async fn database_exists(&self) -> Result<bool> {
        let target = self.target()?;
        self.probe.exists(&target).await
    }

    /// Terminates every other session on the configured database.
    ///
    /// # Errors
    /// Propagates configuration and connection errors.
    pub async fn terminate_connections(&self) -> Result<Vec<i32>> {
        let target = self.target()?;
        self.probe.terminate_other_connections(&target).await
    }

    /// Drops the configured database.
    ///
    /// Dropping a database that does not exist succeeds with
    /// [`DropOutcome::AlreadyAbsent`] without terminating sessions or
    /// running any command. On the remote-authenticated path the command's
    /// stdout must parse as a non-zero integer, otherwise the outcome is
    /// [`DropOutcome::NoEffect`].
    ///
    /// # Errors
    /// - [`crate::LifecycleError::UnsafeConfigValue`] for rejected configuration
    /// - [`crate::LifecycleError::Connection`] if the existence check or
    ///   session termination fails
    /// - [`crate::LifecycleError::ProcessExecution`] if the command exits non-zero
    pub async fn drop_database(&self) -> Result<DropOutcome> {
        let target = self.target()?;

        if !self.probe.exists(&target).await? {
            tracing::info!(database = %target, "Database does not exist, nothing to drop");
            return Ok(DropOutcome::AlreadyAbsent);
        }

        self.probe.terminate_other_connections(&target).await?;

        let strategy = self.strategy()?;
        let command = build_drop_command(&target, strategy)?;
        let env = password_env(&target)?;

        tracing::warn!(database = %target, %strategy, "Dropping database");
        let result = self.runner.run(&command, &env).await?;

        let outcome = if strategy.requires_sentinel() && !result.indicates_success() {
            DropOutcome::NoEffect
        } else {
            DropOutcome::Dropped
        };
        tracing::info!(database = %target, %outcome, "Drop finished");
        Ok(outcome)
    }
}
