//! Administrative connection: existence checks and session termination.
//!
//! # Module Structure
//! - `postgres`: sqlx-backed [`AdminConnector`] over a single connection
//!
//! The probe talks to the server's `postgres` maintenance database, never to
//! the managed database itself, which may not exist.

mod postgres;

pub use postgres::{PgAdminConnector, PgAdminSession};

use crate::target::DatabaseTarget;
use crate::Result;
use async_trait::async_trait;

/// One open administrative session.
///
/// Dropping a session closes it; [`AdminSession::close`] does so gracefully.
#[async_trait]
pub trait AdminSession: Send {
    /// Whether a database named `name` exists on the server.
    async fn database_exists(&mut self, name: &str) -> Result<bool>;

    /// Backend pid of this session.
    async fn backend_pid(&mut self) -> Result<i32>;

    /// Backend pids of all sessions connected to `database`.
    async fn session_pids(&mut self, database: &str) -> Result<Vec<i32>>;

    /// Signals backend `pid` to terminate. Returns whether the server
    /// accepted the request.
    async fn terminate_backend(&mut self, pid: i32) -> Result<bool>;

    /// Closes the session.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens administrative sessions against a target's server.
#[async_trait]
pub trait AdminConnector: Send + Sync {
    /// Opens a session on the maintenance database of `target`'s server.
    ///
    /// # Errors
    /// Returns [`crate::LifecycleError::Connection`] if the server is
    /// unreachable or rejects the credentials, and
    /// [`crate::LifecycleError::UnsafeConfigValue`] if a connection value is
    /// rejected by the guard.
    async fn connect(&self, target: &DatabaseTarget) -> Result<Box<dyn AdminSession>>;
}

/// Existence check and session termination for a target database.
///
/// Each call opens its own session and releases it before returning, on
/// success and on error alike.
#[derive(Debug, Clone)]
pub struct ConnectionProbe<C> {
    connector: C,
}

impl<C: AdminConnector> ConnectionProbe<C> {
    /// Creates a probe using `connector` for its sessions.
    pub const fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Whether the target database exists.
    ///
    /// # Errors
    /// Propagates connection and query failures.
    pub async fn exists(&self, target: &DatabaseTarget) -> Result<bool> {
        target.validate()?;
        let database = target.database()?;
        let mut session = self.connector.connect(target).await?;
        let exists = session.database_exists(database).await?;
        session.close().await?;

        tracing::debug!(database, exists, "Checked database existence");
        Ok(exists)
    }

    /// Terminates every session on the target database except the probe's
    /// own. Returns the pids that were signalled; an empty list when nobody
    /// else was connected.
    ///
    /// # Errors
    /// Propagates connection and query failures.
    pub async fn terminate_other_connections(&self, target: &DatabaseTarget) -> Result<Vec<i32>> {
        target.validate()?;
        let database = target.database()?;
        let mut session = self.connector.connect(target).await?;

        let own_pid = session.backend_pid().await?;
        let mut terminated = Vec::new();
        for pid in session.session_pids(database).await? {
            if pid == own_pid {
                continue;
            }
            if session.terminate_backend(pid).await? {
                terminated.push(pid);
            } else {
                tracing::debug!(pid, "Backend already gone before termination");
            }
        }
        session.close().await?;

        tracing::info!(
            database,
            terminated = terminated.len(),
            "Terminated open connections"
        );
        Ok(terminated)
    }
}
