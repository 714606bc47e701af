//! PostgreSQL administrative sessions over a single sqlx connection.
//!
//! # Security Features
//! - Every connection value passes the configuration guard
//! - The password is handed to the driver directly, never through a URL
//! - Error contexts carry the redacted admin URL only
//! - Catalog queries bind the database name as a parameter

use super::{AdminConnector, AdminSession};
use crate::error::LifecycleError;
use crate::target::{ADMIN_DATABASE, DatabaseTarget};
use crate::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::time::Duration;

/// Opens non-pooled connections to a server's `postgres` database.
#[derive(Debug, Clone)]
pub struct PgAdminConnector {
    connect_timeout: Duration,
}

impl Default for PgAdminConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl PgAdminConnector {
    /// Creates a connector with a 30 second connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connection options for the maintenance database of `target`'s server.
    ///
    /// # Errors
    /// Returns [`LifecycleError::UnsafeConfigValue`] if host, username, or
    /// password is rejected by the guard.
    pub fn connect_options(target: &DatabaseTarget) -> Result<PgConnectOptions> {
        Ok(PgConnectOptions::new()
            .host(target.host()?)
            .port(target.port())
            .username(target.username()?)
            .password(target.password()?)
            .database(ADMIN_DATABASE)
            .application_name(&format!("pgwarden-{}", env!("CARGO_PKG_VERSION")))
            .disable_statement_logging())
    }
}

#[async_trait]
impl AdminConnector for PgAdminConnector {
    async fn connect(&self, target: &DatabaseTarget) -> Result<Box<dyn AdminSession>> {
        let options = Self::connect_options(target)?;
        let admin_url = target.admin_url();

        tracing::debug!(url = %admin_url, "Opening administrative connection");

        let connection = tokio::time::timeout(self.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                LifecycleError::connection_failed(
                    format!("Timed out connecting to {}", admin_url),
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("no connection within {:?}", self.connect_timeout),
                    ),
                )
            })?
            .map_err(|e| {
                LifecycleError::connection_failed(format!("Failed to connect to {}", admin_url), e)
            })?;

        Ok(Box::new(PgAdminSession {
            connection,
            admin_url,
        }))
    }
}

/// An open administrative connection.
///
/// Dropping the session closes the socket; [`AdminSession::close`] sends a
/// graceful termination message first.
pub struct PgAdminSession {
    connection: PgConnection,
    admin_url: String,
}

impl std::fmt::Debug for PgAdminSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgAdminSession")
            .field("admin_url", &self.admin_url)
            .finish_non_exhaustive()
    }
}

impl PgAdminSession {
    fn query_failed(&self, what: &str, error: sqlx::Error) -> LifecycleError {
        LifecycleError::connection_failed(format!("{} on {}", what, self.admin_url), error)
    }
}

#[async_trait]
impl AdminSession for PgAdminSession {
    async fn database_exists(&mut self, name: &str) -> Result<bool> {
        let row: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(name)
            .fetch_optional(&mut self.connection)
            .await
            .map_err(|e| self.query_failed("Database existence check failed", e))?;
        Ok(row.is_some())
    }

    async fn backend_pid(&mut self) -> Result<i32> {
        sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut self.connection)
            .await
            .map_err(|e| self.query_failed("Backend pid lookup failed", e))
    }

    async fn session_pids(&mut self, database: &str) -> Result<Vec<i32>> {
        sqlx::query_scalar("SELECT pid FROM pg_stat_activity WHERE datname = $1")
            .bind(database)
            .fetch_all(&mut self.connection)
            .await
            .map_err(|e| self.query_failed("Session listing failed", e))
    }

    async fn terminate_backend(&mut self, pid: i32) -> Result<bool> {
        tracing::warn!(pid, "Terminating backend");
        sqlx::query_scalar("SELECT pg_terminate_backend($1)")
            .bind(pid)
            .fetch_one(&mut self.connection)
            .await
            .map_err(|e| self.query_failed("Backend termination failed", e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let admin_url = self.admin_url;
        self.connection.close().await.map_err(|e| {
            LifecycleError::connection_failed(format!("Failed to close {}", admin_url), e)
        })
    }
}
