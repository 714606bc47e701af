//! Write-path health check.
//!
//! The probe writes a marker record and deletes it again. Any persistence
//! error is turned into an unhealthy [`HealthCheckResult`]; a health check
//! never returns an error to its caller.

use crate::Result;
use crate::error::LifecycleError;
use crate::target::DatabaseTarget;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::ConnectOptions;
use std::time::Duration;

/// Table holding transient health-check markers.
pub const HEALTH_CHECK_TABLE: &str = "lifecycle_health_check";

/// Value written by the probe.
const MARKER_VALUE: &str = "ok";

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    /// Whether the check passed
    pub healthy: bool,
    /// Failure detail, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheckResult {
    /// A passing result.
    pub const fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    /// A failing result with `message`.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Failure reported by a [`HealthCheckStore`]. Displays as the bare
/// underlying message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PersistenceError {
    message: String,
}

impl PersistenceError {
    /// Creates an error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(error: sqlx::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Storage for health-check markers.
#[async_trait]
pub trait HealthCheckStore: Send + Sync {
    /// Writes a marker and returns its id.
    async fn save_marker(&self, value: &str) -> std::result::Result<i64, PersistenceError>;

    /// Deletes the marker with `id`.
    async fn delete_marker(&self, id: i64) -> std::result::Result<(), PersistenceError>;
}

/// Runs the write-then-delete probe against a store.
#[derive(Debug, Clone)]
pub struct HealthIndicator<S> {
    store: S,
}

impl<S: HealthCheckStore> HealthIndicator<S> {
    /// Creates an indicator probing `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes and deletes a marker. Errors become an unhealthy result
    /// carrying the error message.
    pub async fn execute_health_check(&self) -> HealthCheckResult {
        match self.probe().await {
            Ok(()) => HealthCheckResult::healthy(),
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                HealthCheckResult::unhealthy(e.to_string())
            }
        }
    }

    async fn probe(&self) -> std::result::Result<(), PersistenceError> {
        let id = self.store.save_marker(MARKER_VALUE).await?;
        self.store.delete_marker(id).await
    }
}

/// A named health probe that can be registered with a
/// [`HealthCheckRegistry`].
#[async_trait]
pub trait HealthCheckPlugin: Send + Sync {
    /// Name shown in reports.
    fn name(&self) -> &str;

    /// Executes the probe.
    async fn check(&self) -> HealthCheckResult;
}

/// Health check plugin for database write availability.
#[derive(Debug)]
pub struct DatabaseHealthCheckPlugin<S> {
    indicator: HealthIndicator<S>,
}

impl<S: HealthCheckStore> DatabaseHealthCheckPlugin<S> {
    /// Creates the plugin around `indicator`.
    pub const fn new(indicator: HealthIndicator<S>) -> Self {
        Self { indicator }
    }
}

#[async_trait]
impl<S: HealthCheckStore> HealthCheckPlugin for DatabaseHealthCheckPlugin<S> {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> HealthCheckResult {
        self.indicator.execute_health_check().await
    }
}

/// Ordered collection of health check plugins.
#[derive(Default)]
pub struct HealthCheckRegistry {
    plugins: Vec<Box<dyn HealthCheckPlugin>>,
}

impl HealthCheckRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin; plugins run in registration order.
    pub fn register(&mut self, plugin: Box<dyn HealthCheckPlugin>) {
        self.plugins.push(plugin);
    }

    /// Runs every plugin, one after another.
    pub async fn run_all(&self) -> Vec<(String, HealthCheckResult)> {
        let mut results = Vec::with_capacity(self.plugins.len());
        for plugin in &self.plugins {
            results.push((plugin.name().to_string(), plugin.check().await));
        }
        results
    }
}

/// Marker storage in the managed database.
#[derive(Debug, Clone)]
pub struct PgHealthCheckStore {
    pool: PgPool,
}

impl PgHealthCheckStore {
    /// Prepares a store for the target database. No connection is made
    /// until the first probe, which waits at most `acquire_timeout` for it.
    ///
    /// # Errors
    /// Returns [`LifecycleError::UnsafeConfigValue`] if a connection value is
    /// rejected by the guard.
    pub fn connect_lazy(target: &DatabaseTarget, acquire_timeout: Duration) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(target.host()?)
            .port(target.port())
            .username(target.username()?)
            .password(target.password()?)
            .database(target.database()?)
            .application_name(&format!("pgwarden-{}", env!("CARGO_PKG_VERSION")))
            .disable_statement_logging();

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Creates the marker table if it is missing.
    ///
    /// # Errors
    /// Returns a connection error if the statement fails.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id BIGSERIAL PRIMARY KEY, health_check TEXT NOT NULL)",
            HEALTH_CHECK_TABLE
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| LifecycleError::connection_failed("Failed to create health check table", e))?;
        Ok(())
    }

    /// Closes the underlying connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HealthCheckStore for PgHealthCheckStore {
    async fn save_marker(&self, value: &str) -> std::result::Result<i64, PersistenceError> {
        let id = sqlx::query_scalar(&format!(
            "INSERT INTO {} (health_check) VALUES ($1) RETURNING id",
            HEALTH_CHECK_TABLE
        ))
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn delete_marker(&self, id: i64) -> std::result::Result<(), PersistenceError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", HEALTH_CHECK_TABLE))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        rows: Mutex<Vec<(i64, String)>>,
        fail_save: Option<&'static str>,
        fail_delete: Option<&'static str>,
    }

    #[async_trait]
    impl HealthCheckStore for FakeStore {
        async fn save_marker(&self, value: &str) -> std::result::Result<i64, PersistenceError> {
            if let Some(message) = self.fail_save {
                return Err(PersistenceError::new(message));
            }
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.push((id, value.to_string()));
            Ok(id)
        }

        async fn delete_marker(&self, id: i64) -> std::result::Result<(), PersistenceError> {
            if let Some(message) = self.fail_delete {
                return Err(PersistenceError::new(message));
            }
            self.rows.lock().unwrap().retain(|(row_id, _)| *row_id != id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_health_check_passes_and_cleans_up() {
        let indicator = HealthIndicator::new(FakeStore::default());
        let result = indicator.execute_health_check().await;

        assert_eq!(
            result,
            HealthCheckResult {
                healthy: true,
                message: None
            }
        );
        assert!(indicator.store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_check_reports_save_failure() {
        let indicator = HealthIndicator::new(FakeStore {
            fail_save: Some("connection refused"),
            ..FakeStore::default()
        });

        assert_eq!(
            indicator.execute_health_check().await,
            HealthCheckResult {
                healthy: false,
                message: Some("connection refused".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_health_check_reports_delete_failure() {
        let indicator = HealthIndicator::new(FakeStore {
            fail_delete: Some("permission denied for table lifecycle_health_check"),
            ..FakeStore::default()
        });

        let result = indicator.execute_health_check().await;
        assert!(!result.healthy);
        assert_eq!(
            result.message.as_deref(),
            Some("permission denied for table lifecycle_health_check")
        );
    }

    #[tokio::test]
    async fn test_registry_runs_plugins_in_order() {
        let mut registry = HealthCheckRegistry::new();
        registry.register(Box::new(DatabaseHealthCheckPlugin::new(HealthIndicator::new(
            FakeStore::default(),
        ))));
        registry.register(Box::new(DatabaseHealthCheckPlugin::new(HealthIndicator::new(
            FakeStore {
                fail_save: Some("connection refused"),
                ..FakeStore::default()
            },
        ))));

        let results = registry.run_all().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "database");
        assert!(results[0].1.healthy);
        assert!(!results[1].1.healthy);
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_string(&HealthCheckResult::healthy()).unwrap();
        assert_eq!(json, r#"{"healthy":true}"#);

        let json = serde_json::to_string(&HealthCheckResult::unhealthy("connection refused")).unwrap();
        assert_eq!(json, r#"{"healthy":false,"message":"connection refused"}"#);
    }

    #[test]
    fn test_persistence_error_display_is_bare_message() {
        assert_eq!(PersistenceError::new("connection refused").to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_pg_store_unreachable_is_unhealthy() {
        let target = DatabaseTarget::new("127.0.0.1", 1, "zed", "shop_db", "hunter2");
        let store = PgHealthCheckStore::connect_lazy(&target, Duration::from_secs(1)).unwrap();
        let result = HealthIndicator::new(store).execute_health_check().await;

        assert!(!result.healthy);
        assert!(result.message.is_some());
        assert!(!result.message.unwrap_or_default().contains("hunter2"));
    }
}
