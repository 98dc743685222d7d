//! Pooled connections with named, retained checkouts

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::executor::{self, Execute, Fetch, Statement};
use crate::mysql::MySqlPoolConnector;
use crate::table::{Record, RowMode, Table};
use crate::traits::{Connection, Connector};
use crate::value::Value;

/// Hard ceiling on pool capacity.
pub const MAX_POOL_SIZE: usize = 32;

/// Capacity used when the caller has no preference.
pub const DEFAULT_POOL_SIZE: usize = 30;

/// Clamp a requested pool size into `1..=MAX_POOL_SIZE`.
pub fn clamp_pool_size(requested: usize) -> usize {
    requested.clamp(1, MAX_POOL_SIZE)
}

/// A bounded connection pool plus named connections held out of rotation.
///
/// Connections are checked out per call and handed back afterwards. When a
/// call passes a `name` with `close_after = false`, its connection is kept
/// under that name instead, and later calls with the same name reuse it
/// until [`close_by_name`](Self::close_by_name) or
/// [`close_all`](Self::close_all) releases it.
///
/// The registry can be shared between tasks. Distinct names (or no name)
/// may be used concurrently; callers must not use the same name from two
/// tasks at once.
///
/// # Example
///
/// ```ignore
/// use mysql_helpers::{params, ConnectionConfig, PooledRegistry};
///
/// let registry = PooledRegistry::new(ConnectionConfig::from_env()?, 8)?;
/// registry
///     .execute("CREATE TEMPORARY TABLE t (a INT)", params![], Some("load"), false)
///     .await?;
/// registry
///     .execute("INSERT INTO t (a) VALUES (%s)", params![1], Some("load"), false)
///     .await?;
/// registry.close_by_name("load").await?;
/// ```
pub struct PooledRegistry<C: Connector = MySqlPoolConnector> {
    connector: C,
    capacity: usize,
    pool_name: Option<String>,
    row_mode: RowMode,
    retained: Mutex<HashMap<String, C::Conn>>,
}

impl PooledRegistry<MySqlPoolConnector> {
    /// Create a registry over a new MySQL pool.
    ///
    /// `pool_size` is clamped to [`MAX_POOL_SIZE`]. No connection is opened
    /// until the first call.
    pub fn new(config: ConnectionConfig, pool_size: usize) -> Result<Self> {
        let capacity = clamp_pool_size(pool_size);
        let connector = MySqlPoolConnector::new(config, capacity)?;
        Ok(Self::with_connector(connector, pool_size))
    }

    /// Registry of [`DEFAULT_POOL_SIZE`] connections configured from `DB_*`.
    pub fn from_env() -> Result<Self> {
        Self::new(ConnectionConfig::from_env()?, DEFAULT_POOL_SIZE)
    }

    /// Release every retained connection and shut the pool down.
    pub async fn disconnect(self) -> Result<()> {
        self.close_all().await?;
        self.connector.disconnect().await
    }
}

impl<C: Connector> PooledRegistry<C> {
    /// Create a registry over any pool-like connector.
    ///
    /// The connector is expected to enforce the capacity; the registry only
    /// records the clamped value.
    pub fn with_connector(connector: C, pool_size: usize) -> Self {
        let capacity = clamp_pool_size(pool_size);
        if capacity != pool_size {
            warn!(requested = pool_size, capacity, "pool size clamped");
        }
        Self {
            connector,
            capacity,
            pool_name: None,
            row_mode: RowMode::default(),
            retained: Mutex::new(HashMap::new()),
        }
    }

    /// Label used in log context.
    pub fn with_pool_name(mut self, pool_name: impl Into<String>) -> Self {
        self.set_pool_name(pool_name);
        self
    }

    pub fn set_pool_name(&mut self, pool_name: impl Into<String>) {
        self.pool_name = Some(pool_name.into());
    }

    /// Shape rows returned by [`fetch_as_rows`](Self::fetch_as_rows).
    pub fn with_row_mode(mut self, row_mode: RowMode) -> Self {
        self.set_row_mode(row_mode);
        self
    }

    pub fn set_row_mode(&mut self, row_mode: RowMode) {
        self.row_mode = row_mode;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pool_name(&self) -> Option<&str> {
        self.pool_name.as_deref()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Names of the connections currently held out of the pool.
    pub async fn retained_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.retained.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the connection retained under `name`, or check out a fresh one.
    ///
    /// A retained connection is handed to the caller and leaves the map
    /// until it is [`release`](Self::release)d again. One that no longer
    /// answers a ping is discarded and replaced by a fresh checkout.
    pub async fn acquire(&self, name: Option<&str>) -> Result<C::Conn> {
        if let Some(name) = name {
            let retained = self.retained.lock().await.remove(name);
            if let Some(mut conn) = retained {
                if conn.is_alive().await {
                    debug!(name, pool = self.pool_name(), "reusing retained connection");
                    return Ok(conn);
                }
                debug!(
                    name,
                    pool = self.pool_name(),
                    "retained connection is no longer alive, replacing"
                );
                drop(conn);
            }
        }
        let conn = self.connector.connect().await?;
        let (host, port) = self.connector.endpoint();
        debug!(name, pool = self.pool_name(), host, port, "checked out connection");
        Ok(conn)
    }

    /// Hand a connection back.
    ///
    /// With `close_after`, or without a name, the connection is released to
    /// the pool. Otherwise it is retained under `name`; a connection already
    /// retained under that name is released first.
    pub async fn release(&self, conn: C::Conn, name: Option<&str>, close_after: bool) -> Result<()> {
        let name = match name {
            Some(name) if !close_after => name,
            _ => return conn.close().await,
        };
        let replaced = self.retained.lock().await.insert(name.to_string(), conn);
        debug!(name, pool = self.pool_name(), "retained connection");
        match replaced {
            Some(old) => old.close().await,
            None => Ok(()),
        }
    }

    /// Release the connection retained under `name`.
    ///
    /// Returns `false` when nothing is retained under that name.
    pub async fn close_by_name(&self, name: &str) -> Result<bool> {
        let conn = self.retained.lock().await.remove(name);
        match conn {
            Some(conn) => {
                conn.close().await?;
                debug!(name, pool = self.pool_name(), "released retained connection");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release every retained connection.
    ///
    /// All entries are removed even if closing one of them fails; the first
    /// failure is returned.
    pub async fn close_all(&self) -> Result<()> {
        let drained: Vec<(String, C::Conn)> = self.retained.lock().await.drain().collect();
        let mut first_err = None;
        for (name, conn) in drained {
            if let Err(e) = conn.close().await {
                warn!(name = %name, error = %e, "failed to release retained connection");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run a query and materialize its rows into a [`Table`].
    pub async fn fetch_as_table(
        &self,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<Table> {
        self.run(Fetch::Table, sql, params, name, close_after).await
    }

    /// Run a query and return its rows shaped by the registry's [`RowMode`].
    pub async fn fetch_as_rows(
        &self,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<Vec<Record>> {
        self.run(Fetch::Rows, sql, params, name, close_after)
            .await
            .map(|table| table.into_records(self.row_mode))
    }

    /// Run a mutating statement, committed on its own. Returns the number of
    /// affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<u64> {
        self.run(Execute, sql, params, name, close_after).await
    }

    async fn run<S: Statement>(
        &self,
        stmt: S,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<S::Output> {
        let result = async {
            let mut conn = self.acquire(name).await?;
            let output = stmt.run(&mut conn, sql, &params).await;
            if let Err(e) = self.release(conn, name, close_after).await {
                warn!(error = %e, "failed to release connection");
            }
            output
        }
        .await;
        executor::report(stmt.name(), sql, &params, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::testing::{count_errors, FakeConnector};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn registry() -> (PooledRegistry<FakeConnector>, FakeConnector) {
        let fake = FakeConnector::default();
        (PooledRegistry::with_connector(fake.clone(), 4), fake)
    }

    #[test]
    fn test_pool_size_is_clamped() {
        assert_eq!(clamp_pool_size(1000), 32);
        assert_eq!(clamp_pool_size(0), 1);
        assert_eq!(clamp_pool_size(8), 8);
        let registry = PooledRegistry::with_connector(FakeConnector::default(), 1000);
        assert_eq!(registry.capacity(), 32);
    }

    #[tokio::test]
    async fn test_mysql_registry_capacity_is_clamped() {
        let config = ConnectionConfig::builder()
            .host("127.0.0.1")
            .port(3306)
            .user("u")
            .password("p")
            .database("d")
            .build()
            .unwrap();
        let registry = PooledRegistry::new(config, 1000).unwrap();
        assert_eq!(registry.capacity(), MAX_POOL_SIZE);
    }

    #[tokio::test]
    async fn test_named_release_then_acquire_returns_same_connection() {
        let (registry, fake) = registry();
        let conn = registry.acquire(Some("x")).await.unwrap();
        let id = conn.id;
        registry.release(conn, Some("x"), false).await.unwrap();
        assert_eq!(registry.retained_names().await, vec!["x".to_string()]);

        let again = registry.acquire(Some("x")).await.unwrap();
        assert_eq!(again.id, id);
        assert_eq!(fake.state.connects(), 1);
        assert!(registry.retained_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_dead_retained_connection_is_replaced() {
        let (registry, fake) = registry();
        let conn = registry.acquire(Some("x")).await.unwrap();
        registry.release(conn, Some("x"), false).await.unwrap();
        fake.state.dead.store(true, Ordering::SeqCst);

        let fresh = registry.acquire(Some("x")).await.unwrap();
        assert_eq!(fresh.id, 2);
        assert_eq!(fake.state.pings.load(Ordering::SeqCst), 1);
        assert_eq!(fake.state.connects(), 2);

        registry.release(fresh, Some("x"), false).await.unwrap();
        let n = registry
            .execute("INSERT INTO t (a) VALUES (%s)", params![1], Some("x"), false)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(fake.state.connects(), 2);
    }

    #[tokio::test]
    async fn test_close_after_returns_connection() {
        let (registry, fake) = registry();
        let conn = registry.acquire(Some("x")).await.unwrap();
        registry.release(conn, Some("x"), true).await.unwrap();

        assert!(registry.retained_names().await.is_empty());
        assert_eq!(fake.state.closes(), 1);
        let fresh = registry.acquire(Some("x")).await.unwrap();
        assert_eq!(fresh.id, 2);
    }

    #[tokio::test]
    async fn test_unnamed_release_never_retains() {
        let (registry, fake) = registry();
        let conn = registry.acquire(None).await.unwrap();
        registry.release(conn, None, false).await.unwrap();
        assert!(registry.retained_names().await.is_empty());
        assert_eq!(fake.state.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_by_name() {
        let (registry, fake) = registry();
        let conn = registry.acquire(Some("a")).await.unwrap();
        registry.release(conn, Some("a"), false).await.unwrap();

        assert!(registry.close_by_name("a").await.unwrap());
        assert!(!registry.close_by_name("a").await.unwrap());
        assert!(!registry.close_by_name("never").await.unwrap());
        assert_eq!(fake.state.closes(), 1);
        assert!(registry.retained_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_all() {
        let (registry, fake) = registry();
        for name in ["a", "b", "c"] {
            let conn = registry.acquire(Some(name)).await.unwrap();
            registry.release(conn, Some(name), false).await.unwrap();
        }
        assert_eq!(registry.retained_names().await, ["a", "b", "c"]);

        registry.close_all().await.unwrap();
        assert!(registry.retained_names().await.is_empty());
        assert_eq!(fake.state.closes(), 3);
    }

    #[tokio::test]
    async fn test_retaining_over_a_name_releases_previous() {
        let (registry, fake) = registry();
        let first = registry.acquire(None).await.unwrap();
        let second = registry.acquire(None).await.unwrap();
        registry.release(first, Some("x"), false).await.unwrap();
        registry.release(second, Some("x"), false).await.unwrap();

        assert_eq!(fake.state.closes(), 1);
        assert_eq!(registry.acquire(Some("x")).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_sticky_statements_share_one_connection() {
        let (registry, fake) = registry();
        for a in 0..5 {
            let n = registry
                .execute("INSERT INTO t (a) VALUES (%s)", params![a], Some("load"), false)
                .await
                .unwrap();
            assert_eq!(n, 1);
        }
        let count = registry
            .fetch_as_table("SELECT COUNT(*) FROM t", params![], Some("load"), true)
            .await
            .unwrap();
        assert_eq!(count.get::<i64>(0, "COUNT(*)").unwrap(), 5);
        assert_eq!(fake.state.connects(), 1);
        assert!(registry.retained_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_logged_once_and_returned() {
        let (errors, _guard) = count_errors();
        let refusing = PooledRegistry::with_connector(FakeConnector::refusing(), 2);
        let err = refusing
            .fetch_as_rows("SELECT 1", params![], None, true)
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert_eq!(errors.count(), 1);

        let (registry, _fake) = registry();
        let err = registry
            .execute("FAIL", params![], Some("x"), false)
            .await
            .unwrap_err();
        assert!(err.is_statement());
        assert_eq!(registry.retained_names().await, ["x"]);
        assert_eq!(errors.count(), 2);
    }

    #[tokio::test]
    async fn test_shared_between_tasks() {
        let (registry, fake) = registry();
        let registry = Arc::new(registry);
        let mut handles = Vec::new();
        for i in 0..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("worker-{}", i);
                registry
                    .execute("INSERT INTO t (a) VALUES (%s)", params![i], Some(&name), false)
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(registry.retained_names().await.len(), 4);
        assert_eq!(fake.state.connects(), 4);
    }
}
