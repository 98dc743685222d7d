//! Blocking front-ends over [`crate::Session`] and [`crate::PooledRegistry`].
//!
//! Each type owns a tokio runtime and blocks the calling thread on it. They
//! panic if called from inside an async context; use the async types there.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Builder, Runtime};
use tracing::warn;

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::mysql::{MySqlConnector, MySqlPoolConnector};
use crate::pooled::PooledRegistry as AsyncPooledRegistry;
use crate::session::Session as AsyncSession;
use crate::table::{Record, RowMode, Table};
use crate::traits::Connector;
use crate::value::Value;

/// Blocking single-connection session.
///
/// Dropping the session closes its connection.
pub struct Session<C: Connector = MySqlConnector> {
    inner: AsyncSession<C>,
    runtime: Runtime,
}

impl Session<MySqlConnector> {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_connector(MySqlConnector::new(config))
    }
}

impl<C: Connector> Session<C> {
    pub fn with_connector(connector: C) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            inner: AsyncSession::with_connector(connector),
            runtime,
        })
    }

    pub fn with_row_mode(mut self, row_mode: RowMode) -> Self {
        self.inner.set_row_mode(row_mode);
        self
    }

    pub fn row_mode(&self) -> RowMode {
        self.inner.row_mode()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Make sure a live connection is held.
    pub fn open(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.open()).map(|_| ())
    }

    pub fn close(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.close())
    }

    pub fn fetch_as_table(&mut self, sql: &str, params: Vec<Value>, close_after: bool) -> Result<Table> {
        self.runtime
            .block_on(self.inner.fetch_as_table(sql, params, close_after))
    }

    pub fn fetch_as_rows(
        &mut self,
        sql: &str,
        params: Vec<Value>,
        close_after: bool,
    ) -> Result<Vec<Record>> {
        self.runtime
            .block_on(self.inner.fetch_as_rows(sql, params, close_after))
    }

    pub fn execute(&mut self, sql: &str, params: Vec<Value>, close_after: bool) -> Result<u64> {
        self.runtime
            .block_on(self.inner.execute(sql, params, close_after))
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.block_on(self.inner.close()) {
            warn!(error = %e, "failed to close session on drop");
        }
    }
}

/// Blocking pooled registry.
///
/// Runs on a multi-threaded runtime so the pool's background maintenance
/// keeps going between calls. Dropping the registry releases every
/// retained connection.
pub struct PooledRegistry<C: Connector = MySqlPoolConnector> {
    inner: AsyncPooledRegistry<C>,
    runtime: Runtime,
}

fn pool_runtime() -> Result<Runtime> {
    Ok(Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("mysql-helpers-pool")
        .enable_all()
        .build()?)
}

impl PooledRegistry<MySqlPoolConnector> {
    pub fn new(config: ConnectionConfig, pool_size: usize) -> Result<Self> {
        let runtime = pool_runtime()?;
        // The driver pool spawns its maintenance task on creation
        let inner = {
            let _enter = runtime.enter();
            AsyncPooledRegistry::new(config, pool_size)?
        };
        Ok(Self { inner, runtime })
    }
}

impl<C: Connector> PooledRegistry<C> {
    pub fn with_connector(connector: C, pool_size: usize) -> Result<Self> {
        Ok(Self {
            inner: AsyncPooledRegistry::with_connector(connector, pool_size),
            runtime: pool_runtime()?,
        })
    }

    pub fn with_pool_name(mut self, pool_name: impl Into<String>) -> Self {
        self.inner.set_pool_name(pool_name);
        self
    }

    pub fn with_row_mode(mut self, row_mode: RowMode) -> Self {
        self.inner.set_row_mode(row_mode);
        self
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn retained_names(&self) -> Vec<String> {
        self.runtime.block_on(self.inner.retained_names())
    }

    pub fn close_by_name(&self, name: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.close_by_name(name))
    }

    pub fn close_all(&self) -> Result<()> {
        self.runtime.block_on(self.inner.close_all())
    }

    pub fn fetch_as_table(
        &self,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<Table> {
        self.runtime
            .block_on(self.inner.fetch_as_table(sql, params, name, close_after))
    }

    pub fn fetch_as_rows(
        &self,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<Vec<Record>> {
        self.runtime
            .block_on(self.inner.fetch_as_rows(sql, params, name, close_after))
    }

    pub fn execute(
        &self,
        sql: &str,
        params: Vec<Value>,
        name: Option<&str>,
        close_after: bool,
    ) -> Result<u64> {
        self.runtime
            .block_on(self.inner.execute(sql, params, name, close_after))
    }
}

impl<C: Connector> Drop for PooledRegistry<C> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.block_on(self.inner.close_all()) {
            warn!(error = %e, "failed to release retained connections on drop");
        }
    }
}

/// A cloneable, thread-safe handle over one blocking [`Session`].
///
/// Every call holds the session's lock for its whole
/// open, run and close span, so a shared instance runs one statement at a
/// time. A lock poisoned by a panicking caller is recovered; the session
/// underneath only ever holds a connection or nothing.
pub struct SharedSession<C: Connector = MySqlConnector> {
    inner: Arc<Mutex<Session<C>>>,
}

impl<C: Connector> Clone for SharedSession<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedSession<MySqlConnector> {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Ok(Self::from_session(Session::new(config)?))
    }
}

impl<C: Connector> SharedSession<C> {
    pub fn with_connector(connector: C) -> Result<Self> {
        Ok(Self::from_session(Session::with_connector(connector)?))
    }

    pub fn from_session(session: Session<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    pub fn open(&self) -> Result<()> {
        self.lock().open()
    }

    pub fn close(&self) -> Result<()> {
        self.lock().close()
    }

    pub fn fetch_as_table(&self, sql: &str, params: Vec<Value>, close_after: bool) -> Result<Table> {
        self.lock().fetch_as_table(sql, params, close_after)
    }

    pub fn fetch_as_rows(
        &self,
        sql: &str,
        params: Vec<Value>,
        close_after: bool,
    ) -> Result<Vec<Record>> {
        self.lock().fetch_as_rows(sql, params, close_after)
    }

    pub fn execute(&self, sql: &str, params: Vec<Value>, close_after: bool) -> Result<u64> {
        self.lock().execute(sql, params, close_after)
    }
}
