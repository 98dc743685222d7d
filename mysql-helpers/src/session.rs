//! Single-connection session

use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::executor::{self, Execute, Fetch, Statement};
use crate::mysql::MySqlConnector;
use crate::table::{Record, RowMode, Table};
use crate::traits::{Connection, Connector};
use crate::value::Value;

/// A session owns at most one live connection and reuses it across calls.
///
/// Every statement method opens the connection when needed, runs exactly
/// one statement, then either keeps the connection (`close_after = false`)
/// or closes it (`close_after = true`).
///
/// Failures come back as [`Error`](crate::Error): `Error::Connection` when no
/// link could be established, a statement error otherwise. Each failure is
/// also logged once with the statement and its parameters. Use `.ok()` when
/// "no result" is all the caller needs.
///
/// While a statement runs, the connection is moved out of the session. If
/// the calling future is dropped mid-statement the connection is dropped
/// with it and the session is left disconnected; the next call reconnects.
///
/// # Example
///
/// ```ignore
/// use mysql_helpers::{params, ConnectionConfig, Session};
///
/// let mut session = Session::new(ConnectionConfig::from_env()?);
/// session
///     .execute("INSERT INTO t (a) VALUES (%s)", params![1], false)
///     .await?;
/// let rows = session
///     .fetch_as_rows("SELECT COUNT(*) FROM t", params![], true)
///     .await?;
/// ```
pub struct Session<C: Connector = MySqlConnector> {
    connector: C,
    conn: Option<C::Conn>,
    row_mode: RowMode,
}

impl Session<MySqlConnector> {
    /// Create a session that connects directly to MySQL.
    ///
    /// No connection is made until the first call.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(MySqlConnector::new(config))
    }
}

impl<C: Connector> Session<C> {
    /// Create a session over any connection-acquisition strategy.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            conn: None,
            row_mode: RowMode::default(),
        }
    }

    /// Shape rows returned by [`fetch_as_rows`](Self::fetch_as_rows).
    pub fn with_row_mode(mut self, row_mode: RowMode) -> Self {
        self.set_row_mode(row_mode);
        self
    }

    pub fn set_row_mode(&mut self, row_mode: RowMode) {
        self.row_mode = row_mode;
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn row_mode(&self) -> RowMode {
        self.row_mode
    }

    /// Whether the session currently holds a connection.
    ///
    /// This reflects local state only; [`open`](Self::open) verifies the
    /// link with the server.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Return the held connection if the server confirms it is alive,
    /// otherwise make one fresh connection attempt.
    pub async fn open(&mut self) -> Result<&mut C::Conn> {
        let conn = self.take_open().await?;
        Ok(self.conn.insert(conn))
    }

    /// Like `open`, but moves the connection out of the session.
    async fn take_open(&mut self) -> Result<C::Conn> {
        if let Some(mut conn) = self.conn.take() {
            if conn.is_alive().await {
                return Ok(conn);
            }
            debug!("held connection is no longer alive, reconnecting");
        }
        let conn = self.connector.connect().await?;
        let (host, port) = self.connector.endpoint();
        debug!(host, port, "session connected");
        Ok(conn)
    }

    /// Close the held connection. A no-op when disconnected.
    pub async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                conn.close().await?;
                debug!("session closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Run a query and materialize its rows into a [`Table`].
    pub async fn fetch_as_table(
        &mut self,
        sql: &str,
        params: Vec<Value>,
        close_after: bool,
    ) -> Result<Table> {
        self.run(Fetch::Table, sql, params, close_after).await
    }

    /// Run a query and return its rows shaped by the session's [`RowMode`].
    pub async fn fetch_as_rows(
        &mut self,
        sql: &str,
        params: Vec<Value>,
        close_after: bool,
    ) -> Result<Vec<Record>> {
        let mode = self.row_mode;
        self.run(Fetch::Rows, sql, params, close_after)
            .await
            .map(|table| table.into_records(mode))
    }

    /// Run a mutating statement, committed on its own. Returns the number of
    /// affected rows.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: Vec<Value>,
        close_after: bool,
    ) -> Result<u64> {
        self.run(Execute, sql, params, close_after).await
    }

    async fn run<S: Statement>(
        &mut self,
        stmt: S,
        sql: &str,
        params: Vec<Value>,
        close_after: bool,
    ) -> Result<S::Output> {
        let result = self.run_inner(stmt, sql, &params, close_after).await;
        executor::report(stmt.name(), sql, &params, result)
    }

    async fn run_inner<S: Statement>(
        &mut self,
        stmt: S,
        sql: &str,
        params: &[Value],
        close_after: bool,
    ) -> Result<S::Output> {
        let mut conn = self.take_open().await?;
        let output = stmt.run(&mut conn, sql, params).await;
        if close_after {
            executor::close_quietly(conn).await;
        } else {
            self.conn = Some(conn);
        }
        output
    }
}
