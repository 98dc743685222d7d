//! MySQL connectors: direct connect and pool checkout

use std::fmt;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::placeholders::normalize_placeholders;
use crate::table::Table;
use crate::traits::{Connection, Connector};
use crate::value::Value;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{
    Column, Conn, Opts, Pool as MysqlAsyncPool, PoolConstraints, PoolOpts, Row as MySqlAsyncRow,
};
use tracing::debug;

use super::types::{from_mysql_value, to_mysql_params};

/// Statements run on every new physical connection.
const INIT_STATEMENTS: &[&str] = &["SET autocommit = 1"];

fn session_opts(config: &ConnectionConfig) -> mysql_async::OptsBuilder {
    config
        .opts_builder()
        .init(INIT_STATEMENTS.iter().map(|s| s.to_string()).collect())
}

/// Opens a fresh connection per [`Connector::connect`] call.
#[derive(Clone)]
pub struct MySqlConnector {
    config: ConnectionConfig,
    opts: Opts,
}

impl MySqlConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        let opts = session_opts(&config).into();
        Self { config, opts }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl fmt::Debug for MySqlConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConnector")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Conn = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection> {
        debug!(host = %self.config.host(), port = self.config.port(), "connecting");
        let conn = Conn::new(self.opts.clone()).await.map_err(|e| {
            Error::connection(self.config.host(), self.config.port(), e.into())
        })?;
        Ok(MySqlConnection::new(conn, false, self.config.raise_on_warnings()))
    }

    fn endpoint(&self) -> (&str, u16) {
        (self.config.host(), self.config.port())
    }
}

/// Checks connections out of a bounded `mysql_async` pool.
///
/// Cloning is cheap: clones share the same pool.
#[derive(Clone)]
pub struct MySqlPoolConnector {
    config: ConnectionConfig,
    pool: MysqlAsyncPool,
}

impl MySqlPoolConnector {
    /// Create a pool holding at most `capacity` connections.
    ///
    /// No connection is opened until the first checkout.
    pub fn new(config: ConnectionConfig, capacity: usize) -> Result<Self> {
        let constraints = PoolConstraints::new(1, capacity).ok_or_else(|| {
            Error::Configuration(format!("invalid pool capacity: {}", capacity))
        })?;
        let opts = session_opts(&config)
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        Ok(Self {
            config,
            pool: MysqlAsyncPool::new(opts),
        })
    }

    /// Get a reference to the underlying mysql_async pool.
    pub fn inner(&self) -> &MysqlAsyncPool {
        &self.pool
    }

    /// Close every idle connection and stop the pool.
    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }
}

impl fmt::Debug for MySqlPoolConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlPoolConnector")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Connector for MySqlPoolConnector {
    type Conn = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection> {
        let conn = self.pool.get_conn().await.map_err(|e| {
            Error::connection(self.config.host(), self.config.port(), e.into())
        })?;
        Ok(MySqlConnection::new(conn, true, self.config.raise_on_warnings()))
    }

    fn endpoint(&self) -> (&str, u16) {
        (self.config.host(), self.config.port())
    }
}

/// A live MySQL link, either owned outright or checked out of a pool.
pub struct MySqlConnection {
    conn: Conn,
    pooled: bool,
    raise_on_warnings: bool,
}

impl MySqlConnection {
    fn new(conn: Conn, pooled: bool, raise_on_warnings: bool) -> Self {
        Self {
            conn,
            pooled,
            raise_on_warnings,
        }
    }

    /// Server-side connection id.
    pub fn id(&self) -> u32 {
        self.conn.id()
    }

    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    fn check_warnings(&self, count: u16) -> Result<()> {
        if self.raise_on_warnings && count > 0 {
            return Err(Error::Warnings { count });
        }
        Ok(())
    }
}

impl fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("id", &self.conn.id())
            .field("pooled", &self.pooled)
            .finish()
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn is_alive(&mut self) -> bool {
        self.conn.ping().await.is_ok()
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Table> {
        let sql = normalize_placeholders(sql);
        let mut result = self.conn.exec_iter(&*sql, to_mysql_params(params)?).await?;

        let columns: Vec<Column> = result.columns_ref().to_vec();
        let rows: Vec<MySqlAsyncRow> = result.collect().await?;
        let warnings = result.warnings();
        // Drains any further result sets so the link is reusable
        result.drop_result().await?;
        self.check_warnings(warnings)?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let cell = row
                    .as_ref(i)
                    .ok_or_else(|| Error::ColumnNotFound(column.name_str().into_owned()))?
                    .clone();
                cells.push(from_mysql_value(cell, column));
            }
            values.push(cells);
        }

        let names = columns.iter().map(|c| c.name_str().into_owned()).collect();
        Table::new(names, values)
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let sql = normalize_placeholders(sql);
        let result = self.conn.exec_iter(&*sql, to_mysql_params(params)?).await?;
        let rows_affected = result.affected_rows();
        let warnings = result.warnings();
        result.drop_result().await?;
        self.check_warnings(warnings)?;
        Ok(rows_affected)
    }

    async fn close(self) -> Result<()> {
        if self.pooled {
            // Dropping a pooled conn hands it back to its pool
            drop(self.conn);
        } else {
            self.conn.disconnect().await?;
        }
        Ok(())
    }
}
