//! Statement execution shared by [`Session`](crate::Session) and
//! [`PooledRegistry`](crate::PooledRegistry).
//!
//! Callers obtain a connection, run one [`Statement`] on it, hand the
//! connection back, then pass the outcome through [`report`] so that every
//! failed operation is logged exactly once.

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::table::Table;
use crate::traits::Connection;
use crate::value::Value;

/// A statement shape and the output it yields.
#[async_trait]
pub(crate) trait Statement: Copy + Send + Sync {
    type Output: Send;

    /// Operation name used in log context.
    fn name(self) -> &'static str;

    async fn run<C: Connection>(
        self,
        conn: &mut C,
        sql: &str,
        params: &[Value],
    ) -> Result<Self::Output>;
}

/// A row-returning statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fetch {
    Table,
    Rows,
}

#[async_trait]
impl Statement for Fetch {
    type Output = Table;

    fn name(self) -> &'static str {
        match self {
            Fetch::Table => "fetch_as_table",
            Fetch::Rows => "fetch_as_rows",
        }
    }

    async fn run<C: Connection>(self, conn: &mut C, sql: &str, params: &[Value]) -> Result<Table> {
        conn.query(sql, params).await
    }
}

/// A mutating statement yielding its affected-row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Execute;

#[async_trait]
impl Statement for Execute {
    type Output = u64;

    fn name(self) -> &'static str {
        "execute"
    }

    async fn run<C: Connection>(self, conn: &mut C, sql: &str, params: &[Value]) -> Result<u64> {
        conn.execute(sql, params).await
    }
}

/// Release a connection, logging rather than surfacing close failures.
pub(crate) async fn close_quietly<C: Connection>(conn: C) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "failed to close connection");
    } else {
        debug!("connection closed");
    }
}

/// Log a failed operation with its statement context.
pub(crate) fn report<T>(op: &str, sql: &str, params: &[Value], result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_connection() {
            error!(op, sql, params = ?params, error = %e, "could not obtain a connection");
        } else {
            error!(op, sql, params = ?params, error = %e, "statement failed");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::testing::FakeConnector;
    use crate::traits::Connector;

    #[tokio::test]
    async fn test_statements_route_to_their_connection_method() {
        let fake = FakeConnector::default();
        let mut conn = fake.connect().await.unwrap();

        let n = Execute
            .run(&mut conn, "INSERT INTO t (a) VALUES (%s)", &params![4])
            .await
            .unwrap();
        assert_eq!(n, 1);

        let table = Fetch::Rows
            .run(&mut conn, "SELECT a FROM t", &params![])
            .await
            .unwrap();
        assert_eq!(table.get::<i64>(0, "a").unwrap(), 4);
        assert_eq!(Fetch::Table.name(), "fetch_as_table");
        assert_eq!(Execute.name(), "execute");
    }
}
