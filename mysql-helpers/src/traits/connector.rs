//! Connection-acquisition strategy traits.
//!
//! A [`Connector`] is how a session or registry obtains a live link: a
//! direct connect, a pool checkout, or a test double. Everything above this
//! seam is shared between the variants.

use crate::error::Result;
use crate::table::Table;
use crate::value::Value;
use async_trait::async_trait;

/// Obtains live connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connection type handed out by this connector.
    type Conn: Connection;

    /// Make exactly one attempt to obtain a connection.
    ///
    /// For pooled connectors this waits while the pool is exhausted.
    async fn connect(&self) -> Result<Self::Conn>;

    /// Host and port used in error and log context.
    fn endpoint(&self) -> (&str, u16);
}

/// One live database link.
///
/// `query` and `execute` run exactly one statement and fully drain its
/// result before returning, whether the statement succeeded or not.
#[async_trait]
pub trait Connection: Send {
    /// Whether the link is still usable. Performs a round trip.
    async fn is_alive(&mut self) -> bool;

    /// Run a statement and materialize every row it returns.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Table>;

    /// Run a mutating statement and commit it. Returns the affected-row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Release the link. For pooled links this hands it back to the pool.
    async fn close(self) -> Result<()>;
}
