//! mysql-helpers - single-statement MySQL helpers
//!
//! Thin helpers built on `mysql_async` for scripts and services that run one
//! statement at a time against MySQL.
//!
//! # Features
//!
//! - **Session**: one reusable connection, reconnected when it goes stale
//! - **PooledRegistry**: a bounded pool with named connections kept out of
//!   rotation across calls
//! - **Blocking front-ends**: the same API for synchronous callers, plus a
//!   lock-guarded [`blocking::SharedSession`]
//! - **Environment config**: credentials from `DB_HOST`, `DB_PORT`,
//!   `DB_USER`, `DB_PASS` and `DB_NAME`
//!
//! Statements use `%s` placeholders; parameters are always sent to the
//! server separately from the SQL text.
//!
//! # Example
//!
//! ```ignore
//! use mysql_helpers::{params, ConnectionConfig, Session};
//!
//! async fn count_users(active: bool) -> mysql_helpers::Result<i64> {
//!     let mut session = Session::new(ConnectionConfig::from_env()?);
//!     let table = session
//!         .fetch_as_table("SELECT COUNT(*) AS n FROM users WHERE active = %s", params![active], true)
//!         .await?;
//!     table.get(0, "n")
//! }
//! ```

pub mod blocking;
pub mod config;
pub mod error;
mod executor;
pub mod mysql;
pub mod placeholders;
pub mod pooled;
pub mod session;
pub mod table;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use error::{Error, Result};
pub use mysql::{MySqlConnection, MySqlConnector, MySqlPoolConnector};
pub use placeholders::normalize_placeholders;
pub use pooled::{clamp_pool_size, PooledRegistry, DEFAULT_POOL_SIZE, MAX_POOL_SIZE};
pub use session::Session;
pub use table::{Record, RowMode, Table};
pub use traits::{Connection, Connector, FromValue};
pub use value::Value;
