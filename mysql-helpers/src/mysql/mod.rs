//! MySQL implementation for mysql-helpers

mod connection;
mod types;

pub use connection::{MySqlConnection, MySqlConnector, MySqlPoolConnector};
pub use types::{from_mysql_value, to_mysql_params, to_mysql_value};
