//! Core traits for mysql-helpers

mod connector;
mod from_value;

pub use connector::{Connection, Connector};
pub use from_value::FromValue;
