//! Connection configuration
//!
//! Every field is resolved once, when the config is built: an explicit
//! builder value wins, otherwise the matching `DB_*` environment variable
//! is used. The resulting [`ConnectionConfig`] is immutable.

use std::collections::HashMap;
use std::fmt;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Prefix of the environment variables read as fallback (`DB_HOST`, ...).
pub const ENV_PREFIX: &str = "DB";

/// Resolved, immutable connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    raise_on_warnings: bool,
}

impl ConnectionConfig {
    /// Start building a config. Unset fields fall back to the environment.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Resolve every field from the `DB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn raise_on_warnings(&self) -> bool {
        self.raise_on_warnings
    }

    /// Driver options for a single direct connection.
    pub fn opts(&self) -> mysql_async::Opts {
        self.opts_builder().into()
    }

    pub(crate) fn opts_builder(&self) -> mysql_async::OptsBuilder {
        mysql_async::OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .db_name(Some(self.database.clone()))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("raise_on_warnings", &self.raise_on_warnings)
            .finish()
    }
}

/// Values as read from the environment. Keys follow `DB_<KEY>`.
#[derive(Debug, Default, Deserialize)]
struct EnvValues {
    host: Option<String>,
    port: Option<String>,
    user: Option<String>,
    pass: Option<String>,
    name: Option<String>,
}

/// Builder for [`ConnectionConfig`].
///
/// # Example
///
/// ```ignore
/// use mysql_helpers::ConnectionConfig;
///
/// // DB_USER, DB_PASS and DB_NAME come from the environment
/// let config = ConnectionConfig::builder()
///     .host("db.internal")
///     .port(3307)
///     .build()?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct ConnectionConfigBuilder {
    host: Option<String>,
    port: Option<String>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    raise_on_warnings: bool,
    env: Option<HashMap<String, String>>,
}

impl ConnectionConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port.to_string());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Fail statements that produce server warnings.
    pub fn raise_on_warnings(mut self, raise: bool) -> Self {
        self.raise_on_warnings = raise;
        self
    }

    /// Resolve fallbacks from this map instead of the process environment.
    ///
    /// Keys are full variable names, e.g. `DB_HOST`.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Resolve all fields. Fails if any field is missing or empty.
    pub fn build(self) -> Result<ConnectionConfig> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .source(self.env);
        let from_env: EnvValues = Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;

        let host = required("host", "DB_HOST", self.host.or(from_env.host))?;
        let port = required("port", "DB_PORT", self.port.or(from_env.port))?;
        let user = required("user", "DB_USER", self.user.or(from_env.user))?;
        let password = required("password", "DB_PASS", self.password.or(from_env.pass))?;
        let database = required("database", "DB_NAME", self.database.or(from_env.name))?;

        let port = port.trim().parse::<u16>().map_err(|_| {
            Error::Configuration(format!("port must be a number in 1..=65535, got {:?}", port))
        })?;
        if port == 0 {
            return Err(Error::Configuration("port must not be 0".into()));
        }

        Ok(ConnectionConfig {
            host,
            port,
            user,
            password,
            database,
            raise_on_warnings: self.raise_on_warnings,
        })
    }
}

fn required(field: &str, var: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Configuration(format!(
            "{} is required: pass it explicitly or set {}",
            field, var
        ))),
    }
}
