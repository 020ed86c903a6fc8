//! Database connection pool and utilities
//!
//! The migrations talk to the database through the sqlx `Any` driver: MySQL
//! in production, SQLite in tests, PostgreSQL when pointed at one. The few
//! statements whose syntax differs between backends ask [`Dialect`] for it.
//! The pool defaults to a single connection: each migration is one linear
//! pass that holds its connection exclusively until `close()`.

use crate::config::{mask_url, DatabaseConfig};
use crate::error::{Error, Result};
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Longest identifier accepted by every supported backend (PostgreSQL: 63)
const MAX_IDENTIFIER_LEN: usize = 63;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Create a new database connection pool
    #[instrument(skip(config))]
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self { pool })
    }

    /// Get reference to the underlying pool
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// SQL dialect of the connected backend
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::of(&self.pool)
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database_with_source(format!("Health check failed: {}", e), e))?;
        Ok(())
    }

    /// Close all connections gracefully
    pub async fn close(&self) {
        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// Create a connection pool with the given configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let dialect = Dialect::from_url(&config.url)?;
    info!("Connecting to {} ({})", mask_url(&config.url), dialect);
    debug!(
        "Pool config: max={}, connect_timeout={:?}",
        config.max_connections, config.connect_timeout
    );

    let mut connect_options = AnyConnectOptions::from_str(&config.url)
        .map_err(|e| Error::config(format!("Invalid database URL: {}", e)))?;

    // Statements are only echoed at debug level (RUST_LOG=sqlx=debug)
    connect_options = connect_options.log_statements(log::LevelFilter::Debug);
    connect_options =
        connect_options.log_slow_statements(log::LevelFilter::Warn, config.slow_statement_threshold);

    let pool = AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            Error::database_with_source(format!("Failed to create connection pool: {}", e), e)
        })?;

    // Verify we can connect
    sqlx::query("SELECT 1").fetch_one(&pool).await.map_err(|e| {
        Error::database_with_source(format!("Failed to verify database connection: {}", e), e)
    })?;

    info!("Database connection established (size: {})", pool.size());

    Ok(pool)
}

/// SQL flavour of a backend, picked from the connection URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split_once(':').map(|(scheme, _)| scheme).unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: format!(
                    "unsupported database scheme '{other}' (expected mysql, postgres or sqlite)"
                )
                .into(),
            }),
        }
    }

    /// Dialect of the backend `pool` connects to
    pub fn of(pool: &AnyPool) -> Result<Self> {
        Self::from_url(pool.connect_options().database_url.as_str())
    }

    /// Bind marker for the `n`th (1-based) statement parameter
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Target type for `CAST(.. AS ..)` to a signed 64-bit integer
    pub fn bigint(self) -> &'static str {
        match self {
            Self::MySql => "SIGNED",
            Self::Postgres | Self::Sqlite => "BIGINT",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql => f.write_str("MySQL"),
            Self::Postgres => f.write_str("PostgreSQL"),
            Self::Sqlite => f.write_str("SQLite"),
        }
    }
}

/// A table name that is safe to splice into SQL text.
///
/// Identifiers cannot be bound as statement parameters, so configured table
/// names are restricted to `[A-Za-z_][A-Za-z0-9_]*` instead of being quoted
/// (quoting rules differ between backends).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Validate `name` as a plain SQL identifier
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if is_plain_identifier(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidIdentifier { name })
        }
    }

    /// Build a name from a literal known to be valid
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(is_plain_identifier(name), "invalid table literal {name}");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TableName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
