//! Configuration management for the isuwitter migrations
//!
//! Strongly-typed configuration read from the environment (with `.env`
//! support through `dotenvy`), validated once at startup.
//!
//! # Example
//! ```no_run
//! use isuwitter_migrate::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("Source table: {}", config.friends.source_table);
//! ```

use crate::database::{Dialect, TableName};
use crate::error::{Error, Result};
use crate::friends::{ConflictPolicy, TokenRules};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Friend-table migration configuration
    pub friends: FriendMigrationConfig,
    /// Tweet rendering migration configuration
    pub tweets: TweetMigrationConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (`mysql://...` in production, `sqlite://...` in tests)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Statements slower than this are logged at warn level
    pub slow_statement_threshold: Duration,
}

/// Friend-table migration configuration
#[derive(Debug, Clone)]
pub struct FriendMigrationConfig {
    /// Table holding one delimited friend list per owner
    pub source_table: TableName,
    /// Table receiving one row per (owner, friend) edge
    pub dest_table: TableName,
    /// How friend lists are split into tokens
    pub rules: TokenRules,
    /// What to do when an edge is already present
    pub on_conflict: ConflictPolicy,
}

/// Tweet rendering migration configuration
#[derive(Debug, Clone)]
pub struct TweetMigrationConfig {
    pub table: TableName,
}

/// Local isuwitter database of the benchmark image
pub const DEFAULT_DATABASE_URL: &str = "mysql://root@localhost:3306/isuwitter";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let config = Self {
            database: DatabaseConfig::from_env()?,
            friends: FriendMigrationConfig::from_env()?,
            tweets: TweetMigrationConfig::from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: "Database URL cannot be empty".into(),
            });
        }

        Dialect::from_url(&self.database.url)?;

        if self.database.max_connections == 0 {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be at least 1".into(),
            });
        }

        if self.friends.source_table == self.friends.dest_table {
            return Err(Error::InvalidConfig {
                key: "FRIENDS_DEST_TABLE",
                message: format!(
                    "destination table must differ from source table '{}'",
                    self.friends.source_table
                )
                .into(),
            });
        }

        if self.friends.rules.delimiter.is_whitespace() && self.friends.rules.trim {
            return Err(Error::InvalidConfig {
                key: "FRIENDS_DELIMITER",
                message: "a whitespace delimiter cannot be combined with FRIENDS_TRIM=true".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!("    URL: {}", mask_url(&self.database.url));
        info!("    Pool Size: {}", self.database.max_connections);
        info!("  Friends:");
        info!(
            "    {} -> {}",
            self.friends.source_table, self.friends.dest_table
        );
        info!(
            "    Delimiter: {:?}, trim: {}, dedupe: {}",
            self.friends.rules.delimiter, self.friends.rules.trim, self.friends.rules.dedupe
        );
        info!("    On conflict: {}", self.friends.on_conflict);
        info!("  Tweets:");
        info!("    Table: {}", self.tweets.table);
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: get_env("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: get_env_parsed_or("DB_MAX_CONNECTIONS", 1)?,
            connect_timeout: Duration::from_secs(get_env_parsed_or("DB_CONNECT_TIMEOUT_SECS", 30)?),
            slow_statement_threshold: Duration::from_millis(get_env_parsed_or(
                "DB_SLOW_STATEMENT_MS",
                1000,
            )?),
        })
    }

    /// Configuration pointing at `url` with the single-connection defaults
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 1,
            connect_timeout: Duration::from_secs(30),
            slow_statement_threshold: Duration::from_secs(1),
        }
    }
}

impl FriendMigrationConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            source_table: get_env_table("FRIENDS_SOURCE_TABLE", "friends")?,
            dest_table: get_env_table("FRIENDS_DEST_TABLE", "friends2")?,
            rules: TokenRules {
                delimiter: get_env_delimiter("FRIENDS_DELIMITER", ',')?,
                trim: get_env_parsed_or("FRIENDS_TRIM", true)?,
                dedupe: get_env_parsed_or("FRIENDS_DEDUPE", true)?,
            },
            on_conflict: get_env_parsed_or("FRIENDS_ON_CONFLICT", ConflictPolicy::Skip)?,
        })
    }
}

impl Default for FriendMigrationConfig {
    fn default() -> Self {
        Self {
            source_table: TableName::from_static("friends"),
            dest_table: TableName::from_static("friends2"),
            rules: TokenRules::default(),
            on_conflict: ConflictPolicy::Skip,
        }
    }
}

impl TweetMigrationConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            table: get_env_table("TWEETS_TABLE", "tweets")?,
        })
    }
}

impl Default for TweetMigrationConfig {
    fn default() -> Self {
        Self {
            table: TableName::from_static("tweets"),
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an optional environment variable, rejecting unparsable values
fn get_env_parsed_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
            key,
            message: format!("Invalid value '{}': {}", value, e).into(),
        }),
        Err(_) => Ok(default),
    }
}

/// Get a table name, validated as a plain SQL identifier
fn get_env_table(key: &'static str, default: &str) -> Result<TableName> {
    let value = get_env_or(key, default);
    TableName::new(value.trim()).map_err(|e| Error::InvalidConfig {
        key,
        message: e.to_string().into(),
    })
}

/// Get a single-character delimiter
fn get_env_delimiter(key: &'static str, default: char) -> Result<char> {
    match std::env::var(key) {
        Ok(value) => parse_delimiter(&value).ok_or_else(|| Error::InvalidConfig {
            key,
            message: format!("delimiter must be exactly one character, got {:?}", value).into(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_delimiter(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Mask sensitive parts of URL
pub(crate) fn mask_url(url: &str) -> String {
    // Mask password if present
    if let Some(at_pos) = url.find('@') {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if let Some(colon_pos) = url[scheme_end..at_pos].rfind(':') {
            let colon_pos = scheme_end + colon_pos;
            return format!("{}****{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
