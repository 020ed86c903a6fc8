//! isuwitter migration library crate
//!
//! One-shot data migrations for the isuwitter database, exposed as a library
//! for the `isuwitter-migrate` binary and the integration tests.

pub mod config;
pub mod database;
pub mod error;
pub mod friends;
pub mod tweets;

// Re-export commonly used types
pub use config::Config;
pub use database::{Database, Dialect, TableName};
pub use error::{Error, Result};
pub use friends::{ConflictPolicy, FriendMigrator, MigrationReport, TokenRules};
pub use tweets::{htmlify, migrate_tweets, TweetReport};
