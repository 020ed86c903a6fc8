//! Friend graph migration
//!
//! The legacy `friends` table stores one row per owner with every friend
//! packed into a delimited string. This module normalizes it into one row per
//! (owner, friend) edge and reads the result back.
//!
//! - `tokens` - splitting rules for the delimited list
//! - `migrator` - the one-shot copy into the edge table
//! - `lookup` - reading an owner's friends from either table

pub mod lookup;
pub mod migrator;
pub mod tokens;

pub use lookup::{load_friends, load_friends_from_source};
pub use migrator::{ConflictPolicy, FriendMigrator, MigrationPlan, MigrationReport};
pub use tokens::TokenRules;

use serde::Serialize;

/// One row of the source table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FriendshipRow {
    #[sqlx(rename = "me")]
    pub owner: String,
    #[sqlx(rename = "friends")]
    pub friend_list: Option<String>,
}

impl FriendshipRow {
    pub fn new(owner: impl Into<String>, friend_list: Option<&str>) -> Self {
        Self {
            owner: owner.into(),
            friend_list: friend_list.map(str::to_string),
        }
    }
}

/// One row of the destination table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FriendEdge {
    pub owner: String,
    pub friend: String,
}

impl FriendEdge {
    pub fn new(owner: impl Into<String>, friend: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            friend: friend.into(),
        }
    }
}
