//! Read one owner's friends

use crate::database::{Dialect, TableName};
use crate::error::{Error, Result};
use crate::friends::{FriendshipRow, TokenRules};
use sqlx::AnyPool;
use tracing::instrument;

/// Friends of `owner` from the edge table, sorted. An unknown owner has no
/// friends.
#[instrument(skip(pool))]
pub async fn load_friends(pool: &AnyPool, table: &TableName, owner: &str) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT friend FROM {} WHERE me = {} ORDER BY friend",
        table,
        Dialect::of(pool)?.placeholder(1)
    );

    let friends = sqlx::query_scalar::<_, String>(&sql)
        .bind(owner)
        .fetch_all(pool)
        .await?;

    Ok(friends)
}

/// Friends of `owner` read straight from the delimited source table
#[instrument(skip(pool, rules))]
pub async fn load_friends_from_source(
    pool: &AnyPool,
    table: &TableName,
    owner: &str,
    rules: &TokenRules,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT me, friends FROM {} WHERE me = {}",
        table,
        Dialect::of(pool)?.placeholder(1)
    );

    let row = sqlx::query_as::<_, FriendshipRow>(&sql)
        .bind(owner)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::not_found("friendship row", owner))?;

    Ok(rules
        .split(row.friend_list.as_deref())
        .into_iter()
        .map(str::to_string)
        .collect())
}
