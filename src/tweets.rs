//! Render stored tweet text to HTML
//!
//! Tweets used to be rendered on every page view. This one-shot migration
//! stores the rendered form instead: HTML entities escaped and hashtags
//! turned into links to the hashtag search page.
//!
//! Rendering escapes `&`, so running the migration twice double-escapes every
//! tweet. Run it once per dataset.
//!
//! Unlike the old in-app renderer, the whitespace ending a hashtag stays
//! outside the link (it used to land in both the href and the link text) and
//! the tag text is escaped once, not twice.

use crate::database::{Dialect, TableName};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use sqlx::AnyPool;
use std::fmt;
use tracing::{debug, info, instrument};

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\S+)(\s|$)").expect("hashtag pattern is valid"));

/// Escape HTML entities, then link every `#tag`
pub fn htmlify(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;");

    HASHTAG
        .replace_all(&escaped, |caps: &Captures<'_>| {
            let tag = &caps[1];
            format!(
                "<a class=\"hashtag\" href=\"/hashtag/{tag}\">#{tag}</a>{}",
                &caps[2]
            )
        })
        .into_owned()
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TweetRow {
    id: i64,
    text: String,
}

/// Outcome of one tweet rendering run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TweetReport {
    pub rows: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub dry_run: bool,
}

impl fmt::Display for TweetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tweets, {} rewritten, {} unchanged",
            self.rows, self.rewritten, self.unchanged
        )?;
        if self.dry_run {
            f.write_str(" [dry run]")?;
        }
        Ok(())
    }
}

/// Rewrite every tweet in `table` to its rendered form in one transaction
#[instrument(skip(pool))]
pub async fn migrate_tweets(pool: &AnyPool, table: &TableName, dry_run: bool) -> Result<TweetReport> {
    info!("📝 Rendering tweets in {}", table);

    let dialect = Dialect::of(pool)?;
    let select = format!(
        "SELECT CAST(id AS {}) AS id, text FROM {} ORDER BY id",
        dialect.bigint(),
        table
    );
    let update = format!(
        "UPDATE {} SET text = {} WHERE id = {}",
        table,
        dialect.placeholder(1),
        dialect.placeholder(2)
    );

    let mut tx = pool.begin().await.map_err(|e| {
        Error::database_with_source(format!("Failed to begin transaction: {}", e), e)
    })?;

    let rows = sqlx::query_as::<_, TweetRow>(&select)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source(format!("Failed to read {}: {}", table, e), e))?;

    let mut report = TweetReport {
        rows: rows.len(),
        dry_run,
        ..TweetReport::default()
    };

    for row in &rows {
        let html = htmlify(&row.text);
        if html == row.text {
            report.unchanged += 1;
            continue;
        }

        report.rewritten += 1;
        if dry_run {
            continue;
        }

        debug!(id = row.id, "rewriting tweet");
        sqlx::query(&update)
            .bind(html)
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::database_with_source(format!("Failed to update tweet {}: {}", row.id, e), e)
            })?;
    }

    if dry_run {
        tx.rollback().await?;
        info!("Dry run: {}", report);
    } else {
        tx.commit().await.map_err(|e| {
            Error::database_with_source(format!("Failed to commit tweet rendering: {}", e), e)
        })?;
        info!("✅ Tweet rendering complete: {}", report);
    }

    Ok(report)
}
