//! Copy the delimited friend lists into the edge table
//!
//! The migration is a single linear pass:
//!
//! 1. read every source row
//! 2. plan the edges with the configured [`TokenRules`]
//! 3. create the destination table if it is missing
//! 4. insert every planned edge inside one transaction
//!
//! A failure anywhere in step 4 rolls the transaction back, so the edge table
//! is either fully migrated or untouched.

use crate::config::FriendMigrationConfig;
use crate::database::{Dialect, TableName};
use crate::error::{Error, Result};
use crate::friends::{FriendEdge, FriendshipRow, TokenRules};
use serde::Serialize;
use sqlx::AnyPool;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// What an insert does when the edge is already in the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the existing row alone and count the edge as skipped.
    /// Re-running the migration is a no-op.
    #[default]
    Skip,
    /// Fail with [`Error::DuplicateEdge`] and roll back the whole run
    Abort,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown conflict policy '{other}' (expected skip or abort)")),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

/// Edges derived from the source rows, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub source_rows: usize,
    /// Owners whose friend list produced no tokens
    pub empty_owners: usize,
    pub edges: Vec<FriendEdge>,
}

impl MigrationPlan {
    pub fn build(rows: &[FriendshipRow], rules: &TokenRules) -> Self {
        let mut plan = Self {
            source_rows: rows.len(),
            ..Self::default()
        };

        for row in rows {
            let tokens = rules.split(row.friend_list.as_deref());
            if tokens.is_empty() {
                debug!(owner = %row.owner, "no friends listed");
                plan.empty_owners += 1;
                continue;
            }
            plan.edges.extend(
                tokens
                    .into_iter()
                    .map(|friend| FriendEdge::new(row.owner.as_str(), friend)),
            );
        }

        plan
    }
}

/// Outcome of one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub source_rows: usize,
    pub empty_owners: usize,
    pub planned_edges: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub on_conflict: ConflictPolicy,
    pub dry_run: bool,
}

impl MigrationReport {
    fn from_plan(plan: &MigrationPlan, on_conflict: ConflictPolicy, dry_run: bool) -> Self {
        Self {
            source_rows: plan.source_rows,
            empty_owners: plan.empty_owners,
            planned_edges: plan.edges.len(),
            on_conflict,
            dry_run,
            ..Self::default()
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} source rows ({} without friends), {} edges planned, {} inserted, {} skipped",
            self.source_rows, self.empty_owners, self.planned_edges, self.inserted, self.skipped
        )?;
        if self.dry_run {
            f.write_str(" [dry run]")?;
        }
        Ok(())
    }
}

/// Migrates the delimited friend table into the edge table
pub struct FriendMigrator<'a> {
    pool: &'a AnyPool,
    config: FriendMigrationConfig,
}

impl<'a> FriendMigrator<'a> {
    pub fn new(pool: &'a AnyPool, config: FriendMigrationConfig) -> Self {
        Self { pool, config }
    }

    /// Create the destination table if it does not exist.
    ///
    /// An existing table is left exactly as it is, whatever its columns.
    #[instrument(skip(self), fields(table = %self.config.dest_table))]
    pub async fn ensure_destination(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                me VARCHAR(20) NOT NULL,
                friend VARCHAR(20) NOT NULL,
                PRIMARY KEY (me, friend)
            )",
            self.config.dest_table
        );

        sqlx::query(&ddl).execute(self.pool).await.map_err(|e| {
            Error::database_with_source(
                format!("Failed to create table {}: {}", self.config.dest_table, e),
                e,
            )
        })?;

        debug!("Destination table ready");
        Ok(())
    }

    /// Read the whole source table
    #[instrument(skip(self), fields(table = %self.config.source_table))]
    pub async fn fetch_source_rows(&self) -> Result<Vec<FriendshipRow>> {
        let sql = format!(
            "SELECT me, friends FROM {} ORDER BY me",
            self.config.source_table
        );

        let rows = sqlx::query_as::<_, FriendshipRow>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| {
                Error::database_with_source(
                    format!("Failed to read {}: {}", self.config.source_table, e),
                    e,
                )
            })?;

        debug!("Fetched {} source rows", rows.len());
        Ok(rows)
    }

    /// Run the migration. With `dry_run` nothing is written, not even the
    /// destination table.
    pub async fn run(&self, dry_run: bool) -> Result<MigrationReport> {
        info!(
            "👥 Migrating {} -> {} (on conflict: {})",
            self.config.source_table, self.config.dest_table, self.config.on_conflict
        );

        let rows = self.fetch_source_rows().await?;
        let plan = MigrationPlan::build(&rows, &self.config.rules);
        let mut report = MigrationReport::from_plan(&plan, self.config.on_conflict, dry_run);

        if dry_run {
            info!("Dry run: {}", report);
            return Ok(report);
        }

        self.ensure_destination().await?;
        self.insert_edges(&plan.edges, &mut report).await?;

        info!("✅ Friend migration complete: {}", report);
        Ok(report)
    }

    async fn insert_edges(&self, edges: &[FriendEdge], report: &mut MigrationReport) -> Result<()> {
        // One statement text for every row, so the connection reuses a
        // single prepared statement.
        let dialect = Dialect::of(self.pool)?;
        let sql = insert_edge_sql(dialect, &self.config.dest_table, self.config.on_conflict);

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::database_with_source(format!("Failed to begin transaction: {}", e), e)
        })?;

        for edge in edges {
            let result = sqlx::query(&sql)
                .bind(edge.owner.as_str())
                .bind(edge.friend.as_str())
                .execute(&mut *tx)
                .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => report.skipped += 1,
                Ok(_) => report.inserted += 1,
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    warn!(
                        owner = %edge.owner,
                        friend = %edge.friend,
                        "Duplicate edge, rolling back {} inserted rows",
                        report.inserted
                    );
                    if let Err(e) = tx.rollback().await {
                        warn!("Rollback failed: {}", e);
                    }
                    return Err(Error::DuplicateEdge {
                        owner: edge.owner.clone(),
                        friend: edge.friend.clone(),
                    });
                }
                // Dropping `tx` rolls the transaction back
                Err(e) => {
                    return Err(Error::database_with_source(
                        format!(
                            "Failed to insert ({}, {}) into {}: {}",
                            edge.owner, edge.friend, self.config.dest_table, e
                        ),
                        e,
                    ))
                }
            }
        }

        tx.commit().await.map_err(|e| {
            Error::database_with_source(format!("Failed to commit migration: {}", e), e)
        })?;

        Ok(())
    }
}

/// Insert statement for one edge under `policy`
pub(crate) fn insert_edge_sql(dialect: Dialect, table: &TableName, policy: ConflictPolicy) -> String {
    let (owner, friend) = (dialect.placeholder(1), dialect.placeholder(2));
    match (policy, dialect) {
        // IGNORE also downgrades data errors to warnings; the key is the
        // only thing that can collide on a two-column table.
        (ConflictPolicy::Skip, Dialect::MySql) => {
            format!("INSERT IGNORE INTO {table} (me, friend) VALUES ({owner}, {friend})")
        }
        (ConflictPolicy::Skip, Dialect::Postgres | Dialect::Sqlite) => format!(
            "INSERT INTO {table} (me, friend) VALUES ({owner}, {friend}) \
             ON CONFLICT (me, friend) DO NOTHING"
        ),
        (ConflictPolicy::Abort, _) => {
            format!("INSERT INTO {table} (me, friend) VALUES ({owner}, {friend})")
        }
    }
}
