//! isuwitter migration CLI
//!
//! One-shot data fixes for the isuwitter database:
//!
//! - **friends**: normalize the delimited `friends` table into one row per
//!   (owner, friend) edge
//! - **friends-of**: print one owner's friends
//! - **tweets**: store rendered HTML for every tweet
//!
//! Connection and table settings come from the environment (see
//! `config.rs`); reports go to stdout, logs to stderr.

use clap::{Parser, Subcommand};
use isuwitter_migrate::friends::{load_friends, load_friends_from_source};
use isuwitter_migrate::{migrate_tweets, ConflictPolicy, Config, Database, FriendMigrator, Result};
use serde::Serialize;
use std::fmt::Display;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// isuwitter data migrations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split the delimited friend lists into one row per (owner, friend) edge
    Friends {
        /// Plan the migration without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Behaviour when an edge already exists (overrides FRIENDS_ON_CONFLICT)
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictPolicy>,
    },

    /// Print the friends of one owner
    FriendsOf {
        owner: String,

        /// Read the legacy delimited table instead of the edge table
        #[arg(long)]
        from_source: bool,
    },

    /// Store rendered HTML for every tweet
    Tweets {
        /// Count the tweets that would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();

    info!("🚀 isuwitter-migrate v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), "❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize structured logging with tracing
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default log levels
        EnvFilter::new("isuwitter_migrate=info,sqlx=warn,warn")
    });

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(std::env::var("NO_COLOR").is_err()),
            )
            .init();
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env()?;
    apply_cli_overrides(&mut config, &args.command);
    config.log_summary();

    let db = Database::new(&config.database).await?;

    // The pool is closed on every exit path, including failures
    let result = execute(&db, &config, args.command, args.json).await;
    db.close().await;
    result
}

/// Command-line flags win over the environment
fn apply_cli_overrides(config: &mut Config, command: &Command) {
    if let Command::Friends {
        on_conflict: Some(policy),
        ..
    } = command
    {
        config.friends.on_conflict = *policy;
    }
}

async fn execute(db: &Database, config: &Config, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Friends { dry_run, .. } => {
            let migrator = FriendMigrator::new(db.pool(), config.friends.clone());
            let report = migrator.run(dry_run).await?;
            print_report(&report, json)
        }
        Command::FriendsOf { owner, from_source } => {
            let friends = if from_source {
                load_friends_from_source(
                    db.pool(),
                    &config.friends.source_table,
                    &owner,
                    &config.friends.rules,
                )
                .await?
            } else {
                load_friends(db.pool(), &config.friends.dest_table, &owner).await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&friends)?);
            } else {
                for friend in friends {
                    println!("{}", friend);
                }
            }
            Ok(())
        }
        Command::Tweets { dry_run } => {
            let report = migrate_tweets(db.pool(), &config.tweets.table, dry_run).await?;
            print_report(&report, json)
        }
    }
}

fn print_report<T: Serialize + Display>(report: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isuwitter_migrate::config::{DatabaseConfig, FriendMigrationConfig, TweetMigrationConfig};

    fn config(on_conflict: ConflictPolicy) -> Config {
        Config {
            database: DatabaseConfig::with_url("sqlite://isuwitter.db"),
            friends: FriendMigrationConfig {
                on_conflict,
                ..FriendMigrationConfig::default()
            },
            tweets: TweetMigrationConfig::default(),
        }
    }

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("isuwitter-migrate").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_on_conflict_flag_overrides_env() {
        let args = parse(&["friends", "--on-conflict", "abort"]);
        let mut config = config(ConflictPolicy::Skip);

        apply_cli_overrides(&mut config, &args.command);
        assert_eq!(config.friends.on_conflict, ConflictPolicy::Abort);
    }

    #[test]
    fn test_env_policy_kept_without_flag() {
        let args = parse(&["friends", "--dry-run"]);
        let mut config = config(ConflictPolicy::Abort);

        apply_cli_overrides(&mut config, &args.command);
        assert_eq!(config.friends.on_conflict, ConflictPolicy::Abort);

        let args = parse(&["--json", "tweets"]);
        apply_cli_overrides(&mut config, &args.command);
        assert_eq!(config.friends.on_conflict, ConflictPolicy::Abort);
        assert!(args.json);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let argv = ["isuwitter-migrate", "friends", "--on-conflict", "upsert"];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
