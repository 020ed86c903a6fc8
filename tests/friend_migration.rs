use isuwitter_migrate::config::{DatabaseConfig, FriendMigrationConfig};
use isuwitter_migrate::friends::{load_friends, load_friends_from_source};
use isuwitter_migrate::{ConflictPolicy, Database, Error, FriendMigrator, TableName, TokenRules};
use tempfile::TempDir;

/// Fresh SQLite database with an empty legacy `friends` table
async fn setup() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("isuwitter.db").display()
    );
    let db = Database::new(&DatabaseConfig::with_url(url)).await.unwrap();

    sqlx::query(
        "CREATE TABLE friends (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            me VARCHAR(20) NOT NULL UNIQUE,
            friends TEXT
        )",
    )
    .execute(db.pool())
    .await
    .unwrap();

    (dir, db)
}

async fn seed(db: &Database, rows: &[(&str, Option<&str>)]) {
    for (me, friends) in rows {
        sqlx::query("INSERT INTO friends (me, friends) VALUES (?, ?)")
            .bind(*me)
            .bind(*friends)
            .execute(db.pool())
            .await
            .unwrap();
    }
}

async fn edges(db: &Database) -> Vec<(String, String)> {
    sqlx::query_as::<_, (String, String)>("SELECT me, friend FROM friends2 ORDER BY me, friend")
        .fetch_all(db.pool())
        .await
        .unwrap()
}

fn edge(me: &str, friend: &str) -> (String, String) {
    (me.to_string(), friend.to_string())
}

fn config(on_conflict: ConflictPolicy) -> FriendMigrationConfig {
    FriendMigrationConfig {
        on_conflict,
        ..FriendMigrationConfig::default()
    }
}

#[tokio::test]
async fn migrates_single_owner() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("bob,carol"))]).await;

    let report = FriendMigrator::new(db.pool(), FriendMigrationConfig::default())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.source_rows, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(edges(&db).await, vec![edge("alice", "bob"), edge("alice", "carol")]);
    db.close().await;
}

#[tokio::test]
async fn every_token_becomes_an_edge() {
    let (_dir, db) = setup().await;
    seed(&db, &[("u", Some("a,b,c"))]).await;

    FriendMigrator::new(db.pool(), FriendMigrationConfig::default())
        .run(false)
        .await
        .unwrap();

    assert_eq!(
        edges(&db).await,
        vec![edge("u", "a"), edge("u", "b"), edge("u", "c")]
    );
    db.close().await;
}

#[tokio::test]
async fn empty_and_null_lists_produce_no_rows() {
    let (_dir, db) = setup().await;
    seed(&db, &[("dan", Some("")), ("erin", None), ("frank", Some(" , "))]).await;

    let report = FriendMigrator::new(db.pool(), FriendMigrationConfig::default())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.source_rows, 3);
    assert_eq!(report.empty_owners, 3);
    assert_eq!(report.inserted, 0);
    assert!(edges(&db).await.is_empty());
    db.close().await;
}

#[tokio::test]
async fn messy_lists_are_normalized() {
    let (_dir, db) = setup().await;
    seed(
        &db,
        &[("g", Some("a,,b")), ("h", Some(" a , b ")), ("i", Some("a,a,"))],
    )
    .await;

    FriendMigrator::new(db.pool(), FriendMigrationConfig::default())
        .run(false)
        .await
        .unwrap();

    assert_eq!(
        edges(&db).await,
        vec![
            edge("g", "a"),
            edge("g", "b"),
            edge("h", "a"),
            edge("h", "b"),
            edge("i", "a"),
        ]
    );
    db.close().await;
}

#[tokio::test]
async fn rerun_with_skip_is_a_no_op() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("bob,carol")), ("bob", Some("alice"))]).await;
    let migrator = FriendMigrator::new(db.pool(), config(ConflictPolicy::Skip));

    let first = migrator.run(false).await.unwrap();
    let before = edges(&db).await;
    let second = migrator.run(false).await.unwrap();

    assert_eq!(first.inserted, 3);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(edges(&db).await, before);
    db.close().await;
}

#[tokio::test]
async fn rerun_with_abort_fails_and_leaves_table_unchanged() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("bob,carol"))]).await;
    let migrator = FriendMigrator::new(db.pool(), config(ConflictPolicy::Abort));

    migrator.run(false).await.unwrap();
    let before = edges(&db).await;

    let err = migrator.run(false).await.unwrap_err();
    assert!(
        matches!(&err, Error::DuplicateEdge { owner, friend } if owner == "alice" && friend == "bob"),
        "unexpected error: {err:?}"
    );
    assert_eq!(edges(&db).await, before);
    db.close().await;
}

#[tokio::test]
async fn abort_rolls_back_rows_inserted_before_the_duplicate() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("bob,carol")), ("zed", Some("yan"))]).await;
    let migrator = FriendMigrator::new(db.pool(), config(ConflictPolicy::Abort));

    migrator.ensure_destination().await.unwrap();
    sqlx::query("INSERT INTO friends2 (me, friend) VALUES ('alice', 'carol')")
        .execute(db.pool())
        .await
        .unwrap();

    let err = migrator.run(false).await.unwrap_err();

    assert!(err.is_duplicate());
    assert_eq!(err.error_code(), "DUPLICATE_KEY");
    // ("alice", "bob") went in before the conflict and must be gone
    assert_eq!(edges(&db).await, vec![edge("alice", "carol")]);
    db.close().await;
}

#[tokio::test]
async fn repeated_token_without_dedupe_is_skipped() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("bob,bob"))]).await;

    let config = FriendMigrationConfig {
        rules: TokenRules {
            dedupe: false,
            ..TokenRules::default()
        },
        ..FriendMigrationConfig::default()
    };
    let report = FriendMigrator::new(db.pool(), config).run(false).await.unwrap();

    assert_eq!(report.planned_edges, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    db.close().await;
}

#[tokio::test]
async fn ensure_destination_keeps_existing_table() {
    let (_dir, db) = setup().await;
    sqlx::query(
        "CREATE TABLE friends2 (
            me VARCHAR(20) NOT NULL,
            friend VARCHAR(20) NOT NULL,
            note TEXT,
            PRIMARY KEY (me, friend)
        )",
    )
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query("INSERT INTO friends2 (me, friend, note) VALUES ('x', 'y', 'kept')")
        .execute(db.pool())
        .await
        .unwrap();

    let migrator = FriendMigrator::new(db.pool(), FriendMigrationConfig::default());
    migrator.ensure_destination().await.unwrap();
    migrator.ensure_destination().await.unwrap();

    let note: String = sqlx::query_scalar("SELECT note FROM friends2 WHERE me = 'x'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(note, "kept");
    db.close().await;
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("bob,carol")), ("dan", Some(""))]).await;

    let report = FriendMigrator::new(db.pool(), FriendMigrationConfig::default())
        .run(true)
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.planned_edges, 2);
    assert_eq!(report.empty_owners, 1);
    assert_eq!(report.inserted, 0);

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'friends2'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(tables, 0);
    db.close().await;
}

#[tokio::test]
async fn missing_source_table_is_a_database_error() {
    let (_dir, db) = setup().await;
    let config = FriendMigrationConfig {
        source_table: TableName::new("no_such_table").unwrap(),
        ..FriendMigrationConfig::default()
    };

    let err = FriendMigrator::new(db.pool(), config)
        .run(false)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Database { .. }), "unexpected error: {err:?}");
    db.close().await;
}

#[tokio::test]
async fn lookup_reads_both_tables() {
    let (_dir, db) = setup().await;
    seed(&db, &[("alice", Some("carol, bob")), ("dan", Some(""))]).await;
    let config = FriendMigrationConfig::default();

    FriendMigrator::new(db.pool(), config.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(
        load_friends(db.pool(), &config.dest_table, "alice").await.unwrap(),
        vec!["bob", "carol"]
    );
    assert!(load_friends(db.pool(), &config.dest_table, "nobody")
        .await
        .unwrap()
        .is_empty());

    assert_eq!(
        load_friends_from_source(db.pool(), &config.source_table, "alice", &config.rules)
            .await
            .unwrap(),
        vec!["carol", "bob"]
    );
    assert!(load_friends_from_source(db.pool(), &config.source_table, "dan", &config.rules)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        load_friends_from_source(db.pool(), &config.source_table, "nobody", &config.rules).await,
        Err(Error::NotFound { .. })
    ));
    db.close().await;
}
