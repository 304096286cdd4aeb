use eventlease_db::{create_pool, run_migrations, DbRuntimeSettings};

#[test]
fn file_backed_pool_shares_schema_across_connections() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("eventlease.db");
    let pool = create_pool(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("failed to create pool");

    let first = pool.get().expect("failed to get connection");
    let applied = run_migrations(&first).expect("failed to run migrations");
    assert_eq!(applied, 3);

    // A second live connection must see the tables created through the first.
    let second = pool.get().expect("failed to get second connection");
    let mode: String = second
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("failed to query journal mode");
    assert_eq!(mode, "wal");

    let mut stmt = second
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .expect("failed to prepare table query");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("failed to execute table query")
        .map(|r| r.expect("failed to read table name"))
        .collect();

    assert_eq!(
        tables,
        vec!["_eventlease_migrations", "event_log", "event_subscriptions"]
    );

    let reapplied = run_migrations(&second).expect("failed to rerun migrations");
    assert_eq!(reapplied, 0);
}
