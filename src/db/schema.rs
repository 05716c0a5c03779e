//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Append-only response memory. Insertion order (id) decides which
        -- entry wins when several match a lookup.
        CREATE TABLE IF NOT EXISTS memory_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

/// Import rows from a legacy `memory (query, response)` table
///
/// Older databases stored entries without ids; rowid order is their
/// insertion order, so it is preserved on import.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let legacy: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'memory'",
        [],
        |row| row.get(0),
    )?;

    if legacy > 0 {
        let imported = conn.execute(
            "INSERT INTO memory_entries (query, response)
             SELECT COALESCE(query, ''), COALESCE(response, '') FROM memory ORDER BY rowid",
            [],
        )?;
        conn.execute_batch("DROP TABLE memory;")?;
        tracing::info!(imported, "imported legacy memory table");
    }

    conn.execute_batch("PRAGMA user_version = 2;")?;

    tracing::info!("migrated to schema v2");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_sets_version() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
    }

    #[test]
    fn test_legacy_table_imported_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r"
            CREATE TABLE memory (query TEXT, response TEXT);
            INSERT INTO memory VALUES ('run ls', 'first');
            INSERT INTO memory VALUES ('run ls -la', 'second');
            ",
        )
        .unwrap();

        init(&conn).unwrap();

        let rows: Vec<(String, String)> = conn
            .prepare("SELECT query, response FROM memory_entries ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        assert_eq!(
            rows,
            vec![
                ("run ls".to_string(), "first".to_string()),
                ("run ls -la".to_string(), "second".to_string()),
            ]
        );

        let legacy: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE name = 'memory'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(legacy, 0);
    }
}
