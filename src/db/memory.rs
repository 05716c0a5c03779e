//! Memory repository: durable storage for the response cache

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use super::DbPool;
use crate::cache::{MemoryEntry, MemoryStore};
use crate::{Error, Result};

/// Column list for all memory SELECT queries
const MEMORY_COLUMNS: &str = "id, query, response, created_at";

/// Map a database row to a `MemoryEntry`
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEntry> {
    Ok(MemoryEntry {
        id: row.get(0)?,
        query: row.get(1)?,
        response: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

/// Memory repository
#[derive(Clone)]
pub struct MemoryRepo {
    pool: DbPool,
}

impl MemoryRepo {
    /// Create a new memory repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<super::DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }
}

impl MemoryStore for MemoryRepo {
    fn append(&self, query: &str, response: &str) -> Result<MemoryEntry> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO memory_entries (query, response, created_at) VALUES (?1, ?2, ?3)",
            params![query, response, now.to_rfc3339()],
        )?;

        Ok(MemoryEntry {
            id: conn.last_insert_rowid(),
            query: query.to_string(),
            response: response.to_string(),
            created_at: now,
        })
    }

    fn find_first_containing(&self, substring: &str) -> Result<Option<MemoryEntry>> {
        let conn = self.conn()?;

        // instr() is case-sensitive and treats % and _ literally, unlike LIKE
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {MEMORY_COLUMNS} FROM memory_entries
                     WHERE instr(query, ?1) > 0
                     ORDER BY id ASC LIMIT 1"
                ),
                [substring],
                row_to_entry,
            )
            .optional()?;

        Ok(entry)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT count(*) FROM memory_entries", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn recent(&self, limit: usize) -> Result<Vec<MemoryEntry>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memory_entries ORDER BY id DESC LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map([limit], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
