//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS reminders (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            message    TEXT NOT NULL,
            due_at     TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status     TEXT NOT NULL DEFAULT 'pending'
                       CHECK(status IN ('pending', 'delivered', 'cleared'))
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_status_due
            ON reminders(status, due_at);

        PRAGMA user_version = 1;
        ",
    )?;
    Ok(())
}
