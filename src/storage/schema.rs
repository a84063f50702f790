//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS executions (
            execution_id TEXT PRIMARY KEY,
            config_name TEXT NOT NULL,
            status TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            total_cases INTEGER NOT NULL DEFAULT 0,
            completed_cases INTEGER NOT NULL DEFAULT 0,
            failed_cases INTEGER NOT NULL DEFAULT 0,
            results_ref TEXT,
            error_message TEXT,
            dispatch_handle TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS batch_summaries (
            execution_id TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            worker_index INTEGER NOT NULL,
            completed INTEGER NOT NULL,
            failed INTEGER NOT NULL,
            total INTEGER NOT NULL,
            duration_secs REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (execution_id, batch_id)
        );

        CREATE TABLE IF NOT EXISTS case_results (
            id INTEGER PRIMARY KEY,
            execution_id TEXT NOT NULL,
            model TEXT NOT NULL,
            user_type TEXT NOT NULL,
            think_mode INTEGER NOT NULL,
            question TEXT NOT NULL,
            iteration INTEGER NOT NULL,
            response TEXT NOT NULL,
            elapsed_secs REAL NOT NULL,
            success INTEGER NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_executions_created ON executions(created_at);
        CREATE INDEX IF NOT EXISTS idx_case_results_execution ON case_results(execution_id);",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        // Verify tables exist by querying them
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM executions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM batch_summaries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should not error
    }

    #[test]
    fn test_batch_summaries_dedup_by_primary_key() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let insert = "INSERT OR IGNORE INTO batch_summaries
            (execution_id, batch_id, worker_index, completed, failed, total, duration_secs)
            VALUES ('e1', 'batch_0', 0, 3, 1, 4, 12.5)";
        assert_eq!(conn.execute(insert, []).unwrap(), 1);
        assert_eq!(conn.execute(insert, []).unwrap(), 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM batch_summaries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
