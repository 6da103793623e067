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

        CREATE TABLE IF NOT EXISTS metrics (
            ts INTEGER PRIMARY KEY,
            rps REAL NOT NULL,
            bps REAL NOT NULL,
            unique_src INTEGER NOT NULL,
            syn_ratio REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sources (
            ts INTEGER NOT NULL,
            src_ip TEXT NOT NULL,
            req INTEGER NOT NULL,
            PRIMARY KEY (ts, src_ip),
            FOREIGN KEY (ts) REFERENCES metrics(ts)
        );

        CREATE TABLE IF NOT EXISTS analysis (
            ts INTEGER PRIMARY KEY,
            z_rps REAL NOT NULL,
            z_bps REAL NOT NULL,
            score REAL NOT NULL,
            is_anomaly INTEGER NOT NULL,
            FOREIGN KEY (ts) REFERENCES metrics(ts)
        );

        CREATE TABLE IF NOT EXISTS incidents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_ts INTEGER NOT NULL,
            end_ts INTEGER NOT NULL,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sources_ts ON sources(ts);
        CREATE INDEX IF NOT EXISTS idx_sources_ip ON sources(src_ip);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_incidents_start ON incidents(start_ts);

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);",
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

        for table in ["metrics", "sources", "analysis", "incidents"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0, "table {} should start empty", table);
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should not error

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
