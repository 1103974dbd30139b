use std::path::Path;

use rusqlite::Connection;
use tracing;

use super::DatabaseError;

/// Versioned schema migrations, applied in order. Each script records its
/// own version row in schema_version.
const MIGRATIONS: [(i64, &str); 2] = [
    (1, include_str!("../../resources/migrations/001_initial.sql")),
    (2, include_str!("../../resources/migrations/002_catalog_seed.sql")),
];

/// Open a SQLite connection to the given path and bring the schema up to
/// date.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    // WAL keeps concurrent request handlers from serializing on reads;
    // foreign keys are off by default in SQLite and the event/treatment
    // cleanup order depends on them.
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Apply every migration newer than the stored schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current = current_schema_version(conn);

    for (version, sql) in MIGRATIONS {
        if version > current {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Stored schema version; 0 when the schema_version table does not exist
/// yet (fresh database).
fn current_schema_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

/// Count tables in the database (for verification)
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        // patients + service_categories + services + patient_service_groups
        // + patient_services + patient_treatment_events + payment_methods
        // + payment_statuses + patient_payments + schema_version = 10
        let count = count_tables(&conn).unwrap();
        assert_eq!(count, 10, "Expected 10 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        let result = run_migrations(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn payment_catalogs_seeded() {
        let conn = open_memory_database().unwrap();
        let methods: i64 = conn
            .query_row("SELECT COUNT(*) FROM payment_methods", [], |row| row.get(0))
            .unwrap();
        let statuses: i64 = conn
            .query_row("SELECT COUNT(*) FROM payment_statuses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(methods, 3);
        assert_eq!(statuses, 3);
    }

    #[test]
    fn database_opens_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let conn = open_database(&path).unwrap();
        assert_eq!(count_tables(&conn).unwrap(), 10);
        drop(conn);

        // Re-open — migrations must be idempotent across sessions
        let conn2 = open_database(&path).unwrap();
        assert_eq!(count_tables(&conn2).unwrap(), 10);
    }
}
