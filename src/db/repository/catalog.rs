//! Reference-table lookups: service catalog, payment methods and statuses.
//!
//! Name lookups tolerate absent rows — callers fall back to a sentinel id
//! instead of failing the request.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Tables exposed to [`lookup_id_by_name`]. Anything else is rejected —
/// table names cannot be bound as SQL parameters.
const NAME_LOOKUP_TABLES: [&str; 2] = ["payment_methods", "payment_statuses"];

pub fn insert_category(conn: &Connection, name: &str, sort_order: i64) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO service_categories (name, sort_order) VALUES (?1, ?2)",
        params![name, sort_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_service(conn: &Connection, category_id: i64, name: &str) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO services (category_id, name) VALUES (?1, ?2)",
        params![category_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn service_exists(conn: &Connection, service_id: i64) -> Result<bool, DatabaseError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM services WHERE id = ?1 LIMIT 1",
            params![service_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn category_id_for_name(conn: &Connection, name: &str) -> Result<Option<i64>, DatabaseError> {
    conn.query_row(
        "SELECT id FROM service_categories WHERE name = ?1 LIMIT 1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Resolve a catalog row id by its human-readable name. `None` when the
/// row is absent (caller decides the sentinel).
pub fn lookup_id_by_name(
    conn: &Connection,
    table: &str,
    name: &str,
) -> Result<Option<i64>, DatabaseError> {
    if !NAME_LOOKUP_TABLES.contains(&table) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "name lookups not supported for table {table}"
        )));
    }
    conn.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?1 LIMIT 1"),
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(DatabaseError::from)
}
