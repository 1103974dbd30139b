use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{NewGroup, TreatmentGroup};

pub fn insert_group(
    conn: &Connection,
    patient_id: i64,
    group: &NewGroup,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_service_groups (patient_id, title, start_date, status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![patient_id, group.title, group.start_date, group.status, group.notes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_group(
    conn: &Connection,
    patient_id: i64,
    group_id: i64,
) -> Result<Option<TreatmentGroup>, DatabaseError> {
    conn.query_row(
        "SELECT id, patient_id, title, start_date, status, notes, created_at, updated_at
         FROM patient_service_groups
         WHERE id = ?1 AND patient_id = ?2",
        params![group_id, patient_id],
        |row| {
            Ok(TreatmentGroup {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                title: row.get(2)?,
                start_date: row.get(3)?,
                status: row.get(4)?,
                notes: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// The group id stored on a treatment row, if any.
pub fn stored_group_id(conn: &Connection, treatment_id: i64) -> Result<Option<i64>, DatabaseError> {
    let group_id: Option<Option<i64>> = conn
        .query_row(
            "SELECT group_id FROM patient_services WHERE id = ?1 LIMIT 1",
            params![treatment_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(group_id.flatten())
}

/// Earliest service date among the group's members. Never stored.
pub fn group_start_date(conn: &Connection, group_id: i64) -> Result<Option<String>, DatabaseError> {
    let min: Option<Option<String>> = conn
        .query_row(
            "SELECT MIN(service_date) FROM patient_services WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(min.flatten())
}

/// Latest payment created_at across the group's members. Never stored.
pub fn group_last_activity(
    conn: &Connection,
    patient_id: i64,
    group_id: i64,
) -> Result<Option<String>, DatabaseError> {
    let max: Option<Option<String>> = conn
        .query_row(
            "SELECT MAX(pp.created_at)
             FROM patient_payments pp
             JOIN patient_services ps ON ps.id = pp.patient_service_id
             WHERE pp.patient_id = ?1 AND ps.group_id = ?2",
            params![patient_id, group_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(max.flatten())
}

/// Member count and summed cost for a group.
pub fn group_member_stats(conn: &Connection, group_id: i64) -> Result<(i64, f64), DatabaseError> {
    conn.query_row(
        "SELECT COUNT(*), IFNULL(SUM(total_cost), 0)
         FROM patient_services WHERE group_id = ?1",
        params![group_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .map_err(DatabaseError::from)
}
