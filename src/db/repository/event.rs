use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::db::DatabaseError;
use crate::models::{EventFilter, PatientEvent};

#[derive(Debug)]
pub struct EventRow<'a> {
    pub patient_service_id: Option<i64>,
    pub patient_service_group_id: Option<i64>,
    pub event_type: &'a str,
    pub message: &'a str,
    pub meta_json: Option<String>,
    pub created_by: Option<i64>,
}

pub fn insert_event(
    conn: &Connection,
    patient_id: i64,
    row: &EventRow<'_>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_treatment_events
           (patient_id, patient_service_id, patient_service_group_id,
            event_type, message, meta, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient_id,
            row.patient_service_id,
            row.patient_service_group_id,
            row.event_type,
            row.message,
            row.meta_json,
            row.created_by,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Stored meta is opaque JSON text; anything unparseable decodes to None
/// so one bad payload cannot poison a list read.
fn parse_meta(raw: Option<String>) -> Option<Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn event_from_row(row: &Row<'_>) -> Result<PatientEvent, rusqlite::Error> {
    Ok(PatientEvent {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_service_id: row.get(2)?,
        patient_service_group_id: row.get(3)?,
        event_type: row.get(4)?,
        message: row.get(5)?,
        meta: parse_meta(row.get(6)?),
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        service_name: row.get(9)?,
    })
}

const EVENT_SELECT: &str = "
    SELECT
        e.id, e.patient_id, e.patient_service_id, e.patient_service_group_id,
        e.event_type, e.message, e.meta, e.created_by, e.created_at,
        s.name AS service_name
    FROM patient_treatment_events e
    LEFT JOIN patient_services ps ON ps.id = e.patient_service_id
    LEFT JOIN services s ON s.id = ps.service_id
";

/// Single event with its service annotation (append read-back).
pub fn get_event(conn: &Connection, event_id: i64) -> Result<Option<PatientEvent>, DatabaseError> {
    let sql = format!("{EVENT_SELECT} WHERE e.id = ?1");
    conn.query_row(&sql, params![event_id], event_from_row)
        .optional()
        .map_err(DatabaseError::from)
}

/// Ownership-scoped (id, event_type) probe for the note-mutability check.
pub fn get_event_header(
    conn: &Connection,
    patient_id: i64,
    event_id: i64,
) -> Result<Option<(i64, String)>, DatabaseError> {
    conn.query_row(
        "SELECT id, event_type FROM patient_treatment_events
         WHERE id = ?1 AND patient_id = ?2",
        params![event_id, patient_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Filtered page of events, newest first, plus the unpaged total.
///
/// Filtering by group matches events tagged with the group directly AND
/// events hanging off treatments whose stored group_id matches.
pub fn list_events(
    conn: &Connection,
    patient_id: i64,
    filter: &EventFilter,
    limit: u32,
    offset: u32,
) -> Result<(Vec<PatientEvent>, i64), DatabaseError> {
    let mut where_clauses = vec!["e.patient_id = ?1".to_string()];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(patient_id)];

    if let Some(service_id) = filter.patient_service_id {
        values.push(Box::new(service_id));
        where_clauses.push(format!("e.patient_service_id = ?{}", values.len()));
    }
    if let Some(group_id) = filter.patient_service_group_id {
        values.push(Box::new(group_id));
        let a = values.len();
        values.push(Box::new(group_id));
        let b = values.len();
        where_clauses.push(format!(
            "(e.patient_service_group_id = ?{a} OR ps.group_id = ?{b})"
        ));
    }
    if let Some(ref event_type) = filter.event_type {
        values.push(Box::new(event_type.clone()));
        where_clauses.push(format!("e.event_type = ?{}", values.len()));
    }
    if let Some(ref from) = filter.from {
        values.push(Box::new(from.clone()));
        where_clauses.push(format!("e.created_at >= ?{}", values.len()));
    }
    if let Some(ref to) = filter.to {
        values.push(Box::new(to.clone()));
        where_clauses.push(format!("e.created_at <= ?{}", values.len()));
    }

    let where_sql = where_clauses.join(" AND ");

    let count_sql = format!(
        "SELECT COUNT(*)
         FROM patient_treatment_events e
         LEFT JOIN patient_services ps ON ps.id = e.patient_service_id
         WHERE {where_sql}"
    );
    let params_ref: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let total: i64 = conn.query_row(&count_sql, params_ref.as_slice(), |row| row.get(0))?;

    values.push(Box::new(limit));
    let limit_idx = values.len();
    values.push(Box::new(offset));
    let offset_idx = values.len();

    let sql = format!(
        "{EVENT_SELECT}
         WHERE {where_sql}
         ORDER BY e.created_at DESC, e.id DESC
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_ref.as_slice(), event_from_row)?;
    let items = rows.collect::<Result<Vec<_>, _>>()?;

    Ok((items, total))
}

pub fn update_note_row(
    conn: &Connection,
    patient_id: i64,
    event_id: i64,
    message: &str,
    meta_json: Option<String>,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE patient_treatment_events
         SET message = ?1, meta = ?2
         WHERE id = ?3 AND patient_id = ?4",
        params![message, meta_json, event_id, patient_id],
    )?;
    Ok(updated)
}

pub fn delete_event_row(
    conn: &Connection,
    patient_id: i64,
    event_id: i64,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patient_treatment_events WHERE id = ?1 AND patient_id = ?2",
        params![event_id, patient_id],
    )?;
    Ok(deleted)
}

/// Purge a treatment's dependent events (runs before the treatment row
/// itself is deleted).
pub fn delete_events_for_treatment(
    conn: &Connection,
    patient_id: i64,
    treatment_id: i64,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patient_treatment_events
         WHERE patient_id = ?1 AND patient_service_id = ?2",
        params![patient_id, treatment_id],
    )?;
    Ok(deleted)
}
